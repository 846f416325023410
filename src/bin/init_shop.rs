// Seeds the shop profile printed on every bill.
// Usage: cargo run --bin init_shop -- --name "Shree Jewellers" --gstin 27AAAAA0000A1Z5

use clap::Parser;

use jewel_billing_api::database;
use jewel_billing_api::utils::date;
use jewel_billing_api::Config;

#[derive(Parser)]
#[command(name = "init_shop", about = "Seed the shop profile used on printed bills")]
struct Args {
    /// Shop name printed at the top of every bill
    #[arg(long)]
    name: String,

    /// Street address line
    #[arg(long)]
    address: Option<String>,

    /// Contact phone number
    #[arg(long)]
    phone: Option<String>,

    /// GST identification number
    #[arg(long)]
    gstin: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load environment variables
    dotenv::dotenv().ok();

    let config = Config::from_env()?;
    let pool = database::new_pool(&config.database_url).await?;

    let entries = [
        ("shop_name", Some(args.name), "Shop name printed on bills"),
        ("shop_address", args.address, "Shop address printed on bills"),
        ("shop_phone", args.phone, "Shop contact number"),
        ("shop_gstin", args.gstin, "Shop GST identification number"),
    ];

    for (key, value, description) in entries {
        let Some(value) = value else { continue };
        sqlx::query(
            "INSERT INTO settings (setting_key, setting_value, description, updated_at)
             VALUES (?, ?, ?, ?)
             ON CONFLICT (setting_key)
             DO UPDATE SET setting_value = excluded.setting_value,
                           updated_at = excluded.updated_at",
        )
        .bind(key)
        .bind(&value)
        .bind(description)
        .bind(date::now_stamp())
        .execute(&*pool)
        .await?;
        println!("✅ {} = {}", key, value);
    }

    println!("\nShop profile saved. Bills will use it from the next print.");
    Ok(())
}
