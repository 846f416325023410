use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;

use crate::error::{AppError, AppResult};

pub type DatabasePool = Arc<SqlitePool>;

const WRITE_RETRY_ATTEMPTS: u32 = 5;
const WRITE_RETRY_BASE_DELAY: Duration = Duration::from_millis(100);

pub async fn create_pool(database_url: &str) -> anyhow::Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    Ok(pool)
}

pub async fn new_pool(database_url: &str) -> anyhow::Result<DatabasePool> {
    let pool = create_pool(database_url).await?;
    init_schema(&pool).await?;
    Ok(Arc::new(pool))
}

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS invoice_sequences (
        prefix TEXT PRIMARY KEY,
        last_number INTEGER NOT NULL DEFAULT 0
    )",
    "CREATE TABLE IF NOT EXISTS parties (
        party_id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE,
        phone TEXT UNIQUE,
        alternate_phone TEXT,
        landline_phone TEXT,
        address TEXT,
        pan_number TEXT,
        aadhaar_number TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS sales (
        invoice_no TEXT PRIMARY KEY,
        sale_date TEXT NOT NULL,
        party_id INTEGER NOT NULL REFERENCES parties(party_id) ON DELETE RESTRICT,
        total_amount REAL NOT NULL,
        cheque_amount REAL NOT NULL DEFAULT 0,
        online_amount REAL NOT NULL DEFAULT 0,
        upi_amount REAL NOT NULL DEFAULT 0,
        cash_amount REAL NOT NULL DEFAULT 0,
        old_gold_amount REAL NOT NULL DEFAULT 0,
        balance_amount REAL NOT NULL DEFAULT 0,
        payment_mode TEXT,
        payment_note TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS sale_items (
        item_id INTEGER PRIMARY KEY AUTOINCREMENT,
        invoice_no TEXT NOT NULL REFERENCES sales(invoice_no) ON DELETE CASCADE,
        metal TEXT NOT NULL,
        description TEXT,
        qty INTEGER NOT NULL DEFAULT 1,
        gross_weight REAL NOT NULL DEFAULT 0,
        loss_weight REAL NOT NULL DEFAULT 0,
        net_weight REAL NOT NULL DEFAULT 0,
        purity TEXT,
        metal_rate REAL NOT NULL DEFAULT 0,
        base_amount REAL NOT NULL DEFAULT 0,
        making_charge_type TEXT NOT NULL DEFAULT 'fixed',
        making_charge_rate REAL NOT NULL DEFAULT 0,
        making_charge REAL NOT NULL DEFAULT 0,
        stone_weight REAL NOT NULL DEFAULT 0,
        stone_amount REAL NOT NULL DEFAULT 0,
        wastage_percent REAL NOT NULL DEFAULT 0,
        wastage_amount REAL NOT NULL DEFAULT 0,
        hsn_code TEXT,
        cgst_percent REAL NOT NULL DEFAULT 0,
        sgst_percent REAL NOT NULL DEFAULT 0,
        cgst_amount REAL NOT NULL DEFAULT 0,
        sgst_amount REAL NOT NULL DEFAULT 0,
        line_total REAL NOT NULL DEFAULT 0
    )",
    "CREATE TABLE IF NOT EXISTS purchases (
        invoice_no TEXT PRIMARY KEY,
        purchase_date TEXT NOT NULL,
        party_id INTEGER NOT NULL REFERENCES parties(party_id) ON DELETE RESTRICT,
        total_amount REAL NOT NULL,
        cheque_amount REAL NOT NULL DEFAULT 0,
        online_amount REAL NOT NULL DEFAULT 0,
        upi_amount REAL NOT NULL DEFAULT 0,
        cash_amount REAL NOT NULL DEFAULT 0,
        balance_amount REAL NOT NULL DEFAULT 0,
        payment_mode TEXT,
        payment_note TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS purchase_items (
        item_id INTEGER PRIMARY KEY AUTOINCREMENT,
        invoice_no TEXT NOT NULL REFERENCES purchases(invoice_no) ON DELETE CASCADE,
        metal TEXT NOT NULL,
        description TEXT,
        qty INTEGER NOT NULL DEFAULT 1,
        gross_weight REAL NOT NULL DEFAULT 0,
        loss_weight REAL NOT NULL DEFAULT 0,
        net_weight REAL NOT NULL DEFAULT 0,
        purity TEXT,
        metal_rate REAL NOT NULL DEFAULT 0,
        base_amount REAL NOT NULL DEFAULT 0,
        making_charge_type TEXT NOT NULL DEFAULT 'fixed',
        making_charge_rate REAL NOT NULL DEFAULT 0,
        making_charge REAL NOT NULL DEFAULT 0,
        stone_weight REAL NOT NULL DEFAULT 0,
        stone_amount REAL NOT NULL DEFAULT 0,
        wastage_percent REAL NOT NULL DEFAULT 0,
        wastage_amount REAL NOT NULL DEFAULT 0,
        hsn_code TEXT,
        cgst_percent REAL NOT NULL DEFAULT 0,
        sgst_percent REAL NOT NULL DEFAULT 0,
        cgst_amount REAL NOT NULL DEFAULT 0,
        sgst_amount REAL NOT NULL DEFAULT 0,
        line_total REAL NOT NULL DEFAULT 0
    )",
    "CREATE TABLE IF NOT EXISTS receivables (
        entry_id INTEGER PRIMARY KEY AUTOINCREMENT,
        invoice_no TEXT NOT NULL UNIQUE REFERENCES sales(invoice_no) ON DELETE CASCADE,
        party_id INTEGER NOT NULL REFERENCES parties(party_id) ON DELETE RESTRICT,
        initial_balance REAL NOT NULL,
        current_balance REAL NOT NULL,
        last_payment_date TEXT,
        status TEXT NOT NULL DEFAULT 'pending',
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS payables (
        entry_id INTEGER PRIMARY KEY AUTOINCREMENT,
        invoice_no TEXT NOT NULL UNIQUE REFERENCES purchases(invoice_no) ON DELETE CASCADE,
        party_id INTEGER NOT NULL REFERENCES parties(party_id) ON DELETE RESTRICT,
        initial_balance REAL NOT NULL,
        current_balance REAL NOT NULL,
        last_payment_date TEXT,
        status TEXT NOT NULL DEFAULT 'pending',
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS receivable_transactions (
        txn_id INTEGER PRIMARY KEY AUTOINCREMENT,
        entry_id INTEGER NOT NULL REFERENCES receivables(entry_id) ON DELETE CASCADE,
        payment_date TEXT NOT NULL,
        amount REAL NOT NULL,
        payment_mode TEXT,
        note TEXT,
        reference_no TEXT,
        created_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS payable_transactions (
        txn_id INTEGER PRIMARY KEY AUTOINCREMENT,
        entry_id INTEGER NOT NULL REFERENCES payables(entry_id) ON DELETE CASCADE,
        payment_date TEXT NOT NULL,
        amount REAL NOT NULL,
        payment_mode TEXT,
        note TEXT,
        reference_no TEXT,
        created_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS deposits (
        deposit_no TEXT PRIMARY KEY,
        deposit_date TEXT NOT NULL,
        party_id INTEGER NOT NULL REFERENCES parties(party_id) ON DELETE RESTRICT,
        sale_invoice_no TEXT REFERENCES sales(invoice_no) ON DELETE SET NULL,
        purchase_invoice_no TEXT REFERENCES purchases(invoice_no) ON DELETE SET NULL,
        amount REAL NOT NULL,
        payment_mode TEXT,
        payment_note TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS settings (
        setting_key TEXT PRIMARY KEY,
        setting_value TEXT NOT NULL,
        description TEXT,
        updated_at TEXT
    )",
    "CREATE INDEX IF NOT EXISTS idx_sales_party ON sales(party_id)",
    "CREATE INDEX IF NOT EXISTS idx_purchases_party ON purchases(party_id)",
    "CREATE INDEX IF NOT EXISTS idx_receivables_party_status ON receivables(party_id, status)",
    "CREATE INDEX IF NOT EXISTS idx_payables_party_status ON payables(party_id, status)",
    "CREATE INDEX IF NOT EXISTS idx_payable_txns_reference ON payable_transactions(reference_no)",
];

pub async fn init_schema(pool: &SqlitePool) -> anyhow::Result<()> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }
    tracing::debug!("Database schema ready");
    Ok(())
}

fn is_busy(err: &AppError) -> bool {
    match err {
        AppError::Database(sqlx::Error::Database(db_err)) => {
            let msg = db_err.message();
            msg.contains("database is locked") || msg.contains("database table is locked")
        }
        _ => false,
    }
}

/// Runs a write closure, retrying with doubling delays while SQLite reports
/// the database locked. The closure is expected to open its own transaction
/// so each attempt starts from a clean slate.
pub async fn with_write_retry<T, F, Fut>(operation: &str, mut run: F) -> AppResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = AppResult<T>>,
{
    let mut delay = WRITE_RETRY_BASE_DELAY;
    let mut attempt = 0;

    loop {
        attempt += 1;
        match run().await {
            Ok(value) => return Ok(value),
            Err(err) if is_busy(&err) && attempt < WRITE_RETRY_ATTEMPTS => {
                tracing::warn!(
                    "{} hit a locked database (attempt {}), retrying in {:?}",
                    operation,
                    attempt,
                    delay
                );
                tokio::time::sleep(delay).await;
                delay *= 2;
            }
            Err(err) if is_busy(&err) => {
                tracing::error!("{} failed after {} attempts: {}", operation, attempt, err);
                return Err(AppError::Transient(format!(
                    "{} failed: database is locked",
                    operation
                )));
            }
            Err(err) => return Err(err),
        }
    }
}
