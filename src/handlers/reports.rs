use axum::{
    extract::{Query, State},
    response::Json,
};
use chrono::{Datelike, Local, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::AppResult;
use crate::AppState;

#[derive(Deserialize)]
pub struct DailyReportQuery {
    pub date: Option<NaiveDate>,
}

#[derive(Serialize, sqlx::FromRow)]
pub struct DailySaleRow {
    pub invoice_no: String,
    pub party_name: String,
    pub total_amount: f64,
    pub old_gold_amount: f64,
    pub balance_amount: f64,
    pub payment_mode: Option<String>,
}

#[derive(Serialize, sqlx::FromRow)]
pub struct DailyPurchaseRow {
    pub invoice_no: String,
    pub party_name: String,
    pub total_amount: f64,
    pub payment_mode: Option<String>,
}

#[derive(Serialize)]
pub struct DailyReport {
    pub date: String,
    pub sales: Vec<DailySaleRow>,
    pub total_sales: f64,
    pub total_old_gold: f64,
    pub total_received: f64,
    pub total_balance: f64,
    pub purchases: Vec<DailyPurchaseRow>,
    pub total_purchases: f64,
}

pub async fn daily_report(
    Query(query): Query<DailyReportQuery>,
    State(state): State<AppState>,
) -> AppResult<Json<DailyReport>> {
    let date = query.date.unwrap_or_else(|| Local::now().date_naive());
    let day_prefix = format!("{}%", date.format("%Y-%m-%d"));

    let sales = sqlx::query_as::<_, DailySaleRow>(
        "SELECT s.invoice_no, p.name AS party_name, s.total_amount, s.old_gold_amount,
                s.balance_amount, s.payment_mode
         FROM sales s
         JOIN parties p ON s.party_id = p.party_id
         WHERE s.sale_date LIKE ?
         ORDER BY s.invoice_no",
    )
    .bind(&day_prefix)
    .fetch_all(&*state.db_pool)
    .await?;

    let purchases = sqlx::query_as::<_, DailyPurchaseRow>(
        "SELECT pu.invoice_no, p.name AS party_name, pu.total_amount, pu.payment_mode
         FROM purchases pu
         JOIN parties p ON pu.party_id = p.party_id
         WHERE pu.purchase_date LIKE ?
         ORDER BY pu.invoice_no",
    )
    .bind(&day_prefix)
    .fetch_all(&*state.db_pool)
    .await?;

    let total_sales: f64 = sales.iter().map(|s| s.total_amount).sum();
    let total_old_gold: f64 = sales.iter().map(|s| s.old_gold_amount).sum();
    let total_balance: f64 = sales.iter().map(|s| s.balance_amount).sum();
    let total_purchases: f64 = purchases.iter().map(|p| p.total_amount).sum();

    Ok(Json(DailyReport {
        date: date.format("%Y-%m-%d").to_string(),
        sales,
        total_sales,
        total_old_gold,
        total_received: total_sales - total_balance,
        total_balance,
        purchases,
        total_purchases,
    }))
}

#[derive(Deserialize)]
pub struct MonthlyReportQuery {
    pub year: Option<i32>,
}

#[derive(Serialize, sqlx::FromRow)]
pub struct MonthlySalesRow {
    pub month: String,
    pub sales_count: i64,
    pub total_amount: f64,
    pub old_gold_amount: f64,
    pub balance_amount: f64,
    pub received_amount: f64,
}

#[derive(Serialize, sqlx::FromRow)]
pub struct MonthlyPurchasesRow {
    pub month: String,
    pub purchase_count: i64,
    pub total_amount: f64,
}

#[derive(Serialize)]
pub struct MonthlyReport {
    pub year: i32,
    pub sales: Vec<MonthlySalesRow>,
    pub total_sales: f64,
    pub total_old_gold: f64,
    pub total_received: f64,
    pub total_balance: f64,
    pub purchases: Vec<MonthlyPurchasesRow>,
    pub total_purchases: f64,
}

pub async fn monthly_report(
    Query(query): Query<MonthlyReportQuery>,
    State(state): State<AppState>,
) -> AppResult<Json<MonthlyReport>> {
    let year = query.year.unwrap_or_else(|| Local::now().year());
    let year_prefix = format!("{}-%", year);

    let sales = sqlx::query_as::<_, MonthlySalesRow>(
        "SELECT substr(sale_date, 1, 7) AS month, COUNT(*) AS sales_count,
                SUM(total_amount) AS total_amount,
                SUM(old_gold_amount) AS old_gold_amount,
                SUM(balance_amount) AS balance_amount,
                SUM(total_amount) - SUM(balance_amount) AS received_amount
         FROM sales
         WHERE sale_date LIKE ?
         GROUP BY month
         ORDER BY month",
    )
    .bind(&year_prefix)
    .fetch_all(&*state.db_pool)
    .await?;

    let purchases = sqlx::query_as::<_, MonthlyPurchasesRow>(
        "SELECT substr(purchase_date, 1, 7) AS month, COUNT(*) AS purchase_count,
                SUM(total_amount) AS total_amount
         FROM purchases
         WHERE purchase_date LIKE ?
         GROUP BY month
         ORDER BY month",
    )
    .bind(&year_prefix)
    .fetch_all(&*state.db_pool)
    .await?;

    let total_sales: f64 = sales.iter().map(|s| s.total_amount).sum();
    let total_old_gold: f64 = sales.iter().map(|s| s.old_gold_amount).sum();
    let total_balance: f64 = sales.iter().map(|s| s.balance_amount).sum();
    let total_purchases: f64 = purchases.iter().map(|p| p.total_amount).sum();

    Ok(Json(MonthlyReport {
        year,
        sales,
        total_sales,
        total_old_gold,
        total_received: total_sales - total_balance,
        total_balance,
        purchases,
        total_purchases,
    }))
}

#[derive(Serialize, sqlx::FromRow)]
pub struct OutstandingRow {
    pub party_name: String,
    pub invoice_no: String,
    pub sale_date: String,
    pub current_balance: f64,
}

#[derive(Serialize, sqlx::FromRow)]
pub struct PartyOutstandingRow {
    pub party_name: String,
    pub pending_amount: f64,
}

#[derive(Serialize)]
pub struct OutstandingReport {
    pub entries: Vec<OutstandingRow>,
    pub total_outstanding: f64,
    pub by_party: Vec<PartyOutstandingRow>,
}

pub async fn outstanding_report(
    State(state): State<AppState>,
) -> AppResult<Json<OutstandingReport>> {
    let entries = sqlx::query_as::<_, OutstandingRow>(
        "SELECT p.name AS party_name, r.invoice_no, s.sale_date, r.current_balance
         FROM receivables r
         JOIN parties p ON r.party_id = p.party_id
         JOIN sales s ON r.invoice_no = s.invoice_no
         WHERE r.current_balance > 0
         ORDER BY r.current_balance DESC",
    )
    .fetch_all(&*state.db_pool)
    .await?;

    let by_party = sqlx::query_as::<_, PartyOutstandingRow>(
        "SELECT p.name AS party_name, SUM(r.current_balance) AS pending_amount
         FROM receivables r
         JOIN parties p ON r.party_id = p.party_id
         WHERE r.current_balance > 0
         GROUP BY r.party_id
         ORDER BY pending_amount DESC",
    )
    .fetch_all(&*state.db_pool)
    .await?;

    let total_outstanding = entries.iter().map(|e| e.current_balance).sum();

    Ok(Json(OutstandingReport {
        entries,
        total_outstanding,
        by_party,
    }))
}

#[derive(Serialize, sqlx::FromRow)]
pub struct TopPartyRow {
    pub party_name: String,
    pub sales_count: i64,
    pub total_sales: f64,
}

pub async fn top_parties_report(
    State(state): State<AppState>,
) -> AppResult<Json<Vec<TopPartyRow>>> {
    let rows = sqlx::query_as::<_, TopPartyRow>(
        "SELECT p.name AS party_name, COUNT(s.invoice_no) AS sales_count,
                SUM(s.total_amount) AS total_sales
         FROM sales s
         JOIN parties p ON s.party_id = p.party_id
         GROUP BY s.party_id
         ORDER BY total_sales DESC
         LIMIT 10",
    )
    .fetch_all(&*state.db_pool)
    .await?;

    Ok(Json(rows))
}

#[derive(Deserialize)]
pub struct InventoryValueQuery {
    pub gold_rate: Option<f64>,
    pub silver_rate: Option<f64>,
}

#[derive(Serialize)]
pub struct MetalInventory {
    pub metal: String,
    pub purchased_grams: f64,
    pub sold_grams: f64,
    pub inventory_grams: f64,
    pub rate_per_10g: f64,
    pub value: f64,
}

#[derive(Serialize)]
pub struct InventoryValueReport {
    pub metals: Vec<MetalInventory>,
    pub total_value: f64,
}

const DEFAULT_GOLD_RATE: f64 = 60_000.0;
const DEFAULT_SILVER_RATE: f64 = 8_000.0;

async fn metal_weights(pool: &sqlx::SqlitePool, table: &str) -> AppResult<Vec<(String, f64)>> {
    let rows: Vec<(String, f64)> = sqlx::query_as(&format!(
        "SELECT metal, SUM(net_weight) FROM {} GROUP BY metal",
        table
    ))
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

fn weight_of(rows: &[(String, f64)], metal: &str) -> f64 {
    rows.iter()
        .filter(|(name, _)| name.eq_ignore_ascii_case(metal))
        .map(|(_, weight)| weight)
        .sum()
}

/// Net stock on hand per metal, valued at a caller-supplied rate per 10 g.
pub async fn inventory_value_report(
    Query(query): Query<InventoryValueQuery>,
    State(state): State<AppState>,
) -> AppResult<Json<InventoryValueReport>> {
    let purchased = metal_weights(&state.db_pool, "purchase_items").await?;
    let sold = metal_weights(&state.db_pool, "sale_items").await?;

    let rates = [
        ("Gold", query.gold_rate.unwrap_or(DEFAULT_GOLD_RATE)),
        ("Silver", query.silver_rate.unwrap_or(DEFAULT_SILVER_RATE)),
    ];

    let mut metals = Vec::with_capacity(rates.len());
    let mut total_value = 0.0;
    for (metal, rate) in rates {
        let purchased_grams = weight_of(&purchased, metal);
        let sold_grams = weight_of(&sold, metal);
        let inventory_grams = purchased_grams - sold_grams;
        let value = inventory_grams * rate / 10.0;
        total_value += value;
        metals.push(MetalInventory {
            metal: metal.to_string(),
            purchased_grams,
            sold_grams,
            inventory_grams,
            rate_per_10g: rate,
            value,
        });
    }

    Ok(Json(InventoryValueReport {
        metals,
        total_value,
    }))
}
