// Test helpers for setting up a throwaway database and application state

use std::sync::Arc;

use axum::Json;
use chrono::NaiveDate;
use tempfile::TempDir;

use jewel_billing_api::config::Config;
use jewel_billing_api::database;
use jewel_billing_api::handlers;
use jewel_billing_api::models::MakingChargeType;
use jewel_billing_api::services::invoice_math::LineInput;
use jewel_billing_api::utils::date;
use jewel_billing_api::AppState;

/// Keeps the temp directory (database file and bills folder) alive for as
/// long as the state is used.
pub struct TestContext {
    pub state: AppState,
    _dir: TempDir,
}

pub async fn setup() -> TestContext {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let database_url = format!("sqlite://{}", dir.path().join("test.db").display());
    let db_pool = database::new_pool(&database_url)
        .await
        .expect("Failed to set up test database");
    let config = Arc::new(Config {
        database_url,
        port: 0,
        bills_dir: dir.path().join("bills").to_string_lossy().into_owned(),
    });

    TestContext {
        state: AppState { db_pool, config },
        _dir: dir,
    }
}

pub fn test_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, 10).expect("valid date")
}

pub async fn create_test_party(state: &AppState, name: &str, phone: &str) -> i64 {
    let now = date::now_stamp();
    let result = sqlx::query(
        "INSERT INTO parties (name, phone, created_at, updated_at) VALUES (?, ?, ?, ?)",
    )
    .bind(name)
    .bind(phone)
    .bind(&now)
    .bind(&now)
    .execute(&*state.db_pool)
    .await
    .expect("Failed to create test party");
    result.last_insert_rowid()
}

/// One plain line with no charges or taxes, so its total is grams × rate.
pub fn gold_line(grams: f64, rate_per_gram: f64) -> LineInput {
    LineInput {
        metal: "Gold".to_string(),
        description: Some("22k chain".to_string()),
        qty: 1,
        gross_weight: grams,
        loss_weight: 0.0,
        purity: Some("22K".to_string()),
        metal_rate: rate_per_gram,
        base_override: None,
        making_charge_type: MakingChargeType::Fixed,
        making_charge_rate: 0.0,
        stone_weight: 0.0,
        stone_amount: 0.0,
        wastage_percent: 0.0,
        hsn_code: Some("7113".to_string()),
        cgst_percent: 0.0,
        sgst_percent: 0.0,
    }
}

/// Saves a sale through the handler and returns its invoice number. The
/// unpaid part of `total` lands in the receivable ledger.
pub async fn create_credit_sale(state: &AppState, party_id: i64, total: f64, paid: f64) -> String {
    let request = handlers::CreateSaleRequest {
        party_id,
        sale_date: test_date(),
        items: vec![gold_line(10.0, total / 10.0)],
        cheque_amount: 0.0,
        online_amount: 0.0,
        upi_amount: 0.0,
        cash_amount: paid,
        old_gold_amount: 0.0,
        payment_mode: Some("cash".to_string()),
        payment_note: None,
    };

    let (status, Json(response)) =
        handlers::create_sale(axum::extract::State(state.clone()), Json(request))
            .await
            .expect("Failed to save test sale");
    assert_eq!(status, axum::http::StatusCode::CREATED);
    response.invoice_no
}

/// Saves a purchase through the handler and returns its invoice number.
pub async fn create_credit_purchase(
    state: &AppState,
    party_id: i64,
    total: f64,
    paid: f64,
) -> String {
    let request = handlers::CreatePurchaseRequest {
        party_id,
        purchase_date: test_date(),
        items: vec![gold_line(10.0, total / 10.0)],
        cheque_amount: 0.0,
        online_amount: 0.0,
        upi_amount: 0.0,
        cash_amount: paid,
        payment_mode: Some("cash".to_string()),
        payment_note: None,
    };

    let (status, Json(response)) =
        handlers::create_purchase(axum::extract::State(state.clone()), Json(request))
            .await
            .expect("Failed to save test purchase");
    assert_eq!(status, axum::http::StatusCode::CREATED);
    response.invoice_no
}

/// Inserts a sale row directly, bypassing the handler, for ledger-level
/// tests that need a bare invoice to hang an entry on.
pub async fn insert_bare_sale(
    state: &AppState,
    invoice_no: &str,
    party_id: i64,
    total: f64,
    balance: f64,
) {
    let now = date::now_stamp();
    sqlx::query(
        "INSERT INTO sales (invoice_no, sale_date, party_id, total_amount, cash_amount,
         balance_amount, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(invoice_no)
    .bind(&now)
    .bind(party_id)
    .bind(total)
    .bind(total - balance)
    .bind(balance)
    .bind(&now)
    .bind(&now)
    .execute(&*state.db_pool)
    .await
    .expect("Failed to insert sale row");
}

pub async fn insert_bare_purchase(
    state: &AppState,
    invoice_no: &str,
    party_id: i64,
    total: f64,
    balance: f64,
) {
    let now = date::now_stamp();
    sqlx::query(
        "INSERT INTO purchases (invoice_no, purchase_date, party_id, total_amount, cash_amount,
         balance_amount, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(invoice_no)
    .bind(&now)
    .bind(party_id)
    .bind(total)
    .bind(total - balance)
    .bind(balance)
    .bind(&now)
    .bind(&now)
    .execute(&*state.db_pool)
    .await
    .expect("Failed to insert purchase row");
}

pub async fn entry_state(state: &AppState, table: &str, invoice_no: &str) -> (f64, String) {
    sqlx::query_as(&format!(
        "SELECT current_balance, status FROM {} WHERE invoice_no = ?",
        table
    ))
    .bind(invoice_no)
    .fetch_one(&*state.db_pool)
    .await
    .expect("Ledger entry should exist")
}

pub async fn entry_exists(state: &AppState, table: &str, invoice_no: &str) -> bool {
    sqlx::query_scalar(&format!(
        "SELECT EXISTS(SELECT 1 FROM {} WHERE invoice_no = ?)",
        table
    ))
    .bind(invoice_no)
    .fetch_one(&*state.db_pool)
    .await
    .expect("Failed to query ledger entry")
}
