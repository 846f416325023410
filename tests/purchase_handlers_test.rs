// Integration tests for purchase handlers
// These tests verify:
// 1. An underpaid purchase opens a payable for the unpaid balance
// 2. Payments above the bill total are rejected with no partial state
// 3. Updating a purchase reshapes its payable to the new balance
// 4. Deleting the latest purchase cascades and frees its number

use axum::extract::{Path, State};
use axum::Json;

use jewel_billing_api::error::AppError;
use jewel_billing_api::handlers::{self, purchases};

mod test_helpers;
use test_helpers::*;

#[tokio::test]
async fn underpaid_purchase_opens_payable() {
    let ctx = setup().await;
    let party_id = create_test_party(&ctx.state, "Uma", "9876550001").await;

    let request = purchases::CreatePurchaseRequest {
        party_id,
        purchase_date: test_date(),
        items: vec![gold_line(10.0, 500.0)],
        cheque_amount: 0.0,
        online_amount: 0.0,
        upi_amount: 0.0,
        cash_amount: 2000.0,
        payment_mode: Some("cash".to_string()),
        payment_note: None,
    };
    let (status, Json(response)) =
        purchases::create_purchase(State(ctx.state.clone()), Json(request))
            .await
            .unwrap();

    assert_eq!(status, axum::http::StatusCode::CREATED);
    assert_eq!(response.invoice_no, "PUR-2025-00001");
    assert_eq!(response.total_amount, 5000.0);
    assert_eq!(response.balance_amount, 3000.0);
    assert!(response.payable_opened);

    let (balance, entry_status) =
        entry_state(&ctx.state, "payables", &response.invoice_no).await;
    assert_eq!(balance, 3000.0);
    assert_eq!(entry_status, "pending");
}

#[tokio::test]
async fn fully_paid_purchase_opens_no_payable() {
    let ctx = setup().await;
    let party_id = create_test_party(&ctx.state, "Veer", "9876550002").await;

    let request = purchases::CreatePurchaseRequest {
        party_id,
        purchase_date: test_date(),
        items: vec![gold_line(10.0, 500.0)],
        cheque_amount: 0.0,
        online_amount: 0.0,
        upi_amount: 0.0,
        cash_amount: 5000.0,
        payment_mode: Some("cash".to_string()),
        payment_note: None,
    };
    let (_, Json(response)) = purchases::create_purchase(State(ctx.state.clone()), Json(request))
        .await
        .unwrap();

    assert!(!response.payable_opened);
    assert!(!entry_exists(&ctx.state, "payables", &response.invoice_no).await);
}

#[tokio::test]
async fn purchase_rejects_payments_above_total() {
    let ctx = setup().await;
    let party_id = create_test_party(&ctx.state, "Wafa", "9876550003").await;

    let request = purchases::CreatePurchaseRequest {
        party_id,
        purchase_date: test_date(),
        items: vec![gold_line(10.0, 500.0)],
        cheque_amount: 0.0,
        online_amount: 0.0,
        upi_amount: 0.0,
        cash_amount: 6000.0,
        payment_mode: Some("cash".to_string()),
        payment_note: None,
    };
    let err = purchases::create_purchase(State(ctx.state.clone()), Json(request))
        .await
        .err()
        .unwrap();
    assert!(matches!(err, AppError::Validation(_)));

    let purchases_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM purchases")
        .fetch_one(&*ctx.state.db_pool)
        .await
        .unwrap();
    assert_eq!(purchases_count, 0, "Rejected purchase must leave no rows");
}

#[tokio::test]
async fn update_purchase_reshapes_payable() {
    let ctx = setup().await;
    let party_id = create_test_party(&ctx.state, "Yami", "9876550004").await;
    let invoice_no = create_credit_purchase(&ctx.state, party_id, 5000.0, 2000.0).await;

    // Bigger bill, same 3000 unpaid: the entry resets in place.
    let request = purchases::UpdatePurchaseRequest {
        purchase_date: test_date(),
        items: vec![gold_line(10.0, 800.0)],
        amount_paid: 5000.0,
        payment_mode: Some("upi".to_string()),
        payment_note: None,
    };
    let Json(response) = purchases::update_purchase(
        Path(invoice_no.clone()),
        State(ctx.state.clone()),
        Json(request),
    )
    .await
    .unwrap();
    assert_eq!(response.total_amount, 8000.0);
    assert_eq!(response.balance_amount, 3000.0);

    let (balance, status) = entry_state(&ctx.state, "payables", &invoice_no).await;
    assert_eq!(balance, 3000.0);
    assert_eq!(status, "pending");

    let upi_amount: f64 =
        sqlx::query_scalar("SELECT upi_amount FROM purchases WHERE invoice_no = ?")
            .bind(&invoice_no)
            .fetch_one(&*ctx.state.db_pool)
            .await
            .unwrap();
    assert_eq!(upi_amount, 5000.0, "Repayment lands in the named mode column");

    // Paying in full drops the entry.
    let request = purchases::UpdatePurchaseRequest {
        purchase_date: test_date(),
        items: vec![gold_line(10.0, 800.0)],
        amount_paid: 8000.0,
        payment_mode: Some("cash".to_string()),
        payment_note: None,
    };
    purchases::update_purchase(
        Path(invoice_no.clone()),
        State(ctx.state.clone()),
        Json(request),
    )
    .await
    .unwrap();
    assert!(!entry_exists(&ctx.state, "payables", &invoice_no).await);

    // Dropping the payment re-opens one.
    let request = purchases::UpdatePurchaseRequest {
        purchase_date: test_date(),
        items: vec![gold_line(10.0, 800.0)],
        amount_paid: 6000.0,
        payment_mode: Some("cash".to_string()),
        payment_note: None,
    };
    purchases::update_purchase(
        Path(invoice_no.clone()),
        State(ctx.state.clone()),
        Json(request),
    )
    .await
    .unwrap();
    let (balance, status) = entry_state(&ctx.state, "payables", &invoice_no).await;
    assert_eq!(balance, 2000.0);
    assert_eq!(status, "pending");

    let items_count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM purchase_items WHERE invoice_no = ?")
            .bind(&invoice_no)
            .fetch_one(&*ctx.state.db_pool)
            .await
            .unwrap();
    assert_eq!(items_count, 1, "Each update replaces the item rows");
}

#[tokio::test]
async fn deleting_latest_purchase_cascades_and_frees_number() {
    let ctx = setup().await;
    let party_id = create_test_party(&ctx.state, "Zara", "9876550005").await;
    let invoice_no = create_credit_purchase(&ctx.state, party_id, 3000.0, 0.0).await;

    handlers::delete_bill(Path(invoice_no.clone()), State(ctx.state.clone()))
        .await
        .unwrap();

    let purchase_exists: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM purchases WHERE invoice_no = ?)")
            .bind(&invoice_no)
            .fetch_one(&*ctx.state.db_pool)
            .await
            .unwrap();
    assert!(!purchase_exists);
    assert!(
        !entry_exists(&ctx.state, "payables", &invoice_no).await,
        "The payable goes with its purchase"
    );

    let reused = create_credit_purchase(&ctx.state, party_id, 1000.0, 1000.0).await;
    assert_eq!(reused, invoice_no, "The freed number is handed out again");
}
