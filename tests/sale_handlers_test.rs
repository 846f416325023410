// Integration tests for sale handlers
// These tests verify:
// 1. Saving an underpaid sale opens a pending receivable for the balance
// 2. A fully paid sale opens no ledger entry
// 3. Payments above the bill total are rejected
// 4. Supplier dues are consumed FIFO as a payment component
// 5. Updates rewrite items and reshape the receivable entry
// 6. Only the latest bill can be deleted, and deletion reverses everything

use axum::extract::{Path, State};
use axum::Json;

use jewel_billing_api::error::AppError;
use jewel_billing_api::handlers::{self, sales};

mod test_helpers;
use test_helpers::*;

async fn sale_row_balance_law(state: &jewel_billing_api::AppState, invoice_no: &str) {
    let (total, cheque, online, upi, cash, old_gold, balance): (f64, f64, f64, f64, f64, f64, f64) =
        sqlx::query_as(
            "SELECT total_amount, cheque_amount, online_amount, upi_amount, cash_amount,
             old_gold_amount, balance_amount FROM sales WHERE invoice_no = ?",
        )
        .bind(invoice_no)
        .fetch_one(&*state.db_pool)
        .await
        .expect("Sale row should exist");

    let paid = cheque + online + upi + cash + old_gold;
    assert!(
        (balance - (total - paid)).abs() < 0.005,
        "balance {} must equal total {} minus payments {}",
        balance,
        total,
        paid
    );
}

#[tokio::test]
async fn underpaid_sale_opens_pending_receivable() {
    let ctx = setup().await;
    let party_id = create_test_party(&ctx.state, "Asha", "9876510001").await;

    let request = sales::CreateSaleRequest {
        party_id,
        sale_date: test_date(),
        items: vec![gold_line(10.0, 1000.0)],
        cheque_amount: 0.0,
        online_amount: 0.0,
        upi_amount: 0.0,
        cash_amount: 6000.0,
        old_gold_amount: 0.0,
        payment_mode: Some("cash".to_string()),
        payment_note: None,
    };
    let (status, Json(response)) =
        sales::create_sale(State(ctx.state.clone()), Json(request))
            .await
            .unwrap();

    assert_eq!(status, axum::http::StatusCode::CREATED);
    assert_eq!(response.invoice_no, "SAL-2025-00001");
    assert_eq!(response.total_amount, 10000.0);
    assert_eq!(response.balance_amount, 4000.0);
    assert!(response.receivable_opened);

    let (balance, status) = entry_state(&ctx.state, "receivables", &response.invoice_no).await;
    assert_eq!(balance, 4000.0);
    assert_eq!(status, "pending");
    sale_row_balance_law(&ctx.state, &response.invoice_no).await;
}

#[tokio::test]
async fn fully_paid_sale_opens_no_entry() {
    let ctx = setup().await;
    let party_id = create_test_party(&ctx.state, "Bina", "9876510002").await;

    let request = sales::CreateSaleRequest {
        party_id,
        sale_date: test_date(),
        items: vec![gold_line(10.0, 1000.0)],
        cheque_amount: 0.0,
        online_amount: 0.0,
        upi_amount: 0.0,
        cash_amount: 10000.0,
        old_gold_amount: 0.0,
        payment_mode: Some("cash".to_string()),
        payment_note: None,
    };
    let (_, Json(response)) = sales::create_sale(State(ctx.state.clone()), Json(request))
        .await
        .unwrap();

    assert_eq!(response.balance_amount, 0.0);
    assert!(!response.receivable_opened);
    assert!(!entry_exists(&ctx.state, "receivables", &response.invoice_no).await);
    sale_row_balance_law(&ctx.state, &response.invoice_no).await;
}

#[tokio::test]
async fn sale_rejects_payments_above_total() {
    let ctx = setup().await;
    let party_id = create_test_party(&ctx.state, "Chand", "9876510003").await;

    let request = sales::CreateSaleRequest {
        party_id,
        sale_date: test_date(),
        items: vec![gold_line(10.0, 1000.0)],
        cheque_amount: 0.0,
        online_amount: 0.0,
        upi_amount: 0.0,
        cash_amount: 12000.0,
        old_gold_amount: 0.0,
        payment_mode: Some("cash".to_string()),
        payment_note: None,
    };
    let err = sales::create_sale(State(ctx.state.clone()), Json(request))
        .await
        .err()
        .unwrap();

    assert!(matches!(err, AppError::Validation(_)));
    let sales_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sales")
        .fetch_one(&*ctx.state.db_pool)
        .await
        .unwrap();
    assert_eq!(sales_count, 0, "Rejected sale must leave no partial state");
}

#[tokio::test]
async fn sale_consumes_supplier_dues_fifo() {
    let ctx = setup().await;
    let party_id = create_test_party(&ctx.state, "Deep", "9876510004").await;

    // We owe this party 3000 from an earlier purchase.
    let purchase_no = create_credit_purchase(&ctx.state, party_id, 5000.0, 2000.0).await;
    let (payable, _) = entry_state(&ctx.state, "payables", &purchase_no).await;
    assert_eq!(payable, 3000.0);

    let request = sales::CreateSaleRequest {
        party_id,
        sale_date: test_date(),
        items: vec![gold_line(10.0, 1000.0)],
        cheque_amount: 0.0,
        online_amount: 0.0,
        upi_amount: 0.0,
        cash_amount: 7000.0,
        old_gold_amount: 0.0,
        payment_mode: Some("cash".to_string()),
        payment_note: None,
    };
    let (_, Json(response)) = sales::create_sale(State(ctx.state.clone()), Json(request))
        .await
        .unwrap();

    assert_eq!(response.supplier_dues_adjusted, 3000.0);
    assert_eq!(response.balance_amount, 0.0);
    assert!(!response.receivable_opened);

    let (payable, payable_status) = entry_state(&ctx.state, "payables", &purchase_no).await;
    assert_eq!(payable, 0.0);
    assert_eq!(payable_status, "paid");

    let tagged: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM payable_transactions WHERE reference_no = ?",
    )
    .bind(&response.invoice_no)
    .fetch_one(&*ctx.state.db_pool)
    .await
    .unwrap();
    assert_eq!(tagged, 1, "Settlement must be tagged with the sale number");
}

#[tokio::test]
async fn update_sale_reshapes_receivable() {
    let ctx = setup().await;
    let party_id = create_test_party(&ctx.state, "Esha", "9876510005").await;
    let invoice_no = create_credit_sale(&ctx.state, party_id, 10000.0, 6000.0).await;

    // Paying the new total in full extinguishes the entry.
    let request = sales::UpdateSaleRequest {
        sale_date: test_date(),
        items: vec![gold_line(8.0, 1000.0)],
        amount_paid: 8000.0,
        payment_mode: Some("upi".to_string()),
        payment_note: None,
    };
    let Json(response) = sales::update_sale(
        Path(invoice_no.clone()),
        State(ctx.state.clone()),
        Json(request),
    )
    .await
    .unwrap();

    assert_eq!(response.total_amount, 8000.0);
    assert_eq!(response.balance_amount, 0.0);
    assert!(!entry_exists(&ctx.state, "receivables", &invoice_no).await);
    sale_row_balance_law(&ctx.state, &invoice_no).await;

    let upi: f64 = sqlx::query_scalar("SELECT upi_amount FROM sales WHERE invoice_no = ?")
        .bind(&invoice_no)
        .fetch_one(&*ctx.state.db_pool)
        .await
        .unwrap();
    assert_eq!(upi, 8000.0, "Repayment must land in the named mode column");

    // Dropping the payment re-creates a fresh pending entry.
    let request = sales::UpdateSaleRequest {
        sale_date: test_date(),
        items: vec![gold_line(8.0, 1000.0)],
        amount_paid: 5000.0,
        payment_mode: Some("cash".to_string()),
        payment_note: None,
    };
    let Json(response) = sales::update_sale(
        Path(invoice_no.clone()),
        State(ctx.state.clone()),
        Json(request),
    )
    .await
    .unwrap();

    assert_eq!(response.balance_amount, 3000.0);
    let (balance, status) = entry_state(&ctx.state, "receivables", &invoice_no).await;
    assert_eq!(balance, 3000.0);
    assert_eq!(status, "pending");
    sale_row_balance_law(&ctx.state, &invoice_no).await;
}

#[tokio::test]
async fn update_sale_keeps_original_old_gold() {
    let ctx = setup().await;
    let party_id = create_test_party(&ctx.state, "Falak", "9876510006").await;

    let request = sales::CreateSaleRequest {
        party_id,
        sale_date: test_date(),
        items: vec![gold_line(10.0, 1000.0)],
        cheque_amount: 0.0,
        online_amount: 0.0,
        upi_amount: 0.0,
        cash_amount: 5000.0,
        old_gold_amount: 1000.0,
        payment_mode: Some("cash".to_string()),
        payment_note: None,
    };
    let (_, Json(created)) = sales::create_sale(State(ctx.state.clone()), Json(request))
        .await
        .unwrap();
    assert_eq!(created.balance_amount, 4000.0);

    let request = sales::UpdateSaleRequest {
        sale_date: test_date(),
        items: vec![gold_line(8.0, 1000.0)],
        amount_paid: 7000.0,
        payment_mode: Some("cash".to_string()),
        payment_note: None,
    };
    let Json(updated) = sales::update_sale(
        Path(created.invoice_no.clone()),
        State(ctx.state.clone()),
        Json(request),
    )
    .await
    .unwrap();

    // 7000 fresh + 1000 trade-in covers the new 8000 total.
    assert_eq!(updated.balance_amount, 0.0);
    let old_gold: f64 =
        sqlx::query_scalar("SELECT old_gold_amount FROM sales WHERE invoice_no = ?")
            .bind(&created.invoice_no)
            .fetch_one(&*ctx.state.db_pool)
            .await
            .unwrap();
    assert_eq!(old_gold, 1000.0);
    sale_row_balance_law(&ctx.state, &created.invoice_no).await;
}

#[tokio::test]
async fn deleting_latest_sale_reverses_settlement_and_frees_number() {
    let ctx = setup().await;
    let party_id = create_test_party(&ctx.state, "Gauri", "9876510007").await;

    let purchase_no = create_credit_purchase(&ctx.state, party_id, 3000.0, 0.0).await;
    let (payable, _) = entry_state(&ctx.state, "payables", &purchase_no).await;
    assert_eq!(payable, 3000.0);

    // 2000 cash + 3000 supplier dues covers the 5000 total.
    let request = sales::CreateSaleRequest {
        party_id,
        sale_date: test_date(),
        items: vec![gold_line(5.0, 1000.0)],
        cheque_amount: 0.0,
        online_amount: 0.0,
        upi_amount: 0.0,
        cash_amount: 2000.0,
        old_gold_amount: 0.0,
        payment_mode: Some("cash".to_string()),
        payment_note: None,
    };
    let (_, Json(sale)) = sales::create_sale(State(ctx.state.clone()), Json(request))
        .await
        .unwrap();
    assert_eq!(sale.supplier_dues_adjusted, 3000.0);
    let (payable, _) = entry_state(&ctx.state, "payables", &purchase_no).await;
    assert_eq!(payable, 0.0);

    let Json(deleted) = handlers::delete_bill(
        Path(sale.invoice_no.clone()),
        State(ctx.state.clone()),
    )
    .await
    .unwrap();
    assert_eq!(deleted.number, sale.invoice_no);

    let sale_exists: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM sales WHERE invoice_no = ?)")
            .bind(&sale.invoice_no)
            .fetch_one(&*ctx.state.db_pool)
            .await
            .unwrap();
    assert!(!sale_exists);

    let items_left: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sale_items")
        .fetch_one(&*ctx.state.db_pool)
        .await
        .unwrap();
    assert_eq!(items_left, 0, "Items must cascade with the sale");

    let (payable, payable_status) = entry_state(&ctx.state, "payables", &purchase_no).await;
    assert_eq!(payable, 3000.0, "Settlement must be replayed in reverse");
    assert_eq!(payable_status, "pending");

    // The freed number goes to the next sale. A fresh party keeps the
    // restored payable from offsetting this one.
    let other_party = create_test_party(&ctx.state, "Gauri Two", "9876510017").await;
    let reused = create_credit_sale(&ctx.state, other_party, 4000.0, 4000.0).await;
    assert_eq!(reused, sale.invoice_no);
}

#[tokio::test]
async fn deleting_a_non_latest_bill_is_rejected() {
    let ctx = setup().await;
    let party_id = create_test_party(&ctx.state, "Heer", "9876510008").await;

    let first = create_credit_sale(&ctx.state, party_id, 5000.0, 5000.0).await;
    let _second = create_credit_sale(&ctx.state, party_id, 6000.0, 6000.0).await;

    let err = handlers::delete_bill(Path(first.clone()), State(ctx.state.clone()))
        .await
        .err()
        .unwrap();
    assert!(matches!(err, AppError::Integrity(_)));

    let first_exists: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM sales WHERE invoice_no = ?)")
            .bind(&first)
            .fetch_one(&*ctx.state.db_pool)
            .await
            .unwrap();
    assert!(first_exists, "Rejected deletion must not remove the bill");
}
