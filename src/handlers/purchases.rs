use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::database;
use crate::error::{AppError, AppResult};
use crate::services::invoice_math::{self, LineInput, MONEY_EPS};
use crate::services::ledger::{self, LedgerSide};
use crate::services::numbering;
use crate::utils::date;
use crate::AppState;

use super::bills;
use super::parties::fetch_party;
use super::sales::{insert_item, route_payment};

#[derive(Deserialize)]
pub struct CreatePurchaseRequest {
    pub party_id: i64,
    #[serde(deserialize_with = "crate::utils::date::deserialize")]
    pub purchase_date: NaiveDate,
    pub items: Vec<LineInput>,
    #[serde(default)]
    pub cheque_amount: f64,
    #[serde(default)]
    pub online_amount: f64,
    #[serde(default)]
    pub upi_amount: f64,
    #[serde(default)]
    pub cash_amount: f64,
    #[serde(default)]
    pub payment_mode: Option<String>,
    #[serde(default)]
    pub payment_note: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdatePurchaseRequest {
    #[serde(deserialize_with = "crate::utils::date::deserialize")]
    pub purchase_date: NaiveDate,
    pub items: Vec<LineInput>,
    #[serde(default)]
    pub amount_paid: f64,
    #[serde(default)]
    pub payment_mode: Option<String>,
    #[serde(default)]
    pub payment_note: Option<String>,
}

#[derive(Serialize)]
pub struct PurchaseResponse {
    pub invoice_no: String,
    pub total_amount: f64,
    pub balance_amount: f64,
    pub payable_opened: bool,
    pub pdf_path: Option<String>,
}

#[derive(Serialize)]
pub struct UpdatePurchaseResponse {
    pub invoice_no: String,
    pub total_amount: f64,
    pub balance_amount: f64,
    pub pdf_path: Option<String>,
}

pub async fn create_purchase(
    State(state): State<AppState>,
    Json(payload): Json<CreatePurchaseRequest>,
) -> AppResult<(StatusCode, Json<PurchaseResponse>)> {
    let party = fetch_party(&state, payload.party_id).await?;
    if payload.items.is_empty() {
        return Err(AppError::Validation(
            "A bill needs at least one item".to_string(),
        ));
    }
    for item in &payload.items {
        item.validate().map_err(AppError::Validation)?;
    }
    let amounts = [
        payload.cheque_amount,
        payload.online_amount,
        payload.upi_amount,
        payload.cash_amount,
    ];
    if amounts.iter().any(|a| *a < 0.0) {
        return Err(AppError::Validation(
            "Payment amounts cannot be negative".to_string(),
        ));
    }

    let priced: Vec<_> = payload.items.iter().map(invoice_math::price_line).collect();
    let total = invoice_math::invoice_total(&priced);
    let payments_sum: f64 = amounts.iter().sum();
    if payments_sum > total + MONEY_EPS {
        return Err(AppError::Validation(format!(
            "Payments ({:.2}) exceed the bill total ({:.2})",
            payments_sum, total
        )));
    }
    let balance = total - payments_sum;
    let year = payload.purchase_date.year();
    let purchase_date = date::date_stamp(payload.purchase_date);

    let state_ref = &state;
    let payload_ref = &payload;
    let priced_ref = &priced;
    let purchase_date_ref = &purchase_date;

    let (invoice_no, payable_opened) = database::with_write_retry("save purchase", || async move {
        let mut tx = state_ref.db_pool.begin().await?;

        let number = numbering::next_number(&mut tx, numbering::PURCHASE_SEQUENCE).await?;
        let invoice_no = numbering::purchase_invoice_no(year, number);
        let now = date::now_stamp();

        sqlx::query(
            "INSERT INTO purchases (invoice_no, purchase_date, party_id, total_amount,
             cheque_amount, online_amount, upi_amount, cash_amount, balance_amount,
             payment_mode, payment_note, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&invoice_no)
        .bind(purchase_date_ref)
        .bind(payload_ref.party_id)
        .bind(total)
        .bind(payload_ref.cheque_amount)
        .bind(payload_ref.online_amount)
        .bind(payload_ref.upi_amount)
        .bind(payload_ref.cash_amount)
        .bind(balance)
        .bind(&payload_ref.payment_mode)
        .bind(&payload_ref.payment_note)
        .bind(&now)
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        for (input, line) in payload_ref.items.iter().zip(priced_ref) {
            insert_item(&mut tx, "purchase_items", &invoice_no, input, line).await?;
        }

        let payable_opened = balance > MONEY_EPS;
        if payable_opened {
            ledger::open_entry(
                &mut tx,
                LedgerSide::Payable,
                &invoice_no,
                payload_ref.party_id,
                balance,
            )
            .await?;
        }

        tx.commit().await?;
        Ok((invoice_no, payable_opened))
    })
    .await?;

    tracing::info!(
        "Saved purchase {} from party {} (total {:.2}, balance {:.2})",
        invoice_no,
        party.name,
        total,
        balance
    );

    let pdf_path = bills::generate_purchase_pdf(&state, &invoice_no).await;

    Ok((
        StatusCode::CREATED,
        Json(PurchaseResponse {
            invoice_no,
            total_amount: total,
            balance_amount: balance,
            payable_opened,
            pdf_path,
        }),
    ))
}

pub async fn update_purchase(
    Path(invoice_no): Path<String>,
    State(state): State<AppState>,
    Json(payload): Json<UpdatePurchaseRequest>,
) -> AppResult<Json<UpdatePurchaseResponse>> {
    if payload.items.is_empty() {
        return Err(AppError::Validation(
            "A bill needs at least one item".to_string(),
        ));
    }
    for item in &payload.items {
        item.validate().map_err(AppError::Validation)?;
    }
    if payload.amount_paid < 0.0 {
        return Err(AppError::Validation(
            "Payment amounts cannot be negative".to_string(),
        ));
    }

    let priced: Vec<_> = payload.items.iter().map(invoice_math::price_line).collect();
    let total = invoice_math::invoice_total(&priced);
    if payload.amount_paid > total + MONEY_EPS {
        return Err(AppError::Validation(format!(
            "Payments ({:.2}) exceed the bill total ({:.2})",
            payload.amount_paid, total
        )));
    }
    let balance = total - payload.amount_paid;
    let purchase_date = date::date_stamp(payload.purchase_date);

    let state_ref = &state;
    let payload_ref = &payload;
    let priced_ref = &priced;
    let invoice_ref = &invoice_no;
    let purchase_date_ref = &purchase_date;

    database::with_write_retry("update purchase", || async move {
        let mut tx = state_ref.db_pool.begin().await?;

        let existing = bills::fetch_purchase(&mut tx, invoice_ref)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Purchase {} not found", invoice_ref)))?;

        let (cheque, online, upi, cash) =
            route_payment(payload_ref.amount_paid, payload_ref.payment_mode.as_deref());

        sqlx::query(
            "UPDATE purchases SET purchase_date = ?, total_amount = ?, cheque_amount = ?,
             online_amount = ?, upi_amount = ?, cash_amount = ?, balance_amount = ?,
             payment_mode = ?, payment_note = ?, updated_at = ? WHERE invoice_no = ?",
        )
        .bind(purchase_date_ref)
        .bind(total)
        .bind(cheque)
        .bind(online)
        .bind(upi)
        .bind(cash)
        .bind(balance)
        .bind(&payload_ref.payment_mode)
        .bind(&payload_ref.payment_note)
        .bind(date::now_stamp())
        .bind(invoice_ref)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM purchase_items WHERE invoice_no = ?")
            .bind(invoice_ref)
            .execute(&mut *tx)
            .await?;
        for (input, line) in payload_ref.items.iter().zip(priced_ref) {
            insert_item(&mut tx, "purchase_items", invoice_ref, input, line).await?;
        }

        let entry = ledger::entry_for_invoice(&mut tx, LedgerSide::Payable, invoice_ref).await?;
        match entry {
            Some(entry) if balance > MONEY_EPS => {
                ledger::reset_entry(&mut tx, LedgerSide::Payable, entry.entry_id, balance).await?;
            }
            Some(entry) => {
                ledger::delete_entry(&mut tx, LedgerSide::Payable, entry.entry_id).await?;
            }
            None if balance > MONEY_EPS => {
                ledger::open_entry(
                    &mut tx,
                    LedgerSide::Payable,
                    invoice_ref,
                    existing.party_id,
                    balance,
                )
                .await?;
            }
            None => {}
        }

        tx.commit().await?;
        Ok(())
    })
    .await?;

    tracing::info!(
        "Updated purchase {} (total {:.2}, balance {:.2})",
        invoice_no,
        total,
        balance
    );

    let pdf_path = bills::generate_purchase_pdf(&state, &invoice_no).await;

    Ok(Json(UpdatePurchaseResponse {
        invoice_no,
        total_amount: total,
        balance_amount: balance,
        pdf_path,
    }))
}
