use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;

use crate::database;
use crate::error::{AppError, AppResult};
use crate::services::invoice_math::{self, LineInput, PricedLine, MONEY_EPS};
use crate::services::ledger::{self, LedgerSide};
use crate::services::numbering;
use crate::utils::date;
use crate::AppState;

use super::bills;
use super::parties::fetch_party;

#[derive(Deserialize)]
pub struct CreateSaleRequest {
    pub party_id: i64,
    #[serde(deserialize_with = "crate::utils::date::deserialize")]
    pub sale_date: NaiveDate,
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
    pub old_gold_amount: f64,
    #[serde(default)]
    pub payment_mode: Option<String>,
    #[serde(default)]
    pub payment_note: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateSaleRequest {
    #[serde(deserialize_with = "crate::utils::date::deserialize")]
    pub sale_date: NaiveDate,
    pub items: Vec<LineInput>,
    /// Routed into the bucket named by payment_mode; cash when unrecognised.
    #[serde(default)]
    pub amount_paid: f64,
    #[serde(default)]
    pub payment_mode: Option<String>,
    #[serde(default)]
    pub payment_note: Option<String>,
}

#[derive(Serialize)]
pub struct SaleResponse {
    pub invoice_no: String,
    pub total_amount: f64,
    pub balance_amount: f64,
    pub supplier_dues_adjusted: f64,
    pub receivable_opened: bool,
    pub pdf_path: Option<String>,
}

#[derive(Serialize)]
pub struct UpdateSaleResponse {
    pub invoice_no: String,
    pub total_amount: f64,
    pub balance_amount: f64,
    pub pdf_path: Option<String>,
}

fn validate_items(items: &[LineInput]) -> AppResult<Vec<PricedLine>> {
    if items.is_empty() {
        return Err(AppError::Validation(
            "A bill needs at least one item".to_string(),
        ));
    }
    for item in items {
        item.validate().map_err(AppError::Validation)?;
    }
    Ok(items.iter().map(invoice_math::price_line).collect())
}

fn validate_payments(amounts: &[f64]) -> AppResult<()> {
    if amounts.iter().any(|a| *a < 0.0) {
        return Err(AppError::Validation(
            "Payment amounts cannot be negative".to_string(),
        ));
    }
    Ok(())
}

pub(crate) async fn insert_item(
    conn: &mut SqliteConnection,
    table: &str,
    invoice_no: &str,
    input: &LineInput,
    priced: &PricedLine,
) -> AppResult<()> {
    sqlx::query(&format!(
        "INSERT INTO {} (invoice_no, metal, description, qty, gross_weight, loss_weight,
         net_weight, purity, metal_rate, base_amount, making_charge_type, making_charge_rate,
         making_charge, stone_weight, stone_amount, wastage_percent, wastage_amount, hsn_code,
         cgst_percent, sgst_percent, cgst_amount, sgst_amount, line_total)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        table
    ))
    .bind(invoice_no)
    .bind(input.metal.trim())
    .bind(&input.description)
    .bind(input.qty)
    .bind(input.gross_weight)
    .bind(input.loss_weight)
    .bind(priced.net_weight)
    .bind(&input.purity)
    .bind(input.metal_rate)
    .bind(priced.base_amount)
    .bind(input.making_charge_type.as_str())
    .bind(input.making_charge_rate)
    .bind(priced.making_charge)
    .bind(input.stone_weight)
    .bind(input.stone_amount)
    .bind(input.wastage_percent)
    .bind(priced.wastage_amount)
    .bind(&input.hsn_code)
    .bind(input.cgst_percent)
    .bind(input.sgst_percent)
    .bind(priced.cgst_amount)
    .bind(priced.sgst_amount)
    .bind(priced.line_total)
    .execute(conn)
    .await?;
    Ok(())
}

/// Splits a single repayment into the matching mode column. Unknown modes
/// count as cash, matching how the counter actually takes money.
pub(crate) fn route_payment(amount: f64, mode: Option<&str>) -> (f64, f64, f64, f64) {
    match mode.map(str::to_lowercase).as_deref() {
        Some("cheque") => (amount, 0.0, 0.0, 0.0),
        Some("online") => (0.0, amount, 0.0, 0.0),
        Some("upi") => (0.0, 0.0, amount, 0.0),
        _ => (0.0, 0.0, 0.0, amount),
    }
}

pub async fn create_sale(
    State(state): State<AppState>,
    Json(payload): Json<CreateSaleRequest>,
) -> AppResult<(StatusCode, Json<SaleResponse>)> {
    let party = fetch_party(&state, payload.party_id).await?;
    let priced = validate_items(&payload.items)?;
    validate_payments(&[
        payload.cheque_amount,
        payload.online_amount,
        payload.upi_amount,
        payload.cash_amount,
        payload.old_gold_amount,
    ])?;

    let total = invoice_math::invoice_total(&priced);
    let payments_sum = payload.cheque_amount
        + payload.online_amount
        + payload.upi_amount
        + payload.cash_amount
        + payload.old_gold_amount;
    let year = payload.sale_date.year();
    let sale_date = date::date_stamp(payload.sale_date);

    let state_ref = &state;
    let payload_ref = &payload;
    let priced_ref = &priced;
    let sale_date_ref = &sale_date;

    let (invoice_no, balance, supplier_credit, receivable_opened) =
        database::with_write_retry("save sale", || async move {
            let mut tx = state_ref.db_pool.begin().await?;

            // Dues we owe this party offset the bill before cash does.
            let pending_payables =
                ledger::pending_total(&mut tx, LedgerSide::Payable, payload_ref.party_id).await?;
            let supplier_credit = pending_payables.min(total);
            let paid_total = payments_sum + supplier_credit;
            if paid_total > total + MONEY_EPS {
                return Err(AppError::Validation(format!(
                    "Payments ({:.2}) exceed the bill total ({:.2})",
                    paid_total, total
                )));
            }
            let balance = total - paid_total;

            let number = numbering::next_number(&mut tx, numbering::SALE_SEQUENCE).await?;
            let invoice_no = numbering::sale_invoice_no(year, number);
            let now = date::now_stamp();

            sqlx::query(
                "INSERT INTO sales (invoice_no, sale_date, party_id, total_amount,
                 cheque_amount, online_amount, upi_amount, cash_amount, old_gold_amount,
                 balance_amount, payment_mode, payment_note, created_at, updated_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&invoice_no)
            .bind(sale_date_ref)
            .bind(payload_ref.party_id)
            .bind(total)
            .bind(payload_ref.cheque_amount)
            .bind(payload_ref.online_amount)
            .bind(payload_ref.upi_amount)
            .bind(payload_ref.cash_amount)
            .bind(payload_ref.old_gold_amount)
            .bind(balance)
            .bind(&payload_ref.payment_mode)
            .bind(&payload_ref.payment_note)
            .bind(&now)
            .bind(&now)
            .execute(&mut *tx)
            .await?;

            for (input, line) in payload_ref.items.iter().zip(priced_ref) {
                insert_item(&mut tx, "sale_items", &invoice_no, input, line).await?;
            }

            if supplier_credit > MONEY_EPS {
                ledger::settle_pending_fifo(
                    &mut tx,
                    LedgerSide::Payable,
                    payload_ref.party_id,
                    supplier_credit,
                    sale_date_ref,
                    "Adjustment (Sale)",
                    &invoice_no,
                )
                .await?;
            }

            let receivable_opened = balance > MONEY_EPS;
            if receivable_opened {
                ledger::open_entry(
                    &mut tx,
                    LedgerSide::Receivable,
                    &invoice_no,
                    payload_ref.party_id,
                    balance,
                )
                .await?;
            }

            tx.commit().await?;
            Ok((invoice_no, balance, supplier_credit, receivable_opened))
        })
        .await?;

    tracing::info!(
        "Saved sale {} for party {} (total {:.2}, balance {:.2})",
        invoice_no,
        party.name,
        total,
        balance
    );

    let pdf_path = bills::generate_sale_pdf(&state, &invoice_no).await;

    Ok((
        StatusCode::CREATED,
        Json(SaleResponse {
            invoice_no,
            total_amount: total,
            balance_amount: balance,
            supplier_dues_adjusted: supplier_credit,
            receivable_opened,
            pdf_path,
        }),
    ))
}

pub async fn update_sale(
    Path(invoice_no): Path<String>,
    State(state): State<AppState>,
    Json(payload): Json<UpdateSaleRequest>,
) -> AppResult<Json<UpdateSaleResponse>> {
    let priced = validate_items(&payload.items)?;
    if payload.amount_paid < 0.0 {
        return Err(AppError::Validation(
            "Payment amounts cannot be negative".to_string(),
        ));
    }

    let total = invoice_math::invoice_total(&priced);
    let sale_date = date::date_stamp(payload.sale_date);

    let state_ref = &state;
    let payload_ref = &payload;
    let priced_ref = &priced;
    let invoice_ref = &invoice_no;
    let sale_date_ref = &sale_date;

    let balance = database::with_write_retry("update sale", || async move {
        let mut tx = state_ref.db_pool.begin().await?;

        let existing = bills::fetch_sale(&mut tx, invoice_ref)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Sale {} not found", invoice_ref)))?;

        // The trade-in from the original bill stays; only fresh money moves.
        let old_gold = existing.old_gold_amount;
        let paid_total = payload_ref.amount_paid + old_gold;
        if paid_total > total + MONEY_EPS {
            return Err(AppError::Validation(format!(
                "Payments ({:.2}) exceed the bill total ({:.2})",
                paid_total, total
            )));
        }
        let balance = total - paid_total;
        let (cheque, online, upi, cash) =
            route_payment(payload_ref.amount_paid, payload_ref.payment_mode.as_deref());

        sqlx::query(
            "UPDATE sales SET sale_date = ?, total_amount = ?, cheque_amount = ?,
             online_amount = ?, upi_amount = ?, cash_amount = ?, balance_amount = ?,
             payment_mode = ?, payment_note = ?, updated_at = ? WHERE invoice_no = ?",
        )
        .bind(sale_date_ref)
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

        sqlx::query("DELETE FROM sale_items WHERE invoice_no = ?")
            .bind(invoice_ref)
            .execute(&mut *tx)
            .await?;
        for (input, line) in payload_ref.items.iter().zip(priced_ref) {
            insert_item(&mut tx, "sale_items", invoice_ref, input, line).await?;
        }

        let entry =
            ledger::entry_for_invoice(&mut tx, LedgerSide::Receivable, invoice_ref).await?;
        match entry {
            Some(entry) if balance > MONEY_EPS => {
                ledger::reset_entry(&mut tx, LedgerSide::Receivable, entry.entry_id, balance)
                    .await?;
            }
            Some(entry) => {
                ledger::delete_entry(&mut tx, LedgerSide::Receivable, entry.entry_id).await?;
            }
            None if balance > MONEY_EPS => {
                ledger::open_entry(
                    &mut tx,
                    LedgerSide::Receivable,
                    invoice_ref,
                    existing.party_id,
                    balance,
                )
                .await?;
            }
            None => {}
        }

        tx.commit().await?;
        Ok(balance)
    })
    .await?;

    tracing::info!("Updated sale {} (total {:.2}, balance {:.2})", invoice_no, total, balance);

    let pdf_path = bills::generate_sale_pdf(&state, &invoice_no).await;

    Ok(Json(UpdateSaleResponse {
        invoice_no,
        total_amount: total,
        balance_amount: balance,
        pdf_path,
    }))
}
