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
use crate::models::LedgerEntry;
use crate::services::invoice_math::MONEY_EPS;
use crate::services::ledger::{self, LedgerSide};
use crate::services::numbering;
use crate::utils::date;
use crate::AppState;

use super::bills;
use super::parties::fetch_party;

#[derive(Deserialize)]
pub struct CreateDepositRequest {
    pub party_id: i64,
    #[serde(deserialize_with = "crate::utils::date::deserialize")]
    pub deposit_date: NaiveDate,
    pub amount: f64,
    /// Pays down the receivable of this sale when given.
    #[serde(default)]
    pub sale_invoice_no: Option<String>,
    /// Also pays down the payable of this purchase when given.
    #[serde(default)]
    pub purchase_invoice_no: Option<String>,
    #[serde(default)]
    pub payment_mode: Option<String>,
    #[serde(default)]
    pub payment_note: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateDepositRequest {
    pub amount: f64,
    #[serde(default)]
    pub sale_invoice_no: Option<String>,
    #[serde(default)]
    pub payment_mode: Option<String>,
    #[serde(default)]
    pub payment_note: Option<String>,
}

#[derive(Serialize)]
pub struct DepositResponse {
    pub deposit_no: String,
    pub amount: f64,
    pub receivable_balance: Option<f64>,
    pub payable_balance: Option<f64>,
    pub pdf_path: Option<String>,
}

/// The linked entry must exist and belong to the depositing party.
async fn linked_entry(
    conn: &mut SqliteConnection,
    side: LedgerSide,
    invoice_no: &str,
    party_id: i64,
) -> AppResult<LedgerEntry> {
    let entry = ledger::entry_for_invoice(conn, side, invoice_no)
        .await?
        .ok_or_else(|| {
            AppError::Validation(format!(
                "No {} entry found for invoice {}",
                side.label(),
                invoice_no
            ))
        })?;
    if entry.party_id != party_id {
        return Err(AppError::Validation(format!(
            "Invoice {} does not belong to party {}",
            invoice_no, party_id
        )));
    }
    Ok(entry)
}

pub async fn create_deposit(
    State(state): State<AppState>,
    Json(payload): Json<CreateDepositRequest>,
) -> AppResult<(StatusCode, Json<DepositResponse>)> {
    if payload.amount <= 0.0 {
        return Err(AppError::Validation(
            "Deposit amount must be positive".to_string(),
        ));
    }
    let party = fetch_party(&state, payload.party_id).await?;

    let year = payload.deposit_date.year();
    let deposit_date = date::date_stamp(payload.deposit_date);
    let sequence = numbering::deposit_sequence(payload.party_id);

    let state_ref = &state;
    let payload_ref = &payload;
    let deposit_date_ref = &deposit_date;
    let sequence_ref = &sequence;

    let (deposit_no, receivable_balance, payable_balance) =
        database::with_write_retry("save deposit", || async move {
            let mut tx = state_ref.db_pool.begin().await?;

            let receivable = match &payload_ref.sale_invoice_no {
                Some(invoice_no) => Some(
                    linked_entry(
                        &mut tx,
                        LedgerSide::Receivable,
                        invoice_no,
                        payload_ref.party_id,
                    )
                    .await?,
                ),
                None => None,
            };
            let payable = match &payload_ref.purchase_invoice_no {
                Some(invoice_no) => Some(
                    linked_entry(
                        &mut tx,
                        LedgerSide::Payable,
                        invoice_no,
                        payload_ref.party_id,
                    )
                    .await?,
                ),
                None => None,
            };

            // Paying past the receivable only makes sense when the surplus
            // lands on a linked payable.
            if let Some(receivable) = &receivable {
                if payable.is_none() && payload_ref.amount > receivable.current_balance + MONEY_EPS
                {
                    return Err(AppError::Validation(format!(
                        "Deposit ({:.2}) exceeds the pending balance ({:.2}) of {}",
                        payload_ref.amount, receivable.current_balance, receivable.invoice_no
                    )));
                }
            }

            let number = numbering::next_number(&mut tx, sequence_ref).await?;
            let deposit_no = numbering::deposit_no(year, payload_ref.party_id, number);
            let now = date::now_stamp();

            sqlx::query(
                "INSERT INTO deposits (deposit_no, deposit_date, party_id, sale_invoice_no,
                 purchase_invoice_no, amount, payment_mode, payment_note, created_at, updated_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&deposit_no)
            .bind(deposit_date_ref)
            .bind(payload_ref.party_id)
            .bind(&payload_ref.sale_invoice_no)
            .bind(&payload_ref.purchase_invoice_no)
            .bind(payload_ref.amount)
            .bind(&payload_ref.payment_mode)
            .bind(&payload_ref.payment_note)
            .bind(&now)
            .bind(&now)
            .execute(&mut *tx)
            .await?;

            // The full amount lands on each linked side; the two ledgers
            // track different counterparty positions.
            let mut receivable_balance = None;
            if let Some(entry) = &receivable {
                let balance = ledger::apply_payment(
                    &mut tx,
                    LedgerSide::Receivable,
                    entry.entry_id,
                    payload_ref.amount,
                    deposit_date_ref,
                    payload_ref.payment_mode.as_deref(),
                    Some("Deposit"),
                    Some(&deposit_no),
                )
                .await?;
                receivable_balance = Some(balance);
            }
            let mut payable_balance = None;
            if let Some(entry) = &payable {
                let balance = ledger::apply_payment(
                    &mut tx,
                    LedgerSide::Payable,
                    entry.entry_id,
                    payload_ref.amount,
                    deposit_date_ref,
                    payload_ref.payment_mode.as_deref(),
                    Some("Deposit (Purchase)"),
                    Some(&deposit_no),
                )
                .await?;
                payable_balance = Some(balance);
            }

            tx.commit().await?;
            Ok((deposit_no, receivable_balance, payable_balance))
        })
        .await?;

    tracing::info!(
        "Recorded deposit {} of {:.2} from party {}",
        deposit_no,
        payload.amount,
        party.name
    );

    let pdf_path = bills::generate_deposit_pdf(&state, &deposit_no).await;

    Ok((
        StatusCode::CREATED,
        Json(DepositResponse {
            deposit_no,
            amount: payload.amount,
            receivable_balance,
            payable_balance,
            pdf_path,
        }),
    ))
}

pub async fn update_deposit(
    Path(deposit_no): Path<String>,
    State(state): State<AppState>,
    Json(payload): Json<UpdateDepositRequest>,
) -> AppResult<Json<DepositResponse>> {
    if payload.amount <= 0.0 {
        return Err(AppError::Validation(
            "Deposit amount must be positive".to_string(),
        ));
    }

    let state_ref = &state;
    let payload_ref = &payload;
    let deposit_ref = &deposit_no;

    let (receivable_balance, payable_balance) =
        database::with_write_retry("update deposit", || async move {
            let mut tx = state_ref.db_pool.begin().await?;

            let existing = bills::fetch_deposit(&mut tx, deposit_ref)
                .await?
                .ok_or_else(|| {
                    AppError::NotFound(format!("Deposit {} not found", deposit_ref))
                })?;

            // Unwind what the original amount did to the receivable side.
            // Payable applications are left in place; that link is fixed at
            // creation time.
            ledger::reverse_by_reference(&mut tx, LedgerSide::Receivable, deposit_ref).await?;

            let receivable = match &payload_ref.sale_invoice_no {
                Some(invoice_no) => Some(
                    linked_entry(
                        &mut tx,
                        LedgerSide::Receivable,
                        invoice_no,
                        existing.party_id,
                    )
                    .await?,
                ),
                None => None,
            };

            if let Some(entry) = &receivable {
                if existing.purchase_invoice_no.is_none()
                    && payload_ref.amount > entry.current_balance + MONEY_EPS
                {
                    return Err(AppError::Validation(format!(
                        "Deposit ({:.2}) exceeds the pending balance ({:.2}) of {}",
                        payload_ref.amount, entry.current_balance, entry.invoice_no
                    )));
                }
            }

            sqlx::query(
                "UPDATE deposits SET sale_invoice_no = ?, amount = ?, payment_mode = ?,
                 payment_note = ?, updated_at = ? WHERE deposit_no = ?",
            )
            .bind(&payload_ref.sale_invoice_no)
            .bind(payload_ref.amount)
            .bind(&payload_ref.payment_mode)
            .bind(&payload_ref.payment_note)
            .bind(date::now_stamp())
            .bind(deposit_ref)
            .execute(&mut *tx)
            .await?;

            let mut receivable_balance = None;
            if let Some(entry) = &receivable {
                let balance = ledger::apply_payment(
                    &mut tx,
                    LedgerSide::Receivable,
                    entry.entry_id,
                    payload_ref.amount,
                    &existing.deposit_date,
                    payload_ref.payment_mode.as_deref(),
                    Some("Deposit"),
                    Some(deposit_ref),
                )
                .await?;
                receivable_balance = Some(balance);
            }

            let payable_balance = match &existing.purchase_invoice_no {
                Some(invoice_no) => {
                    ledger::entry_for_invoice(&mut tx, LedgerSide::Payable, invoice_no)
                        .await?
                        .map(|entry| entry.current_balance)
                }
                None => None,
            };

            tx.commit().await?;
            Ok((receivable_balance, payable_balance))
        })
        .await?;

    tracing::info!("Updated deposit {} to {:.2}", deposit_no, payload.amount);

    let pdf_path = bills::generate_deposit_pdf(&state, &deposit_no).await;

    Ok(Json(DepositResponse {
        deposit_no,
        amount: payload.amount,
        receivable_balance,
        payable_balance,
        pdf_path,
    }))
}
