use axum::{
    extract::{Path, State},
    response::Json,
};
use serde::Serialize;
use serde_json::json;
use sqlx::SqliteConnection;

use crate::database;
use crate::error::{AppError, AppResult};
use crate::models::{DepositRow, ItemRow, Party, PurchaseRow, SaleRow};
use crate::services::ledger::{self, LedgerSide};
use crate::services::numbering;
use crate::services::pdf;
use crate::AppState;

use super::settings::load_shop_profile;

#[derive(Clone, Copy, PartialEq, Eq)]
enum BillKind {
    Sale,
    Purchase,
    Deposit,
}

fn bill_kind(number: &str) -> AppResult<BillKind> {
    if number.starts_with("SAL-") {
        Ok(BillKind::Sale)
    } else if number.starts_with("PUR-") {
        Ok(BillKind::Purchase)
    } else if number.starts_with("UDH-") {
        Ok(BillKind::Deposit)
    } else {
        Err(AppError::Validation(format!(
            "Unrecognised bill number format: {}",
            number
        )))
    }
}

pub(crate) async fn fetch_sale(
    conn: &mut SqliteConnection,
    invoice_no: &str,
) -> AppResult<Option<SaleRow>> {
    let sale = sqlx::query_as::<_, SaleRow>("SELECT * FROM sales WHERE invoice_no = ?")
        .bind(invoice_no)
        .fetch_optional(conn)
        .await?;
    Ok(sale)
}

pub(crate) async fn fetch_purchase(
    conn: &mut SqliteConnection,
    invoice_no: &str,
) -> AppResult<Option<PurchaseRow>> {
    let purchase = sqlx::query_as::<_, PurchaseRow>("SELECT * FROM purchases WHERE invoice_no = ?")
        .bind(invoice_no)
        .fetch_optional(conn)
        .await?;
    Ok(purchase)
}

pub(crate) async fn fetch_deposit(
    conn: &mut SqliteConnection,
    deposit_no: &str,
) -> AppResult<Option<DepositRow>> {
    let deposit = sqlx::query_as::<_, DepositRow>("SELECT * FROM deposits WHERE deposit_no = ?")
        .bind(deposit_no)
        .fetch_optional(conn)
        .await?;
    Ok(deposit)
}

pub(crate) async fn fetch_items(
    conn: &mut SqliteConnection,
    table: &str,
    invoice_no: &str,
) -> AppResult<Vec<ItemRow>> {
    let items = sqlx::query_as::<_, ItemRow>(&format!(
        "SELECT * FROM {} WHERE invoice_no = ? ORDER BY item_id",
        table
    ))
    .bind(invoice_no)
    .fetch_all(conn)
    .await?;
    Ok(items)
}

async fn fetch_party_row(conn: &mut SqliteConnection, party_id: i64) -> AppResult<Party> {
    sqlx::query_as::<_, Party>("SELECT * FROM parties WHERE party_id = ?")
        .bind(party_id)
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| AppError::Consistency(format!("Party {} is missing", party_id)))
}

async fn render_sale(state: &AppState, invoice_no: &str) -> AppResult<String> {
    let shop = load_shop_profile(&state.db_pool).await?;
    let mut conn = state.db_pool.acquire().await?;
    let sale = fetch_sale(&mut conn, invoice_no)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Sale {} not found", invoice_no)))?;
    let items = fetch_items(&mut conn, "sale_items", invoice_no).await?;
    let party = fetch_party_row(&mut conn, sale.party_id).await?;

    let bytes = pdf::render_sale_pdf(&shop, &sale, &items, &party)?;
    let filename = pdf::sale_pdf_filename(&party.name, invoice_no);
    pdf::write_bill(&state.config.bills_dir, &sale.sale_date, &filename, &bytes).await
}

async fn render_purchase(state: &AppState, invoice_no: &str) -> AppResult<String> {
    let shop = load_shop_profile(&state.db_pool).await?;
    let mut conn = state.db_pool.acquire().await?;
    let purchase = fetch_purchase(&mut conn, invoice_no)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Purchase {} not found", invoice_no)))?;
    let items = fetch_items(&mut conn, "purchase_items", invoice_no).await?;
    let party = fetch_party_row(&mut conn, purchase.party_id).await?;

    let bytes = pdf::render_purchase_pdf(&shop, &purchase, &items, &party)?;
    let filename = pdf::purchase_pdf_filename(&party.name, invoice_no);
    pdf::write_bill(
        &state.config.bills_dir,
        &purchase.purchase_date,
        &filename,
        &bytes,
    )
    .await
}

async fn render_deposit(state: &AppState, deposit_no: &str) -> AppResult<String> {
    let shop = load_shop_profile(&state.db_pool).await?;
    let mut conn = state.db_pool.acquire().await?;
    let deposit = fetch_deposit(&mut conn, deposit_no)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Deposit {} not found", deposit_no)))?;
    let party = fetch_party_row(&mut conn, deposit.party_id).await?;

    let bytes = pdf::render_deposit_pdf(&shop, &deposit, &party)?;
    let filename = pdf::deposit_pdf_filename(&party.name, deposit_no);
    pdf::write_bill(
        &state.config.bills_dir,
        &deposit.deposit_date,
        &filename,
        &bytes,
    )
    .await
}

/// A bill is already committed when its PDF renders, so a failure here only
/// logs and the response carries a null path.
pub(crate) async fn generate_sale_pdf(state: &AppState, invoice_no: &str) -> Option<String> {
    match render_sale(state, invoice_no).await {
        Ok(path) => Some(path),
        Err(err) => {
            tracing::error!("PDF generation for {} failed: {}", invoice_no, err);
            None
        }
    }
}

pub(crate) async fn generate_purchase_pdf(state: &AppState, invoice_no: &str) -> Option<String> {
    match render_purchase(state, invoice_no).await {
        Ok(path) => Some(path),
        Err(err) => {
            tracing::error!("PDF generation for {} failed: {}", invoice_no, err);
            None
        }
    }
}

pub(crate) async fn generate_deposit_pdf(state: &AppState, deposit_no: &str) -> Option<String> {
    match render_deposit(state, deposit_no).await {
        Ok(path) => Some(path),
        Err(err) => {
            tracing::error!("PDF generation for {} failed: {}", deposit_no, err);
            None
        }
    }
}

pub async fn get_bill(
    Path(number): Path<String>,
    State(state): State<AppState>,
) -> AppResult<Json<serde_json::Value>> {
    let kind = bill_kind(&number)?;
    let mut conn = state.db_pool.acquire().await?;

    let body = match kind {
        BillKind::Sale => {
            let sale = fetch_sale(&mut conn, &number)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("Sale {} not found", number)))?;
            let items = fetch_items(&mut conn, "sale_items", &number).await?;
            let party = fetch_party_row(&mut conn, sale.party_id).await?;
            let receivable =
                ledger::entry_for_invoice(&mut conn, LedgerSide::Receivable, &number).await?;
            json!({
                "kind": "sale",
                "sale": sale,
                "items": items,
                "party": party,
                "receivable": receivable,
            })
        }
        BillKind::Purchase => {
            let purchase = fetch_purchase(&mut conn, &number)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("Purchase {} not found", number)))?;
            let items = fetch_items(&mut conn, "purchase_items", &number).await?;
            let party = fetch_party_row(&mut conn, purchase.party_id).await?;
            let payable =
                ledger::entry_for_invoice(&mut conn, LedgerSide::Payable, &number).await?;
            json!({
                "kind": "purchase",
                "purchase": purchase,
                "items": items,
                "party": party,
                "payable": payable,
            })
        }
        BillKind::Deposit => {
            let deposit = fetch_deposit(&mut conn, &number)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("Deposit {} not found", number)))?;
            let party = fetch_party_row(&mut conn, deposit.party_id).await?;
            json!({
                "kind": "deposit",
                "deposit": deposit,
                "party": party,
            })
        }
    };

    Ok(Json(body))
}

/// Newest bill across sales, purchases and deposits by created_at.
async fn newest_bill(conn: &mut SqliteConnection) -> AppResult<Option<(String, String)>> {
    let mut newest: Option<(String, String)> = None;
    for (table, column) in [
        ("sales", "invoice_no"),
        ("purchases", "invoice_no"),
        ("deposits", "deposit_no"),
    ] {
        let row: Option<(String, String)> = sqlx::query_as(&format!(
            "SELECT {}, created_at FROM {} ORDER BY created_at DESC LIMIT 1",
            column, table
        ))
        .fetch_optional(&mut *conn)
        .await?;
        if let Some((number, created_at)) = row {
            let newer = newest
                .as_ref()
                .map_or(true, |(_, current)| created_at > *current);
            if newer {
                newest = Some((number, created_at));
            }
        }
    }
    Ok(newest)
}

async fn ensure_latest(conn: &mut SqliteConnection, number: &str) -> AppResult<()> {
    match newest_bill(conn).await? {
        Some((latest, _)) if latest == number => Ok(()),
        Some((latest, _)) => Err(AppError::Integrity(format!(
            "Only the latest bill can be deleted; the latest is {}",
            latest
        ))),
        None => Err(AppError::NotFound("No bills exist yet".to_string())),
    }
}

async fn remove_pdf(state: &AppState, bill_date: &str, filename: &str) {
    let day: String = bill_date.chars().take(10).collect();
    let path = std::path::Path::new(&state.config.bills_dir)
        .join(day)
        .join(filename);
    if let Err(err) = tokio::fs::remove_file(&path).await {
        tracing::debug!("Could not remove {}: {}", path.display(), err);
    }
}

#[derive(Serialize)]
pub struct DeleteBillResponse {
    pub number: String,
    pub message: String,
}

pub async fn delete_bill(
    Path(number): Path<String>,
    State(state): State<AppState>,
) -> AppResult<Json<DeleteBillResponse>> {
    let kind = bill_kind(&number)?;
    let state_ref = &state;
    let number_ref = &number;

    // The PDF can only be removed after the row is gone; keep what we need.
    let (bill_date, party_name) = database::with_write_retry("delete bill", || async move {
        let mut tx = state_ref.db_pool.begin().await?;
        ensure_latest(&mut tx, number_ref).await?;

        let (bill_date, party_name) = match kind {
            BillKind::Sale => {
                let sale = fetch_sale(&mut tx, number_ref)
                    .await?
                    .ok_or_else(|| AppError::NotFound(format!("Sale {} not found", number_ref)))?;
                let party = fetch_party_row(&mut tx, sale.party_id).await?;

                // Supplier dues consumed while saving this sale go back on
                // the payables they came from.
                let restored =
                    ledger::reverse_by_reference(&mut tx, LedgerSide::Payable, number_ref).await?;
                if restored > 0.0 {
                    tracing::info!(
                        "Restored {:.2} of supplier dues while deleting {}",
                        restored,
                        number_ref
                    );
                }

                sqlx::query("DELETE FROM sales WHERE invoice_no = ?")
                    .bind(number_ref)
                    .execute(&mut *tx)
                    .await?;
                numbering::release_number(&mut tx, numbering::SALE_SEQUENCE).await?;
                (sale.sale_date, party.name)
            }
            BillKind::Purchase => {
                let purchase = fetch_purchase(&mut tx, number_ref).await?.ok_or_else(|| {
                    AppError::NotFound(format!("Purchase {} not found", number_ref))
                })?;
                let party = fetch_party_row(&mut tx, purchase.party_id).await?;

                sqlx::query("DELETE FROM purchases WHERE invoice_no = ?")
                    .bind(number_ref)
                    .execute(&mut *tx)
                    .await?;
                numbering::release_number(&mut tx, numbering::PURCHASE_SEQUENCE).await?;
                (purchase.purchase_date, party.name)
            }
            BillKind::Deposit => {
                let deposit = fetch_deposit(&mut tx, number_ref).await?.ok_or_else(|| {
                    AppError::NotFound(format!("Deposit {} not found", number_ref))
                })?;
                let party = fetch_party_row(&mut tx, deposit.party_id).await?;

                if let Some(invoice_no) = &deposit.sale_invoice_no {
                    let entry =
                        ledger::entry_for_invoice(&mut tx, LedgerSide::Receivable, invoice_no)
                            .await?;
                    match entry {
                        Some(_) => {
                            ledger::reverse_by_reference(
                                &mut tx,
                                LedgerSide::Receivable,
                                number_ref,
                            )
                            .await?;
                        }
                        None => {
                            // The entry was settled away since; the sale
                            // still exists, so the debt comes back whole.
                            ledger::open_entry(
                                &mut tx,
                                LedgerSide::Receivable,
                                invoice_no,
                                deposit.party_id,
                                deposit.amount,
                            )
                            .await?;
                            tracing::warn!(
                                "Receivable for {} was gone; re-created with balance {:.2}",
                                invoice_no,
                                deposit.amount
                            );
                        }
                    }
                }
                if let Some(invoice_no) = &deposit.purchase_invoice_no {
                    let entry =
                        ledger::entry_for_invoice(&mut tx, LedgerSide::Payable, invoice_no)
                            .await?;
                    match entry {
                        Some(_) => {
                            ledger::reverse_by_reference(
                                &mut tx,
                                LedgerSide::Payable,
                                number_ref,
                            )
                            .await?;
                        }
                        None => {
                            tracing::warn!(
                                "Payable for {} is missing; skipping reversal",
                                invoice_no
                            );
                        }
                    }
                }

                sqlx::query("DELETE FROM deposits WHERE deposit_no = ?")
                    .bind(number_ref)
                    .execute(&mut *tx)
                    .await?;
                numbering::release_number(
                    &mut tx,
                    &numbering::deposit_sequence(deposit.party_id),
                )
                .await?;
                (deposit.deposit_date, party.name)
            }
        };

        tx.commit().await?;
        Ok((bill_date, party_name))
    })
    .await?;

    let filename = match kind {
        BillKind::Sale => pdf::sale_pdf_filename(&party_name, &number),
        BillKind::Purchase => pdf::purchase_pdf_filename(&party_name, &number),
        BillKind::Deposit => pdf::deposit_pdf_filename(&party_name, &number),
    };
    remove_pdf(&state, &bill_date, &filename).await;

    tracing::info!("Deleted bill {}", number);
    Ok(Json(DeleteBillResponse {
        number,
        message: "Bill deleted".to_string(),
    }))
}

#[derive(Serialize)]
pub struct ReprintResponse {
    pub number: String,
    pub pdf_path: String,
}

pub async fn reprint_bill(
    Path(number): Path<String>,
    State(state): State<AppState>,
) -> AppResult<Json<ReprintResponse>> {
    let pdf_path = match bill_kind(&number)? {
        BillKind::Sale => render_sale(&state, &number).await?,
        BillKind::Purchase => render_purchase(&state, &number).await?,
        BillKind::Deposit => render_deposit(&state, &number).await?,
    };
    Ok(Json(ReprintResponse { number, pdf_path }))
}
