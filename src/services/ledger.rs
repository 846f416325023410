//! Receivable/payable ledger state machine.
//!
//! One entry per invoice. An entry opens as `pending` with
//! `initial_balance == current_balance`, moves to `partially_paid` as
//! payments land and to `paid` when the balance hits zero. Every applied
//! payment leaves an audit transaction row; reversals walk those rows back.

use sqlx::SqliteConnection;

use crate::error::{AppError, AppResult};
use crate::models::{LedgerEntry, LedgerStatus};
use crate::utils::date;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LedgerSide {
    /// Money a customer still owes us, keyed by sale invoice.
    Receivable,
    /// Money we still owe a supplier, keyed by purchase invoice.
    Payable,
}

impl LedgerSide {
    fn entry_table(&self) -> &'static str {
        match self {
            LedgerSide::Receivable => "receivables",
            LedgerSide::Payable => "payables",
        }
    }

    fn txn_table(&self) -> &'static str {
        match self {
            LedgerSide::Receivable => "receivable_transactions",
            LedgerSide::Payable => "payable_transactions",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            LedgerSide::Receivable => "receivable",
            LedgerSide::Payable => "payable",
        }
    }
}

pub async fn open_entry(
    conn: &mut SqliteConnection,
    side: LedgerSide,
    invoice_no: &str,
    party_id: i64,
    balance: f64,
) -> AppResult<i64> {
    let now = date::now_stamp();
    let result = sqlx::query(&format!(
        "INSERT INTO {} (invoice_no, party_id, initial_balance, current_balance, status, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
        side.entry_table()
    ))
    .bind(invoice_no)
    .bind(party_id)
    .bind(balance)
    .bind(balance)
    .bind(LedgerStatus::Pending.as_str())
    .bind(&now)
    .bind(&now)
    .execute(conn)
    .await?;

    Ok(result.last_insert_rowid())
}

pub async fn entry_for_invoice(
    conn: &mut SqliteConnection,
    side: LedgerSide,
    invoice_no: &str,
) -> AppResult<Option<LedgerEntry>> {
    let entry = sqlx::query_as::<_, LedgerEntry>(&format!(
        "SELECT * FROM {} WHERE invoice_no = ?",
        side.entry_table()
    ))
    .bind(invoice_no)
    .fetch_optional(conn)
    .await?;
    Ok(entry)
}

pub async fn pending_for_party(
    conn: &mut SqliteConnection,
    side: LedgerSide,
    party_id: i64,
) -> AppResult<Vec<LedgerEntry>> {
    let entries = sqlx::query_as::<_, LedgerEntry>(&format!(
        "SELECT * FROM {} WHERE party_id = ? AND status != 'paid' AND current_balance > 0
         ORDER BY created_at ASC",
        side.entry_table()
    ))
    .bind(party_id)
    .fetch_all(conn)
    .await?;
    Ok(entries)
}

pub async fn pending_total(
    conn: &mut SqliteConnection,
    side: LedgerSide,
    party_id: i64,
) -> AppResult<f64> {
    let total: f64 = sqlx::query_scalar(&format!(
        "SELECT COALESCE(SUM(current_balance), 0.0)
         FROM {} WHERE party_id = ? AND status != 'paid'",
        side.entry_table()
    ))
    .bind(party_id)
    .fetch_one(conn)
    .await?;
    Ok(total)
}

async fn current_balance(
    conn: &mut SqliteConnection,
    side: LedgerSide,
    entry_id: i64,
) -> AppResult<f64> {
    sqlx::query_scalar(&format!(
        "SELECT current_balance FROM {} WHERE entry_id = ?",
        side.entry_table()
    ))
    .bind(entry_id)
    .fetch_optional(conn)
    .await?
    .ok_or_else(|| {
        AppError::Consistency(format!("{} entry {} is missing", side.label(), entry_id))
    })
}

/// Applies a payment, clamping the balance at zero, and logs the audit row.
/// Returns the new balance.
#[allow(clippy::too_many_arguments)]
pub async fn apply_payment(
    conn: &mut SqliteConnection,
    side: LedgerSide,
    entry_id: i64,
    amount: f64,
    payment_date: &str,
    payment_mode: Option<&str>,
    note: Option<&str>,
    reference_no: Option<&str>,
) -> AppResult<f64> {
    let balance = current_balance(&mut *conn, side, entry_id).await?;
    let new_balance = (balance - amount).max(0.0);
    let status = if new_balance <= 0.0 {
        LedgerStatus::Paid
    } else {
        LedgerStatus::PartiallyPaid
    };

    sqlx::query(&format!(
        "UPDATE {} SET current_balance = ?, status = ?, last_payment_date = ?, updated_at = ?
         WHERE entry_id = ?",
        side.entry_table()
    ))
    .bind(new_balance)
    .bind(status.as_str())
    .bind(payment_date)
    .bind(date::now_stamp())
    .bind(entry_id)
    .execute(&mut *conn)
    .await?;

    sqlx::query(&format!(
        "INSERT INTO {} (entry_id, payment_date, amount, payment_mode, note, reference_no, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
        side.txn_table()
    ))
    .bind(entry_id)
    .bind(payment_date)
    .bind(amount)
    .bind(payment_mode)
    .bind(note)
    .bind(reference_no)
    .bind(date::now_stamp())
    .execute(conn)
    .await?;

    tracing::debug!(
        "Applied {} payment of {} to entry {}, balance now {}",
        side.label(),
        amount,
        entry_id,
        new_balance
    );
    Ok(new_balance)
}

/// Puts a previously applied amount back on the entry. Returns the restored
/// balance.
pub async fn reverse_payment(
    conn: &mut SqliteConnection,
    side: LedgerSide,
    entry_id: i64,
    amount: f64,
) -> AppResult<f64> {
    let balance = current_balance(&mut *conn, side, entry_id).await?;
    let new_balance = balance + amount;
    let status = if new_balance > 0.0 {
        LedgerStatus::Pending
    } else {
        LedgerStatus::Paid
    };

    sqlx::query(&format!(
        "UPDATE {} SET current_balance = ?, status = ?, updated_at = ? WHERE entry_id = ?",
        side.entry_table()
    ))
    .bind(new_balance)
    .bind(status.as_str())
    .bind(date::now_stamp())
    .bind(entry_id)
    .execute(conn)
    .await?;

    Ok(new_balance)
}

/// Rewrites an entry to a fresh balance, as if it had just been opened.
pub async fn reset_entry(
    conn: &mut SqliteConnection,
    side: LedgerSide,
    entry_id: i64,
    balance: f64,
) -> AppResult<()> {
    sqlx::query(&format!(
        "UPDATE {} SET initial_balance = ?, current_balance = ?, status = ?, updated_at = ?
         WHERE entry_id = ?",
        side.entry_table()
    ))
    .bind(balance)
    .bind(balance)
    .bind(LedgerStatus::Pending.as_str())
    .bind(date::now_stamp())
    .bind(entry_id)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn delete_entry(
    conn: &mut SqliteConnection,
    side: LedgerSide,
    entry_id: i64,
) -> AppResult<()> {
    sqlx::query(&format!(
        "DELETE FROM {} WHERE entry_id = ?",
        side.entry_table()
    ))
    .bind(entry_id)
    .execute(conn)
    .await?;
    Ok(())
}

/// Walks a party's open entries oldest-first and pays them down until the
/// amount runs out. Returns how much was actually applied.
pub async fn settle_pending_fifo(
    conn: &mut SqliteConnection,
    side: LedgerSide,
    party_id: i64,
    amount: f64,
    payment_date: &str,
    note: &str,
    reference_no: &str,
) -> AppResult<f64> {
    let entries = pending_for_party(&mut *conn, side, party_id).await?;
    let mut remaining = amount;

    for entry in entries {
        if remaining <= 0.0 {
            break;
        }
        let portion = remaining.min(entry.current_balance);
        apply_payment(
            &mut *conn,
            side,
            entry.entry_id,
            portion,
            payment_date,
            None,
            Some(note),
            Some(reference_no),
        )
        .await?;
        remaining -= portion;
    }

    Ok(amount - remaining)
}

/// Undoes every payment recorded against a reference (a sale or deposit
/// number) and drops the audit rows. Returns the total put back.
pub async fn reverse_by_reference(
    conn: &mut SqliteConnection,
    side: LedgerSide,
    reference_no: &str,
) -> AppResult<f64> {
    let rows: Vec<(i64, i64, f64)> = sqlx::query_as(&format!(
        "SELECT txn_id, entry_id, amount FROM {} WHERE reference_no = ? ORDER BY txn_id DESC",
        side.txn_table()
    ))
    .bind(reference_no)
    .fetch_all(&mut *conn)
    .await?;

    let mut reversed = 0.0;
    for (txn_id, entry_id, amount) in rows {
        reverse_payment(&mut *conn, side, entry_id, amount).await?;
        sqlx::query(&format!("DELETE FROM {} WHERE txn_id = ?", side.txn_table()))
            .bind(txn_id)
            .execute(&mut *conn)
            .await?;
        reversed += amount;
    }

    Ok(reversed)
}
