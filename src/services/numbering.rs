//! Per-prefix invoice sequences. Allocation happens inside the caller's
//! transaction so a failed save never burns a number; deleting the latest
//! bill hands its number back.

use sqlx::SqliteConnection;

pub const SALE_SEQUENCE: &str = "SALES";
pub const PURCHASE_SEQUENCE: &str = "PURCHASE";

/// Deposit receipts number per party.
pub fn deposit_sequence(party_id: i64) -> String {
    format!("UDHAAR-{}", party_id)
}

pub async fn next_number(conn: &mut SqliteConnection, prefix: &str) -> Result<i64, sqlx::Error> {
    let current: Option<i64> =
        sqlx::query_scalar("SELECT last_number FROM invoice_sequences WHERE prefix = ?")
            .bind(prefix)
            .fetch_optional(&mut *conn)
            .await?;
    let next = current.unwrap_or(0) + 1;

    sqlx::query(
        "INSERT INTO invoice_sequences (prefix, last_number) VALUES (?, ?)
         ON CONFLICT(prefix) DO UPDATE SET last_number = excluded.last_number",
    )
    .bind(prefix)
    .bind(next)
    .execute(conn)
    .await?;

    Ok(next)
}

pub async fn release_number(conn: &mut SqliteConnection, prefix: &str) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE invoice_sequences SET last_number = last_number - 1
         WHERE prefix = ? AND last_number > 0",
    )
    .bind(prefix)
    .execute(conn)
    .await?;
    Ok(())
}

pub fn sale_invoice_no(year: i32, number: i64) -> String {
    format!("SAL-{}-{:05}", year, number)
}

pub fn purchase_invoice_no(year: i32, number: i64) -> String {
    format!("PUR-{}-{:05}", year, number)
}

pub fn deposit_no(year: i32, party_id: i64, number: i64) -> String {
    format!("UDH-{}-{}-{:03}", year, party_id, number)
}
