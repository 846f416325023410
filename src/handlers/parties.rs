use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::models::party::{clean_optional, validate_aadhaar, validate_pan, validate_phone};
use crate::models::{LedgerEntry, Party};
use crate::services::ledger::{self, LedgerSide};
use crate::utils::date;
use crate::AppState;

#[derive(Deserialize)]
pub struct CreatePartyRequest {
    pub name: String,
    pub phone: Option<String>,
    pub alternate_phone: Option<String>,
    pub landline_phone: Option<String>,
    pub address: Option<String>,
    pub pan_number: Option<String>,
    pub aadhaar_number: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdatePartyRequest {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub alternate_phone: Option<String>,
    pub landline_phone: Option<String>,
    pub address: Option<String>,
    pub pan_number: Option<String>,
    pub aadhaar_number: Option<String>,
}

#[derive(Deserialize)]
pub struct ListPartiesQuery {
    pub q: Option<String>,
}

#[derive(Serialize)]
pub struct PendingEntriesResponse {
    pub entries: Vec<LedgerEntry>,
    pub total: f64,
}

fn validate_optional_fields(
    phone: &Option<String>,
    pan: &Option<String>,
    aadhaar: &Option<String>,
) -> AppResult<()> {
    if let Some(phone) = phone {
        validate_phone(phone).map_err(AppError::Validation)?;
    }
    if let Some(pan) = pan {
        validate_pan(pan).map_err(AppError::Validation)?;
    }
    if let Some(aadhaar) = aadhaar {
        validate_aadhaar(aadhaar).map_err(AppError::Validation)?;
    }
    Ok(())
}

pub(crate) async fn fetch_party(state: &AppState, party_id: i64) -> AppResult<Party> {
    sqlx::query_as::<_, Party>("SELECT * FROM parties WHERE party_id = ?")
        .bind(party_id)
        .fetch_optional(&*state.db_pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Party {} not found", party_id)))
}

pub async fn create_party(
    State(state): State<AppState>,
    Json(payload): Json<CreatePartyRequest>,
) -> AppResult<(StatusCode, Json<Party>)> {
    let name = payload.name.trim().to_string();
    if name.is_empty() {
        return Err(AppError::Validation("Name is required".to_string()));
    }
    let phone = clean_optional(payload.phone);
    // Secondary numbers are stored as given; only the primary phone is checked.
    let alternate_phone = clean_optional(payload.alternate_phone);
    let landline_phone = clean_optional(payload.landline_phone);
    let address = clean_optional(payload.address);
    let pan_number = clean_optional(payload.pan_number);
    let aadhaar_number = clean_optional(payload.aadhaar_number);
    validate_optional_fields(&phone, &pan_number, &aadhaar_number)?;

    let name_taken: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM parties WHERE name = ?)")
            .bind(&name)
            .fetch_one(&*state.db_pool)
            .await?;
    if name_taken {
        return Err(AppError::Integrity(format!(
            "A party named '{}' already exists",
            name
        )));
    }
    if let Some(phone) = &phone {
        let phone_taken: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM parties WHERE phone = ?)")
                .bind(phone)
                .fetch_one(&*state.db_pool)
                .await?;
        if phone_taken {
            return Err(AppError::Integrity(format!(
                "Phone number {} is already registered",
                phone
            )));
        }
    }

    let now = date::now_stamp();
    let result = sqlx::query(
        "INSERT INTO parties (name, phone, alternate_phone, landline_phone, address,
         pan_number, aadhaar_number, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&name)
    .bind(&phone)
    .bind(&alternate_phone)
    .bind(&landline_phone)
    .bind(&address)
    .bind(&pan_number)
    .bind(&aadhaar_number)
    .bind(&now)
    .bind(&now)
    .execute(&*state.db_pool)
    .await?;

    let party = fetch_party(&state, result.last_insert_rowid()).await?;
    tracing::info!("Created party {} ({})", party.party_id, party.name);
    Ok((StatusCode::CREATED, Json(party)))
}

pub async fn list_parties(
    State(state): State<AppState>,
    Query(query): Query<ListPartiesQuery>,
) -> AppResult<Json<Vec<Party>>> {
    let parties = match query.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
        Some(q) => {
            let pattern = format!("%{}%", q);
            sqlx::query_as::<_, Party>(
                "SELECT * FROM parties WHERE name LIKE ? OR phone LIKE ? ORDER BY name",
            )
            .bind(&pattern)
            .bind(&pattern)
            .fetch_all(&*state.db_pool)
            .await?
        }
        None => {
            sqlx::query_as::<_, Party>("SELECT * FROM parties ORDER BY name")
                .fetch_all(&*state.db_pool)
                .await?
        }
    };
    Ok(Json(parties))
}

pub async fn get_party(
    Path(party_id): Path<i64>,
    State(state): State<AppState>,
) -> AppResult<Json<Party>> {
    Ok(Json(fetch_party(&state, party_id).await?))
}

pub async fn update_party(
    Path(party_id): Path<i64>,
    State(state): State<AppState>,
    Json(payload): Json<UpdatePartyRequest>,
) -> AppResult<Json<Party>> {
    let current = fetch_party(&state, party_id).await?;

    let name = match payload.name {
        Some(name) => {
            let name = name.trim().to_string();
            if name.is_empty() {
                return Err(AppError::Validation("Name cannot be blank".to_string()));
            }
            name
        }
        None => current.name.clone(),
    };
    let phone = clean_optional(payload.phone).or(current.phone.clone());
    let alternate_phone =
        clean_optional(payload.alternate_phone).or(current.alternate_phone.clone());
    let landline_phone = clean_optional(payload.landline_phone).or(current.landline_phone.clone());
    let address = clean_optional(payload.address).or(current.address.clone());
    let pan_number = clean_optional(payload.pan_number).or(current.pan_number.clone());
    let aadhaar_number = clean_optional(payload.aadhaar_number).or(current.aadhaar_number.clone());
    validate_optional_fields(&phone, &pan_number, &aadhaar_number)?;

    let name_taken: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM parties WHERE name = ? AND party_id != ?)",
    )
    .bind(&name)
    .bind(party_id)
    .fetch_one(&*state.db_pool)
    .await?;
    if name_taken {
        return Err(AppError::Integrity(format!(
            "A party named '{}' already exists",
            name
        )));
    }
    if let Some(phone) = &phone {
        let phone_taken: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM parties WHERE phone = ? AND party_id != ?)",
        )
        .bind(phone)
        .bind(party_id)
        .fetch_one(&*state.db_pool)
        .await?;
        if phone_taken {
            return Err(AppError::Integrity(format!(
                "Phone number {} is already registered",
                phone
            )));
        }
    }

    sqlx::query(
        "UPDATE parties SET name = ?, phone = ?, alternate_phone = ?, landline_phone = ?,
         address = ?, pan_number = ?, aadhaar_number = ?, updated_at = ? WHERE party_id = ?",
    )
    .bind(&name)
    .bind(&phone)
    .bind(&alternate_phone)
    .bind(&landline_phone)
    .bind(&address)
    .bind(&pan_number)
    .bind(&aadhaar_number)
    .bind(date::now_stamp())
    .bind(party_id)
    .execute(&*state.db_pool)
    .await?;

    Ok(Json(fetch_party(&state, party_id).await?))
}

async fn pending_entries(
    state: &AppState,
    side: LedgerSide,
    party_id: i64,
) -> AppResult<Json<PendingEntriesResponse>> {
    fetch_party(state, party_id).await?;
    let mut conn = state.db_pool.acquire().await?;
    let entries = ledger::pending_for_party(&mut conn, side, party_id).await?;
    let total = entries.iter().map(|e| e.current_balance).sum();
    Ok(Json(PendingEntriesResponse { entries, total }))
}

pub async fn pending_receivables(
    Path(party_id): Path<i64>,
    State(state): State<AppState>,
) -> AppResult<Json<PendingEntriesResponse>> {
    pending_entries(&state, LedgerSide::Receivable, party_id).await
}

pub async fn pending_payables(
    Path(party_id): Path<i64>,
    State(state): State<AppState>,
) -> AppResult<Json<PendingEntriesResponse>> {
    pending_entries(&state, LedgerSide::Payable, party_id).await
}
