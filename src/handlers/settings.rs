use axum::{
    extract::{Path, State},
    response::Json,
};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::error::AppResult;
use crate::models::Setting;
use crate::services::pdf::ShopProfile;
use crate::utils::date;
use crate::AppState;

#[derive(Deserialize)]
pub struct UpdateSettingRequest {
    pub value: String,
    pub description: Option<String>,
}

#[derive(Serialize)]
pub struct SettingResponse {
    pub key: String,
    pub value: String,
}

pub async fn get_settings(State(state): State<AppState>) -> AppResult<Json<Vec<Setting>>> {
    let settings = sqlx::query_as::<_, Setting>("SELECT * FROM settings ORDER BY setting_key")
        .fetch_all(&*state.db_pool)
        .await?;
    Ok(Json(settings))
}

pub async fn update_setting(
    Path(setting_key): Path<String>,
    State(state): State<AppState>,
    Json(payload): Json<UpdateSettingRequest>,
) -> AppResult<Json<SettingResponse>> {
    sqlx::query(
        "INSERT INTO settings (setting_key, setting_value, description, updated_at)
         VALUES (?, ?, ?, ?)
         ON CONFLICT (setting_key)
         DO UPDATE SET setting_value = excluded.setting_value,
                       description = COALESCE(excluded.description, description),
                       updated_at = excluded.updated_at",
    )
    .bind(&setting_key)
    .bind(&payload.value)
    .bind(&payload.description)
    .bind(date::now_stamp())
    .execute(&*state.db_pool)
    .await?;

    tracing::info!("Setting {} updated", setting_key);
    Ok(Json(SettingResponse {
        key: setting_key,
        value: payload.value,
    }))
}

/// Shop header fields for PDF rendering, with a usable fallback when the
/// settings table has not been seeded.
pub(crate) async fn load_shop_profile(pool: &SqlitePool) -> AppResult<ShopProfile> {
    let rows = sqlx::query_as::<_, (String, String)>(
        "SELECT setting_key, setting_value FROM settings
         WHERE setting_key IN ('shop_name', 'shop_address', 'shop_phone', 'shop_gstin')",
    )
    .fetch_all(pool)
    .await?;

    let mut profile = ShopProfile {
        name: "Jewellery Shop".to_string(),
        address: None,
        phone: None,
        gstin: None,
    };

    for (key, value) in rows {
        match key.as_str() {
            "shop_name" => profile.name = value,
            "shop_address" => profile.address = Some(value),
            "shop_phone" => profile.phone = Some(value),
            "shop_gstin" => profile.gstin = Some(value),
            _ => {}
        }
    }

    Ok(profile)
}
