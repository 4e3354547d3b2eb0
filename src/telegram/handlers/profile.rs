//! Синхронизация профиля: upsert по telegram_id при каждом открытии Mini App.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::storage::db::{self, Profile, ProfileSync};
use crate::telegram::webapp::{authenticate, require_json, ApiError, WebAppState};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncProfileRequest {
    pub init_data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncProfileResponse {
    pub profile: Profile,
    pub articles_count: i64,
}

/// POST /api/profile/sync
///
/// Создает или обновляет профиль по данным из initData и возвращает его
/// вместе со счетчиком статей. Репутация в ответе считается по истории
/// грантов, а не из кешированной колонки: фронту нужен источник истины.
pub async fn sync_profile(
    State(state): State<Arc<WebAppState>>,
    payload: Result<Json<SyncProfileRequest>, JsonRejection>,
) -> Result<Json<SyncProfileResponse>, ApiError> {
    let req = require_json(payload)?;
    let user = authenticate(&req.init_data, &state.bot_token, "sync_profile")?;

    let conn = db::get_connection(&state.db_pool)?;

    let first_name = user.first_name.as_deref().unwrap_or("User");
    let mut profile = db::upsert_profile(
        &conn,
        &ProfileSync {
            telegram_id: user.id,
            username: user.username.as_deref(),
            first_name,
            last_name: user.last_name.as_deref(),
            avatar_url: user.photo_url.as_deref(),
            is_premium: user.is_premium,
        },
    )?;

    let articles_count = db::count_articles_by_author(&conn, profile.id)?;
    profile.reputation = db::reputation_from_history(&conn, profile.id)?;

    log::info!(
        "👤 Profile synced: telegram_id={} articles={}",
        user.id,
        articles_count
    );

    Ok(Json(SyncProfileResponse {
        profile,
        articles_count,
    }))
}
