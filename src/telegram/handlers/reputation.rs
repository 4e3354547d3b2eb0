//! Репутация: выдача +1 с кулдауном и чтение истории.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config;
use crate::storage::db::{self, Profile, ReputationEntry};
use crate::telegram::webapp::{authenticate, require_json, resolve_profile, ApiError, WebAppState};
use crate::telegram::webapp_auth::VerifiedUser;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GiveReputationRequest {
    pub init_data: String,
    pub target_user_id: Option<i64>,
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct GiveReputationResponse {
    pub success: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserReputationRequest {
    pub init_data: String,
    pub user_id: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct UserReputationResponse {
    pub reputation: i64,
    pub history: Vec<ReputationEntry>,
}

/// Имя отправителя для текста уведомления.
fn sender_display_name(sender: &Profile, tg_user: &VerifiedUser) -> String {
    if let Some(username) = tg_user.username.as_deref().or(sender.username.as_deref()) {
        format!("@{}", username)
    } else if !sender.first_name.is_empty() {
        sender.first_name.clone()
    } else {
        "Пользователь".to_string()
    }
}

/// POST /api/reputation/give
///
/// Грант строго +1. Вставка в историю обязана пройти; инкремент кэша и
/// уведомление получателю — best-effort, их отказ логируется и не
/// превращается в ошибку клиенту.
pub async fn give_reputation(
    State(state): State<Arc<WebAppState>>,
    payload: Result<Json<GiveReputationRequest>, JsonRejection>,
) -> Result<Json<GiveReputationResponse>, ApiError> {
    let req = require_json(payload)?;
    let user = authenticate(&req.init_data, &state.bot_token, "give_reputation")?;

    let target_user_id = req
        .target_user_id
        .ok_or_else(|| ApiError::BadRequest("targetUserId is required".to_string()))?;
    let reason = req
        .reason
        .as_deref()
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .ok_or_else(|| ApiError::BadRequest("reason is required".to_string()))?;

    let conn = db::get_connection(&state.db_pool)?;
    let sender = resolve_profile(&conn, user.id)?;

    let target = db::get_profile_by_id(&conn, target_user_id)?
        .ok_or_else(|| ApiError::NotFound("Target profile not found".to_string()))?;

    if sender.id == target.id {
        return Err(ApiError::BadRequest(
            "Нельзя дать репутацию самому себе".to_string(),
        ));
    }

    if db::has_recent_grant(&conn, sender.id, target.id, config::reputation::COOLDOWN_HOURS)? {
        return Err(ApiError::BadRequest(
            "Вы уже давали репутацию этому пользователю за последние 24 часа".to_string(),
        ));
    }

    db::insert_reputation_grant(&conn, target.id, sender.id, 1)?;

    if let Err(e) = db::increment_profile_reputation(&conn, target.id, 1) {
        log::warn!("Reputation counter update failed for profile {}: {}", target.id, e);
    }

    let notice = format!("{} дал вам +1 rep: \"{}\"", sender_display_name(&sender, &user), reason);
    if let Err(e) = db::insert_notification(&conn, target.id, Some(sender.id), "reputation", &notice) {
        log::warn!("Notification insert failed for profile {}: {}", target.id, e);
    }

    log::info!("⭐ Reputation +1: profile {} -> profile {}", sender.id, target.id);

    Ok(Json(GiveReputationResponse { success: true }))
}

/// POST /api/reputation
///
/// Кэшированная репутация + последние гранты. Здесь как раз отдается
/// кэшированный счетчик: история рядом, расхождение видно сразу.
pub async fn user_reputation(
    State(state): State<Arc<WebAppState>>,
    payload: Result<Json<UserReputationRequest>, JsonRejection>,
) -> Result<Json<UserReputationResponse>, ApiError> {
    let req = require_json(payload)?;
    authenticate(&req.init_data, &state.bot_token, "user_reputation")?;

    let user_id = req
        .user_id
        .ok_or_else(|| ApiError::BadRequest("userId is required".to_string()))?;

    let conn = db::get_connection(&state.db_pool)?;
    let target = db::get_profile_by_id(&conn, user_id)?
        .ok_or_else(|| ApiError::NotFound("Profile not found".to_string()))?;

    let history =
        db::get_reputation_history(&conn, target.id, config::reputation::HISTORY_PAGE_SIZE)?;

    Ok(Json(UserReputationResponse {
        reputation: target.reputation,
        history,
    }))
}
