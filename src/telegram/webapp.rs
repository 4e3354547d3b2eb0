use axum::{
    extract::rejection::JsonRejection,
    extract::DefaultBodyLimit,
    http::{header, HeaderName, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use teloxide::types::ChatId;
use teloxide::Bot;
use tower_http::cors::{Any, CorsLayer};

use crate::core::error::AppError;
use crate::storage::db::{self, DbPool};
use crate::storage::MediaStore;
use crate::telegram::handlers;
use crate::telegram::webapp_auth::{self, VerifiedUser};

// ============================================================================
// СОСТОЯНИЕ ПРИЛОЖЕНИЯ
// ============================================================================

/// Shared state для всех endpoints
#[derive(Clone)]
pub struct WebAppState {
    pub db_pool: Arc<DbPool>,
    pub media: MediaStore,
    pub bot_token: String,
    /// Бот для модераторских уведомлений; None если токен не настроен
    pub bot: Option<Bot>,
    /// Чат модераторов; None отключает уведомления
    pub admin_chat_id: Option<ChatId>,
}

// ============================================================================
// ERROR HANDLING
// ============================================================================

/// Ошибка уровня API: то, что уходит клиенту в JSON-конверте.
///
/// Внутренние детали (SQL, IO) сюда не попадают — они логируются на
/// сервере, а клиент видит только обобщённое сообщение.
#[derive(Debug)]
pub enum ApiError {
    /// 401: подпись initData не прошла
    Unauthorized {
        message: String,
        reason: Option<&'static str>,
    },
    /// 403: identity валиден, но прав/тарифа не хватает
    Forbidden(String),
    /// 400: невалидный вход или нарушение бизнес-правила
    BadRequest(String),
    /// 404
    NotFound(String),
    /// 500
    Internal(String),
}

impl ApiError {
    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::Unauthorized {
            message: message.into(),
            reason: None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message, reason) = match self {
            ApiError::Unauthorized { message, reason } => (StatusCode::UNAUTHORIZED, message, reason),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg, None),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg, None),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg, None),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg, None),
        };

        let body = match reason {
            Some(reason) => Json(serde_json::json!({ "error": message, "reason": reason })),
            None => Json(serde_json::json!({ "error": message })),
        };

        (status, body).into_response()
    }
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        log::error!("Internal error: {}", err);
        ApiError::Internal("Internal server error".to_string())
    }
}

impl From<rusqlite::Error> for ApiError {
    fn from(err: rusqlite::Error) -> Self {
        log::error!("Database error: {}", err);
        ApiError::Internal("Internal server error".to_string())
    }
}

impl From<r2d2::Error> for ApiError {
    fn from(err: r2d2::Error) -> Self {
        log::error!("Database pool error: {}", err);
        ApiError::Internal("Internal server error".to_string())
    }
}

// ============================================================================
// ВСПОМОГАТЕЛЬНЫЕ ФУНКЦИИ
// ============================================================================

/// Разворачивает JSON-тело запроса.
///
/// Отказ экстрактора (не-JSON, не тот content-type, нет обязательного
/// поля) уходит клиенту тем же конвертом `{"error": ...}` с 400, а не
/// plain-text ответом axum.
pub(crate) fn require_json<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    match payload {
        Ok(Json(value)) => Ok(value),
        Err(rejection) => Err(ApiError::BadRequest(rejection.body_text())),
    }
}

/// Проверяет initData и возвращает Telegram identity вызывающего.
///
/// Отказ логируется с именем действия: hash_mismatch в проде почти всегда
/// означает расхождение токена бота, а не атаку.
pub(crate) fn authenticate(init_data: &str, bot_token: &str, action: &str) -> Result<VerifiedUser, ApiError> {
    webapp_auth::verify_init_data(init_data, bot_token).map_err(|e| {
        log::warn!("[{}] initData rejected: {}", action, e.reason());

        let message = if e == webapp_auth::InitDataError::HashMismatch {
            "Invalid Telegram initData. Убедитесь, что мини-приложение открыто через того же бота, чей токен настроен на сервере.".to_string()
        } else {
            "Invalid Telegram initData".to_string()
        };

        ApiError::Unauthorized {
            message,
            reason: Some(e.reason()),
        }
    })
}

/// Резолвит Telegram identity в профиль приложения.
///
/// Все шлюзы кроме sync требуют уже существующий профиль.
pub(crate) fn resolve_profile(
    conn: &db::DbConnection,
    telegram_id: i64,
) -> Result<db::Profile, ApiError> {
    db::get_profile_by_telegram_id(conn, telegram_id)?
        .ok_or_else(|| ApiError::NotFound("Profile not found".to_string()))
}

// ============================================================================
// РОУТЕР
// ============================================================================

/// Создает роутер для Mini App API
pub fn create_webapp_router(state: WebAppState) -> Router {
    // CORS для Mini App: web view ходит с другого origin, preflight должен
    // пропускать заголовки supabase-style клиентов
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static("x-client-info"),
            HeaderName::from_static("apikey"),
        ]);

    Router::new()
        .route("/api/health", get(health_check))
        .route("/api/profile/sync", post(handlers::profile::sync_profile))
        .route("/api/articles", post(handlers::articles::create_article))
        .route("/api/reputation/give", post(handlers::reputation::give_reputation))
        .route("/api/reputation", post(handlers::reputation::user_reputation))
        .route("/api/products", post(handlers::products::manage_product))
        .route("/api/products/media", post(handlers::products::upload_product_media))
        // Поднимаем лимит тела выше 5 MiB файла + multipart-оверхед
        .layer(DefaultBodyLimit::max(8 * 1024 * 1024))
        .layer(cors)
        .with_state(Arc::new(state))
}

/// Запускает веб-сервер для Mini App
pub async fn run_webapp_server(port: u16, state: WebAppState) -> anyhow::Result<()> {
    let app = create_webapp_router(state);

    let addr = format!("0.0.0.0:{}", port);
    log::info!("🌐 Starting Mini App API server on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Health check endpoint
async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "repka-webapp"
    }))
}
