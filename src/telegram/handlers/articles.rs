//! Создание статей: нормализация входа + постановка в очередь модерации.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config;
use crate::storage::db::{self, Article, NewArticle};
use crate::telegram::moderation;
use crate::telegram::webapp::{authenticate, require_json, resolve_profile, ApiError, WebAppState};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateArticleRequest {
    pub init_data: String,
    pub article: ArticleInput,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleInput {
    pub title: String,
    pub body: String,
    pub preview: Option<String>,
    pub media_url: Option<String>,
    pub media_type: Option<String>,
    pub category_id: Option<i64>,
    pub is_anonymous: Option<bool>,
    pub allow_comments: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct CreateArticleResponse {
    pub article: Article,
}

/// Выводит тип медиа из ссылки, когда клиент его не прислал.
/// Нарочно по подстроке: клиенты шлют ссылки и без схемы
/// ("youtube.com/watch?v=..."), такие тоже считаются видео.
fn infer_media_type(media_url: &str) -> &'static str {
    if media_url.contains("youtube.com") || media_url.contains("youtu.be") {
        "youtube"
    } else {
        "image"
    }
}

/// Обрезает текст до первых N символов. По границе символа, не байта.
fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// POST /api/articles
///
/// Создает статью в статусе `pending` и шлет best-effort уведомление
/// модераторам. Падение уведомления не откатывает статью.
pub async fn create_article(
    State(state): State<Arc<WebAppState>>,
    payload: Result<Json<CreateArticleRequest>, JsonRejection>,
) -> Result<Json<CreateArticleResponse>, ApiError> {
    let req = require_json(payload)?;
    let user = authenticate(&req.init_data, &state.bot_token, "create_article")?;

    let input = &req.article;
    if input.title.trim().is_empty() || input.body.trim().is_empty() {
        return Err(ApiError::BadRequest("Title and body are required".to_string()));
    }

    let conn = db::get_connection(&state.db_pool)?;
    let profile = resolve_profile(&conn, user.id)?;

    let preview_source = input.preview.as_deref().unwrap_or(&input.body);
    let preview = truncate_chars(preview_source, config::article::PREVIEW_MAX_CHARS);

    let media_type = match (&input.media_url, &input.media_type) {
        (Some(url), None) => Some(infer_media_type(url)),
        (Some(_), Some(explicit)) => Some(explicit.as_str()),
        (None, _) => None,
    };

    let article = db::insert_article(
        &conn,
        &NewArticle {
            author_id: profile.id,
            category_id: input.category_id,
            title: input.title.trim(),
            body: &input.body,
            preview,
            media_url: input.media_url.as_deref(),
            media_type,
            is_anonymous: input.is_anonymous.unwrap_or(false),
            allow_comments: input.allow_comments.unwrap_or(true),
        },
    )?;

    log::info!("📝 Article #{} created by profile {}", article.id, profile.id);

    // Уведомление модераторам — вне пути ответа
    if let (Some(bot), Some(chat_id)) = (state.bot.clone(), state.admin_chat_id) {
        let pool = Arc::clone(&state.db_pool);
        let article_for_notice = article.clone();
        let author = profile.clone();
        tokio::spawn(async move {
            if let Err(e) =
                moderation::send_moderation_notice(&bot, chat_id, &pool, &article_for_notice, &author).await
            {
                log::warn!("Failed to send moderation notice for article {}: {}", article_for_notice.id, e);
            }
        });
    }

    Ok(Json(CreateArticleResponse { article }))
}
