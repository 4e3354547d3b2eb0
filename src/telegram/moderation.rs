//! Уведомления модераторам о новых статьях.

use teloxide::prelude::*;
use teloxide::types::{ChatId, InlineKeyboardButton, InlineKeyboardMarkup, ParseMode};

use crate::core::error::AppResult;
use crate::storage::db::{self, Article, DbPool, Profile};

/// Экранирует текст для parse_mode=HTML.
fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Автор анонимной статьи не раскрывается даже модераторам.
fn author_label(article: &Article, author: &Profile) -> String {
    if article.is_anonymous {
        return "Аноним".to_string();
    }
    match author.username.as_deref() {
        Some(username) => format!("@{}", username),
        None => author.first_name.clone(),
    }
}

/// Строит текст карточки модерации: заголовок, автор, превью, id статьи.
fn moderation_text(article: &Article, author: &Profile) -> String {
    let mut text = format!(
        "📝 <b>Новая статья на модерацию</b>\n\n<b>{}</b>\n👤 Автор: {}\n\n{}",
        escape_html(&article.title),
        escape_html(&author_label(article, author)),
        escape_html(&article.preview),
    );

    if let Some(url) = article.media_url.as_deref() {
        text.push_str(&format!("\n\n🔗 {}", escape_html(url)));
    }

    // Id нужен модераторам для ручных операций, когда кнопки недоступны
    text.push_str(&format!("\n\n<b>ID:</b> <code>{}</code>", article.id));
    text
}

fn moderation_keyboard(article_id: i64) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![
        InlineKeyboardButton::callback("✅ Одобрить", format!("approve:{}", article_id)),
        InlineKeyboardButton::callback("❌ Отклонить", format!("reject:{}", article_id)),
    ]])
}

/// Шлет карточку статьи в чат модераторов и запоминает message_id,
/// чтобы callback-обработчик мог обновить карточку.
pub async fn send_moderation_notice(
    bot: &Bot,
    admin_chat_id: ChatId,
    pool: &DbPool,
    article: &Article,
    author: &Profile,
) -> AppResult<()> {
    let message = bot
        .send_message(admin_chat_id, moderation_text(article, author))
        .parse_mode(ParseMode::Html)
        .reply_markup(moderation_keyboard(article.id))
        .await?;

    let conn = db::get_connection(pool)?;
    db::set_article_telegram_message_id(&conn, article.id, message.id.0 as i64)?;

    log::info!(
        "📨 Moderation notice sent for article #{} (message {})",
        article.id,
        message.id.0
    );

    Ok(())
}
