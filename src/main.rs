use std::sync::Arc;

use teloxide::types::ChatId;
use teloxide::Bot;

use repka::config;
use repka::core::logging;
use repka::storage::{self, MediaStore};
use repka::telegram::webapp::{run_webapp_server, WebAppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Загружаем .env до чтения конфигурации
    dotenvy::dotenv().ok();

    logging::init_logger(&config::LOG_FILE_PATH)?;
    logging::log_auth_configuration();

    log::info!("🚀 Starting repka Mini App backend...");

    let db_pool = Arc::new(storage::create_pool(&config::DATABASE_PATH)?);
    log::info!("💾 Database ready: {}", *config::DATABASE_PATH);

    let media = MediaStore::new(config::MEDIA_ROOT.as_str(), config::MEDIA_PUBLIC_BASE_URL.as_str());

    let bot_token = config::BOT_TOKEN.clone();
    if bot_token.is_empty() {
        anyhow::bail!("BOT_TOKEN is not set; initData verification cannot work without it");
    }

    // Без admin-чата сервер работает, но модерация не уведомляется
    let admin_chat_id = (*config::ADMIN_CHAT_ID != 0).then(|| ChatId(*config::ADMIN_CHAT_ID));
    let bot = admin_chat_id.is_some().then(|| Bot::new(&bot_token));
    if admin_chat_id.is_none() {
        log::warn!("⚠️ ADMIN_CHAT_ID not set, moderation notices disabled");
    }

    let state = WebAppState {
        db_pool,
        media,
        bot_token,
        bot,
        admin_chat_id,
    };

    run_webapp_server(*config::WEBAPP_PORT, state).await
}
