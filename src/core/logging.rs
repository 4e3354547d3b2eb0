//! Logging initialization and startup diagnostics
//!
//! Console + file logger, plus a startup check that the bot token is
//! actually configured. A missing or wrong token is the number one cause
//! of "Invalid initData" reports, so we shout about it early.

use anyhow::Result;
use simplelog::*;
use std::fs::File;

use crate::config;

/// Initialize logger for both console and file output
///
/// # Arguments
/// * `log_file_path` - Path to the log file
///
/// # Returns
/// * `Ok(())` - Logger initialized successfully
/// * `Err(anyhow::Error)` - Failed to initialize logger
pub fn init_logger(log_file_path: &str) -> Result<()> {
    let log_file =
        File::create(log_file_path).map_err(|e| anyhow::anyhow!("Failed to create log file: {}", e))?;

    CombinedLogger::init(vec![
        TermLogger::new(
            LevelFilter::Info,
            Config::default(),
            TerminalMode::Mixed,
            ColorChoice::Auto,
        ),
        WriteLogger::new(LevelFilter::Info, Config::default(), log_file),
    ])
    .map_err(|e| anyhow::anyhow!("Failed to initialize logger: {}", e))?;

    Ok(())
}

/// Logs the authentication configuration at startup.
///
/// Validates and logs:
/// - BOT_TOKEN presence (only a prefix, never the full token)
/// - ADMIN_CHAT_ID for moderation notices
pub fn log_auth_configuration() {
    log::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    log::info!("🔐 Mini App Auth Configuration Check");
    log::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let token = config::BOT_TOKEN.as_str();
    if token.is_empty() {
        log::error!("❌ BOT_TOKEN not set - initData verification will reject ALL requests!");
        log::error!("   Set BOT_TOKEN to the token of the bot that opens the Mini App.");
    } else {
        let prefix: String = token.chars().take(10).collect();
        log::info!("✅ BOT_TOKEN: {}... ({} chars)", prefix, token.len());
        log::info!("   Must be the SAME bot the Mini App is opened through,");
        log::info!("   otherwise every request fails with hash_mismatch.");
    }

    let admin_chat = *config::ADMIN_CHAT_ID;
    if admin_chat == 0 {
        log::warn!("⚠️  ADMIN_CHAT_ID not set - moderation notices disabled");
    } else {
        log::info!("✅ ADMIN_CHAT_ID: {}", admin_chat);
    }

    log::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
}
