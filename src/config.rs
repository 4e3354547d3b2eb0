use once_cell::sync::Lazy;
use std::env;

/// Configuration constants for the Mini App API server

/// Bot token
/// Read from BOT_TOKEN or TELOXIDE_TOKEN environment variable.
/// The same token signs Mini App initData, so a mismatch here breaks
/// authentication for every client (most "invalid hash" reports are this).
pub static BOT_TOKEN: Lazy<String> = Lazy::new(|| {
    env::var("BOT_TOKEN")
        .or_else(|_| env::var("TELOXIDE_TOKEN"))
        .unwrap_or_else(|_| String::new())
});

/// Database file path
/// Read from DATABASE_PATH environment variable
/// Default: repka.sqlite
pub static DATABASE_PATH: Lazy<String> =
    Lazy::new(|| env::var("DATABASE_PATH").unwrap_or_else(|_| "repka.sqlite".to_string()));

/// Log file path
/// Read from LOG_FILE_PATH environment variable
/// Default: repka.log
pub static LOG_FILE_PATH: Lazy<String> =
    Lazy::new(|| env::var("LOG_FILE_PATH").unwrap_or_else(|_| "repka.log".to_string()));

/// HTTP port for the Mini App API
/// Read from WEBAPP_PORT environment variable
/// Default: 8080
pub static WEBAPP_PORT: Lazy<u16> = Lazy::new(|| {
    env::var("WEBAPP_PORT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(8080)
});

/// Root directory for uploaded product media
/// Read from MEDIA_ROOT environment variable
/// Default: ./media
pub static MEDIA_ROOT: Lazy<String> =
    Lazy::new(|| env::var("MEDIA_ROOT").unwrap_or_else(|_| "media".to_string()));

/// Public base URL under which MEDIA_ROOT is served (no trailing slash)
/// Read from MEDIA_PUBLIC_BASE_URL environment variable
/// Default: /media (relative, same origin as the API)
pub static MEDIA_PUBLIC_BASE_URL: Lazy<String> =
    Lazy::new(|| env::var("MEDIA_PUBLIC_BASE_URL").unwrap_or_else(|_| "/media".to_string()));

/// Admin chat that receives moderation notices for new articles
/// Read from ADMIN_CHAT_ID environment variable; 0 disables notices
pub static ADMIN_CHAT_ID: Lazy<i64> = Lazy::new(|| {
    env::var("ADMIN_CHAT_ID")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(0)
});

/// Reputation configuration
pub mod reputation {
    /// One grant per sender/recipient pair per rolling window of this length
    pub const COOLDOWN_HOURS: i64 = 24;

    /// How many history entries the reputation endpoint returns
    pub const HISTORY_PAGE_SIZE: i64 = 50;
}

/// Article configuration
pub mod article {
    /// Preview is the first N characters of the body (or explicit preview)
    pub const PREVIEW_MAX_CHARS: usize = 200;
}

/// Product media upload configuration
pub mod upload {
    /// Maximum upload size (5 MiB)
    pub const MAX_FILE_SIZE_BYTES: usize = 5 * 1024 * 1024;

    /// Accepted MIME types for product media
    pub const ALLOWED_MIME_TYPES: [&str; 4] =
        ["image/jpeg", "image/png", "image/gif", "image/webp"];

    /// Fallback extension when the client filename has none
    pub const DEFAULT_EXTENSION: &str = "jpg";

    /// Returns true if the given MIME type is allowed for product media.
    pub fn is_allowed_mime(mime: &str) -> bool {
        ALLOWED_MIME_TYPES.contains(&mime)
    }
}

/// Product listing configuration
pub mod products {
    /// A profile may have at most this many active products
    pub const MAX_PER_PROFILE: i64 = 1;
}
