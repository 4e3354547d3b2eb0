//! repka — бэкенд Telegram Mini App: профили, статьи, репутация и
//! продукты поверх SQLite, с HMAC-верификацией initData на каждом
//! запросе.

pub mod config;
pub mod core;
pub mod storage;
pub mod telegram;

pub use crate::core::error::{AppError, AppResult};
pub use storage::{create_pool, DbPool};
pub use telegram::{create_webapp_router, run_webapp_server, WebAppState};
