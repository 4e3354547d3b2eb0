//! Telegram-слой: верификация initData, Mini App API и уведомления
//! модераторам.

pub mod handlers;
pub mod moderation;
pub mod webapp;
pub mod webapp_auth;

pub use webapp::{create_webapp_router, run_webapp_server, WebAppState};
pub use webapp_auth::{verify_init_data, InitDataError, VerifiedUser};
