//! Core utilities: error types and logging setup.

pub mod error;
pub mod logging;

pub use error::{AppError, AppResult};
pub use logging::{init_logger, log_auth_configuration};
