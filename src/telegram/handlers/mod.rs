//! Обработчики шлюзов Mini App API.
//!
//! Каждый шлюз аутентифицируется по initData из тела запроса, а не по
//! HTTP-заголовку: web view Telegram передаёт строку как есть.

pub mod articles;
pub mod products;
pub mod profile;
pub mod reputation;
