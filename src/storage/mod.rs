//! Persistence: SQLite row store and the filesystem media store.

pub mod db;
pub mod media;

pub use db::{create_pool, get_connection, DbConnection, DbPool};
pub use media::MediaStore;
