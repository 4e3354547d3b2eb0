//! Filesystem-backed blob store for product media.
//!
//! Uploads land under `<root>/<profile_id>/<timestamp>.<ext>` so that one
//! profile's files never collide with another's and repeated uploads get
//! unique names. The returned URL is `<public_base>/<relative path>` and is
//! what gets stored on the product row.

use std::path::{Path, PathBuf};

use crate::core::error::AppResult;

/// Хранилище медиафайлов продуктов.
#[derive(Debug, Clone)]
pub struct MediaStore {
    root: PathBuf,
    public_base_url: String,
}

impl MediaStore {
    /// Создаёт хранилище. Каталог создаётся лениво при первой записи.
    pub fn new(root: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        let mut base = public_base_url.into();
        while base.ends_with('/') {
            base.pop();
        }
        Self {
            root: root.into(),
            public_base_url: base,
        }
    }

    /// Сохраняет файл под namespace профиля и возвращает публичный URL.
    ///
    /// # Arguments
    /// * `profile_id` - владелец файла (namespace)
    /// * `original_filename` - имя файла от клиента; из него берётся расширение
    /// * `bytes` - содержимое
    pub fn store(&self, profile_id: i64, original_filename: &str, bytes: &[u8]) -> AppResult<String> {
        let ext = extension_of(original_filename);
        let filename = format!("{}.{}", chrono::Utc::now().timestamp_millis(), ext);

        let dir = self.root.join(profile_id.to_string());
        std::fs::create_dir_all(&dir)?;
        let path = dir.join(&filename);
        std::fs::write(&path, bytes)?;

        log::info!(
            "Stored product media for profile {}: {} ({} bytes)",
            profile_id,
            path.display(),
            bytes.len()
        );

        Ok(format!("{}/{}/{}", self.public_base_url, profile_id, filename))
    }
}

/// Расширение из клиентского имени файла; fallback "jpg" как в оригинале.
fn extension_of(filename: &str) -> String {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty() && e.len() <= 8 && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_else(|| crate::config::upload::DEFAULT_EXTENSION.to_string())
}
