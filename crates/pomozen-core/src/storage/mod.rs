pub mod backend;
pub mod backup;
pub mod migrations;
mod safe;

pub use backend::{MemoryBackend, SqliteBackend, StorageBackend};
pub use backup::{export_backup, import_backup, Backup, BACKUP_VERSION};
pub use safe::{SafeStorage, StorageWarning};

use std::path::PathBuf;

use tracing::warn;

use crate::error::StorageError;

/// Returns `~/.config/pomozen[-dev]/` based on POMOZEN_ENV, creating it if
/// needed. POMOZEN_DATA_DIR overrides the location outright (tests use this
/// to stay out of the real config directory).
///
/// # Errors
/// Returns an error if the directory cannot be created.
pub fn data_dir() -> Result<PathBuf, StorageError> {
    let dir = if let Ok(dir) = std::env::var("POMOZEN_DATA_DIR") {
        PathBuf::from(dir)
    } else {
        let base_dir = dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".config");
        let env = std::env::var("POMOZEN_ENV").unwrap_or_else(|_| "production".to_string());
        if env == "dev" {
            base_dir.join("pomozen-dev")
        } else {
            base_dir.join("pomozen")
        }
    };

    std::fs::create_dir_all(&dir)
        .map_err(|e| StorageError::Unavailable(format!("{}: {e}", dir.display())))?;
    Ok(dir)
}

/// Open the default durable store at `<data_dir>/pomozen.db`, degrading to
/// in-memory storage when the directory or database cannot be opened.
pub fn open_default() -> SafeStorage {
    match data_dir().and_then(|dir| SqliteBackend::open(&dir.join("pomozen.db"))) {
        Ok(backend) => SafeStorage::new(Box::new(backend)),
        Err(e) => {
            warn!(error = %e, "cannot open durable store, data will not survive this session");
            SafeStorage::degraded()
        }
    }
}
