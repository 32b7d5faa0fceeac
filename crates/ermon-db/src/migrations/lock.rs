use std::fs::{File, OpenOptions};
use std::path::Path;

use fd_lock::RwLock;

use super::error::MigrationError;

/// Open (creating if needed) the file used to serialize migration runs
/// across processes. The caller takes the write lock for the whole run.
pub(crate) fn open(path: &Path) -> Result<RwLock<File>, MigrationError> {
    let file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(path)
        .map_err(|source| MigrationError::LockFailed {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(RwLock::new(file))
}
