//! Whole-cache advisory locking so two `chariot` invocations never walk
//! the same cache root at once.

use std::fs::{File, OpenOptions};
use std::path::Path;

use fs2::FileExt;

use crate::error::{ChariotError, Result};

/// Acquire an exclusive lock on `lock_path`. Returns a guard that releases
/// the lock when dropped.
///
/// The lock file is never deleted, on acquisition or on contention: a
/// stale lock file is harmless since the advisory lock itself is released
/// on process exit, and deleting it while another process holds it open
/// risks a "new file, new lock" race.
pub fn acquire(lock_path: &Path) -> Result<CacheLock> {
    if let Some(parent) = lock_path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ChariotError::io(parent, e))?;
    }

    let file = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(false)
        .open(lock_path)
        .map_err(|e| ChariotError::io(lock_path, e))?;

    file.try_lock_exclusive()
        .map_err(|_| ChariotError::LockContention {
            path: lock_path.to_path_buf(),
        })?;

    Ok(CacheLock { _file: file })
}

/// RAII guard releasing the advisory lock when dropped.
#[derive(Debug)]
pub struct CacheLock {
    _file: File,
}
