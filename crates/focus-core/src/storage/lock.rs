//! Exclusive writer lock for the session database.
//!
//! The lock is an exclusive OS file lock on `<db>.lock` next to the database.
//! It is held for as long as a store is open; dropping the guard releases it.

use std::fs::{File, OpenOptions, TryLockError};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::error::{CoreError, Result};

/// How long `acquire` keeps retrying before giving up.
pub const LOCK_TIMEOUT: Duration = Duration::from_secs(1);

const RETRY_EVERY: Duration = Duration::from_millis(50);

#[derive(Debug)]
pub struct FileLock {
    file: File,
    path: PathBuf,
}

impl FileLock {
    /// Lock file used for the database at `db_path`.
    pub fn path_for(db_path: &Path) -> PathBuf {
        let mut name = db_path.as_os_str().to_owned();
        name.push(".lock");
        PathBuf::from(name)
    }

    /// Take the lock for `db_path`, retrying for up to `timeout`.
    ///
    /// # Errors
    /// [`CoreError::AlreadyRunning`] if another process keeps holding it.
    pub fn acquire(db_path: &Path, timeout: Duration) -> Result<Self> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(lock) = Self::try_acquire(db_path)? {
                return Ok(lock);
            }
            if Instant::now() >= deadline {
                return Err(CoreError::AlreadyRunning);
            }
            thread::sleep(RETRY_EVERY);
        }
    }

    /// One non-blocking attempt. `Ok(None)` means someone else holds it.
    pub fn try_acquire(db_path: &Path) -> Result<Option<Self>> {
        let path = Self::path_for(db_path);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        match file.try_lock() {
            Ok(()) => {
                // Owner info for debugging only.
                let _ = file.set_len(0);
                let _ = file.seek(SeekFrom::Start(0));
                let _ = writeln!(file, "pid={}", std::process::id());
                let _ = file.flush();
                debug!(path = %path.display(), "acquired store lock");
                Ok(Some(Self { file, path }))
            }
            Err(TryLockError::WouldBlock) => Ok(None),
            Err(TryLockError::Error(e)) => Err(e.into()),
        }
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
        debug!(path = %self.path.display(), "released store lock");
    }
}

/// Whether another process currently holds the lock for `db_path`.
pub fn probe_running(db_path: &Path) -> Result<bool> {
    if !db_path.exists() {
        return Ok(false);
    }
    Ok(FileLock::try_acquire(db_path)?.is_none())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn second_acquire_times_out() {
        let dir = TempDir::new().unwrap();
        let db = dir.path().join("focus.db");
        let _held = FileLock::acquire(&db, LOCK_TIMEOUT).unwrap();

        let started = Instant::now();
        let err = FileLock::acquire(&db, Duration::from_millis(120)).unwrap_err();
        assert!(matches!(err, CoreError::AlreadyRunning));
        assert!(started.elapsed() >= Duration::from_millis(100));
    }

    #[test]
    fn drop_releases_lock() {
        let dir = TempDir::new().unwrap();
        let db = dir.path().join("focus.db");
        drop(FileLock::acquire(&db, LOCK_TIMEOUT).unwrap());
        assert!(FileLock::try_acquire(&db).unwrap().is_some());
    }

    #[test]
    fn probe_reports_holder() {
        let dir = TempDir::new().unwrap();
        let db = dir.path().join("focus.db");
        assert!(!probe_running(&db).unwrap());

        std::fs::write(&db, b"").unwrap();
        let held = FileLock::acquire(&db, LOCK_TIMEOUT).unwrap();
        assert!(probe_running(&db).unwrap());
        drop(held);
        assert!(!probe_running(&db).unwrap());
    }

    #[test]
    fn lock_path_sits_next_to_db() {
        let p = FileLock::path_for(Path::new("/tmp/x/focus_dev.db"));
        assert_eq!(p, PathBuf::from("/tmp/x/focus_dev.db.lock"));
    }
}
