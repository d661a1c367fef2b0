// ABOUTME: Operation lock to prevent concurrent runs against the same MTA.
// ABOUTME: Uses atomic file creation with lock info stored under the state directory.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LockError {
    #[error("MTA {mta_id} is locked by {holder} (pid {pid}) since {started_at}")]
    Held {
        mta_id: String,
        holder: String,
        pid: u32,
        started_at: DateTime<Utc>,
    },

    #[error("lock error: {0}")]
    Other(String),
}

/// Information about who holds an operation lock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockInfo {
    /// Hostname of the machine that holds the lock.
    pub holder: String,
    /// Process ID of the lock holder.
    pub pid: u32,
    /// When the lock was acquired.
    pub started_at: DateTime<Utc>,
    pub mta_id: String,
}

impl LockInfo {
    /// Create new lock info for the current process.
    pub fn new(mta_id: &str) -> Self {
        Self {
            holder: gethostname::gethostname().to_string_lossy().into_owned(),
            pid: std::process::id(),
            started_at: Utc::now(),
            mta_id: mta_id.to_string(),
        }
    }

    /// Check if this lock is stale (older than 1 hour).
    pub fn is_stale(&self) -> bool {
        let age = Utc::now() - self.started_at;
        age.num_hours() >= 1
    }

    pub fn lock_path(locks_dir: &Path, mta_id: &str) -> PathBuf {
        locks_dir.join(format!("{mta_id}.lock"))
    }
}

/// A held operation lock that releases on drop.
#[derive(Debug)]
pub struct OperationLock {
    path: PathBuf,
    mta_id: String,
    released: bool,
}

impl OperationLock {
    /// Acquire the lock of `mta_id` in `locks_dir`.
    ///
    /// Creation is atomic (`create_new`), so two runs cannot both win.
    /// Stale locks (>1 hour) and unreadable lock files are broken with a
    /// warning; `force` breaks any existing lock.
    pub fn acquire(locks_dir: &Path, mta_id: &str, force: bool) -> Result<Self, LockError> {
        std::fs::create_dir_all(locks_dir).map_err(|e| {
            LockError::Other(format!(
                "failed to create lock directory {}: {e}",
                locks_dir.display()
            ))
        })?;
        let path = LockInfo::lock_path(locks_dir, mta_id);
        let info = LockInfo::new(mta_id);

        if Self::try_create(&path, &info)? {
            return Ok(Self::held(path, mta_id));
        }

        if !Self::should_break(&path, force)? {
            return Err(match read_info(&path) {
                Some(existing) => LockError::Held {
                    mta_id: mta_id.to_string(),
                    holder: existing.holder,
                    pid: existing.pid,
                    started_at: existing.started_at,
                },
                None => LockError::Other("lock held by another process".to_string()),
            });
        }

        tracing::debug!("Removing stale/forced lock at {}", path.display());
        let _ = std::fs::remove_file(&path);

        if !Self::try_create(&path, &info)? {
            return Err(LockError::Other(
                "lock acquired by another process during break".to_string(),
            ));
        }
        Ok(Self::held(path, mta_id))
    }

    fn held(path: PathBuf, mta_id: &str) -> Self {
        tracing::debug!("acquired lock {}", path.display());
        Self {
            path,
            mta_id: mta_id.to_string(),
            released: false,
        }
    }

    /// `Ok(false)` when the lock file already exists.
    fn try_create(path: &Path, info: &LockInfo) -> Result<bool, LockError> {
        let json = serde_json::to_string(info)
            .map_err(|e| LockError::Other(format!("failed to serialize lock: {e}")))?;
        match OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(mut file) => {
                file.write_all(json.as_bytes())
                    .map_err(|e| LockError::Other(format!("failed to write lock: {e}")))?;
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(LockError::Other(format!("failed to acquire lock: {e}"))),
        }
    }

    /// Check if an existing lock should be broken (stale, forced, or corrupted).
    fn should_break(path: &Path, force: bool) -> Result<bool, LockError> {
        let Some(existing) = read_info(path) else {
            tracing::warn!("Lock info unreadable, breaking lock");
            return Ok(true);
        };
        if force {
            tracing::warn!(
                "Breaking lock held by {} (pid {}) since {}",
                existing.holder,
                existing.pid,
                existing.started_at
            );
            Ok(true)
        } else if existing.is_stale() {
            tracing::warn!(
                "Auto-breaking stale lock held by {} (pid {}) since {}",
                existing.holder,
                existing.pid,
                existing.started_at
            );
            Ok(true)
        } else {
            Ok(false)
        }
    }

    pub fn mta_id(&self) -> &str {
        &self.mta_id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Release the lock.
    pub fn release(mut self) -> Result<(), LockError> {
        self.released = true;
        std::fs::remove_file(&self.path).map_err(|e| {
            LockError::Other(format!(
                "failed to remove lock file {}: {e}",
                self.path.display()
            ))
        })
    }
}

impl Drop for OperationLock {
    fn drop(&mut self) {
        if !self.released {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

fn read_info(path: &Path) -> Option<LockInfo> {
    let content = std::fs::read_to_string(path).ok()?;
    serde_json::from_str(&content).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_info_creates_with_current_host_and_pid() {
        let info = LockInfo::new("com.example.shop");

        assert_eq!(info.mta_id, "com.example.shop");
        assert_eq!(info.pid, std::process::id());
        assert!(!info.holder.is_empty());
    }

    #[test]
    fn old_lock_is_stale() {
        let mut info = LockInfo::new("shop");
        assert!(!info.is_stale());
        info.started_at = Utc::now() - chrono::Duration::hours(2);
        assert!(info.is_stale());
    }

    #[test]
    fn second_acquire_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let lock = OperationLock::acquire(dir.path(), "shop", false).unwrap();

        let err = OperationLock::acquire(dir.path(), "shop", false).unwrap_err();
        assert!(matches!(err, LockError::Held { pid, .. } if pid == std::process::id()));

        lock.release().unwrap();
        assert!(OperationLock::acquire(dir.path(), "shop", false).is_ok());
    }

    #[test]
    fn force_breaks_an_active_lock() {
        let dir = tempfile::tempdir().unwrap();
        let first = OperationLock::acquire(dir.path(), "shop", false).unwrap();
        let second = OperationLock::acquire(dir.path(), "shop", true).unwrap();
        assert_eq!(first.path(), second.path());
        std::mem::forget(first);
    }

    #[test]
    fn stale_and_corrupted_locks_are_broken() {
        let dir = tempfile::tempdir().unwrap();
        let path = LockInfo::lock_path(dir.path(), "shop");

        let mut stale = LockInfo::new("shop");
        stale.started_at = Utc::now() - chrono::Duration::hours(3);
        std::fs::write(&path, serde_json::to_string(&stale).unwrap()).unwrap();
        let lock = OperationLock::acquire(dir.path(), "shop", false).unwrap();
        lock.release().unwrap();

        std::fs::write(&path, "garbage").unwrap();
        assert!(OperationLock::acquire(dir.path(), "shop", false).is_ok());
    }

    #[test]
    fn drop_releases_the_lock() {
        let dir = tempfile::tempdir().unwrap();
        let path = {
            let lock = OperationLock::acquire(dir.path(), "shop", false).unwrap();
            lock.path().to_path_buf()
        };
        assert!(!path.exists());
    }
}
