//! File-based locking so two runs of the same model never overlap

use anyhow::{Context, Result};
use fd_lock::{RwLock, RwLockWriteGuard};
use std::fmt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::ptr::NonNull;
use tracing::{debug, info};

/// Exclusive lock held for the duration of one model run
pub struct BackupLock {
    guard: Option<RwLockWriteGuard<'static, File>>,
    // Heap allocation from `Box::into_raw`; owned here and only turned back
    // into a `Box` in `Drop`, after `guard` is gone.
    lock: NonNull<RwLock<File>>,
    lock_path: PathBuf,
}

impl BackupLock {
    /// Acquire the lock for `model` inside `lock_dir`.
    /// Returns error if another run of the model holds it.
    pub fn acquire(lock_dir: &Path, model: &str) -> Result<Self> {
        let lock_path = lock_dir.join(format!("{}.lock", model));

        debug!("Attempting to acquire lock: {:?}", lock_path);

        std::fs::create_dir_all(lock_dir).context("Failed to create lock directory")?;

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .context(format!("Failed to open lock file: {:?}", lock_path))?;

        let lock = NonNull::from(Box::leak(Box::new(RwLock::new(file))));

        // SAFETY: `lock` points to a live heap allocation that nothing else
        // references and that is not freed until `Drop`, which releases the
        // guard first.
        let guard = match unsafe { (*lock.as_ptr()).try_write() } {
            Ok(guard) => guard,
            Err(e) => {
                // SAFETY: the failed attempt left no borrow behind.
                drop(unsafe { Box::from_raw(lock.as_ptr()) });
                return Err(e).context(format!(
                    "Model '{}' is already running (lock held)",
                    model
                ));
            }
        };
        // SAFETY: see above; the guard never outlives the allocation.
        let guard: RwLockWriteGuard<'static, File> = unsafe { std::mem::transmute(guard) };

        info!("Acquired lock for model: {}", model);

        Ok(Self {
            guard: Some(guard),
            lock,
            lock_path,
        })
    }

    /// Get the lock file path (for cleanup or inspection)
    pub fn path(&self) -> &Path {
        &self.lock_path
    }
}

impl fmt::Debug for BackupLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackupLock")
            .field("lock_path", &self.lock_path)
            .field("held", &self.guard.is_some())
            .finish()
    }
}

impl Drop for BackupLock {
    fn drop(&mut self) {
        drop(self.guard.take());
        // SAFETY: the guard borrowing the allocation was just dropped, and
        // `lock` came from `Box::leak` in `acquire`.
        drop(unsafe { Box::from_raw(self.lock.as_ptr()) });
        debug!("Released lock: {:?}", self.lock_path);
    }
}
