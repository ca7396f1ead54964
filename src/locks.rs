//! Per-target mutual exclusion for staging and finalizing.
//!
//! Two requests for the same `target-dir` share one staging directory and one
//! install destination, so they must not interleave. Requests for different
//! targets proceed in parallel.
//!
//! Tasks inside one process queue on an async mutex. When a lock directory is
//! configured, the holder also takes an exclusive advisory lock on
//! `<lock_dir>/<target>.lock`, which serializes separate `mwpkg` processes.

use anyhow::{Context, Result};
use fs2::FileExt;
use log::debug;
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Registry of async locks keyed by target directory name.
#[derive(Clone, Default)]
pub struct TargetLocks {
    locks: Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>,
    lock_dir: Option<PathBuf>,
}

/// Held while a target is being staged or finalized.
pub struct TargetGuard {
    // Closing the file releases the advisory lock
    _file: Option<File>,
    _guard: OwnedMutexGuard<()>,
}

impl TargetLocks {
    /// Locks that only coordinate tasks within this process.
    pub fn new() -> Self {
        Self::default()
    }

    /// Locks that also coordinate with other processes using `lock_dir`.
    pub fn with_lock_dir(lock_dir: impl Into<PathBuf>) -> Self {
        Self {
            lock_dir: Some(lock_dir.into()),
            ..Self::default()
        }
    }

    pub fn lock_file_path(&self, target: &str) -> Option<PathBuf> {
        self.lock_dir
            .as_ref()
            .map(|dir| dir.join(format!("{}.lock", target)))
    }

    /// Waits until no other holder owns `target`, then returns its guard.
    pub async fn lock(&self, target: &str) -> Result<TargetGuard> {
        let lock = {
            let mut locks = self
                .locks
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            // Drop entries nobody is waiting on so the map stays small
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            Arc::clone(locks.entry(target.to_string()).or_default())
        };

        debug!("Waiting for lock on target {}", target);
        let guard = lock.lock_owned().await;

        let file = match self.lock_file_path(target) {
            Some(path) => Some(
                tokio::task::spawn_blocking(move || lock_file(&path))
                    .await
                    .context("File lock task panicked")??,
            ),
            None => None,
        };

        Ok(TargetGuard {
            _file: file,
            _guard: guard,
        })
    }
}

fn lock_file(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create lock directory {:?}", parent))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(false)
        .open(path)
        .with_context(|| format!("Failed to open lock file {:?}", path))?;
    debug!("Waiting for file lock {:?}", path);
    file.lock_exclusive()
        .with_context(|| format!("Failed to lock {:?}", path))?;
    Ok(file)
}
