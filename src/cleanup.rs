//! Interrupt cleanup for half-written staging directories.
//!
//! A staging directory is registered while its archive is downloading and
//! extracting. If the process is interrupted in that window, everything still
//! registered is removed before exit.

use log::debug;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::runtime::Runtime;

/// Paths to remove on interruption.
#[derive(Debug, Default)]
pub struct CleanupContext {
    paths: Vec<PathBuf>,
}

impl CleanupContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, path: PathBuf) {
        self.paths.push(path);
    }

    pub fn remove(&mut self, path: &Path) {
        self.paths.retain(|p| p != path);
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    /// Removes every registered path. Failures are ignored.
    pub fn cleanup<R: Runtime>(&self, runtime: &R) {
        for path in &self.paths {
            debug!("Cleaning up: {:?}", path);
            let result = if runtime.is_dir(path) {
                runtime.remove_dir_all(path)
            } else {
                runtime.remove_file(path)
            };
            if let Err(e) = result {
                debug!("Failed to clean up {:?}: {:#}", path, e);
            }
        }
    }
}

pub type SharedCleanupContext = Arc<Mutex<CleanupContext>>;

pub fn new_shared() -> SharedCleanupContext {
    Arc::new(Mutex::new(CleanupContext::new()))
}

/// Locks the context, recovering it if a previous holder panicked.
pub fn lock(ctx: &SharedCleanupContext) -> MutexGuard<'_, CleanupContext> {
    ctx.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Keeps `path` registered for cleanup until [`release`](Self::release) or drop.
pub struct CleanupGuard {
    ctx: SharedCleanupContext,
    path: PathBuf,
}

impl CleanupGuard {
    pub fn new(ctx: SharedCleanupContext, path: PathBuf) -> Self {
        lock(&ctx).add(path.clone());
        Self { ctx, path }
    }

    /// The path is complete (or already discarded) and must no longer be cleaned up.
    pub fn release(self) {
        // Drop does the unregistering
    }
}

impl Drop for CleanupGuard {
    fn drop(&mut self) {
        lock(&self.ctx).remove(&self.path);
    }
}

/// Removes registered paths and exits with status 130 on Ctrl-C.
///
/// The returned handle must be aborted once the guarded work finishes.
pub fn spawn_interrupt_handler<R: Runtime + 'static>(
    runtime: Arc<R>,
    ctx: SharedCleanupContext,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nInterrupted, cleaning up...");
            lock(&ctx).cleanup(runtime.as_ref());
            std::process::exit(130);
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{MockRuntime, RealRuntime};
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_cleanup_context_add_remove() {
        let mut ctx = CleanupContext::new();
        let path = PathBuf::from("/cache/composer-download/widget");

        ctx.add(path.clone());
        assert_eq!(ctx.paths().len(), 1);

        ctx.remove(&path);
        assert!(ctx.paths().is_empty());
    }

    #[test]
    fn test_cleanup_removes_dirs_and_files() {
        let dir = tempdir().unwrap();
        let staging = dir.path().join("widget");
        fs::create_dir(&staging).unwrap();
        fs::write(staging.join("last-package.zip"), "partial").unwrap();
        let stray = dir.path().join("stray.tmp");
        fs::write(&stray, "x").unwrap();

        let mut ctx = CleanupContext::new();
        ctx.add(staging.clone());
        ctx.add(stray.clone());
        ctx.cleanup(&RealRuntime);

        assert!(!staging.exists());
        assert!(!stray.exists());
    }

    #[test]
    fn test_cleanup_ignores_failures() {
        let mut runtime = MockRuntime::new();
        runtime.expect_is_dir().returning(|_| true);
        runtime
            .expect_remove_dir_all()
            .times(2)
            .returning(|_| Err(anyhow::anyhow!("permission denied")));

        let mut ctx = CleanupContext::new();
        ctx.add(PathBuf::from("/a"));
        ctx.add(PathBuf::from("/b"));
        ctx.cleanup(&runtime);
    }

    #[test]
    fn test_guard_unregisters_on_release_and_drop() {
        let ctx = new_shared();

        let guard = CleanupGuard::new(Arc::clone(&ctx), PathBuf::from("/a"));
        assert_eq!(lock(&ctx).paths().len(), 1);
        guard.release();
        assert!(lock(&ctx).paths().is_empty());

        {
            let _guard = CleanupGuard::new(Arc::clone(&ctx), PathBuf::from("/b"));
            assert_eq!(lock(&ctx).paths(), &[PathBuf::from("/b")]);
        }
        assert!(lock(&ctx).paths().is_empty());
    }
}
