//! Operation log: a plain-text diagnostics file for the install workflow.
//!
//! The file is rewritten at the start of every request. Write failures are
//! swallowed; diagnostics must never block an install.

use log::{debug, info};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::runtime::Runtime;

/// File name of the log under the userfiles root.
pub const LOG_FILE_NAME: &str = "install_item_log.txt";

pub struct OperationLog<R: Runtime> {
    runtime: Arc<R>,
    path: PathBuf,
}

impl<R: Runtime> Clone for OperationLog<R> {
    fn clone(&self) -> Self {
        Self {
            runtime: Arc::clone(&self.runtime),
            path: self.path.clone(),
        }
    }
}

impl<R: Runtime> OperationLog<R> {
    pub fn new(runtime: Arc<R>, path: PathBuf) -> Self {
        Self { runtime, path }
    }

    /// Log at `<userfiles>/install_item_log.txt`.
    pub fn in_userfiles(runtime: Arc<R>, userfiles: &Path) -> Self {
        Self::new(runtime, userfiles.join(LOG_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Truncates the log and writes `line` as its first entry.
    pub fn reset(&self, line: &str) {
        info!("{}", line);
        self.ensure_parent();
        if let Err(e) = self.runtime.write(&self.path, format!("{}\n", line).as_bytes()) {
            debug!("Failed to reset operation log {:?}: {:#}", self.path, e);
        }
    }

    pub fn append(&self, line: &str) {
        info!("{}", line);
        self.ensure_parent();
        if let Err(e) = self
            .runtime
            .append(&self.path, format!("{}\n", line).as_bytes())
        {
            debug!("Failed to append to operation log {:?}: {:#}", self.path, e);
        }
    }

    fn ensure_parent(&self) {
        if let Some(parent) = self.path.parent()
            && !self.runtime.exists(parent)
            && let Err(e) = self.runtime.create_dir_all(parent)
        {
            debug!("Failed to create log directory {:?}: {:#}", parent, e);
        }
    }
}
