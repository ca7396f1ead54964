use anyhow::{Context, Result};
use std::path::Path;

use crate::runtime::Runtime;

/// Base names of everything under `root`, depth-first, children before their
/// parent directory. Siblings are visited in name order.
pub fn scan_children_first<R: Runtime>(runtime: &R, root: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    walk(runtime, root, &mut names)?;
    Ok(names)
}

fn walk<R: Runtime>(runtime: &R, dir: &Path, names: &mut Vec<String>) -> Result<()> {
    let mut entries = runtime
        .read_dir(dir)
        .with_context(|| format!("Failed to list {:?}", dir))?;
    entries.sort();

    for path in entries {
        if runtime.is_dir(&path) {
            walk(runtime, &path, names)?;
        }
        if let Some(name) = path.file_name() {
            names.push(name.to_string_lossy().into_owned());
        }
    }
    Ok(())
}
