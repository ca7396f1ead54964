use crate::runtime::Runtime;
use anyhow::{Context, Result, bail};
use log::{debug, info};
use std::path::Path;
use zip::ZipArchive;

use super::{ArchiveExtractor, enclosed_path};

/// Extractor for .zip archives
pub struct ZipExtractor;

impl ArchiveExtractor for ZipExtractor {
    fn extract<R: Runtime>(
        &self,
        runtime: &R,
        archive_path: &Path,
        extract_to: &Path,
    ) -> Result<usize> {
        debug!("Extracting zip archive to {:?}...", extract_to);
        let file = runtime
            .open_seekable(archive_path)
            .with_context(|| format!("Failed to open archive at {:?}", archive_path))?;

        let mut archive = ZipArchive::new(file).with_context(|| "Failed to parse ZIP archive")?;
        let mut written = 0;

        for i in 0..archive.len() {
            let mut entry = archive
                .by_index(i)
                .with_context(|| format!("Failed to read ZIP entry {}", i))?;

            let Some(full_path) = entry
                .enclosed_name()
                .and_then(|name| enclosed_path(extract_to, &name))
            else {
                debug!("Skipping entry with invalid path: {}", entry.name());
                continue;
            };

            if entry.is_dir() {
                runtime.create_dir_all(&full_path)?;
                continue;
            }

            if let Some(parent) = full_path.parent() {
                runtime.create_dir_all(parent)?;
            }
            let mut dest_file = runtime.create_file(&full_path)?;
            std::io::copy(&mut entry, &mut dest_file)
                .with_context(|| format!("Failed to extract file {:?}", full_path))?;
            written += 1;

            #[cfg(unix)]
            if let Some(mode) = entry.unix_mode()
                && let Err(e) = runtime.set_permissions(&full_path, mode)
            {
                debug!("Failed to set permissions on {:?}: {}", full_path, e);
            }
        }

        if written == 0 {
            bail!("Archive appears to be empty.");
        }

        info!("Extracted {} file(s).", written);
        Ok(written)
    }
}
