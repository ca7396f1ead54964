use crate::runtime::Runtime;
use anyhow::{Context, Result, bail};
use flate2::read::GzDecoder;
use log::{debug, info};
use std::path::Path;
use tar::{Archive, EntryType};

use super::{ArchiveExtractor, enclosed_path};

/// Extractor for gzip-compressed tar archives
pub struct TarGzExtractor;

impl ArchiveExtractor for TarGzExtractor {
    fn extract<R: Runtime>(
        &self,
        runtime: &R,
        archive_path: &Path,
        extract_to: &Path,
    ) -> Result<usize> {
        debug!("Extracting tar.gz archive to {:?}...", extract_to);
        let file = runtime
            .open(archive_path)
            .with_context(|| format!("Failed to open archive at {:?}", archive_path))?;

        let mut archive = Archive::new(GzDecoder::new(file));
        let mut written = 0;

        let entries = archive
            .entries()
            .context("Failed to read tar.gz archive")?;

        for entry in entries {
            let mut entry = entry.context("Failed to read tar entry")?;
            let member = entry.path().context("Invalid tar entry path")?.into_owned();

            let Some(full_path) = enclosed_path(extract_to, &member) else {
                debug!("Skipping entry with invalid path: {:?}", member);
                continue;
            };

            match entry.header().entry_type() {
                EntryType::Directory => {
                    runtime.create_dir_all(&full_path)?;
                }
                EntryType::Regular | EntryType::Continuous => {
                    if let Some(parent) = full_path.parent() {
                        runtime.create_dir_all(parent)?;
                    }
                    let mut dest_file = runtime.create_file(&full_path)?;
                    std::io::copy(&mut entry, &mut dest_file)
                        .with_context(|| format!("Failed to extract file {:?}", full_path))?;
                    written += 1;

                    #[cfg(unix)]
                    if let Ok(mode) = entry.header().mode()
                        && let Err(e) = runtime.set_permissions(&full_path, mode)
                    {
                        debug!("Failed to set permissions on {:?}: {}", full_path, e);
                    }
                }
                other => {
                    debug!("Skipping {:?} entry {:?}", other, member);
                }
            }
        }

        if written == 0 {
            bail!("Archive appears to be empty.");
        }

        info!("Extracted {} file(s).", written);
        Ok(written)
    }
}
