mod tar_gz;
mod zip;

use crate::runtime::Runtime;
use anyhow::{Context, Result, anyhow};
use std::io::Read;
use std::path::{Component, Path, PathBuf};

pub use tar_gz::TarGzExtractor;
pub use zip::ZipExtractor;

/// Archive container formats, told apart by their leading magic bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Zip,
    TarGz,
}

impl ArchiveFormat {
    pub fn from_magic(header: &[u8]) -> Option<Self> {
        if header.starts_with(b"PK\x03\x04") || header.starts_with(b"PK\x05\x06") {
            Some(ArchiveFormat::Zip)
        } else if header.starts_with(&[0x1f, 0x8b]) {
            Some(ArchiveFormat::TarGz)
        } else {
            None
        }
    }
}

/// Reads the first bytes of `archive_path` and identifies its format.
pub fn detect_format<R: Runtime>(runtime: &R, archive_path: &Path) -> Result<Option<ArchiveFormat>> {
    let mut reader = runtime
        .open(archive_path)
        .with_context(|| format!("Failed to open archive at {:?}", archive_path))?;

    let mut header = [0u8; 4];
    let mut filled = 0;
    while filled < header.len() {
        let n = reader
            .read(&mut header[filled..])
            .with_context(|| format!("Failed to read archive {:?}", archive_path))?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(ArchiveFormat::from_magic(&header[..filled]))
}

/// Joins an archive member path onto `root`, refusing absolute paths and `..`.
pub(crate) fn enclosed_path(root: &Path, member: &Path) -> Option<PathBuf> {
    let mut out = root.to_path_buf();
    let mut depth = 0usize;
    for component in member.components() {
        match component {
            Component::Normal(part) => {
                out.push(part);
                depth += 1;
            }
            Component::CurDir => {}
            _ => return None,
        }
    }
    (depth > 0).then_some(out)
}

/// Trait for format-specific archive extractors.
///
/// Extraction happens in place: members are written under `extract_to`,
/// overwriting files that already exist there.
pub trait ArchiveExtractor: Send + Sync {
    /// Extract the archive into the specified directory.
    /// Returns the number of regular files written.
    fn extract<R: Runtime>(&self, runtime: &R, archive_path: &Path, extract_to: &Path)
    -> Result<usize>;
}

/// Dispatcher that selects the extractor matching the archive's magic bytes.
pub struct ArchiveExtractorImpl {
    tar_gz: TarGzExtractor,
    zip: ZipExtractor,
}

impl Default for ArchiveExtractorImpl {
    fn default() -> Self {
        Self::new()
    }
}

impl ArchiveExtractorImpl {
    pub fn new() -> Self {
        Self {
            tar_gz: TarGzExtractor,
            zip: ZipExtractor,
        }
    }
}

impl ArchiveExtractor for ArchiveExtractorImpl {
    #[tracing::instrument(skip(self, runtime))]
    fn extract<R: Runtime>(
        &self,
        runtime: &R,
        archive_path: &Path,
        extract_to: &Path,
    ) -> Result<usize> {
        match detect_format(runtime, archive_path)? {
            Some(ArchiveFormat::Zip) => self.zip.extract(runtime, archive_path, extract_to),
            Some(ArchiveFormat::TarGz) => self.tar_gz.extract(runtime, archive_path, extract_to),
            None => Err(anyhow!(
                "Unsupported archive format: {}",
                archive_path.display()
            )),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::test_archives::{tar_gz_bytes, zip_bytes};
    use super::*;
    use crate::runtime::RealRuntime;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_from_magic() {
        assert_eq!(ArchiveFormat::from_magic(b"PK\x03\x04rest"), Some(ArchiveFormat::Zip));
        assert_eq!(ArchiveFormat::from_magic(&[0x1f, 0x8b, 8, 0]), Some(ArchiveFormat::TarGz));
        assert_eq!(ArchiveFormat::from_magic(b"<htm"), None);
        assert_eq!(ArchiveFormat::from_magic(b""), None);
    }

    #[test]
    fn test_enclosed_path() {
        let root = Path::new("/stage");
        assert_eq!(
            enclosed_path(root, Path::new("a/b.txt")),
            Some(PathBuf::from("/stage/a/b.txt"))
        );
        assert_eq!(
            enclosed_path(root, Path::new("./a.txt")),
            Some(PathBuf::from("/stage/a.txt"))
        );
        assert_eq!(enclosed_path(root, Path::new("../evil")), None);
        assert_eq!(enclosed_path(root, Path::new("a/../../evil")), None);
        assert_eq!(enclosed_path(root, Path::new("/etc/passwd")), None);
        assert_eq!(enclosed_path(root, Path::new(".")), None);
    }

    #[test]
    fn test_detect_format_by_content() -> Result<()> {
        let dir = tempdir()?;
        let zip_path = dir.path().join("last-package.zip");
        let tgz_path = dir.path().join("other.zip");
        let junk_path = dir.path().join("junk.zip");
        fs::write(&zip_path, zip_bytes(&[("a.txt", "a")]))?;
        fs::write(&tgz_path, tar_gz_bytes(&[("a.txt", "a")]))?;
        fs::write(&junk_path, "<html>not found</html>")?;

        assert_eq!(detect_format(&RealRuntime, &zip_path)?, Some(ArchiveFormat::Zip));
        assert_eq!(detect_format(&RealRuntime, &tgz_path)?, Some(ArchiveFormat::TarGz));
        assert_eq!(detect_format(&RealRuntime, &junk_path)?, None);
        assert!(detect_format(&RealRuntime, &dir.path().join("missing.zip")).is_err());
        Ok(())
    }

    #[test]
    fn test_extractor_impl_dispatches_to_tar_gz() -> Result<()> {
        let dir = tempdir()?;
        let archive_path = dir.path().join("last-package.zip");
        let extract_path = dir.path().join("extracted");
        fs::create_dir(&extract_path)?;
        fs::write(&archive_path, tar_gz_bytes(&[("src/file1.txt", "tar content")]))?;

        let count = ArchiveExtractorImpl::new().extract(&RealRuntime, &archive_path, &extract_path)?;

        assert_eq!(count, 1);
        assert_eq!(
            fs::read_to_string(extract_path.join("src/file1.txt"))?,
            "tar content"
        );
        Ok(())
    }

    #[test]
    fn test_extractor_impl_dispatches_to_zip() -> Result<()> {
        let dir = tempdir()?;
        let archive_path = dir.path().join("last-package.zip");
        let extract_path = dir.path().join("extracted");
        fs::create_dir(&extract_path)?;
        fs::write(&archive_path, zip_bytes(&[("src/file1.txt", "zip content")]))?;

        let count = ArchiveExtractorImpl::new().extract(&RealRuntime, &archive_path, &extract_path)?;

        assert_eq!(count, 1);
        assert_eq!(
            fs::read_to_string(extract_path.join("src/file1.txt"))?,
            "zip content"
        );
        Ok(())
    }

    #[test]
    fn test_extractor_impl_unsupported_format() -> Result<()> {
        let dir = tempdir()?;
        let archive_path = dir.path().join("last-package.zip");
        fs::write(&archive_path, "plain text")?;

        let result = ArchiveExtractorImpl::new().extract(&RealRuntime, &archive_path, dir.path());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("Unsupported archive format")
        );
        Ok(())
    }
}
