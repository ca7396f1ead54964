//! Exact (name, version) resolution against fetched indexes.
//!
//! There are no version ranges and no "latest" fallback: a request resolves
//! to the entry stored under exactly that name and version string, or to
//! nothing.

use crate::error::PackageError;
use crate::registry::{PackageEntry, PackageIndex};

/// Looks up `index[name][version]`.
pub fn resolve<'a>(index: &'a PackageIndex, name: &str, version: &str) -> Option<&'a PackageEntry> {
    index.get(name, version)
}

/// Picks the first search match, or fails with `PackageNotFound`.
pub fn first_match(
    matches: Vec<PackageEntry>,
    name: &str,
    version: &str,
) -> Result<PackageEntry, PackageError> {
    matches
        .into_iter()
        .next()
        .ok_or_else(|| PackageError::PackageNotFound {
            name: name.to_string(),
            version: version.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(name: &str, version: &str, target_dir: &str) -> PackageEntry {
        serde_json::from_value(json!({
            "name": name,
            "version": version,
            "target-dir": target_dir
        }))
        .unwrap()
    }

    fn index(entries: &[(&str, &str, &str)]) -> PackageIndex {
        let mut index = PackageIndex::new();
        for (name, version, target_dir) in entries {
            index.insert(name, version, entry(name, version, target_dir));
        }
        index
    }

    #[test]
    fn test_resolve_exact_match() {
        let idx = index(&[("acme/widget", "1.0.0", "w1"), ("acme/widget", "1.1.0", "w2")]);
        let found = resolve(&idx, "acme/widget", "1.1.0").unwrap();
        assert_eq!(found.target_dir.as_deref(), Some("w2"));
    }

    #[test]
    fn test_resolve_absent_name_or_version() {
        let idx = index(&[("acme/widget", "1.0.0", "w1")]);

        assert!(resolve(&idx, "acme/other", "1.0.0").is_none());
        assert!(resolve(&idx, "acme/widget", "2.0.0").is_none());
        assert!(resolve(&PackageIndex::new(), "acme/widget", "1.0.0").is_none());
    }

    #[test]
    fn test_resolve_has_no_prefix_or_range_matching() {
        let idx = index(&[("acme/widget", "v1.0.0", "w1")]);

        assert!(resolve(&idx, "acme/widget", "1.0.0").is_none());
        assert!(resolve(&idx, "acme/widget", "^1.0").is_none());
        assert!(resolve(&idx, "acme/widget", "latest").is_none());
        assert!(resolve(&idx, "ACME/widget", "v1.0.0").is_none());
    }

    #[test]
    fn test_first_match_not_found() {
        let err = first_match(vec![], "acme/widget", "1.0.0").unwrap_err();
        assert_eq!(
            err,
            PackageError::PackageNotFound {
                name: "acme/widget".into(),
                version: "1.0.0".into()
            }
        );

        let found = first_match(
            vec![entry("acme/widget", "1.0.0", "a"), entry("acme/widget", "1.0.0", "b")],
            "acme/widget",
            "1.0.0",
        )
        .unwrap();
        assert_eq!(found.target_dir.as_deref(), Some("a"));
    }
}
