//! Identifier-to-path derivation with traversal defenses. Runs before any
//! filesystem access that uses a caller-supplied identifier.

use std::path::{Path, PathBuf};

use keyhold_core::error::StoreError;

/// Extension for credential record files under the storage root.
pub const RECORD_EXT: &str = "cred";

/// Derive the record path for an identifier, or fail with
/// `InvalidIdentifier` before any I/O happens. The allowed character set
/// excludes path separators and anything that could form an absolute path;
/// the direct-child check is kept as a final guard.
pub fn resolve(root: &Path, identifier: &str) -> Result<PathBuf, StoreError> {
    if identifier.is_empty() {
        return Err(StoreError::invalid_identifier("empty identifier"));
    }
    if identifier.contains("..") {
        return Err(StoreError::invalid_identifier(
            "identifier must not contain '..'",
        ));
    }
    if !identifier.bytes().all(allowed_byte) {
        return Err(StoreError::invalid_identifier(
            "identifier must match [A-Za-z0-9._-]",
        ));
    }

    let path = root.join(format!("{identifier}.{RECORD_EXT}"));
    if path.parent() != Some(root) {
        return Err(StoreError::invalid_identifier(
            "identifier escapes the storage root",
        ));
    }
    Ok(path)
}

/// Inverse used by the startup scan: the identifier a record file belongs
/// to, or `None` for files that are not well-formed records.
pub fn identifier_for(path: &Path) -> Option<String> {
    if path.extension()? != RECORD_EXT {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    if stem.is_empty() || stem.contains("..") || !stem.bytes().all(allowed_byte) {
        return None;
    }
    Some(stem.to_string())
}

fn allowed_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b'-')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn root() -> PathBuf {
        PathBuf::from("/srv/keyhold")
    }

    #[test]
    fn resolves_simple_identifier_to_direct_child() {
        let path = resolve(&root(), "anthropic").expect("resolve");
        assert_eq!(path, root().join("anthropic.cred"));
    }

    #[test]
    fn rejects_traversal_attempts() {
        for bad in ["..", "../etc", "a/../b", "..hidden"] {
            let err = resolve(&root(), bad).expect_err(bad);
            assert!(matches!(err, StoreError::InvalidIdentifier { .. }));
        }
    }

    #[test]
    fn rejects_separators_and_absolute_paths() {
        for bad in ["a/b", "a\\b", "/etc/passwd", "C:\\keys"] {
            let err = resolve(&root(), bad).expect_err(bad);
            assert!(matches!(err, StoreError::InvalidIdentifier { .. }));
        }
    }

    #[test]
    fn rejects_empty_and_foreign_characters() {
        for bad in ["", "sp ace", "emoji🔑", "null\0byte", "semi;colon"] {
            let err = resolve(&root(), bad).expect_err("should reject");
            assert!(matches!(err, StoreError::InvalidIdentifier { .. }));
        }
    }

    #[test]
    fn identifier_round_trips_through_path() {
        let path = resolve(&root(), "open-router_v1").expect("resolve");
        assert_eq!(identifier_for(&path).as_deref(), Some("open-router_v1"));
    }

    #[test]
    fn scan_ignores_foreign_files() {
        assert_eq!(identifier_for(Path::new("/srv/keyhold/notes.txt")), None);
        assert_eq!(identifier_for(Path::new("/srv/keyhold/.cred")), None);
        assert_eq!(identifier_for(Path::new("/srv/keyhold/no-extension")), None);
    }
}
