//! File utilities used to load and fingerprint configuration sources
//!
//! These are thin wrappers over `std::fs` that convert failures into
//! liveconf errors carrying the offending file path.

use std::fs;
use std::io::ErrorKind as IoErrorKind;
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

/// Check whether anything exists at `path`
pub fn exists(path: impl AsRef<Path>) -> Result<bool> {
    let path = path.as_ref();
    match fs::metadata(path) {
        Ok(_) => Ok(true),
        Err(e) if e.kind() == IoErrorKind::NotFound => Ok(false),
        Err(e) => Err(Error::io(path, e)),
    }
}

/// Check whether `path` is an existing regular file
pub fn is_file(path: impl AsRef<Path>) -> Result<bool> {
    let path = path.as_ref();
    match fs::metadata(path) {
        Ok(meta) => Ok(meta.is_file()),
        Err(e) if e.kind() == IoErrorKind::NotFound => Ok(false),
        Err(e) => Err(Error::io(path, e)),
    }
}

/// Read the whole file
pub fn read_all(path: impl AsRef<Path>) -> Result<Vec<u8>> {
    let path = path.as_ref();
    fs::read(path).map_err(|e| Error::io(path, e))
}

/// Content fingerprint of a byte buffer (lowercase hex SHA-256)
pub fn digest(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Content fingerprint of a file
pub fn fingerprint(path: impl AsRef<Path>) -> Result<String> {
    read_all(path).map(|bytes| digest(&bytes))
}

/// Copy `src` to `dst`
///
/// Fails if `dst` already exists and `overwrite` is false.
pub fn copy(src: impl AsRef<Path>, dst: impl AsRef<Path>, overwrite: bool) -> Result<()> {
    let (src, dst) = (src.as_ref(), dst.as_ref());
    if !overwrite && exists(dst)? {
        return Err(Error::io(dst, "destination already exists")
            .with_help("Pass overwrite=true to replace the destination"));
    }
    fs::copy(src, dst).map_err(|e| Error::io(src, e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_exists_and_is_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("app.json");
        std::fs::write(&file, "{}").unwrap();

        assert!(exists(&file).unwrap());
        assert!(is_file(&file).unwrap());
        assert!(exists(dir.path()).unwrap());
        assert!(!is_file(dir.path()).unwrap());
        assert!(!exists(dir.path().join("missing.json")).unwrap());
        assert!(!is_file(dir.path().join("missing.json")).unwrap());
    }

    #[test]
    fn test_fingerprint_tracks_content() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("app.json");

        std::fs::write(&file, r#"{"a":1}"#).unwrap();
        let first = fingerprint(&file).unwrap();
        assert_eq!(first, digest(br#"{"a":1}"#));
        assert_eq!(first.len(), 64);

        std::fs::write(&file, r#"{"a":2}"#).unwrap();
        assert_ne!(fingerprint(&file).unwrap(), first);
    }

    #[test]
    fn test_read_missing_file_is_io_error() {
        let err = read_all("/definitely/not/here.json").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Io);
        assert_eq!(err.path.as_deref(), Some("/definitely/not/here.json"));
    }

    #[test]
    fn test_copy_respects_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src.json");
        let dst = dir.path().join("dst.json");
        std::fs::write(&src, "new").unwrap();
        std::fs::write(&dst, "old").unwrap();

        let err = copy(&src, &dst, false).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Io);
        assert_eq!(std::fs::read_to_string(&dst).unwrap(), "old");

        copy(&src, &dst, true).unwrap();
        assert_eq!(std::fs::read_to_string(&dst).unwrap(), "new");
    }
}
