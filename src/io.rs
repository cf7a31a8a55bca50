//! Container file I/O
//!
//! Containers are single-digit megabytes at most, so both directions are
//! whole-buffer, non-streaming operations.

use crate::error::Result;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Read a container file into memory
pub fn read_container<P: AsRef<Path>>(path: P) -> Result<Vec<u8>> {
    let bytes = fs::read(&path)?;
    debug!(path = %path.as_ref().display(), len = bytes.len(), "read container");
    Ok(bytes)
}

/// Write an assembled container verbatim
pub fn write_container<P: AsRef<Path>>(path: P, bytes: &[u8]) -> Result<()> {
    fs::write(&path, bytes)?;
    debug!(path = %path.as_ref().display(), len = bytes.len(), "wrote container");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EquipakError;
    use tempfile::NamedTempFile;

    #[test]
    fn test_write_then_read_round_trip() {
        let temp = NamedTempFile::new().unwrap();
        let bytes: Vec<u8> = (0u8..=0xFF).collect();

        write_container(temp.path(), &bytes).unwrap();
        let back = read_container(temp.path()).unwrap();
        assert_eq!(back, bytes);
    }

    #[test]
    fn test_read_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_container(dir.path().join("missing.zobj")).unwrap_err();
        assert!(matches!(err, EquipakError::Io(_)));
    }
}
