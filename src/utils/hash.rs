//! Content hashing.
//!
//! - [`ContentHash`] (blake3) fingerprints artifacts in run reports.
//! - [`md5_hex`] matches the ETag an object store reports for single-part
//!   uploads, so sync can compare content without downloading.

use md5::{Digest, Md5};
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

/// A 256-bit content hash (blake3 output).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    /// Hash an in-memory buffer.
    pub fn of_bytes(data: &[u8]) -> Self {
        Self(*blake3::hash(data).as_bytes())
    }

    /// Hash a file's contents (streaming).
    pub fn of_file(path: &Path) -> io::Result<Self> {
        let mut hasher = blake3::Hasher::new();
        stream(path, |chunk| {
            hasher.update(chunk);
        })?;
        Ok(Self(*hasher.finalize().as_bytes()))
    }

    /// Convert to hex string.
    pub fn to_hex(self) -> String {
        hex::encode(self.0)
    }
}

impl std::fmt::Display for ContentHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // first 16 hex chars
        write!(f, "{}", &self.to_hex()[..16])
    }
}

/// Lowercase hex MD5 of a buffer.
pub fn md5_hex(data: &[u8]) -> String {
    hex::encode(Md5::digest(data))
}

/// Lowercase hex MD5 of a file's contents (streaming).
pub fn md5_file(path: &Path) -> io::Result<String> {
    let mut hasher = Md5::new();
    stream(path, |chunk| hasher.update(chunk))?;
    Ok(hex::encode(hasher.finalize()))
}

fn stream(path: &Path, mut sink: impl FnMut(&[u8])) -> io::Result<()> {
    let mut reader = BufReader::with_capacity(64 * 1024, File::open(path)?);
    let mut buffer = [0u8; 64 * 1024];
    loop {
        match reader.read(&mut buffer) {
            Ok(0) => return Ok(()),
            Ok(n) => sink(&buffer[..n]),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_md5_known_value() {
        assert_eq!(md5_hex(b""), "d41d8cd98f00b204e9800998ecf8427e");
        assert_eq!(md5_hex(b"hello"), "5d41402abc4b2a76b9719d911017c592");
    }

    #[test]
    fn test_file_hashes_match_buffer_hashes() {
        let file = NamedTempFile::new().unwrap();
        std::fs::write(file.path(), b"body { color: red }").unwrap();

        assert_eq!(md5_file(file.path()).unwrap(), md5_hex(b"body { color: red }"));
        assert_eq!(
            ContentHash::of_file(file.path()).unwrap(),
            ContentHash::of_bytes(b"body { color: red }")
        );
    }

    #[test]
    fn test_missing_file_is_error() {
        assert!(md5_file(Path::new("/nonexistent/sitepipe/file")).is_err());
    }

    #[test]
    fn test_display_is_short_hex() {
        let hash = ContentHash::of_bytes(b"x");
        assert_eq!(hash.to_string().len(), 16);
        assert!(hash.to_hex().starts_with(&hash.to_string()));
    }
}
