//! BLAKE3 content fingerprints.
//!
//! # Overview
//!
//! [`Hasher`] streams a file once and returns its size and 256-bit BLAKE3
//! digest. Files at or above the mmap threshold are hashed through a memory
//! map instead of the read loop.
//!
//! Unlike metadata extraction there is no silent fallback here: a file that
//! cannot be read is reported as a [`HashError`] naming the path.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::HashError;

/// A BLAKE3 digest.
pub type Hash = [u8; 32];

/// Read buffer for the streaming path.
const BUFFER_SIZE: usize = 64 * 1024;

/// Default size at which hashing switches to a memory map.
pub const DEFAULT_MMAP_THRESHOLD: u64 = 64 * 1024 * 1024;

/// Streaming BLAKE3 file hasher.
#[derive(Debug, Clone)]
pub struct Hasher {
    use_mmap: bool,
    mmap_threshold: u64,
    shutdown_flag: Option<Arc<AtomicBool>>,
}

impl Default for Hasher {
    fn default() -> Self {
        Self::new()
    }
}

impl Hasher {
    #[must_use]
    pub fn new() -> Self {
        Self {
            use_mmap: true,
            mmap_threshold: DEFAULT_MMAP_THRESHOLD,
            shutdown_flag: None,
        }
    }

    /// Enable or disable memory-mapped hashing.
    #[must_use]
    pub fn with_mmap(mut self, enabled: bool) -> Self {
        self.use_mmap = enabled;
        self
    }

    /// Size in bytes at which memory-mapped hashing kicks in.
    #[must_use]
    pub fn with_mmap_threshold(mut self, threshold: u64) -> Self {
        self.mmap_threshold = threshold;
        self
    }

    /// Abort long reads when the flag is raised.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }

    /// Return `(size, hash)` of a file, reading it exactly once.
    ///
    /// The size is the number of bytes hashed, so it always agrees with the
    /// digest even if the file changes between the walk and this call.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] when the file cannot be opened or read, or
    /// [`HashError::Interrupted`] if shutdown was requested mid-file.
    pub fn fingerprint(&self, path: &Path) -> Result<(u64, Hash), HashError> {
        let file = File::open(path).map_err(|e| HashError::from_io(path, e))?;
        let len = file
            .metadata()
            .map_err(|e| HashError::from_io(path, e))?
            .len();

        let mut hasher = blake3::Hasher::new();
        if self.use_mmap && len > 0 && len >= self.mmap_threshold {
            log::trace!("Hashing {} via mmap ({} bytes)", path.display(), len);
            hasher
                .update_mmap(path)
                .map_err(|e| HashError::from_io(path, e))?;
            return Ok((len, *hasher.finalize().as_bytes()));
        }

        let size = self.stream(file, &mut hasher, path)?;
        Ok((size, *hasher.finalize().as_bytes()))
    }

    fn stream(&self, mut file: File, hasher: &mut blake3::Hasher, path: &Path) -> Result<u64, HashError> {
        let mut buffer = vec![0u8; BUFFER_SIZE];
        let mut total = 0u64;
        loop {
            if self.is_shutdown_requested() {
                return Err(HashError::Interrupted(path.to_path_buf()));
            }
            let n = match file.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(HashError::from_io(path, e)),
            };
            hasher.update(&buffer[..n]);
            total += n as u64;
        }
        Ok(total)
    }
}

/// Format a digest as lowercase hex.
#[must_use]
pub fn hash_to_hex(hash: &Hash) -> String {
    blake3::Hash::from_bytes(*hash).to_hex().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_fingerprint_small_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.txt");
        fs::write(&path, b"hello").unwrap();

        let (size, hash) = Hasher::new().fingerprint(&path).unwrap();
        assert_eq!(size, 5);
        assert_eq!(hash, *blake3::hash(b"hello").as_bytes());
    }

    #[test]
    fn test_empty_file_is_hashed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty");
        fs::write(&path, b"").unwrap();

        let (size, hash) = Hasher::new().with_mmap_threshold(0).fingerprint(&path).unwrap();
        assert_eq!(size, 0);
        assert_eq!(hash, *blake3::hash(b"").as_bytes());
    }

    #[test]
    fn test_mmap_and_stream_agree() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("big.bin");
        let content: Vec<u8> = (0..300_000u32).map(|i| (i % 251) as u8).collect();
        fs::write(&path, &content).unwrap();

        let streamed = Hasher::new().with_mmap(false).fingerprint(&path).unwrap();
        let mapped = Hasher::new().with_mmap_threshold(1024).fingerprint(&path).unwrap();
        assert_eq!(streamed, mapped);
        assert_eq!(streamed.0, content.len() as u64);
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing.dll");
        match Hasher::new().fingerprint(&path) {
            Err(HashError::NotFound(p)) => assert_eq!(p, path),
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[test]
    fn test_shutdown_interrupts_streaming() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.bin");
        fs::write(&path, vec![1u8; 1024]).unwrap();

        let flag = Arc::new(AtomicBool::new(true));
        let hasher = Hasher::new().with_mmap(false).with_shutdown_flag(flag);
        assert!(matches!(hasher.fingerprint(&path), Err(HashError::Interrupted(_))));
    }

    #[test]
    fn test_hex_form() {
        let hash = *blake3::hash(b"x").as_bytes();
        let hex = hash_to_hex(&hash);
        assert_eq!(hex.len(), 64);
        assert_eq!(hex, blake3::hash(b"x").to_hex().as_str());
    }
}
