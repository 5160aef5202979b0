//! Content identity for duplicate-skip decisions.
//!
//! The fingerprint is a cheap (name, size, mtime) proxy rather than a full
//! checksum: a missed dedup only costs a re-import, while the digest keeps
//! the value opaque and fixed-width so it can be swapped for a real content
//! hash without touching the broker or store.

use std::path::Path;
use std::time::UNIX_EPOCH;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use sha2::{Digest, Sha256};

use clipdock_model::ContentHash;

use crate::error::Result;

/// Derives stable identities for files on disk. Blocking; run batch work
/// through `spawn_blocking`.
#[derive(Clone, Copy, Debug, Default)]
pub struct ContentHasher;

impl ContentHasher {
    pub fn fingerprint(path: &Path) -> Result<ContentHash> {
        let metadata = std::fs::metadata(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let mtime_ms = metadata
            .modified()?
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0);

        Ok(encode_hash(&[
            &name,
            &metadata.len().to_string(),
            &mtime_ms.to_string(),
        ]))
    }
}

fn encode_hash(parts: &[&str]) -> ContentHash {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.as_bytes());
        hasher.update(b":");
    }
    let digest = hasher.finalize();
    ContentHash(URL_SAFE_NO_PAD.encode(&digest[..16]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn fingerprint_is_stable_for_unchanged_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("a.wav");
        fs::write(&path, b"pcm data").unwrap();

        let first = ContentHasher::fingerprint(&path).unwrap();
        let second = ContentHasher::fingerprint(&path).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn fingerprint_changes_with_size() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("a.wav");
        fs::write(&path, b"pcm data").unwrap();
        let before = ContentHasher::fingerprint(&path).unwrap();

        fs::write(&path, b"pcm data plus a tail").unwrap();
        let after = ContentHasher::fingerprint(&path).unwrap();
        assert_ne!(before, after);
    }

    #[test]
    fn fingerprint_distinguishes_names() {
        let tmp = tempfile::tempdir().unwrap();
        let a = tmp.path().join("a.wav");
        let b = tmp.path().join("b.wav");
        fs::write(&a, b"same bytes").unwrap();
        fs::write(&b, b"same bytes").unwrap();

        let ha = ContentHasher::fingerprint(&a).unwrap();
        let hb = ContentHasher::fingerprint(&b).unwrap();
        assert_ne!(ha, hb);
    }

    #[test]
    fn missing_file_surfaces_io_error() {
        let tmp = tempfile::tempdir().unwrap();
        let gone = tmp.path().join("never.wav");
        assert!(ContentHasher::fingerprint(&gone).is_err());
    }
}
