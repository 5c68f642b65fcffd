//! Content hashing: file hash for dedup identity, vector hash
//! as the cross-store key for an embedding.

use anyhow::{Context, Result};
use std::path::Path;

/// MD5 of a file's bytes, lowercase hex. Document identity.
pub fn file_hash(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("failed to read file for hashing: {}", path.display()))?;
    Ok(format!("{:x}", md5::compute(&bytes)))
}

/// MD5 over the little-endian IEEE-754 bytes of a vector, folded to the
/// first 8 bytes of the digest as a little-endian u64. Deterministic: the
/// same `f32` slice always yields the same hash.
pub fn vector_hash(vector: &[f32]) -> u64 {
    let mut bytes = Vec::with_capacity(vector.len() * 4);
    for v in vector {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    let digest = md5::compute(&bytes);
    u64::from_le_bytes(digest.0[0..8].try_into().unwrap())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vector_hash_is_deterministic() {
        let v = vec![0.1_f32, -2.5, 3.75, 0.0];
        assert_eq!(vector_hash(&v), vector_hash(&v));
    }

    #[test]
    fn vector_hash_differs_for_different_vectors() {
        let a = vec![0.1_f32, 0.2, 0.3];
        let b = vec![0.1_f32, 0.2, 0.31];
        assert_ne!(vector_hash(&a), vector_hash(&b));
    }

    #[test]
    fn file_hash_matches_known_md5() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.txt");
        std::fs::write(&path, b"hello world").unwrap();
        // md5("hello world") = 5eb63bbbe01eeed093cb22bb8f5acdc3
        assert_eq!(file_hash(&path).unwrap(), "5eb63bbbe01eeed093cb22bb8f5acdc3");
    }

    #[test]
    fn file_hash_errors_on_missing_file() {
        let path = Path::new("/nonexistent/does/not/exist.pdf");
        assert!(file_hash(path).is_err());
    }
}
