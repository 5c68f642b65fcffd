//! Vector cache file format: a memory-mappable on-disk blob
//! of `{hash, vector}` pairs for one document, named `<file-hash>.vecdump`
//! under the corpus's `_vecdumps/` directory.

use crate::error::RagError;
use anyhow::{Context, Result};
use memmap2::Mmap;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

const MAGIC: &[u8; 8] = b"RAGCVEC1";
const VERSION: u32 = 1;
const HASH_SIZE_BYTES: u32 = 8;
const HEADER_SIZE: usize = 64;

fn vecdump_path(corpus_dir: &Path, file_hash: &str) -> PathBuf {
    dump_path(corpus_dir, file_hash)
}

/// Path a `.vecdump` file for `file_hash` would live at under `corpus_dir`,
/// whether or not it currently exists.
pub fn dump_path(corpus_dir: &Path, file_hash: &str) -> PathBuf {
    corpus_dir.join(crate::config::VECDUMP_DIR).join(format!("{file_hash}.vecdump"))
}

/// Write `<file-hash>.vecdump` under `corpus_dir/_vecdumps/`. Writes to a
/// temp file, fsyncs, then renames into place, so a reader never observes
/// a partially written cache file.
pub fn write(corpus_dir: &Path, file_hash: &str, hashes: &[u64], vectors: &[Vec<f32>]) -> Result<()> {
    assert_eq!(hashes.len(), vectors.len());
    let dims = vectors.first().map(|v| v.len()).unwrap_or(0);
    for v in vectors {
        assert_eq!(v.len(), dims, "all vectors in a cache file must share one dimensionality");
    }

    let dir = corpus_dir.join(crate::config::VECDUMP_DIR);
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create vecdump dir {}", dir.display()))?;

    let final_path = vecdump_path(corpus_dir, file_hash);
    let tmp_path = dir.join(format!("{file_hash}.vecdump.tmp"));

    {
        let mut file = File::create(&tmp_path)
            .with_context(|| format!("failed to create {}", tmp_path.display()))?;

        let mut header = [0u8; HEADER_SIZE];
        header[0..8].copy_from_slice(MAGIC);
        header[8..12].copy_from_slice(&VERSION.to_le_bytes());
        header[12..20].copy_from_slice(&(hashes.len() as u64).to_le_bytes());
        header[20..24].copy_from_slice(&HASH_SIZE_BYTES.to_le_bytes());
        header[24..28].copy_from_slice(&(dims as u32).to_le_bytes());
        file.write_all(&header).context("failed to write vecdump header")?;

        for h in hashes {
            file.write_all(&h.to_le_bytes())?;
        }
        for v in vectors {
            for f in v {
                file.write_all(&f.to_le_bytes())?;
            }
        }
        file.sync_all().context("failed to fsync vecdump")?;
    }

    std::fs::rename(&tmp_path, &final_path)
        .with_context(|| format!("failed to rename vecdump into place: {}", final_path.display()))?;

    Ok(())
}

/// `true` if a cache file already exists for `file_hash`: the ingest
/// skip-check signal.
pub fn exists(corpus_dir: &Path, file_hash: &str) -> bool {
    vecdump_path(corpus_dir, file_hash).exists()
}

/// A read-only, memory-mapped view of a `.vecdump` file.
pub struct VecDump {
    _mmap: Mmap,
    num_entries: usize,
    dims: usize,
    hashes_offset: usize,
    vectors_offset: usize,
}

impl VecDump {
    /// Memory-map and validate a cache file's header and length.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
        let mmap = unsafe { Mmap::map(&file) }.with_context(|| format!("failed to mmap {}", path.display()))?;

        if mmap.len() < HEADER_SIZE {
            return Err(RagError::CacheFormat("file shorter than header".into()).into());
        }
        if &mmap[0..8] != MAGIC {
            return Err(RagError::CacheFormat("bad magic".into()).into());
        }
        let version = u32::from_le_bytes(mmap[8..12].try_into().unwrap());
        if version != VERSION {
            return Err(RagError::CacheFormat(format!("unsupported version {version}")).into());
        }
        let num_entries = u64::from_le_bytes(mmap[12..20].try_into().unwrap()) as usize;
        let hash_size_bytes = u32::from_le_bytes(mmap[20..24].try_into().unwrap());
        if hash_size_bytes != HASH_SIZE_BYTES {
            return Err(RagError::CacheFormat(format!("unsupported hash size {hash_size_bytes}")).into());
        }
        let dims = u32::from_le_bytes(mmap[24..28].try_into().unwrap()) as usize;

        let expected_len = HEADER_SIZE + num_entries * 8 + num_entries * dims * 4;
        if mmap.len() != expected_len {
            return Err(RagError::CacheFormat(format!(
                "length mismatch: file is {} bytes, header implies {}",
                mmap.len(),
                expected_len
            ))
            .into());
        }

        Ok(Self {
            hashes_offset: HEADER_SIZE,
            vectors_offset: HEADER_SIZE + num_entries * 8,
            num_entries,
            dims,
            _mmap: mmap,
        })
    }

    pub fn open_for(corpus_dir: &Path, file_hash: &str) -> Result<Self> {
        Self::open(&vecdump_path(corpus_dir, file_hash))
    }

    pub fn len(&self) -> usize {
        self.num_entries
    }

    pub fn is_empty(&self) -> bool {
        self.num_entries == 0
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    pub fn hash_at(&self, i: usize) -> u64 {
        let off = self.hashes_offset + i * 8;
        u64::from_le_bytes(self._mmap[off..off + 8].try_into().unwrap())
    }

    pub fn vector_at(&self, i: usize) -> Vec<f32> {
        let off = self.vectors_offset + i * self.dims * 4;
        (0..self.dims)
            .map(|d| {
                let start = off + d * 4;
                f32::from_le_bytes(self._mmap[start..start + 4].try_into().unwrap())
            })
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u64, Vec<f32>)> + '_ {
        (0..self.num_entries).map(move |i| (self.hash_at(i), self.vector_at(i)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A cache file round-trips byte-for-byte through write/read.
    #[test]
    fn round_trip_is_byte_identical() {
        let dir = tempfile::tempdir().unwrap();
        let hashes = vec![1u64, 2, 42];
        let vectors = vec![
            vec![0.1f32, 0.2, 0.3],
            vec![1.0, -1.0, 2.5],
            vec![0.0, 0.0, 0.0],
        ];

        write(dir.path(), "abc123", &hashes, &vectors).unwrap();
        assert!(exists(dir.path(), "abc123"));

        let dump = VecDump::open_for(dir.path(), "abc123").unwrap();
        assert_eq!(dump.len(), 3);
        assert_eq!(dump.dims(), 3);
        for (i, (h, v)) in dump.iter().enumerate() {
            assert_eq!(h, hashes[i]);
            assert_eq!(v, vectors[i]);
        }
    }

    #[test]
    fn empty_cache_file_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "empty", &[], &[]).unwrap();
        let dump = VecDump::open_for(dir.path(), "empty").unwrap();
        assert!(dump.is_empty());
    }

    #[test]
    fn rejects_corrupt_magic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(crate::config::VECDUMP_DIR);
        std::fs::create_dir_all(&path).unwrap();
        std::fs::write(path.join("bad.vecdump"), vec![0u8; 64]).unwrap();
        assert!(VecDump::open_for(dir.path(), "bad").is_err());
    }

    #[test]
    fn rejects_truncated_file() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "abc", &[1, 2], &[vec![0.1, 0.2], vec![0.3, 0.4]]).unwrap();
        let path = vecdump_path(dir.path(), "abc");
        let mut bytes = std::fs::read(&path).unwrap();
        bytes.truncate(bytes.len() - 4);
        std::fs::write(&path, bytes).unwrap();
        assert!(VecDump::open_for(dir.path(), "abc").is_err());
    }
}
