//! Accelerated vector engine (consumed, not built here): `retrieve(model_path,
//! corpus_dir, query, D, K) -> {(u64 hash, f32 score)}[]`, scanning
//! `*.vecdump` files under `corpus_dir`. Only the interface is specified;
//! this repo provides one conforming implementation (a brute-force scan
//! over the memory-mapped cache files) behind a trait, so a faster engine
//! can be swapped in without touching the retriever.

use crate::vector_cache::VecDump;
use anyhow::Result;
use std::collections::HashMap;
use std::path::Path;

pub trait SimilarityEngine: Send + Sync {
    fn retrieve(
        &self,
        model_path: &str,
        corpus_dir: &Path,
        query: &[f32],
        k: usize,
    ) -> Result<HashMap<u64, f32>>;
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

/// Scans every `*.vecdump` file under `corpus_dir`, scoring each entry by
/// cosine similarity and keeping the top-`k` (ascending vector_hash as
/// tiebreaker).
pub struct FileScanEngine;

impl SimilarityEngine for FileScanEngine {
    fn retrieve(
        &self,
        _model_path: &str,
        corpus_dir: &Path,
        query: &[f32],
        k: usize,
    ) -> Result<HashMap<u64, f32>> {
        let vecdumps_dir = corpus_dir.join(crate::config::VECDUMP_DIR);
        if !vecdumps_dir.is_dir() {
            return Ok(HashMap::new());
        }

        let mut scored: Vec<(u64, f32)> = Vec::new();
        for entry in std::fs::read_dir(&vecdumps_dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("vecdump") {
                continue;
            }
            let dump = match VecDump::open(&path) {
                Ok(d) => d,
                Err(e) => {
                    eprintln!("similarity_engine: warning: skipping unreadable cache {}: {e}", path.display());
                    continue;
                }
            };
            for (hash, vector) in dump.iter() {
                scored.push((hash, cosine_similarity(query, &vector)));
            }
        }

        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        scored.truncate(k);

        Ok(scored.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector_cache;

    #[test]
    fn retrieve_ranks_top_k_across_files() {
        let dir = tempfile::tempdir().unwrap();
        vector_cache::write(dir.path(), "doc1", &[1, 2], &[vec![1.0, 0.0], vec![0.0, 1.0]]).unwrap();
        vector_cache::write(dir.path(), "doc2", &[3], &[vec![0.9, 0.1]]).unwrap();

        let engine = FileScanEngine;
        let results = engine.retrieve("model", dir.path(), &[1.0, 0.0], 2).unwrap();

        assert_eq!(results.len(), 2);
        assert!(results.contains_key(&1));
        assert!(results.contains_key(&3));
        assert!(!results.contains_key(&2));
    }

    #[test]
    fn empty_corpus_dir_returns_empty_map() {
        let dir = tempfile::tempdir().unwrap();
        let engine = FileScanEngine;
        let results = engine.retrieve("model", dir.path(), &[1.0, 0.0], 3).unwrap();
        assert!(results.is_empty());
    }
}
