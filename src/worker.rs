//! Embedding worker: batches a chunk stream, obtains
//! vectors via an acquired context, computes per-vector hashes, and hands
//! results to persistence, all from within the worker thread.

use crate::config::BATCH_SIZE;
use crate::db::VectorStore;
use crate::embedding::{EmbeddingBackend, EmbeddingContext};
use crate::hash::vector_hash;
use crate::pool::{Lease, Pool};
use std::sync::{Arc, Mutex};

/// Output of [`embed`]: parallel `vectors`/`vector_hashes` arrays.
/// Note: these are concatenated in **worker-join order, not document
/// order**. Callers needing chunk order must read the DB or the vector
/// cache file, both of which preserve per-batch order.
#[derive(Debug, Default)]
pub struct EmbedOutput {
    pub vectors: Vec<Vec<f32>>,
    pub vector_hashes: Vec<u64>,
}

/// Embed `chunks` (with parallel `page_nums`) under `file_hash`, using up
/// to `num_threads` batch workers drawing contexts from `pool`. Persists
/// each batch to `db` from within the worker thread, in chunk order within
/// the batch. A batch-level failure is logged and that batch is skipped
/// (partial-success mode); the caller must check
/// `output.vectors.len() == chunks.len()` to decide whether the file
/// ingest as a whole succeeded.
pub fn embed(
    backend: &dyn EmbeddingBackend,
    pool: &Arc<Pool<EmbeddingContext>>,
    db: &VectorStore,
    chunks: &[String],
    page_nums: &[u32],
    file_hash: &str,
    num_threads: usize,
) -> EmbedOutput {
    assert_eq!(chunks.len(), page_nums.len());
    if chunks.is_empty() {
        return EmbedOutput::default();
    }

    let total_batches = (chunks.len() + BATCH_SIZE - 1) / BATCH_SIZE;
    let num_threads = num_threads.max(1);
    let batches_per_thread = (total_batches + num_threads - 1) / num_threads;

    let aggregate = Mutex::new(EmbedOutput::default());

    std::thread::scope(|scope| {
        let mut handles = Vec::new();
        for t in 0..num_threads {
            let batch_start = t * batches_per_thread;
            if batch_start >= total_batches {
                continue; // trailing empty partition, skipped
            }
            let batch_end = (batch_start + batches_per_thread).min(total_batches);

            let aggregate = &aggregate;
            let handle = scope.spawn(move || {
                let mut local = EmbedOutput::default();
                for batch_idx in batch_start..batch_end {
                    let chunk_start = batch_idx * BATCH_SIZE;
                    let chunk_end = (chunk_start + BATCH_SIZE).min(chunks.len());
                    let batch_chunks = &chunks[chunk_start..chunk_end];
                    let batch_pages = &page_nums[chunk_start..chunk_end];

                    match process_batch(backend, pool, db, batch_chunks, batch_pages, file_hash) {
                        Ok((vectors, hashes)) => {
                            local.vectors.extend(vectors);
                            local.vector_hashes.extend(hashes);
                        }
                        Err(e) => {
                            eprintln!(
                                "worker: warning: batch {batch_idx} of '{file_hash}' failed, skipping: {e}"
                            );
                        }
                    }
                }
                let mut aggregate = aggregate.lock().unwrap();
                aggregate.vectors.extend(local.vectors);
                aggregate.vector_hashes.extend(local.vector_hashes);
            });
            handles.push(handle);
        }
        for handle in handles {
            let _ = handle.join();
        }
    });

    aggregate.into_inner().unwrap()
}

fn process_batch(
    backend: &dyn EmbeddingBackend,
    pool: &Arc<Pool<EmbeddingContext>>,
    db: &VectorStore,
    batch_chunks: &[String],
    batch_pages: &[u32],
    file_hash: &str,
) -> anyhow::Result<(Vec<Vec<f32>>, Vec<u64>)> {
    let lease = Lease::acquire(pool.clone())?;
    let vectors = backend.embed_batch(lease.get(), batch_chunks)?;
    drop(lease); // release back to the pool before persisting

    let hashes: Vec<u64> = vectors.iter().map(|v| vector_hash(v)).collect();

    db.save_embeddings(batch_chunks, &vectors, &hashes, batch_pages, file_hash)?;

    Ok((vectors, hashes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DbHashPresentAction, EMBEDDING_MAX_CONTEXTS, EMBEDDING_MIN_CONTEXTS};
    use anyhow::Result;

    /// In-process stub backend: deterministic vectors, no network.
    struct StubBackend {
        dim: usize,
    }

    impl EmbeddingBackend for StubBackend {
        fn create_context(&self) -> Result<EmbeddingContext> {
            // Contexts are opaque to the worker; the stub doesn't need a
            // real HTTP client for tests, but EmbeddingContext's fields
            // are private to embedding.rs, so tests go through the real
            // HttpEmbeddingBackend::create_context instead (see
            // embed_produces_one_vector_per_chunk below) rather than
            // constructing one directly here.
            unreachable!("tests build contexts via HttpEmbeddingBackend")
        }

        fn embed_batch(&self, _ctx: &EmbeddingContext, batch: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(batch
                .iter()
                .map(|c| {
                    let seed = c.len() as f32;
                    vec![seed; self.dim]
                })
                .collect())
        }
    }

    fn test_store() -> (tempfile::TempDir, crate::db::VectorStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = crate::db::VectorStore::open(
            &dir.path().join("db.sqlite"),
            2,
            DbHashPresentAction::DoNothing,
        )
        .unwrap();
        (dir, store)
    }

    #[test]
    fn embed_produces_one_vector_per_chunk() {
        let (_dir, store) = test_store();
        store
            .save_document_metadata(&crate::types::Document {
                file_hash: "f1".into(),
                path: "/docs/f1.pdf".into(),
                filename: "f1.pdf".into(),
                ..Default::default()
            })
            .unwrap();

        let backend = StubBackend { dim: 4 };
        let pool = Pool::new_with_health(
            "embedding",
            EMBEDDING_MIN_CONTEXTS.min(1),
            EMBEDDING_MAX_CONTEXTS.min(2),
            || Ok(EmbeddingContextStub::fresh()),
            |_| true,
        )
        .unwrap();

        let chunks: Vec<String> = (0..23).map(|i| format!("chunk-{i}")).collect();
        let pages: Vec<u32> = (0..23).map(|i| (i / 10) + 1).collect();

        let output = embed(&backend, &pool, &store, &chunks, &pages, "f1", 2);

        assert_eq!(output.vectors.len(), chunks.len());
        assert_eq!(output.vector_hashes.len(), chunks.len());
    }

    // A pool of unit-ish contexts for the stub backend, since
    // `EmbeddingContext` itself can only be built by its own module.
    type EmbeddingContextStub = crate::embedding::EmbeddingContext;
    impl EmbeddingContextStub {
        fn fresh() -> Self {
            crate::embedding::HttpEmbeddingBackend::from_config(&crate::config::Config::default())
                .create_context()
                .unwrap()
        }
    }
}
