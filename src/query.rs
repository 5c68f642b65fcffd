//! Query retriever: embed the query, consult the
//! accelerated engine, fall back to the DB, hydrate hashes into chunks,
//! assemble a prompt context, and call the chat model.

use crate::chat::{ChatBackend, ChatContext};
use crate::config::Config;
use crate::db::VectorStore;
use crate::embedding::{EmbeddingBackend, EmbeddingContext};
use crate::error::RagError;
use crate::pool::{Lease, Pool};
use crate::similarity_engine::SimilarityEngine;
use crate::types::{ContextChunk, RagResult};
use anyhow::Result;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

/// `queryRag(user_query, corpus_dir, model_path)`.
#[allow(clippy::too_many_arguments)]
pub fn query_rag(
    user_query: &str,
    corpus_dir: &Path,
    model_path: &str,
    config: &Config,
    db: &VectorStore,
    embedding_backend: &dyn EmbeddingBackend,
    embedding_pool: &Arc<Pool<EmbeddingContext>>,
    chat_backend: &dyn ChatBackend,
    chat_pool: &Arc<Pool<ChatContext>>,
    engine: &dyn SimilarityEngine,
) -> RagResult {
    match query_rag_inner(
        user_query,
        corpus_dir,
        model_path,
        config,
        db,
        embedding_backend,
        embedding_pool,
        chat_backend,
        chat_pool,
        engine,
    ) {
        Ok(result) => result,
        Err(e) => RagResult {
            response: format!("query failed: {e}"),
            context_chunks: Vec::new(),
            referenced_document_count: 0,
        },
    }
}

#[allow(clippy::too_many_arguments)]
fn query_rag_inner(
    user_query: &str,
    corpus_dir: &Path,
    model_path: &str,
    config: &Config,
    db: &VectorStore,
    embedding_backend: &dyn EmbeddingBackend,
    embedding_pool: &Arc<Pool<EmbeddingContext>>,
    chat_backend: &dyn ChatBackend,
    chat_pool: &Arc<Pool<ChatContext>>,
    engine: &dyn SimilarityEngine,
) -> Result<RagResult> {
    let k = config.k_similar_chunks;

    // 1. Embed the query.
    let embed_lease = Lease::acquire(embedding_pool.clone())?;
    let vectors = embedding_backend.embed_batch(embed_lease.get(), std::slice::from_ref(&user_query.to_string()))?;
    drop(embed_lease);
    let query_vector = vectors
        .into_iter()
        .next()
        .ok_or_else(|| RagError::QueryDimensionMismatch { expected: config.embedding_dim, actual: 0 })?;
    if query_vector.len() != config.embedding_dim {
        return Err(RagError::QueryDimensionMismatch {
            expected: config.embedding_dim,
            actual: query_vector.len(),
        }
        .into());
    }

    // 2. Accelerated engine over the cache directory.
    let engine_scores = engine.retrieve(model_path, corpus_dir, &query_vector, k)?;

    let mut chunks: Vec<ContextChunk> = if engine_scores.is_empty() {
        // 3. Fall back to the DB.
        db.search_similar_vectors(&query_vector, k)?
    } else {
        // 4. Hydrate hashes into chunks, then overwrite similarity with
        // the engine's score.
        let hashes: Vec<u64> = engine_scores.keys().copied().collect();
        let hydrated = db.get_chunks_by_hashes(&hashes)?;

        let mut chunks: Vec<ContextChunk> = Vec::new();
        for (hash, score) in &engine_scores {
            if let Some(chunk) = hydrated.get(hash) {
                let mut chunk = chunk.clone();
                chunk.score = *score;
                chunks.push(chunk);
            } else {
                eprintln!("query: warning: engine returned hash {hash} with no matching DB row, skipping");
            }
        }
        // Tie-breaking: keep the top-k by score, ascending hash as tiebreak.
        chunks.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.vector_hash.cmp(&b.vector_hash))
        });
        chunks.truncate(k);
        chunks
    };
    chunks.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.vector_hash.cmp(&b.vector_hash))
    });

    // 5. Assemble the prompt context.
    let context = build_context(&chunks);

    // 6. Call the chat model.
    let chat_lease = Lease::acquire(chat_pool.clone())?;
    let response = chat_backend.chat(chat_lease.get(), &context, user_query)?;
    drop(chat_lease);

    let mut seen = HashSet::new();
    for chunk in &chunks {
        seen.insert((chunk.file_path.clone(), chunk.file_name.clone()));
    }

    Ok(RagResult {
        response,
        context_chunks: chunks,
        referenced_document_count: seen.len(),
    })
}

/// Build the prompt context: for each chunk, a short attribution header
/// followed by the chunk text, separated by blank lines.
fn build_context(chunks: &[ContextChunk]) -> String {
    chunks
        .iter()
        .map(|c| {
            let mut header = format!("{} | {}", c.title, c.file_name);
            if !c.author.is_empty() {
                header.push_str(&format!(" | {}", c.author));
            }
            header.push_str(&format!(" | page {} of {}", c.page_num, c.page_count));
            format!("{header}\n{}", c.text)
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}
