//! End-to-end round trip: seed a document + embeddings + vector cache
//! directly (bypassing the PDF reader and network-backed inference
//! servers), then drive `query_rag` through its public API and check the
//! retrieved context and chat response.

use ragcorpus::chat::{ChatBackend, ChatContext, HttpChatBackend};
use ragcorpus::config::{Config, DbHashPresentAction};
use ragcorpus::db::VectorStore;
use ragcorpus::embedding::{EmbeddingBackend, EmbeddingContext, HttpEmbeddingBackend};
use ragcorpus::similarity_engine::FileScanEngine;
use ragcorpus::types::Document;
use ragcorpus::{query, vector_cache, Pool};
use std::sync::Arc;

/// Deterministic stub embedding backend: the vector is the byte-length of
/// the text repeated across `dim` dimensions, so queries similar in length
/// to a chunk cosine-match that chunk.
struct StubEmbeddingBackend {
    dim: usize,
    inner: HttpEmbeddingBackend,
}

impl EmbeddingBackend for StubEmbeddingBackend {
    fn create_context(&self) -> anyhow::Result<EmbeddingContext> {
        self.inner.create_context()
    }

    fn embed_batch(&self, _ctx: &EmbeddingContext, batch: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        Ok(batch
            .iter()
            .map(|text| {
                let mut v = vec![0.0f32; self.dim];
                v[0] = text.len() as f32;
                v[1] = 1.0;
                v
            })
            .collect())
    }
}

struct StubChatBackend {
    inner: HttpChatBackend,
}

impl ChatBackend for StubChatBackend {
    fn create_context(&self) -> anyhow::Result<ChatContext> {
        self.inner.create_context()
    }

    fn chat(&self, _ctx: &ChatContext, system_context: &str, user_query: &str) -> anyhow::Result<String> {
        Ok(format!("answering '{user_query}' using context of {} bytes", system_context.len()))
    }
}

#[test]
fn ingest_then_query_round_trip() {
    let db_dir = tempfile::tempdir().unwrap();
    let corpus_dir = tempfile::tempdir().unwrap();
    let config = Config {
        embedding_dim: 4,
        k_similar_chunks: 2,
        ..Config::default()
    };

    let db = VectorStore::open(&db_dir.path().join("db.sqlite"), 2, DbHashPresentAction::Upsert).unwrap();

    db.save_document_metadata(&Document {
        file_hash: "docA".into(),
        path: "/corpus/docA.pdf".into(),
        filename: "docA.pdf".into(),
        title: "On Overlapping Windows".into(),
        author: "A. Author".into(),
        page_count: 2,
        ..Default::default()
    })
    .unwrap();

    let chunk_texts = vec!["first chunk body".to_string(), "second chunk body here".to_string()];
    let vectors: Vec<Vec<f32>> = chunk_texts
        .iter()
        .map(|t| {
            let mut v = vec![0.0f32; 4];
            v[0] = t.len() as f32;
            v[1] = 1.0;
            v
        })
        .collect();
    let hashes: Vec<u64> = vectors.iter().map(|v| ragcorpus::hash::vector_hash(v)).collect();
    let pages: Vec<u32> = vec![1, 2];

    db.save_embeddings(&chunk_texts, &vectors, &hashes, &pages, "docA").unwrap();
    vector_cache::write(corpus_dir.path(), "docA", &hashes, &vectors).unwrap();

    let embedding_backend = StubEmbeddingBackend {
        dim: 4,
        inner: HttpEmbeddingBackend::from_config(&config),
    };
    let embedding_backend2 = StubEmbeddingBackend {
        dim: 4,
        inner: HttpEmbeddingBackend::from_config(&config),
    };
    let embedding_pool = Pool::new("embedding", 1, 1, move || embedding_backend.create_context()).unwrap();

    let chat_backend = StubChatBackend {
        inner: HttpChatBackend::from_config(&config),
    };
    let chat_backend2 = StubChatBackend {
        inner: HttpChatBackend::from_config(&config),
    };
    let chat_pool = Pool::new("chat", 1, 1, move || chat_backend.create_context()).unwrap();

    let engine = FileScanEngine;

    let result = query::query_rag(
        "second chunk query!!",
        corpus_dir.path(),
        &config.embeddings_model_path,
        &config,
        &db,
        &embedding_backend2,
        &embedding_pool,
        &chat_backend2,
        &chat_pool,
        &engine,
    );

    assert!(!result.context_chunks.is_empty());
    assert_eq!(result.referenced_document_count, 1);
    assert!(result.response.contains("second chunk query"));
    assert!(result.context_chunks.iter().any(|c| c.title == "On Overlapping Windows"));
}

#[test]
fn query_with_no_corpus_falls_back_to_db_and_reports_empty() {
    let db_dir = tempfile::tempdir().unwrap();
    let corpus_dir = tempfile::tempdir().unwrap();
    let config = Config::default();

    let db = VectorStore::open(&db_dir.path().join("db.sqlite"), 1, DbHashPresentAction::DoNothing).unwrap();

    let embedding_backend = StubEmbeddingBackend {
        dim: config.embedding_dim,
        inner: HttpEmbeddingBackend::from_config(&config),
    };
    let embedding_backend2 = StubEmbeddingBackend {
        dim: config.embedding_dim,
        inner: HttpEmbeddingBackend::from_config(&config),
    };
    let embedding_pool = Pool::new("embedding", 1, 1, move || embedding_backend.create_context()).unwrap();

    let chat_backend = StubChatBackend {
        inner: HttpChatBackend::from_config(&config),
    };
    let chat_backend2 = StubChatBackend {
        inner: HttpChatBackend::from_config(&config),
    };
    let chat_pool = Pool::new("chat", 1, 1, move || chat_backend.create_context()).unwrap();

    let engine = FileScanEngine;

    let result = query::query_rag(
        "anything",
        corpus_dir.path(),
        &config.embeddings_model_path,
        &config,
        &db,
        &embedding_backend2,
        &embedding_pool,
        &chat_backend2,
        &chat_pool,
        &engine,
    );

    assert!(result.context_chunks.is_empty());
    assert_eq!(result.referenced_document_count, 0);
}
