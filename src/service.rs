//! Service container: wires config, DB,
//! backends and pools into one struct passed explicitly to callers,
//! rather than read from hidden globals.

use crate::chat::{ChatBackend, ChatContext, HttpChatBackend};
use crate::config::{Config, CHAT_MAX_CONTEXTS, CHAT_MIN_CONTEXTS, EMBEDDING_MAX_CONTEXTS, EMBEDDING_MIN_CONTEXTS};
use crate::db::VectorStore;
use crate::embedding::{EmbeddingBackend, EmbeddingContext, HttpEmbeddingBackend};
use crate::error::WorkResult;
use crate::pool::Pool;
use crate::similarity_engine::{FileScanEngine, SimilarityEngine};
use crate::types::RagResult;
use crate::{ingest, query};
use anyhow::Result;
use std::path::Path;
use std::sync::Arc;

/// Everything a caller needs to run `addCorpus`/`queryRag`, built once per
/// process via [`initialize_system`] and torn down via [`cleanup_system`].
pub struct ServiceContainer {
    pub config: Config,
    pub db: VectorStore,
    pub embedding_backend: Box<dyn EmbeddingBackend>,
    pub embedding_pool: Arc<Pool<EmbeddingContext>>,
    pub chat_backend: Box<dyn ChatBackend>,
    pub chat_pool: Arc<Pool<ChatContext>>,
    pub engine: Box<dyn SimilarityEngine>,
}

/// `initializeSystem(chat_model_path, embeddings_model_path)`:
/// loads config (or defaults on first run), opens the DB, starts the
/// context pools at their configured minimum sizes, and creates the
/// corpus directory structure if absent.
pub fn initialize_system(chat_model_path: Option<&str>, embeddings_model_path: Option<&str>) -> Result<ServiceContainer> {
    let mut config = Config::load()?.unwrap_or_default();
    if let Some(path) = chat_model_path {
        config.chat_model_path = path.to_string();
    }
    if let Some(path) = embeddings_model_path {
        config.embeddings_model_path = path.to_string();
    }

    std::fs::create_dir_all(&config.corpus_dir)?;
    std::fs::create_dir_all(config.corpus_dir.join(crate::config::VECDUMP_DIR))?;

    let db = VectorStore::initialize(&config)?;

    let embedding_backend = HttpEmbeddingBackend::from_config(&config);
    let embedding_pool_backend = HttpEmbeddingBackend::from_config(&config);
    let embedding_pool = Pool::new(
        "embedding",
        EMBEDDING_MIN_CONTEXTS,
        EMBEDDING_MAX_CONTEXTS,
        move || embedding_pool_backend.create_context(),
    )?;

    let chat_backend = HttpChatBackend::from_config(&config);
    let chat_pool_backend = HttpChatBackend::from_config(&config);
    let chat_pool = Pool::new("chat", CHAT_MIN_CONTEXTS, CHAT_MAX_CONTEXTS, move || chat_pool_backend.create_context())?;

    Ok(ServiceContainer {
        config,
        db,
        embedding_backend: Box::new(embedding_backend),
        embedding_pool,
        chat_backend: Box::new(chat_backend),
        chat_pool,
        engine: Box::new(FileScanEngine),
    })
}

/// `cleanupSystem()`: drain and shut down both context
/// pools. The DB connection pool lives inside `VectorStore` and is
/// dropped with it.
pub fn cleanup_system(container: &ServiceContainer) {
    container.embedding_pool.shutdown();
    container.chat_pool.shutdown();
}

impl ServiceContainer {
    pub fn add_corpus(&self, source_path: &Path) -> WorkResult {
        ingest::add_corpus(
            source_path,
            &self.db,
            self.embedding_backend.as_ref(),
            &self.embedding_pool,
            &self.config.corpus_dir,
            self.config.corpus_file_proc_type,
        )
    }

    pub fn query(&self, user_query: &str) -> RagResult {
        query::query_rag(
            user_query,
            &self.config.corpus_dir,
            &self.config.embeddings_model_path,
            &self.config,
            &self.db,
            self.embedding_backend.as_ref(),
            &self.embedding_pool,
            self.chat_backend.as_ref(),
            &self.chat_pool,
            self.engine.as_ref(),
        )
    }

    /// `deleteCorpus(id)` (stub): removes a document's rows and
    /// its `.vecdump` cache file by file hash. Not wired into any CLI
    /// subcommand yet; nothing rules it out, it's simply unused so far.
    pub fn delete_corpus(&self, file_hash: &str) -> Result<()> {
        self.db.delete_embeddings(file_hash)?;
        let path = crate::vector_cache::dump_path(&self.config.corpus_dir, file_hash);
        if path.exists() {
            std::fs::remove_file(&path)?;
        }
        Ok(())
    }
}
