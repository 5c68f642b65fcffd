//! Recognized configuration options and their defaults.
//!
//! A `Config::load`/`save` TOML-on-disk pattern (`dirs::home_dir` + a
//! dotfile directory) carrying the corpus engine's constants.

use crate::error::RagError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// ── Chunking constants ──────────────────────────────────────────────────────
pub const AVG_WORDS_PER_SENTENCE: usize = 6;
pub const AVG_CHARS_PER_WORD: usize = 5;
pub const CHUNK_N_SENTENCES: usize = 10;
pub const OVERLAP: usize = 40;
pub const MAX_CHARS_PER_BATCH: usize = 512;
pub const MAX_CHUNK_SIZE: usize = MAX_CHARS_PER_BATCH - 2 * OVERLAP;
pub const BATCH_SIZE: usize = 10;

// ── Concurrency constants ───────────────────────────────────────────────────
pub const EMB_PROC_NUM_THREADS: usize = 2;
pub const ADD_CORPUS_N_THREADS: usize = 3;
pub const DB_CONN_POOL_SIZE: usize = 2;
pub const CHAT_MIN_CONTEXTS: usize = 1;
pub const CHAT_MAX_CONTEXTS: usize = 2;
pub const EMBEDDING_MIN_CONTEXTS: usize = 4;
pub const EMBEDDING_MAX_CONTEXTS: usize = 6;

// ── Model / retrieval constants ─────────────────────────────────────────────
pub const EMBEDDING_SIZE: usize = 384;
pub const K_SIMILAR_CHUNKS_TO_RETRIEVE: usize = 3;

// ── HTTP backend timeouts (original_source/constants.h) ─────────────────────
pub const CONNECT_TIMEOUT_SECONDS: u64 = 5;
pub const REQUEST_TIMEOUT_SECONDS: u64 = 30;
pub const MAX_RETRIES: u32 = 1;
pub const RETRY_DELAY_MS: u64 = 1000;

pub const VECDUMP_DIR: &str = "_vecdumps";

/// Collision policy for `saveEmbeddings`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DbHashPresentAction {
    Upsert,
    #[default]
    DoNothing,
}

/// Sequential vs. parallel per-file ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CorpusFileProcType {
    Parallel,
    #[default]
    Sequential,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Postgres-style connection string, kept for parity
    /// with the original's default; this engine's store is SQLite-backed
    /// (see DESIGN.md), so only `sqlite_path` is actually opened.
    #[serde(default = "default_db_connection_string")]
    pub db_connection_string: String,

    /// Path to the SQLite database file backing the `VectorStore`.
    #[serde(default = "default_sqlite_path")]
    pub sqlite_path: PathBuf,

    /// Corpus root directory; `_vecdumps/` lives under it.
    #[serde(default = "default_corpus_dir")]
    pub corpus_dir: PathBuf,

    #[serde(default = "default_embeddings_url")]
    pub embeddings_url: String,
    #[serde(default = "default_chat_url")]
    pub chat_url: String,
    #[serde(default = "default_embeddings_model_path")]
    pub embeddings_model_path: String,
    #[serde(default = "default_chat_model_path")]
    pub chat_model_path: String,

    #[serde(default = "default_embedding_dim")]
    pub embedding_dim: usize,
    #[serde(default = "default_k")]
    pub k_similar_chunks: usize,

    #[serde(default)]
    pub db_hash_present_action: DbHashPresentAction,
    #[serde(default)]
    pub corpus_file_proc_type: CorpusFileProcType,
}

fn default_db_connection_string() -> String {
    "dbname=tldr user=postgres password=postgres host=localhost port=5432".to_string()
}
fn default_sqlite_path() -> PathBuf {
    default_config_dir().join("embeddings.db")
}
fn default_corpus_dir() -> PathBuf {
    default_config_dir().join("corpus")
}
fn default_embeddings_url() -> String {
    "http://localhost:8084/embeddings".to_string()
}
fn default_chat_url() -> String {
    "http://localhost:8088/v1/chat/completions".to_string()
}
fn default_embeddings_model_path() -> String {
    "all-MiniLM-L6-v2".to_string()
}
fn default_chat_model_path() -> String {
    "llama-3.2-1b-instruct".to_string()
}
fn default_embedding_dim() -> usize {
    EMBEDDING_SIZE
}
fn default_k() -> usize {
    K_SIMILAR_CHUNKS_TO_RETRIEVE
}

fn default_config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".ragcorpus")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_connection_string: default_db_connection_string(),
            sqlite_path: default_sqlite_path(),
            corpus_dir: default_corpus_dir(),
            embeddings_url: default_embeddings_url(),
            chat_url: default_chat_url(),
            embeddings_model_path: default_embeddings_model_path(),
            chat_model_path: default_chat_model_path(),
            embedding_dim: default_embedding_dim(),
            k_similar_chunks: default_k(),
            db_hash_present_action: DbHashPresentAction::default(),
            corpus_file_proc_type: CorpusFileProcType::default(),
        }
    }
}

impl Config {
    fn path() -> PathBuf {
        default_config_dir().join("config.toml")
    }

    /// Load the config file if it exists; `None` if this is a first run.
    pub fn load() -> Result<Option<Self>> {
        let path = Self::path();
        if !path.exists() {
            return Ok(None);
        }
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read config at {}", path.display()))?;
        let mut config: Self = toml::from_str(&text)
            .map_err(|e| RagError::Config(format!("failed to parse config.toml: {e}")))?;
        config.expand_paths();
        Ok(Some(config))
    }

    /// Expand `~`/`$VAR` references in path-valued fields, e.g. a
    /// `corpus_dir = "~/notes/corpus"` written by hand into `config.toml`.
    fn expand_paths(&mut self) {
        self.corpus_dir = PathBuf::from(crate::path_util::expand_path(&self.corpus_dir.display().to_string()));
        self.sqlite_path = PathBuf::from(crate::path_util::expand_path(&self.sqlite_path.display().to_string()));
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create config dir {}", parent.display()))?;
        }
        let text = toml::to_string_pretty(self)
            .map_err(|e| RagError::Config(format!("failed to serialize config: {e}")))?;
        std::fs::write(&path, text)
            .with_context(|| format!("failed to write config at {}", path.display()))?;
        Ok(())
    }
}
