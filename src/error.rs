//! Typed failures the orchestrator needs to distinguish from generic `anyhow`
//! errors when folding outcomes into a [`WorkResult`].

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RagError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("context pool for '{pool}' is shut down")]
    PoolShutDown { pool: &'static str },

    #[error("context pool for '{pool}' failed to reach its minimum size: {source}")]
    PoolStartup {
        pool: &'static str,
        #[source]
        source: anyhow::Error,
    },

    #[error("file '{path}' could not be read or hashed: {source}")]
    FileHash {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("document '{path}' has zero pages or failed extraction")]
    EmptyDocument { path: String },

    #[error("embedding count mismatch for '{path}': expected {expected}, got {actual}")]
    EmbeddingCountMismatch {
        path: String,
        expected: usize,
        actual: usize,
    },

    #[error("vector cache file is invalid: {0}")]
    CacheFormat(String),

    #[error("query embedding has dimension {actual}, expected {expected}")]
    QueryDimensionMismatch { expected: usize, actual: usize },
}

/// Uniform ingest-outcome wrapper. Never let a raw error escape an
/// orchestrator entry point; fold it into this instead.
#[derive(Debug, Clone)]
pub struct WorkResult {
    pub is_error: bool,
    pub error_message: Option<String>,
    pub result_message: String,
}

impl WorkResult {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            is_error: false,
            error_message: None,
            result_message: message.into(),
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            is_error: true,
            error_message: Some(message.clone()),
            result_message: message,
        }
    }
}
