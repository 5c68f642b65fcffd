//! Shared data-model types.

use serde::{Deserialize, Serialize};

/// A document, identified by its file hash.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub file_hash: String,
    pub path: String,
    pub filename: String,
    pub title: String,
    pub author: String,
    pub subject: String,
    pub keywords: String,
    pub creator: String,
    pub producer: String,
    pub page_count: u32,
}

/// A chunk hydrated with its document metadata and similarity score,
/// the unit the query retriever assembles its prompt context from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContextChunk {
    pub vector_hash: u64,
    pub text: String,
    pub page_num: u32,
    pub file_hash: String,
    pub file_path: String,
    pub file_name: String,
    pub title: String,
    pub author: String,
    pub page_count: u32,
    pub score: f32,
}

/// Result of `queryRag`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RagResult {
    pub response: String,
    pub context_chunks: Vec<ContextChunk>,
    pub referenced_document_count: usize,
}
