//! ragcorpus - Local corpus engine for retrieval-augmented chat
//!
//! Ingests PDF documents into page-aware, overlapping chunks, embeds them
//! through a pooled external embedding backend, and persists both a
//! relational store (SQLite) and a memory-mappable `.vecdump` vector
//! cache per document. Queries run an accelerated similarity scan over
//! the cache, fall back to the relational store on a cold cache, and
//! hand the retrieved context to an external chat backend.

pub mod chat;
pub mod chunking;
pub mod config;
pub mod db;
pub mod embedding;
pub mod error;
pub mod hash;
pub mod ingest;
pub mod path_util;
pub mod pdf_reader;
pub mod pool;
pub mod query;
pub mod service;
pub mod similarity_engine;
pub mod types;
pub mod vector_cache;
pub mod worker;

pub use chat::{ChatBackend, ChatContext, HttpChatBackend};
pub use config::{Config, CorpusFileProcType, DbHashPresentAction};
pub use db::VectorStore;
pub use embedding::{EmbeddingBackend, EmbeddingContext, HttpEmbeddingBackend};
pub use error::{RagError, WorkResult};
pub use pool::{Lease, Pool};
pub use service::{cleanup_system, initialize_system, ServiceContainer};
pub use similarity_engine::{FileScanEngine, SimilarityEngine};
pub use types::{ContextChunk, Document, RagResult};
