//! Vector store: persists embeddings + chunk text + page
//! number + document metadata; looks up chunks by vector-hash set; deletes
//! by file-hash. Backed by SQLite via `rusqlite` (see DESIGN.md for why;
//! the original `lib_tldr` already supports a SQLite fallback alongside
//! Postgres). Connections are drawn from a `Pool` (the pool
//! abstraction, reused here for `DB_CONN_POOL_SIZE`).

use crate::config::{Config, DbHashPresentAction};
use crate::pool::{Lease, Pool};
use crate::types::{ContextChunk, Document};
use anyhow::{Context, Result};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS documents (
    file_hash   TEXT PRIMARY KEY,
    path        TEXT NOT NULL,
    filename    TEXT NOT NULL,
    title       TEXT NOT NULL DEFAULT '',
    author      TEXT NOT NULL DEFAULT '',
    subject     TEXT NOT NULL DEFAULT '',
    keywords    TEXT NOT NULL DEFAULT '',
    creator     TEXT NOT NULL DEFAULT '',
    producer    TEXT NOT NULL DEFAULT '',
    page_count  INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS embeddings (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    file_hash   TEXT NOT NULL REFERENCES documents(file_hash),
    vector_hash INTEGER NOT NULL UNIQUE,
    chunk_text  TEXT NOT NULL,
    page_num    INTEGER NOT NULL,
    vector      BLOB NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_embeddings_file_hash ON embeddings(file_hash);
";

fn vector_to_blob(v: &[f32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(v.len() * 4);
    for f in v {
        out.extend_from_slice(&f.to_le_bytes());
    }
    out
}

fn blob_to_vector(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes(c.try_into().unwrap()))
        .collect()
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

/// A bounded pool of SQLite connections, all opening the same file with
/// WAL mode + foreign keys on, drawn from the generic `pool::Pool`.
pub struct VectorStore {
    pool: Arc<Pool<Connection>>,
    hash_present_action: DbHashPresentAction,
}

impl VectorStore {
    /// Open (creating schema if absent) and fill a connection pool of
    /// `DB_CONN_POOL_SIZE` connections.
    pub fn initialize(config: &Config) -> Result<Self> {
        Self::open(&config.sqlite_path, crate::config::DB_CONN_POOL_SIZE, config.db_hash_present_action)
    }

    pub fn open(path: &Path, pool_size: usize, hash_present_action: DbHashPresentAction) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create DB directory {}", parent.display()))?;
        }
        let path: PathBuf = path.to_path_buf();

        // Create schema up front on a throwaway connection so pool startup
        // can't race the first user of the pool.
        let conn = open_connection(&path)?;
        conn.execute_batch(SCHEMA).context("failed to create schema")?;
        drop(conn);

        let pool = Pool::new("db_connections", pool_size, pool_size, move || open_connection(&path))?;

        Ok(Self { pool, hash_present_action })
    }

    fn lease(&self) -> Result<Lease<Connection>> {
        Lease::acquire(self.pool.clone())
    }

    /// Upsert a document's metadata by file_hash.
    pub fn save_document_metadata(&self, doc: &Document) -> Result<()> {
        let lease = self.lease()?;
        lease.get().execute(
            "INSERT INTO documents
                (file_hash, path, filename, title, author, subject, keywords, creator, producer, page_count)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
             ON CONFLICT(file_hash) DO UPDATE SET
                path = excluded.path,
                filename = excluded.filename,
                title = excluded.title,
                author = excluded.author,
                subject = excluded.subject,
                keywords = excluded.keywords,
                creator = excluded.creator,
                producer = excluded.producer,
                page_count = excluded.page_count",
            params![
                doc.file_hash,
                doc.path,
                doc.filename,
                doc.title,
                doc.author,
                doc.subject,
                doc.keywords,
                doc.creator,
                doc.producer,
                doc.page_count,
            ],
        )
        .context("failed to save document metadata")?;
        Ok(())
    }

    pub fn get_document(&self, file_hash: &str) -> Result<Option<Document>> {
        let lease = self.lease()?;
        lease
            .get()
            .query_row(
                "SELECT file_hash, path, filename, title, author, subject, keywords, creator, producer, page_count
                 FROM documents WHERE file_hash = ?1",
                params![file_hash],
                row_to_document,
            )
            .optional()
            .context("failed to fetch document")
    }

    /// Insert rows for one batch of chunks. `DB_HASH_PRESENT_ACTION`
    /// governs what happens on a `vector_hash` collision.
    pub fn save_embeddings(
        &self,
        chunks: &[String],
        vectors: &[Vec<f32>],
        vector_hashes: &[u64],
        page_nums: &[u32],
        file_hash: &str,
    ) -> Result<i64> {
        assert_eq!(chunks.len(), vectors.len());
        assert_eq!(chunks.len(), vector_hashes.len());
        assert_eq!(chunks.len(), page_nums.len());
        if chunks.is_empty() {
            return Ok(-1);
        }

        let mut lease = self.lease()?;
        let tx = lease.get_mut().transaction().context("failed to start transaction")?;
        let mut last_id = -1i64;
        for i in 0..chunks.len() {
            let blob = vector_to_blob(&vectors[i]);
            let result = match self.hash_present_action {
                DbHashPresentAction::Upsert => tx.execute(
                    "INSERT INTO embeddings (file_hash, vector_hash, chunk_text, page_num, vector)
                     VALUES (?1, ?2, ?3, ?4, ?5)
                     ON CONFLICT(vector_hash) DO UPDATE SET
                        file_hash = excluded.file_hash,
                        chunk_text = excluded.chunk_text,
                        page_num = excluded.page_num,
                        vector = excluded.vector",
                    params![file_hash, vector_hashes[i] as i64, chunks[i], page_nums[i], blob],
                ),
                DbHashPresentAction::DoNothing => tx.execute(
                    "INSERT OR IGNORE INTO embeddings (file_hash, vector_hash, chunk_text, page_num, vector)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![file_hash, vector_hashes[i] as i64, chunks[i], page_nums[i], blob],
                ),
            };
            match result {
                Ok(_) => last_id = tx.last_insert_rowid(),
                Err(e) => eprintln!("db: warning: failed to save embedding row: {e}"),
            }
        }
        tx.commit().context("failed to commit embeddings batch")?;
        Ok(last_id)
    }

    /// Remove all embedding rows for `file_hash` (the unconditional replace
    /// before re-embedding a changed file). Transactional.
    pub fn delete_embeddings(&self, file_hash: &str) -> Result<bool> {
        let lease = self.lease()?;
        let affected = lease
            .get()
            .execute("DELETE FROM embeddings WHERE file_hash = ?1", params![file_hash])
            .context("failed to delete embeddings")?;
        Ok(affected > 0)
    }

    /// Fallback path when the accelerated engine misses: brute-force
    /// cosine similarity over all stored vectors, tie-broken by ascending
    /// vector_hash.
    pub fn search_similar_vectors(&self, query: &[f32], k: usize) -> Result<Vec<ContextChunk>> {
        let lease = self.lease()?;
        let conn = lease.get();
        let mut stmt = conn
            .prepare(
                "SELECT e.vector_hash, e.chunk_text, e.page_num, e.vector,
                        d.file_hash, d.path, d.filename, d.title, d.author, d.page_count
                 FROM embeddings e JOIN documents d ON d.file_hash = e.file_hash",
            )
            .context("failed to prepare similarity scan")?;

        let mut scored: Vec<ContextChunk> = stmt
            .query_map([], |row| {
                let vector_hash: i64 = row.get(0)?;
                let vector_blob: Vec<u8> = row.get(3)?;
                let vector = blob_to_vector(&vector_blob);
                let score = cosine_similarity(query, &vector);
                Ok(ContextChunk {
                    vector_hash: vector_hash as u64,
                    text: row.get(1)?,
                    page_num: row.get::<_, i64>(2)? as u32,
                    file_hash: row.get(4)?,
                    file_path: row.get(5)?,
                    file_name: row.get(6)?,
                    title: row.get(7)?,
                    author: row.get(8)?,
                    page_count: row.get::<_, i64>(9)? as u32,
                    score,
                })
            })
            .context("failed to scan embeddings")?
            .collect::<rusqlite::Result<_>>()
            .context("failed to collect similarity rows")?;

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.vector_hash.cmp(&b.vector_hash))
        });
        scored.truncate(k);
        Ok(scored)
    }

    /// Hydration path for the accelerated engine: given a set of
    /// vector-hashes, return their chunks joined with document metadata.
    /// Similarity scores are left at 0.0; callers overwrite with the
    /// accelerated engine's score.
    pub fn get_chunks_by_hashes(&self, vector_hashes: &[u64]) -> Result<HashMap<u64, ContextChunk>> {
        if vector_hashes.is_empty() {
            return Ok(HashMap::new());
        }
        let lease = self.lease()?;
        let conn = lease.get();

        let placeholders = vec!["?"; vector_hashes.len()].join(",");
        let sql = format!(
            "SELECT e.vector_hash, e.chunk_text, e.page_num,
                    d.file_hash, d.path, d.filename, d.title, d.author, d.page_count
             FROM embeddings e JOIN documents d ON d.file_hash = e.file_hash
             WHERE e.vector_hash IN ({placeholders})"
        );
        let mut stmt = conn.prepare(&sql).context("failed to prepare hydration query")?;
        let params: Vec<i64> = vector_hashes.iter().map(|h| *h as i64).collect();

        let rows = stmt
            .query_map(params_from_iter(params.iter()), |row| {
                let vector_hash: i64 = row.get(0)?;
                Ok(ContextChunk {
                    vector_hash: vector_hash as u64,
                    text: row.get(1)?,
                    page_num: row.get::<_, i64>(2)? as u32,
                    file_hash: row.get(3)?,
                    file_path: row.get(4)?,
                    file_name: row.get(5)?,
                    title: row.get(6)?,
                    author: row.get(7)?,
                    page_count: row.get::<_, i64>(8)? as u32,
                    score: 0.0,
                })
            })
            .context("failed to run hydration query")?;

        let mut out = HashMap::with_capacity(vector_hashes.len());
        for row in rows {
            let chunk = row.context("failed to read hydration row")?;
            out.insert(chunk.vector_hash, chunk);
        }
        Ok(out)
    }
}

fn open_connection(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path).with_context(|| format!("failed to open SQLite DB at {}", path.display()))?;
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA synchronous = NORMAL;
         PRAGMA foreign_keys = ON;
         PRAGMA busy_timeout = 5000;",
    )
    .context("failed to set SQLite pragmas")?;
    Ok(conn)
}

fn row_to_document(row: &rusqlite::Row) -> rusqlite::Result<Document> {
    Ok(Document {
        file_hash: row.get(0)?,
        path: row.get(1)?,
        filename: row.get(2)?,
        title: row.get(3)?,
        author: row.get(4)?,
        subject: row.get(5)?,
        keywords: row.get(6)?,
        creator: row.get(7)?,
        producer: row.get(8)?,
        page_count: row.get::<_, i64>(9)? as u32,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_store() -> (tempfile::TempDir, VectorStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = VectorStore::open(&dir.path().join("db.sqlite"), 2, DbHashPresentAction::DoNothing).unwrap();
        (dir, store)
    }

    fn sample_doc(hash: &str) -> Document {
        Document {
            file_hash: hash.to_string(),
            path: format!("/docs/{hash}.pdf"),
            filename: format!("{hash}.pdf"),
            title: "Title".into(),
            author: "Author".into(),
            subject: "Subject".into(),
            keywords: "kw".into(),
            creator: "Creator".into(),
            producer: "Producer".into(),
            page_count: 2,
        }
    }

    #[test]
    fn upsert_document_metadata_is_idempotent() {
        let (_dir, store) = test_store();
        store.save_document_metadata(&sample_doc("h1")).unwrap();
        let mut doc2 = sample_doc("h1");
        doc2.title = "New Title".into();
        store.save_document_metadata(&doc2).unwrap();

        let fetched = store.get_document("h1").unwrap().unwrap();
        assert_eq!(fetched.title, "New Title");
    }

    #[test]
    fn delete_then_save_leaves_only_new_rows() {
        let (_dir, store) = test_store();
        store.save_document_metadata(&sample_doc("h1")).unwrap();
        store
            .save_embeddings(
                &["a".into(), "b".into()],
                &[vec![1.0, 0.0], vec![0.0, 1.0]],
                &[1, 2],
                &[1, 1],
                "h1",
            )
            .unwrap();

        store.delete_embeddings("h1").unwrap();
        store
            .save_embeddings(&["c".into()], &[vec![1.0, 1.0]], &[3], &[1], "h1")
            .unwrap();

        let hydrated = store.get_chunks_by_hashes(&[1, 2, 3]).unwrap();
        assert_eq!(hydrated.len(), 1);
        assert!(hydrated.contains_key(&3));
    }

    #[test]
    fn do_nothing_on_hash_collision_drops_new_row() {
        let (_dir, store) = test_store();
        store.save_document_metadata(&sample_doc("h1")).unwrap();
        store
            .save_embeddings(&["first".into()], &[vec![1.0, 0.0]], &[7], &[1], "h1")
            .unwrap();
        store
            .save_embeddings(&["second".into()], &[vec![0.0, 1.0]], &[7], &[2], "h1")
            .unwrap();

        let hydrated = store.get_chunks_by_hashes(&[7]).unwrap();
        assert_eq!(hydrated.get(&7).unwrap().text, "first");
    }

    #[test]
    fn search_similar_vectors_ranks_by_cosine_similarity() {
        let (_dir, store) = test_store();
        store.save_document_metadata(&sample_doc("h1")).unwrap();
        store
            .save_embeddings(
                &["near".into(), "far".into()],
                &[vec![1.0, 0.0], vec![0.0, 1.0]],
                &[1, 2],
                &[1, 1],
                "h1",
            )
            .unwrap();

        let results = store.search_similar_vectors(&[1.0, 0.0], 1).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].text, "near");
    }
}
