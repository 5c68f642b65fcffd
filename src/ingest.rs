//! Ingestion orchestrator: drives the chunker, hasher,
//! embedding worker, vector store and vector cache file per document.

use crate::chunking::chunk_pages;
use crate::config::{CorpusFileProcType, ADD_CORPUS_N_THREADS, EMB_PROC_NUM_THREADS};
use crate::db::VectorStore;
use crate::embedding::{EmbeddingBackend, EmbeddingContext};
use crate::error::{RagError, WorkResult};
use crate::hash::file_hash;
use crate::pdf_reader;
use crate::pool::Pool;
use crate::types::Document;
use crate::vector_cache;
use crate::worker;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Outcome of ingesting a single file, used to build the corpus-level
/// `WorkResult` message.
struct FileOutcome {
    path: PathBuf,
    ok: bool,
    detail: String,
}

/// `addCorpus(sourcePath)`.
pub fn add_corpus(
    source_path: &Path,
    db: &VectorStore,
    embedding_backend: &dyn EmbeddingBackend,
    embedding_pool: &Arc<Pool<EmbeddingContext>>,
    corpus_dir: &Path,
    proc_type: CorpusFileProcType,
) -> WorkResult {
    let candidates = match enumerate_pdfs(source_path) {
        Ok(files) => files,
        Err(e) => return WorkResult::err(format!("failed to enumerate PDFs under {}: {e}", source_path.display())),
    };

    if candidates.is_empty() {
        return WorkResult::ok("no PDF files found to process");
    }

    // Step 2: hash all candidates (order irrelevant, bounded worker set).
    let hashed: Vec<(PathBuf, String)> = hash_all(&candidates, ADD_CORPUS_N_THREADS);

    // Step 3: skip files whose cache already exists.
    let to_process: Vec<(PathBuf, String)> = hashed
        .into_iter()
        .filter(|(_, hash)| !vector_cache::exists(corpus_dir, hash))
        .collect();

    if to_process.is_empty() {
        return WorkResult::ok("nothing to process: all files already have a vector cache");
    }

    let progress = new_progress_bar(to_process.len() as u64);

    let n_threads = ADD_CORPUS_N_THREADS.min(to_process.len()).max(1);
    let outcomes = match proc_type {
        CorpusFileProcType::Sequential => to_process
            .iter()
            .map(|(path, hash)| {
                let outcome = process_file(path, hash, db, embedding_backend, embedding_pool, corpus_dir);
                progress.inc(1);
                outcome
            })
            .collect::<Vec<_>>(),
        CorpusFileProcType::Parallel => {
            process_parallel(&to_process, db, embedding_backend, embedding_pool, corpus_dir, n_threads, &progress)
        }
    };

    progress.finish_and_clear();
    summarize(outcomes)
}

fn new_progress_bar(len: u64) -> ProgressBar {
    let bar = ProgressBar::new(len);
    if let Ok(style) = ProgressStyle::with_template("{bar:40.cyan/blue} {pos}/{len} {msg}") {
        bar.set_style(style);
    }
    bar.set_message("ingesting corpus");
    bar
}

fn process_parallel(
    files: &[(PathBuf, String)],
    db: &VectorStore,
    embedding_backend: &dyn EmbeddingBackend,
    embedding_pool: &Arc<Pool<EmbeddingContext>>,
    corpus_dir: &Path,
    n_threads: usize,
    progress: &ProgressBar,
) -> Vec<FileOutcome> {
    let next = AtomicUsize::new(0);
    let results = std::sync::Mutex::new(Vec::with_capacity(files.len()));

    std::thread::scope(|scope| {
        let mut handles = Vec::new();
        for _ in 0..n_threads {
            let next = &next;
            let results = &results;
            let progress = &progress;
            handles.push(scope.spawn(move || loop {
                let idx = next.fetch_add(1, Ordering::SeqCst);
                if idx >= files.len() {
                    break;
                }
                let (path, hash) = &files[idx];
                let outcome = process_file(path, hash, db, embedding_backend, embedding_pool, corpus_dir);
                progress.inc(1);
                results.lock().unwrap().push(outcome);
            }));
        }
        for h in handles {
            let _ = h.join();
        }
    });

    results.into_inner().unwrap()
}

fn process_file(
    path: &Path,
    file_hash_value: &str,
    db: &VectorStore,
    embedding_backend: &dyn EmbeddingBackend,
    embedding_pool: &Arc<Pool<EmbeddingContext>>,
    corpus_dir: &Path,
) -> FileOutcome {
    match process_file_inner(path, file_hash_value, db, embedding_backend, embedding_pool, corpus_dir) {
        Ok(detail) => FileOutcome { path: path.to_path_buf(), ok: true, detail },
        Err(e) => {
            eprintln!("ingest: warning: skipping '{}': {e}", path.display());
            FileOutcome { path: path.to_path_buf(), ok: false, detail: e.to_string() }
        }
    }
}

fn process_file_inner(
    path: &Path,
    file_hash_value: &str,
    db: &VectorStore,
    embedding_backend: &dyn EmbeddingBackend,
    embedding_pool: &Arc<Pool<EmbeddingContext>>,
    corpus_dir: &Path,
) -> anyhow::Result<String> {
    // 4a. Extract document data.
    let data = pdf_reader::open(path)?;
    if data.page_count == 0 {
        return Err(RagError::EmptyDocument { path: path.display().to_string() }.into());
    }

    // 4b. Upsert document metadata.
    let filename = path.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
    let doc = Document {
        file_hash: file_hash_value.to_string(),
        path: path.to_string_lossy().to_string(),
        filename,
        title: data.metadata.title,
        author: data.metadata.author,
        subject: data.metadata.subject,
        keywords: data.metadata.keywords,
        creator: data.metadata.creator,
        producer: data.metadata.producer,
        page_count: data.page_count as u32,
    };
    db.save_document_metadata(&doc)?;

    // 4c. Unconditional replace.
    db.delete_embeddings(file_hash_value)?;

    // 4d. Chunk and embed.
    let chunked = chunk_pages(&data.pages);
    let output = worker::embed(
        embedding_backend,
        embedding_pool,
        db,
        &chunked.chunks,
        &chunked.pages,
        file_hash_value,
        EMB_PROC_NUM_THREADS,
    );

    // 4e. Verify counts.
    if output.vectors.len() != chunked.chunks.len() {
        return Err(RagError::EmbeddingCountMismatch {
            path: path.display().to_string(),
            expected: chunked.chunks.len(),
            actual: output.vectors.len(),
        }
        .into());
    }

    // 4f. Write the vector cache file; failure here is a warning only.
    if let Err(e) = vector_cache::write(corpus_dir, file_hash_value, &output.vector_hashes, &output.vectors) {
        eprintln!("ingest: warning: failed to write vector cache for '{}': {e}", path.display());
    }

    Ok(format!("{} chunks embedded", chunked.chunks.len()))
}

fn enumerate_pdfs(source_path: &Path) -> anyhow::Result<Vec<PathBuf>> {
    if source_path.is_file() {
        return Ok(vec![source_path.to_path_buf()]);
    }
    let mut files = Vec::new();
    for entry in walkdir::WalkDir::new(source_path).into_iter().filter_map(|e| e.ok()) {
        let path = entry.path();
        if path.is_file() && path.extension().and_then(|e| e.to_str()).map(|e| e.eq_ignore_ascii_case("pdf")).unwrap_or(false) {
            files.push(path.to_path_buf());
        }
    }
    Ok(files)
}

fn hash_all(files: &[PathBuf], n_threads: usize) -> Vec<(PathBuf, String)> {
    let n_threads = n_threads.min(files.len()).max(1);
    let next = AtomicUsize::new(0);
    let results = std::sync::Mutex::new(Vec::with_capacity(files.len()));

    std::thread::scope(|scope| {
        let mut handles = Vec::new();
        for _ in 0..n_threads {
            let next = &next;
            let results = &results;
            handles.push(scope.spawn(move || loop {
                let idx = next.fetch_add(1, Ordering::SeqCst);
                if idx >= files.len() {
                    break;
                }
                let path = &files[idx];
                match file_hash(path) {
                    Ok(hash) => results.lock().unwrap().push((path.clone(), hash)),
                    Err(e) => {
                        let typed = RagError::FileHash {
                            path: path.display().to_string(),
                            source: std::io::Error::new(std::io::ErrorKind::Other, e.to_string()),
                        };
                        eprintln!("ingest: warning: {typed}");
                    }
                }
            }));
        }
        for h in handles {
            let _ = h.join();
        }
    });

    results.into_inner().unwrap()
}

fn summarize(outcomes: Vec<FileOutcome>) -> WorkResult {
    let total = outcomes.len();
    let failed: Vec<&FileOutcome> = outcomes.iter().filter(|o| !o.ok).collect();
    let succeeded = total - failed.len();

    if failed.is_empty() {
        WorkResult::ok(format!("processed {succeeded}/{total} files successfully"))
    } else {
        let failed_names: Vec<String> = failed
            .iter()
            .map(|o| format!("{}: {}", o.path.display(), o.detail))
            .collect();
        WorkResult {
            is_error: succeeded == 0,
            error_message: Some(failed_names.join("; ")),
            result_message: format!(
                "processed {succeeded}/{total} files successfully, {} failed",
                failed.len()
            ),
        }
    }
}
