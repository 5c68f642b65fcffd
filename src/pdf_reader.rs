//! Document reader boundary: PDFs are the only supported input
//! type. Wraps `pdf_oxide`, the external document reader (only its
//! interface is in scope here, not decoding internals).

use anyhow::{Context, Result};
use std::path::Path;

/// Metadata extracted from a PDF's document info dictionary. Any field the
/// reader can't find is left as an empty string; a per-page extraction
/// failure logs a warning and continues rather than failing the whole
/// document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentMetadata {
    pub title: String,
    pub author: String,
    pub subject: String,
    pub keywords: String,
    pub creator: String,
    pub producer: String,
}

/// A fully read document: metadata plus one ASCII-filtered text string per
/// physical page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentData {
    pub page_count: usize,
    pub metadata: DocumentMetadata,
    pub pages: Vec<String>,
}

/// ASCII-filter a string, dropping any byte `>= 128` (a documented reader
/// limitation, not a core requirement).
pub fn ascii_filter(text: &str) -> String {
    text.chars().filter(|c| (*c as u32) < 128).collect()
}

/// Open a PDF and extract its metadata and per-page text. Returns an error
/// if the file cannot be opened or its page count cannot be determined;
/// callers treat that as a per-file error and skip the file.
pub fn open(path: &Path) -> Result<DocumentData> {
    let mut doc = pdf_oxide::PdfDocument::open(path)
        .with_context(|| format!("failed to open PDF: {}", path.display()))?;

    let page_count = doc
        .page_count()
        .with_context(|| format!("failed to get page count: {}", path.display()))?;

    let metadata = read_metadata(&doc);

    let options = pdf_oxide::converters::ConversionOptions::default();
    let mut pages = Vec::with_capacity(page_count);
    for page_idx in 0..page_count {
        match doc.to_markdown(page_idx, &options) {
            Ok(text) => pages.push(ascii_filter(&text)),
            Err(e) => {
                eprintln!(
                    "pdf_reader: warning: failed to extract page {} of {}: {e}",
                    page_idx + 1,
                    path.display()
                );
                pages.push(String::new());
            }
        }
    }

    Ok(DocumentData {
        page_count,
        metadata,
        pages,
    })
}

fn read_metadata(doc: &pdf_oxide::PdfDocument) -> DocumentMetadata {
    match doc.metadata() {
        Ok(m) => DocumentMetadata {
            title: m.title.unwrap_or_default(),
            author: m.author.unwrap_or_default(),
            subject: m.subject.unwrap_or_default(),
            keywords: m.keywords.unwrap_or_default(),
            creator: m.creator.unwrap_or_default(),
            producer: m.producer.unwrap_or_default(),
        },
        Err(e) => {
            eprintln!("pdf_reader: warning: failed to read metadata: {e}");
            DocumentMetadata::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_filter_drops_non_ascii_bytes() {
        assert_eq!(ascii_filter("héllo wörld"), "hllo wrld");
        assert_eq!(ascii_filter("plain text"), "plain text");
        assert_eq!(ascii_filter(""), "");
    }
}
