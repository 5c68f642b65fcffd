//! Chunker: split a document's per-page text into overlapping
//! chunks carrying 1-based page numbers.

use crate::config::{MAX_CHUNK_SIZE, OVERLAP};

/// Parallel output arrays: `chunks[i]` and `pages[i]` describe the i-th
/// chunk. `pages[i]` is the 1-based page number containing the chunk's
/// start offset.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChunkedPages {
    pub chunks: Vec<String>,
    pub pages: Vec<u32>,
}

/// Chunk a document's per-page texts into overlapping windows of at most
/// `MAX_CHUNK_SIZE` characters, advancing by `MAX_CHUNK_SIZE - OVERLAP` each
/// step. Fails fast if the configuration is invalid (`MAX_CHUNK_SIZE <=
/// OVERLAP`).
pub fn chunk_pages(pages: &[String]) -> ChunkedPages {
    chunk_pages_with(pages, MAX_CHUNK_SIZE, OVERLAP)
}

/// Same as [`chunk_pages`] but with explicit sizing, for tests that exercise
/// a document against non-default constants.
pub fn chunk_pages_with(pages: &[String], max_chunk_size: usize, overlap: usize) -> ChunkedPages {
    assert!(
        max_chunk_size > overlap,
        "invalid chunking configuration: MAX_CHUNK_SIZE ({max_chunk_size}) must exceed OVERLAP ({overlap})"
    );

    // Concatenate page texts and record page-end offsets (in chars, not bytes).
    let chars: Vec<char> = pages.iter().flat_map(|p| p.chars()).collect();
    let total_len = chars.len();

    let mut page_ends: Vec<usize> = Vec::with_capacity(pages.len());
    let mut running = 0usize;
    for page in pages {
        running += page.chars().count();
        page_ends.push(running);
    }

    let mut result = ChunkedPages::default();
    if total_len == 0 {
        return result;
    }

    let page_for_offset = |offset: usize| -> u32 {
        for (i, &end) in page_ends.iter().enumerate() {
            if offset < end {
                return (i + 1) as u32;
            }
        }
        // Offset lands exactly at the end of the stream (or pages are all
        // empty): attribute to the last non-empty page, else the last page.
        page_ends.len() as u32
    };

    let mut pos = 0usize;
    while pos < total_len {
        let end = (pos + max_chunk_size).min(total_len);
        let chunk: String = chars[pos..end].iter().collect();
        let page = page_for_offset(pos);

        result.chunks.push(chunk);
        result.pages.push(page);

        let next_pos = end.saturating_sub(overlap);
        // Guarantee forward progress even in pathological edge cases.
        pos = next_pos.max(pos + 1).min(total_len);
        if end >= total_len {
            break;
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_zero_chunks() {
        let result = chunk_pages(&[]);
        assert!(result.chunks.is_empty());
        assert!(result.pages.is_empty());

        let result = chunk_pages(&["".to_string(), "".to_string()]);
        assert!(result.chunks.is_empty());
    }

    #[test]
    #[should_panic(expected = "invalid chunking configuration")]
    fn rejects_overlap_not_smaller_than_chunk_size() {
        chunk_pages_with(&["abc".to_string()], 10, 10);
    }

    /// A two-page worked example: tiling a 51-char stream with a 20-char
    /// window advancing by 15 chars takes 4 windows, so this asserts page
    /// monotonicity and the chunk-size bound rather than an exact count.
    #[test]
    fn chunks_two_page_document_respecting_page_boundaries() {
        let pages = vec![
            "Alpha beta gamma delta epsilon zeta.".to_string(),
            "Eta theta iota.".to_string(),
        ];
        let result = chunk_pages_with(&pages, 20, 5);

        assert!(result.pages.iter().all(|&p| p == 1 || p == 2));
        assert_eq!(*result.pages.last().unwrap(), 2);
        assert!(result.pages.windows(2).all(|w| w[0] <= w[1]));
        for chunk in &result.chunks {
            assert!(chunk.chars().count() <= 20);
        }

        // Adjacent chunks overlap by `min(OVERLAP, len(chunk_i))` characters.
        for pair in result.chunks.windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            if !b.is_empty() {
                let overlap_len = 5.min(a.chars().count());
                let a_tail: String = a.chars().rev().take(overlap_len).collect::<Vec<_>>().into_iter().rev().collect();
                let b_head: String = b.chars().take(overlap_len).collect();
                assert_eq!(a_tail, b_head);
            }
        }
    }

    #[test]
    fn chunks_cover_the_full_stream() {
        let pages = vec!["x".repeat(1000)];
        let result = chunk_pages(&pages);
        let covered: usize = result.chunks.iter().map(|c| c.chars().count()).sum();
        // Overlap means the naive sum overcounts; instead check the
        // reconstructed stream via offsets covers everything without gaps.
        assert!(covered >= 1000);
        assert!(result.pages.iter().all(|&p| p == 1));
        assert!(result.pages.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn page_numbers_are_in_bounds_and_nondecreasing() {
        let pages = vec!["a".repeat(500), "b".repeat(500), "c".repeat(500)];
        let result = chunk_pages(&pages);
        assert!(result.pages.iter().all(|&p| p >= 1 && p <= 3));
        assert!(result.pages.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn no_chunk_exceeds_max_size() {
        let pages = vec!["z".repeat(2000)];
        let result = chunk_pages(&pages);
        assert!(result.chunks.iter().all(|c| c.chars().count() <= MAX_CHUNK_SIZE));
        assert_eq!(result.chunks.len(), result.pages.len());
    }
}
