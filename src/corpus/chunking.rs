//! Fixed-size chunking of extracted document text.
//!
//! Chunks are consecutive, non-overlapping runs of `chunk_size` characters in
//! left-to-right order; the final chunk may be shorter. Splitting counts
//! characters rather than bytes so multi-byte UTF-8 content never lands on an
//! invalid boundary. No trimming or normalization is applied: retrieval
//! returns the document text exactly as extracted.

use super::types::ChunkingError;

/// Split `text` into fixed-size character chunks.
///
/// Returns an empty vector for empty input. Deterministic: the same text and
/// size always produce the same chunks.
pub fn chunk_text(text: &str, chunk_size: usize) -> Result<Vec<String>, ChunkingError> {
    if chunk_size == 0 {
        return Err(ChunkingError::InvalidChunkSize);
    }

    let mut chunks = Vec::new();
    let mut start = 0;
    let mut chars_in_chunk = 0;
    for (offset, _) in text.char_indices() {
        if chars_in_chunk == chunk_size {
            chunks.push(text[start..offset].to_string());
            start = offset;
            chars_in_chunk = 0;
        }
        chars_in_chunk += 1;
    }
    if start < text.len() {
        chunks.push(text[start..].to_string());
    }
    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_evenly_divisible_text() {
        let chunks = chunk_text("abcdef", 2).expect("chunk");
        assert_eq!(chunks, vec!["ab", "cd", "ef"]);
    }

    #[test]
    fn final_chunk_may_be_shorter() {
        let chunks = chunk_text("abcde", 2).expect("chunk");
        assert_eq!(chunks, vec!["ab", "cd", "e"]);
    }

    #[test]
    fn empty_text_produces_no_chunks() {
        for size in [1, 2, 500] {
            assert!(chunk_text("", size).expect("chunk").is_empty());
        }
    }

    #[test]
    fn size_larger_than_text_yields_single_chunk() {
        let chunks = chunk_text("abc", 10).expect("chunk");
        assert_eq!(chunks, vec!["abc"]);
    }

    #[test]
    fn counts_characters_not_bytes() {
        let chunks = chunk_text("ééééé", 2).expect("chunk");
        assert_eq!(chunks, vec!["éé", "éé", "é"]);
    }

    #[test]
    fn zero_chunk_size_is_an_error() {
        assert!(matches!(
            chunk_text("abc", 0),
            Err(ChunkingError::InvalidChunkSize)
        ));
    }

    #[test]
    fn whitespace_is_preserved_verbatim() {
        let chunks = chunk_text("a b\nc ", 3).expect("chunk");
        assert_eq!(chunks, vec!["a b", "\nc "]);
    }
}
