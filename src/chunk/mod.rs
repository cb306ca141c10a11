//! Fixed-window text chunking
//!
//! Documents are split into windows of at most `max_size` characters that
//! advance by `max_size - overlap`, so consecutive chunks share exactly
//! `overlap` characters. Offsets count characters, never bytes.
//!
//! Chunk ids derive from `(source_id, start_offset)` only, so re-chunking an
//! unchanged document reproduces the same ids and upserts stay idempotent.

use crate::config::ChunkConfig;
use crate::error::{Error, Result};
use blake3::Hasher;
use uuid::Uuid;

/// A text chunk with provenance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Stable id derived from source and offset
    pub chunk_id: String,

    /// The actual text content
    pub text: String,

    /// Document identifier (path relative to the data directory)
    pub source_path: String,

    /// Character offset of the first character in the document
    pub start_offset: usize,

    /// Length in characters
    pub length: usize,

    /// Chunk index (0-based)
    pub index: usize,
}

/// Splitting policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunker {
    max_size: usize,
    overlap: usize,
}

impl Chunker {
    /// Create a chunker; `overlap` must be strictly smaller than `max_size`
    pub fn new(max_size: usize, overlap: usize) -> Result<Self> {
        if max_size == 0 {
            return Err(Error::Config("chunk size must be > 0".to_string()));
        }
        if overlap >= max_size {
            return Err(Error::Config(format!(
                "chunk overlap ({}) must be smaller than chunk size ({})",
                overlap, max_size
            )));
        }
        Ok(Self { max_size, overlap })
    }

    pub fn from_config(config: &ChunkConfig) -> Result<Self> {
        Self::new(config.max_chars, config.overlap_chars)
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Lazily split `text` into chunks attributed to `source_id`
    pub fn split<'a>(&self, text: &'a str, source_id: &'a str) -> Chunks<'a> {
        Chunks {
            text,
            source_id,
            max_size: self.max_size,
            step: self.max_size - self.overlap,
            byte_pos: 0,
            char_pos: 0,
            index: 0,
            done: text.is_empty(),
        }
    }
}

/// Split `text` with an ad-hoc policy
pub fn split<'a>(
    text: &'a str,
    source_id: &'a str,
    max_size: usize,
    overlap: usize,
) -> Result<Chunks<'a>> {
    Ok(Chunker::new(max_size, overlap)?.split(text, source_id))
}

/// Iterator over the chunks of one document.
///
/// Cloning yields an independent cursor at the same position; splitting has
/// no side effects, so a caller may stop early and start over at will.
#[derive(Debug, Clone)]
pub struct Chunks<'a> {
    text: &'a str,
    source_id: &'a str,
    max_size: usize,
    step: usize,
    byte_pos: usize,
    char_pos: usize,
    index: usize,
    done: bool,
}

impl Iterator for Chunks<'_> {
    type Item = Chunk;

    fn next(&mut self) -> Option<Chunk> {
        if self.done {
            return None;
        }

        let rest = &self.text[self.byte_pos..];
        let end = byte_offset_of(rest, self.max_size);
        let window = &rest[..end];
        let length = if end == rest.len() {
            window.chars().count()
        } else {
            self.max_size
        };

        let chunk = Chunk {
            chunk_id: chunk_id(self.source_id, self.char_pos),
            text: window.to_string(),
            source_path: self.source_id.to_string(),
            start_offset: self.char_pos,
            length,
            index: self.index,
        };

        if end == rest.len() {
            self.done = true;
        } else {
            self.byte_pos += byte_offset_of(rest, self.step);
            self.char_pos += self.step;
            self.index += 1;
        }

        Some(chunk)
    }
}

/// Byte offset just past the first `chars` characters of `s` (or `s.len()`)
fn byte_offset_of(s: &str, chars: usize) -> usize {
    s.char_indices().nth(chars).map(|(i, _)| i).unwrap_or(s.len())
}

/// Deterministic chunk id for a source and character offset
pub fn chunk_id(source_id: &str, start_offset: usize) -> String {
    let name = format!("{}#{}", source_id, start_offset);
    Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes()).to_string()
}

/// Compute a stable hash for document content
pub fn compute_content_hash(content: &[u8]) -> String {
    let mut hasher = Hasher::new();
    hasher.update(content);
    hasher.finalize().to_hex().to_string()
}

/// Compute a stable hash for a string
pub fn compute_text_hash(text: &str) -> String {
    compute_content_hash(text.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reassemble(chunks: &[Chunk], overlap: usize) -> String {
        let mut out = String::new();
        for (i, chunk) in chunks.iter().enumerate() {
            if i == 0 {
                out.push_str(&chunk.text);
            } else {
                out.extend(chunk.text.chars().skip(overlap));
            }
        }
        out
    }

    #[test]
    fn test_chunk_short_document() {
        let chunks: Vec<_> = split("This is a short document.", "a.txt", 500, 50)
            .unwrap()
            .collect();

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "This is a short document.");
        assert_eq!(chunks[0].start_offset, 0);
        assert_eq!(chunks[0].length, 25);
        assert_eq!(chunks[0].index, 0);
    }

    #[test]
    fn test_empty_document_has_no_chunks() {
        assert_eq!(split("", "a.txt", 10, 2).unwrap().count(), 0);
    }

    #[test]
    fn test_window_arithmetic() {
        let text: String = ('a'..='z').collect();
        let chunks: Vec<_> = split(&text, "abc.txt", 10, 4).unwrap().collect();

        let offsets: Vec<_> = chunks.iter().map(|c| c.start_offset).collect();
        assert_eq!(offsets, vec![0, 6, 12, 18]);
        assert_eq!(chunks[0].text, "abcdefghij");
        assert_eq!(chunks[1].text, "ghijklmnop");
        assert_eq!(chunks[3].text, "stuvwxyz");
        assert_eq!(chunks[3].length, 8);
    }

    #[test]
    fn test_chunks_respect_max_size_and_overlap() {
        let text = "Lorem ipsum dolor sit amet. ".repeat(100);
        let chunks: Vec<_> = split(&text, "lorem.txt", 300, 60).unwrap().collect();

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.length <= 300);
            assert_eq!(chunk.text.chars().count(), chunk.length);
        }
        for pair in chunks.windows(2) {
            let tail: String = pair[0].text.chars().skip(pair[0].length - 60).collect();
            let head: String = pair[1].text.chars().take(60).collect();
            assert_eq!(tail, head);
        }
        for chunk in &chunks[..chunks.len() - 1] {
            assert_eq!(chunk.length, 300);
        }
    }

    #[test]
    fn test_reassembly_is_lossless() {
        let text = "Première ligne — avec des accents.\nDeuxième ligne: ça marche? 日本語も。".repeat(7);
        let chunks: Vec<_> = split(&text, "fr.md", 37, 11).unwrap().collect();

        assert_eq!(reassemble(&chunks, 11), text);
    }

    #[test]
    fn test_multibyte_offsets_are_characters() {
        let text = "ééééé";
        let chunks: Vec<_> = split(text, "e.txt", 2, 1).unwrap().collect();

        assert_eq!(chunks.len(), 4);
        assert_eq!(chunks[1].start_offset, 1);
        assert_eq!(chunks[1].text, "éé");
        assert_eq!(chunks[3].start_offset, 3);
    }

    #[test]
    fn test_invalid_sizing_is_config_error() {
        assert!(matches!(Chunker::new(10, 10), Err(Error::Config(_))));
        assert!(matches!(Chunker::new(10, 11), Err(Error::Config(_))));
        assert!(matches!(Chunker::new(0, 0), Err(Error::Config(_))));
        assert!(Chunker::new(10, 9).is_ok());
    }

    #[test]
    fn test_chunk_ids_are_stable() {
        let text = "Test content for hashing. ".repeat(20);
        let first: Vec<_> = split(&text, "docs/a.txt", 100, 10).unwrap().collect();
        let second: Vec<_> = split(&text, "docs/a.txt", 100, 10).unwrap().collect();

        assert_eq!(first, second);
        assert_eq!(first[1].chunk_id, chunk_id("docs/a.txt", 90));
        assert_ne!(chunk_id("docs/a.txt", 0), chunk_id("docs/b.txt", 0));
        assert!(Uuid::try_parse(&first[0].chunk_id).is_ok());
    }

    #[test]
    fn test_iteration_can_restart() {
        let text = "0123456789".repeat(5);
        let chunker = Chunker::new(10, 3).unwrap();
        let chunks = chunker.split(&text, "digits.txt");

        let mut partial = chunks.clone();
        let first = partial.next().unwrap();
        drop(partial);

        let all: Vec<_> = chunks.collect();
        assert_eq!(all[0], first);
        assert_eq!(all.len(), 7);
    }

    #[test]
    fn test_content_hash() {
        let hash1 = compute_text_hash("hello world");
        let hash2 = compute_text_hash("hello world");
        let hash3 = compute_text_hash("different content");

        assert_eq!(hash1, hash2);
        assert_ne!(hash1, hash3);
    }
}
