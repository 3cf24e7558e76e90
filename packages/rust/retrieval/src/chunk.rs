//! Fixed-size overlapping text chunking.

use grounder_shared::{GrounderError, Result};

// ---------------------------------------------------------------------------
// ChunkParams
// ---------------------------------------------------------------------------

/// Segmentation parameters. Sizes and offsets count characters, not bytes;
/// slices always land on char boundaries.
#[derive(Debug, Clone, Copy)]
pub struct ChunkParams {
    /// Maximum chunk length in characters.
    pub chunk_size: usize,
    /// Characters shared between adjacent chunks. Must be < `chunk_size`.
    pub overlap: usize,
    /// Maximum number of chunks emitted.
    pub max_chunks: usize,
}

impl ChunkParams {
    /// Reject parameter combinations that would stall the cursor.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(GrounderError::config("chunk_size must be > 0"));
        }
        if self.overlap >= self.chunk_size {
            return Err(GrounderError::config(format!(
                "overlap ({}) must be smaller than chunk_size ({})",
                self.overlap, self.chunk_size
            )));
        }
        Ok(())
    }

    fn stride(&self) -> usize {
        self.chunk_size - self.overlap
    }
}

// ---------------------------------------------------------------------------
// Chunks iterator
// ---------------------------------------------------------------------------

/// Lazy iterator over a text's chunks.
///
/// Chunk *i* starts at char offset `i * (chunk_size - overlap)` and spans up
/// to `chunk_size` chars. Iteration ends when the cursor reaches the end of
/// the text or `max_chunks` chunks have been emitted. Identical input always
/// yields the identical sequence.
pub struct Chunks<'a> {
    text: &'a str,
    params: ChunkParams,
    /// Byte offset of the next chunk start; always a char boundary.
    cursor: usize,
    emitted: usize,
}

impl<'a> Iterator for Chunks<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        if self.cursor >= self.text.len() || self.emitted >= self.params.max_chunks {
            return None;
        }

        let rest = &self.text[self.cursor..];
        let end = self.cursor + byte_len_of_chars(rest, self.params.chunk_size);
        let chunk = &self.text[self.cursor..end];

        self.cursor += byte_len_of_chars(rest, self.params.stride());
        self.emitted += 1;

        Some(chunk)
    }
}

/// Chunk a text with the given parameters.
///
/// Callers must have run [`ChunkParams::validate`] beforehand (the pipeline
/// does this once at construction).
pub fn chunk_text<'a>(text: &'a str, params: &ChunkParams) -> Chunks<'a> {
    Chunks {
        text,
        params: *params,
        cursor: 0,
        emitted: 0,
    }
}

/// Byte length of the first `n` chars of `s` (all of `s` if shorter).
fn byte_len_of_chars(s: &str, n: usize) -> usize {
    match s.char_indices().nth(n) {
        Some((idx, _)) => idx,
        None => s.len(),
    }
}
