//! Fixed-window text chunking with overlap.
//!
//! The chunker advances through the input in windows of `chunk_size`
//! characters, stepping by `chunk_size - overlap` characters, so consecutive
//! chunks share `overlap` characters of context. Window positions are a pure
//! function of the input text and the configuration; there is no
//! content-sensitive snapping, which keeps chunk boundaries byte-identical
//! across runs.
//!
//! Edge behavior:
//! - text shorter than `chunk_size` yields exactly one chunk,
//! - empty text yields no chunks,
//! - the final window is truncated at the end of the text rather than padded.

use serde::{Deserialize, Serialize};

/// Configuration error raised when the window geometry is unusable.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ChunkingError {
    /// `chunk_size` must be at least one character.
    #[error("chunk_size must be greater than zero")]
    ZeroChunkSize,

    /// The window must advance on every step, so the overlap has to be
    /// strictly smaller than the window itself.
    #[error("overlap ({overlap}) must be smaller than chunk_size ({chunk_size})")]
    OverlapTooLarge { chunk_size: usize, overlap: usize },
}

/// Validated chunking parameters, in characters.
///
/// Construction is the only place geometry is checked: once a
/// `ChunkingConfig` exists, chunking cannot fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkingConfig {
    chunk_size: usize,
    overlap: usize,
}

impl ChunkingConfig {
    /// Create a config, rejecting `chunk_size == 0` and `overlap >= chunk_size`.
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self, ChunkingError> {
        if chunk_size == 0 {
            return Err(ChunkingError::ZeroChunkSize);
        }
        if overlap >= chunk_size {
            return Err(ChunkingError::OverlapTooLarge {
                chunk_size,
                overlap,
            });
        }
        Ok(Self {
            chunk_size,
            overlap,
        })
    }

    /// Window size in characters.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Characters shared between consecutive windows.
    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Characters the window advances per step.
    pub fn step(&self) -> usize {
        self.chunk_size - self.overlap
    }
}

/// One segment of a larger text, with its position within the sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextSpan {
    /// 0-based ordinal of this span within the chunked text.
    pub sequence: usize,
    /// Character offset (not byte offset) where this span starts.
    pub start_char: usize,
    /// The span's content, copied out of the source text.
    pub text: String,
}

/// Splits text into overlapping fixed-size character windows.
#[derive(Debug, Clone, Copy)]
pub struct TextChunker {
    config: ChunkingConfig,
}

impl TextChunker {
    pub fn new(config: ChunkingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ChunkingConfig {
        &self.config
    }

    /// Chunk `text` into overlapping windows.
    ///
    /// Windows are counted in characters but sliced on the underlying byte
    /// boundaries, so multi-byte characters are never split.
    pub fn chunk(&self, text: &str) -> Vec<TextSpan> {
        // Byte offset of every char boundary, plus the end of the text.
        let boundaries: Vec<usize> = text
            .char_indices()
            .map(|(offset, _)| offset)
            .chain(std::iter::once(text.len()))
            .collect();
        let total_chars = boundaries.len() - 1;

        if total_chars == 0 {
            return Vec::new();
        }

        let mut spans = Vec::new();
        let mut start = 0usize;
        let mut sequence = 0usize;
        loop {
            let end = (start + self.config.chunk_size).min(total_chars);
            spans.push(TextSpan {
                sequence,
                start_char: start,
                text: text[boundaries[start]..boundaries[end]].to_string(),
            });
            if end == total_chars {
                break;
            }
            start += self.config.step();
            sequence += 1;
        }
        spans
    }
}
