//! Text chunking domain models
//!
//! Documents are split into overlapping character windows before embedding so
//! that a fact straddling a window boundary still appears whole in one chunk.

use serde::{Deserialize, Serialize};

/// Configuration for document chunking
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ChunkingConfig {
    /// Maximum size of each chunk in characters
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Characters shared by consecutive chunks
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,

    /// Shorten a window to the last sentence boundary when one exists
    /// beyond the overlap region
    #[serde(default)]
    pub respect_boundaries: bool,
}

const fn default_chunk_size() -> usize {
    1000
}

const fn default_chunk_overlap() -> usize {
    200
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            respect_boundaries: false,
        }
    }
}

impl ChunkingConfig {
    /// Create configuration for small chunks (better for precise retrieval)
    pub fn small() -> Self {
        Self {
            chunk_size: 400,
            chunk_overlap: 80,
            respect_boundaries: false,
        }
    }

    /// Fraction of each window repeated in the next one.
    pub fn overlap_fraction(&self) -> f64 {
        if self.chunk_size == 0 {
            0.0
        } else {
            self.chunk_overlap as f64 / self.chunk_size as f64
        }
    }

    /// Validate the chunking configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.chunk_size == 0 {
            return Err("chunk_size must be greater than 0".to_string());
        }

        if self.chunk_overlap >= self.chunk_size {
            return Err("chunk_overlap must be less than chunk_size".to_string());
        }

        Ok(())
    }
}

/// A chunk of text extracted from a document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Index of this chunk within the document (0-based)
    pub chunk_index: usize,

    /// The text content of this chunk
    pub content: String,

    /// Start position in the normalized document (character offset)
    pub start_char: usize,

    /// End position in the normalized document (character offset, exclusive)
    pub end_char: usize,
}

impl Chunk {
    /// Number of characters in this chunk
    pub fn char_len(&self) -> usize {
        self.end_char - self.start_char
    }

    /// Returns true if this is the first chunk
    pub fn is_first(&self) -> bool {
        self.chunk_index == 0
    }
}
