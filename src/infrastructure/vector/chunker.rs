//! Text chunking service implementation
//!
//! Splits normalized document text into fixed-size character windows where
//! consecutive windows share `chunk_overlap` characters.

use anyhow::{anyhow, Result};

use crate::domain::models::{Chunk, ChunkingConfig};

const BOUNDARIES: [char; 4] = ['.', '!', '?', '\n'];

/// Character-window text chunker
pub struct Chunker {
    config: ChunkingConfig,
}

impl Chunker {
    /// Create a new chunker with default configuration
    pub fn new() -> Result<Self> {
        Self::with_config(ChunkingConfig::default())
    }

    /// Create a new chunker with custom configuration
    pub fn with_config(config: ChunkingConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| anyhow!("Invalid chunking config: {e}"))?;

        Ok(Self { config })
    }

    pub fn config(&self) -> &ChunkingConfig {
        &self.config
    }

    /// Chunk text into pieces suitable for embedding
    ///
    /// Every chunk holds at most `chunk_size` characters and the windows
    /// together cover the whole text. Without boundary snapping, chunk `i+1`
    /// starts exactly `chunk_overlap` characters before chunk `i` ends.
    pub fn chunk(&self, text: &str) -> Vec<Chunk> {
        let chars: Vec<char> = text.chars().collect();
        if chars.is_empty() {
            return Vec::new();
        }

        let size = self.config.chunk_size;
        let overlap = self.config.chunk_overlap;
        let mut chunks = Vec::new();
        let mut start = 0;

        loop {
            let mut end = (start + size).min(chars.len());

            if self.config.respect_boundaries && end < chars.len() {
                if let Some(snapped) = snap_to_boundary(&chars[start..end]) {
                    // Only shorten when the window still advances past the overlap.
                    if snapped > overlap {
                        end = start + snapped;
                    }
                }
            }

            chunks.push(Chunk {
                chunk_index: chunks.len(),
                content: chars[start..end].iter().collect(),
                start_char: start,
                end_char: end,
            });

            if end >= chars.len() {
                break;
            }

            start = end - overlap;
        }

        chunks
    }
}

/// Length of the window up to and including its last sentence boundary.
fn snap_to_boundary(window: &[char]) -> Option<usize> {
    window
        .iter()
        .rposition(|c| BOUNDARIES.contains(c))
        .map(|pos| pos + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn chunker(chunk_size: usize, chunk_overlap: usize, respect_boundaries: bool) -> Chunker {
        Chunker::with_config(ChunkingConfig {
            chunk_size,
            chunk_overlap,
            respect_boundaries,
        })
        .unwrap()
    }

    #[test]
    fn test_invalid_config() {
        assert!(Chunker::with_config(ChunkingConfig {
            chunk_size: 100,
            chunk_overlap: 150,
            respect_boundaries: false,
        })
        .is_err());
    }

    #[test]
    fn test_chunk_empty_text() {
        assert!(Chunker::new().unwrap().chunk("").is_empty());
    }

    #[test]
    fn test_chunk_short_text() {
        let chunks = Chunker::new().unwrap().chunk("The sky is blue. Grass is green.");

        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].is_first());
        assert_eq!(chunks[0].content, "The sky is blue. Grass is green.");
    }

    #[test]
    fn test_chunk_with_overlap() {
        let chunks = chunker(10, 4, false).chunk("abcdefghijklmnopqrstuvwxyz");

        let contents: Vec<&str> = chunks.iter().map(|c| c.content.as_str()).collect();
        assert_eq!(contents, vec!["abcdefghij", "ghijklmnop", "mnopqrstuv", "stuvwxyz"]);
    }

    #[test]
    fn test_fact_across_boundary_survives_whole() {
        let text = format!("{}The code is 4711.{}", "x".repeat(45), "y".repeat(40));
        let chunks = chunker(50, 20, false).chunk(&text);

        assert!(chunks.len() > 1);
        assert!(chunks.iter().any(|c| c.content.contains("The code is 4711.")));
    }

    #[test]
    fn test_multibyte_characters() {
        let chunks = chunker(3, 1, false).chunk("héllo wörld");
        assert!(chunks.iter().all(|c| c.content.chars().count() <= 3));
        assert_eq!(chunks.last().unwrap().end_char, "héllo wörld".chars().count());
    }

    #[test]
    fn test_snap_to_boundary() {
        let text = "This is a sentence. This is another one that runs on";
        let chunks = chunker(30, 5, true).chunk(text);

        assert_eq!(chunks[0].content, "This is a sentence.");
        assert_eq!(chunks[1].start_char, 19 - 5);
    }

    #[test]
    fn test_snap_to_boundary_no_boundary() {
        let window: Vec<char> = "This text has no sentence ending".chars().collect();
        assert_eq!(snap_to_boundary(&window), None);
    }

    proptest! {
        #[test]
        fn prop_windows_are_bounded_and_cover_text(
            text in "[a-z .!?\n]{0,400}",
            size in 2usize..60,
            overlap_pct in 0usize..90,
            respect in any::<bool>(),
        ) {
            let overlap = size * overlap_pct / 100;
            let chunks = chunker(size, overlap, respect).chunk(&text);
            let len = text.chars().count();

            if len == 0 {
                prop_assert!(chunks.is_empty());
            } else {
                prop_assert_eq!(chunks[0].start_char, 0);
                prop_assert_eq!(chunks.last().unwrap().end_char, len);
            }

            for (i, chunk) in chunks.iter().enumerate() {
                prop_assert_eq!(chunk.chunk_index, i);
                prop_assert!(chunk.char_len() <= size);
                prop_assert!(chunk.char_len() > 0);
                prop_assert_eq!(chunk.content.chars().count(), chunk.char_len());
            }

            for pair in chunks.windows(2) {
                prop_assert!(pair[1].start_char > pair[0].start_char);
                prop_assert_eq!(pair[0].end_char - pair[1].start_char, overlap);
            }
        }
    }
}
