//! Domain errors for the multimodal RAG engine.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Input modality of an embedding call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Modality {
    Text,
    Image,
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Image => write!(f, "image"),
        }
    }
}

/// Why an embedding call failed.
///
/// `InvalidInput` means this particular item was rejected (bad encoding, too large,
/// unsupported content). `Backend` means the provider itself is unusable right now
/// (unreachable, auth failure, retries exhausted).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingFailureKind {
    InvalidInput,
    Backend,
}

/// Errors that can occur anywhere in ingestion, indexing, or querying.
#[derive(Debug, Error)]
pub enum RagError {
    #[error("Empty query: provide a question, an image, or both")]
    EmptyQuery,

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Vector component {position} is not a finite number")]
    NonFiniteVector { position: usize },

    #[error("Failed to embed {modality} input: {reason}")]
    EmbeddingFailure {
        modality: Modality,
        kind: EmbeddingFailureKind,
        reason: String,
    },

    #[error("Timed out embedding {modality} input")]
    EmbeddingTimeout { modality: Modality },

    #[error("Skipped {}: {reason}", path.display())]
    IngestItem { path: PathBuf, reason: String },

    #[error(
        "Ingestion aborted at {} after {added_before_abort} item(s): {reason}",
        path.display()
    )]
    IngestBackend {
        path: PathBuf,
        added_before_abort: usize,
        reason: String,
    },

    #[error("Generation failed: {0}")]
    GenerationFailure(String),

    #[error("Timed out waiting for the generation backend")]
    GenerationTimeout,

    #[error("No index found. Run `mmrag ingest` first.")]
    IndexNotFound,

    #[error("Corrupt index: {0}")]
    CorruptIndex(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RagError {
    /// Build an embedding failure for a rejected input.
    pub fn invalid_input(modality: Modality, reason: impl Into<String>) -> Self {
        Self::EmbeddingFailure {
            modality,
            kind: EmbeddingFailureKind::InvalidInput,
            reason: reason.into(),
        }
    }

    /// Build an embedding failure for an unusable backend.
    pub fn backend(modality: Modality, reason: impl Into<String>) -> Self {
        Self::EmbeddingFailure {
            modality,
            kind: EmbeddingFailureKind::Backend,
            reason: reason.into(),
        }
    }

    /// Returns true if the error concerns a single input and a batch may continue.
    pub fn is_item_error(&self) -> bool {
        matches!(
            self,
            Self::IngestItem { .. }
                | Self::DimensionMismatch { .. }
                | Self::NonFiniteVector { .. }
                | Self::EmbeddingFailure {
                    kind: EmbeddingFailureKind::InvalidInput,
                    ..
                }
        )
    }
}

pub type RagResult<T> = Result<T, RagError>;

impl From<sqlx::Error> for RagError {
    fn from(err: sqlx::Error) -> Self {
        Self::Storage(err.to_string())
    }
}
