//! Port trait definitions (Hexagonal Architecture)
//!
//! - EmbeddingProvider: maps text or an image into the shared vector space
//! - Generator: produces an answer from a prompt and an optional image
//!
//! Remote backends live in `adapters`; tests substitute in-memory fakes.

pub mod embedding;
pub mod generation;

pub use embedding::EmbeddingProvider;
pub use generation::{GenerationRequest, Generator};
