//! Domain layer for the multimodal RAG engine
//!
//! Core models, the ports backends implement, and the error taxonomy.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{EmbeddingFailureKind, Modality, RagError, RagResult};
