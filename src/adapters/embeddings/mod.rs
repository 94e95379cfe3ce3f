//! Multimodal embedding provider adapters.

pub mod voyage;

pub use voyage::VoyageEmbeddingProvider;
