//! Vector index and text chunking

pub mod chunker;
pub mod store;

pub use chunker::Chunker;
pub use store::{IndexStats, VectorIndexStore};
