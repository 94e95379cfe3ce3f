//! Multimodal RAG - retrieval-augmented generation over documents and images
//!
//! Text chunks and images are embedded into one vector space, stored in a
//! brute-force cosine index persisted to `SQLite`, and retrieved as cited
//! context for a generative model.
//!
//! # Architecture
//!
//! This crate follows Clean Architecture / Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain`): models, the embedding/generation ports, errors
//! - **Adapters** (`adapters`): remote model backends and the index artifact
//! - **Infrastructure Layer** (`infrastructure`): config, logging, HTTP plumbing, the vector index
//! - **Service Layer** (`services`): ingestion pipeline and query orchestrator
//! - **CLI Layer** (`cli`): command-line interface
//!
//! # Example
//!
//! ```ignore
//! use multimodal_rag::domain::models::QueryRequest;
//!
//! let rag = multimodal_rag::cli::commands::build_rag(&config)?;
//! if rag.load_index().await? {
//!     let answer = rag.query(QueryRequest::text("What color is the sky?", 5)).await?;
//!     println!("{}", answer.answer);
//! }
//! ```

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::errors::{RagError, RagResult};
pub use domain::models::{
    Config, ImageData, NewRecord, QueryAnswer, QueryFusion, QueryRequest, RecordKind,
    ScoredRecord, SourceRecord,
};
pub use domain::ports::{EmbeddingProvider, GenerationRequest, Generator};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use infrastructure::vector::{Chunker, IndexStats, VectorIndexStore};
pub use services::{IngestReport, IngestService, MultimodalRag};
