pub mod ingest_service;
pub mod rag_service;

pub use ingest_service::{IngestReport, IngestService, SkippedFile};
pub use rag_service::MultimodalRag;
