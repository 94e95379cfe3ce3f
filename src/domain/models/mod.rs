pub mod chunking;
pub mod config;
pub mod image;
pub mod query;
pub mod record;

pub use chunking::{Chunk, ChunkingConfig};
pub use config::{
    Config, DataConfig, EmbeddingConfig, GenerationConfig, IngestConfig, LoggingConfig,
    QueryConfig, RateLimitConfig, RetryConfig,
};
pub use image::{ImageData, ImageFormat};
pub use query::{QueryAnswer, QueryContext, QueryFusion, QueryRequest};
pub use record::{NewRecord, RecordId, RecordKind, ScoredRecord, SourceRecord};
