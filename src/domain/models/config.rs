use serde::{Deserialize, Serialize};

use super::chunking::ChunkingConfig;
use super::query::QueryFusion;

/// Main configuration structure for mmrag
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Data locations
    #[serde(default)]
    pub data: DataConfig,

    /// Embedding backend
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Generation backend
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Document chunking
    #[serde(default)]
    pub chunking: ChunkingConfig,

    /// Ingestion behaviour
    #[serde(default)]
    pub ingest: IngestConfig,

    /// Query behaviour
    #[serde(default)]
    pub query: QueryConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Retry policy configuration
    #[serde(default)]
    pub retry: RetryConfig,
}

/// Where source files and the index live
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DataConfig {
    /// Directory scanned by `ingest --all` for text documents
    #[serde(default = "default_documents_dir")]
    pub documents_dir: String,

    /// Directory scanned by `ingest --all` for images
    #[serde(default = "default_images_dir")]
    pub images_dir: String,

    /// Path to the `SQLite` index artifact
    #[serde(default = "default_index_path")]
    pub index_path: String,
}

fn default_documents_dir() -> String {
    "data/documents".to_string()
}

fn default_images_dir() -> String {
    "data/images".to_string()
}

fn default_index_path() -> String {
    ".mmrag/index.db".to_string()
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            documents_dir: default_documents_dir(),
            images_dir: default_images_dir(),
            index_path: default_index_path(),
        }
    }
}

/// Multimodal embedding backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct EmbeddingConfig {
    /// Provider name (currently `voyage`)
    #[serde(default = "default_embedding_provider")]
    pub provider: String,

    /// API key; falls back to `VOYAGE_API_KEY`
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_embedding_base_url")]
    pub base_url: String,

    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Length of every vector the model returns
    #[serde(default = "default_dimension")]
    pub dimension: usize,

    /// Per-request HTTP timeout
    #[serde(default = "default_embedding_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_embedding_provider() -> String {
    "voyage".to_string()
}

fn default_embedding_base_url() -> String {
    "https://api.voyageai.com/v1".to_string()
}

fn default_embedding_model() -> String {
    "voyage-multimodal-3".to_string()
}

const fn default_dimension() -> usize {
    1024
}

const fn default_embedding_timeout_secs() -> u64 {
    30
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            api_key: None,
            base_url: default_embedding_base_url(),
            model: default_embedding_model(),
            dimension: default_dimension(),
            timeout_secs: default_embedding_timeout_secs(),
        }
    }
}

/// Generation backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct GenerationConfig {
    /// Provider name (currently `anthropic`)
    #[serde(default = "default_generation_provider")]
    pub provider: String,

    /// API key; falls back to `ANTHROPIC_API_KEY`
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_generation_base_url")]
    pub base_url: String,

    #[serde(default = "default_generation_model")]
    pub model: String,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Per-request HTTP timeout
    #[serde(default = "default_generation_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_generation_provider() -> String {
    "anthropic".to_string()
}

fn default_generation_base_url() -> String {
    "https://api.anthropic.com".to_string()
}

fn default_generation_model() -> String {
    "claude-sonnet-4-20250514".to_string()
}

const fn default_max_tokens() -> u32 {
    1024
}

const fn default_temperature() -> f32 {
    0.2
}

const fn default_generation_timeout_secs() -> u64 {
    120
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: default_generation_provider(),
            api_key: None,
            base_url: default_generation_base_url(),
            model: default_generation_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            timeout_secs: default_generation_timeout_secs(),
        }
    }
}

/// Ingestion configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct IngestConfig {
    /// Embedding calls in flight at once (chunks of one document, or image files)
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Replace earlier records of a re-ingested file instead of appending
    #[serde(default = "default_true")]
    pub replace_existing: bool,

    /// Ask the generator for an image caption to store as record content
    #[serde(default)]
    pub caption_images: bool,
}

const fn default_concurrency() -> usize {
    4
}

const fn default_true() -> bool {
    true
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            replace_existing: true,
            caption_images: false,
        }
    }
}

/// Query configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct QueryConfig {
    /// Records passed to generation when the caller does not say
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Cap on hits from one source (0 disables the cap)
    #[serde(default = "default_max_chunks_per_source")]
    pub max_chunks_per_source: usize,

    /// Search `top_k * oversample` candidates before the per-source cap
    #[serde(default = "default_oversample")]
    pub oversample: usize,

    /// Upper bound on assembled context length, in characters
    #[serde(default = "default_max_context_chars")]
    pub max_context_chars: usize,

    #[serde(default)]
    pub fusion: QueryFusion,

    /// Question sent with an image-only query
    #[serde(default = "default_image_prompt")]
    pub default_image_prompt: String,

    #[serde(default = "default_embed_timeout_secs")]
    pub embed_timeout_secs: u64,

    #[serde(default = "default_generation_timeout_secs")]
    pub generation_timeout_secs: u64,
}

const fn default_top_k() -> usize {
    5
}

const fn default_max_chunks_per_source() -> usize {
    2
}

const fn default_oversample() -> usize {
    3
}

const fn default_max_context_chars() -> usize {
    8000
}

fn default_image_prompt() -> String {
    "What is in this image?".to_string()
}

const fn default_embed_timeout_secs() -> u64 {
    30
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            max_chunks_per_source: default_max_chunks_per_source(),
            oversample: default_oversample(),
            max_context_chars: default_max_context_chars(),
            fusion: QueryFusion::default(),
            default_image_prompt: default_image_prompt(),
            embed_timeout_secs: default_embed_timeout_secs(),
            generation_timeout_secs: default_generation_timeout_secs(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Directory for rolling log files; none disables file output
    #[serde(default)]
    pub log_dir: Option<String>,

    /// File rotation: daily, hourly, never
    #[serde(default = "default_rotation")]
    pub rotation: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_rotation() -> String {
    "daily".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
            rotation: default_rotation(),
        }
    }
}

/// Rate limiting configuration, applied per backend
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RateLimitConfig {
    /// Requests per second allowed
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: f64,

    /// Burst size for token bucket
    #[serde(default = "default_burst_size")]
    pub burst_size: u32,
}

const fn default_requests_per_second() -> f64 {
    5.0
}

const fn default_burst_size() -> u32 {
    10
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: default_requests_per_second(),
            burst_size: default_burst_size(),
        }
    }
}

/// Retry policy configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RetryConfig {
    /// Maximum number of retry attempts
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Initial backoff delay in milliseconds
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Maximum backoff delay in milliseconds
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

const fn default_max_retries() -> u32 {
    3
}

const fn default_initial_backoff_ms() -> u64 {
    500
}

const fn default_max_backoff_ms() -> u64 {
    20_000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}
