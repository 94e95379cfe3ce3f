//! Infrastructure layer module
//!
//! - Configuration management (figment)
//! - Logging infrastructure (tracing)
//! - HTTP plumbing shared by the model backends
//! - The vector index store and the text chunker

pub mod config;
pub mod http;
pub mod logging;
pub mod vector;
