//! Logging infrastructure
//!
//! Structured logging using tracing and tracing-subscriber. Console output
//! goes to stderr so command output on stdout stays machine-readable.

pub mod config;
pub mod logger;

pub use config::{LogConfig, LogFormat, RotationPolicy};
pub use logger::LoggerImpl;
