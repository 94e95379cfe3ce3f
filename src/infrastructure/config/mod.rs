//! Configuration management
//!
//! Hierarchical configuration loading with figment:
//! defaults, `.mmrag/config.yaml`, `.mmrag/local.yaml`, then `MMRAG_*` env vars.

pub mod loader;

pub use loader::{ConfigError, ConfigLoader};
