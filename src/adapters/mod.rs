//! Adapters for external systems: model backends and the index artifact.

pub mod embeddings;
pub mod generation;
pub mod sqlite;

use std::sync::Arc;

use anyhow::{bail, Context, Result};

use crate::domain::models::Config;
use crate::domain::ports::{EmbeddingProvider, Generator};
use embeddings::VoyageEmbeddingProvider;
use generation::AnthropicGenerator;

/// Build the embedding provider named by `embedding.provider`.
pub fn build_embedding_provider(config: &Config) -> Result<Arc<dyn EmbeddingProvider>> {
    match config.embedding.provider.as_str() {
        "voyage" => {
            let provider = VoyageEmbeddingProvider::new(
                config.embedding.clone(),
                &config.rate_limit,
                &config.retry,
            )
            .context("Failed to create Voyage embedding client")?;
            Ok(Arc::new(provider))
        }
        other => bail!("Unknown embedding provider: {other}"),
    }
}

/// Build the generator named by `generation.provider`.
pub fn build_generator(config: &Config) -> Result<Arc<dyn Generator>> {
    match config.generation.provider.as_str() {
        "anthropic" => {
            let generator = AnthropicGenerator::new(
                config.generation.clone(),
                &config.rate_limit,
                &config.retry,
            )
            .context("Failed to create Anthropic client")?;
            Ok(Arc::new(generator))
        }
        other => bail!("Unknown generation provider: {other}"),
    }
}
