//! Command implementations and the wiring they share.

pub mod chat;
pub mod ingest;
pub mod query;
pub mod status;

use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};

use crate::adapters::{build_embedding_provider, build_generator};
use crate::domain::models::{Config, ImageData};
use crate::domain::ports::EmbeddingProvider;
use crate::infrastructure::vector::VectorIndexStore;
use crate::services::MultimodalRag;

/// Empty index sized for `embedder`.
pub(crate) fn new_store(embedder: &dyn EmbeddingProvider) -> Arc<VectorIndexStore> {
    Arc::new(VectorIndexStore::new(embedder.dimension(), embedder.name()))
}

/// Orchestrator with the configured backends and an empty, not yet loaded index.
pub fn build_rag(config: &Config) -> Result<MultimodalRag> {
    let embedder = build_embedding_provider(config)?;
    let generator = build_generator(config)?;
    let store = new_store(embedder.as_ref());

    Ok(MultimodalRag::new(
        store,
        embedder,
        generator,
        config.query.clone(),
        &config.data.index_path,
    ))
}

/// Read an image file for use as a query.
pub(crate) async fn read_image(path: &Path) -> Result<ImageData> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read image {}", path.display()))?;
    ImageData::from_bytes(bytes).map_err(|reason| anyhow!("{}: {reason}", path.display()))
}
