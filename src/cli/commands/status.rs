//! Implementation of the `mmrag status` command.

use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;

use crate::cli::output::table::TableFormatter;
use crate::cli::output::{output, CommandOutput};
use crate::domain::models::Config;
use crate::infrastructure::vector::{IndexStats, VectorIndexStore};

#[derive(Args, Debug)]
pub struct StatusArgs {}

#[derive(Debug, Serialize)]
pub struct StatusOutput {
    pub index_path: String,
    pub exists: bool,
    pub provider: String,
    pub model: String,
    pub stats: Option<IndexStats>,
}

impl CommandOutput for StatusOutput {
    fn to_human(&self) -> String {
        match &self.stats {
            Some(stats) => {
                let table =
                    TableFormatter::new().format_stats(&self.index_path, stats, &self.provider);
                format!("{table}\nModel: {}", self.model)
            }
            None => format!(
                "No index found at {}. Run `mmrag ingest` first.",
                self.index_path
            ),
        }
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

/// Report the persisted index without contacting any backend.
pub async fn execute(_args: StatusArgs, config: &Config, json_mode: bool) -> Result<()> {
    let store = VectorIndexStore::new(config.embedding.dimension, config.embedding.provider.as_str());
    let exists = store
        .load(Path::new(&config.data.index_path))
        .await
        .context("Failed to read index")?;

    let result = StatusOutput {
        index_path: config.data.index_path.clone(),
        exists,
        provider: config.embedding.provider.clone(),
        model: config.embedding.model.clone(),
        stats: if exists { Some(store.stats().await) } else { None },
    };
    output(&result, json_mode);
    Ok(())
}
