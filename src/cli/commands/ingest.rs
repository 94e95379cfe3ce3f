//! Implementation of the `mmrag ingest` command.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Args;
use serde::Serialize;

use super::new_store;
use crate::adapters::{build_embedding_provider, build_generator};
use crate::cli::output::progress::create_spinner;
use crate::cli::output::{output, CommandOutput};
use crate::domain::errors::{RagError, RagResult};
use crate::domain::models::Config;
use crate::infrastructure::vector::Chunker;
use crate::services::{IngestReport, IngestService};

#[derive(Args, Debug)]
pub struct IngestArgs {
    /// Ingest the configured documents and images directories
    #[arg(long, conflicts_with_all = ["documents", "images"])]
    pub all: bool,

    /// Document files or directories (.txt, .md, .pdf)
    #[arg(long, num_args = 1..)]
    pub documents: Vec<PathBuf>,

    /// Image files or directories (.png, .jpg, .gif, .webp)
    #[arg(long, num_args = 1..)]
    pub images: Vec<PathBuf>,
}

#[derive(Debug, Serialize)]
pub struct IngestOutput {
    pub documents: IngestReport,
    pub images: IngestReport,
    pub total_records: usize,
    pub index_path: String,
}

impl CommandOutput for IngestOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![
            format!(
                "Ingested: {} text chunks, {} images.",
                self.documents.added, self.images.added
            ),
            format!("Total vectors: {}", self.total_records),
        ];

        let replaced = self.documents.replaced + self.images.replaced;
        if replaced > 0 {
            lines.push(format!("Replaced {replaced} record(s) from re-ingested files."));
        }

        let skipped: Vec<_> = self
            .documents
            .skipped
            .iter()
            .chain(&self.images.skipped)
            .collect();
        if !skipped.is_empty() {
            lines.push(format!("\nSkipped {} file(s):", skipped.len()));
            for file in skipped {
                lines.push(format!("  - {}: {}", file.path.display(), file.reason));
            }
        }

        lines.push(format!("\nIndex saved to {}", self.index_path));
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(args: IngestArgs, config: &Config, json_mode: bool) -> Result<()> {
    if !args.all && args.documents.is_empty() && args.images.is_empty() {
        bail!("Nothing to ingest. Pass --all, --documents or --images.");
    }

    let embedder = build_embedding_provider(config)?;
    let store = new_store(embedder.as_ref());
    let index_path = Path::new(&config.data.index_path);
    store
        .load(index_path)
        .await
        .context("Existing index cannot be extended")?;

    let chunker = Chunker::with_config(config.chunking.clone())?;
    let mut service = IngestService::new(store.clone(), embedder, chunker, config.ingest.clone());
    if config.ingest.caption_images {
        service = service.with_captioner(build_generator(config)?);
    }

    let spinner = create_spinner("Ingesting...", json_mode);
    let result = run(&service, &args, config).await;
    spinner.finish_and_clear();

    let (documents, images) = match result {
        Ok(reports) => reports,
        Err(err @ RagError::IngestBackend { .. }) => {
            // Keep what was committed before the backend went away.
            store
                .save(index_path)
                .await
                .context("Failed to save partial index")?;
            return Err(err).context("Ingestion aborted");
        }
        Err(err) => return Err(err).context("Ingestion failed"),
    };

    store
        .save(index_path)
        .await
        .with_context(|| format!("Failed to save index to {}", index_path.display()))?;

    let result = IngestOutput {
        documents,
        images,
        total_records: store.count().await,
        index_path: config.data.index_path.clone(),
    };
    output(&result, json_mode);
    Ok(())
}

async fn run(
    service: &IngestService,
    args: &IngestArgs,
    config: &Config,
) -> RagResult<(IngestReport, IngestReport)> {
    if args.all {
        return service
            .ingest_all(
                Path::new(&config.data.documents_dir),
                Path::new(&config.data.images_dir),
            )
            .await;
    }

    let documents = if args.documents.is_empty() {
        IngestReport::default()
    } else {
        service.ingest_documents(&args.documents).await?
    };
    let images = if args.images.is_empty() {
        IngestReport::default()
    } else {
        service.ingest_images(&args.images).await?
    };

    Ok((documents, images))
}
