//! Implementation of the `mmrag query` command.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use uuid::Uuid;

use super::{build_rag, read_image};
use crate::cli::output::progress::create_spinner;
use crate::cli::output::table::TableFormatter;
use crate::cli::output::{output, CommandOutput};
use crate::domain::errors::RagError;
use crate::domain::models::{Config, QueryAnswer, QueryRequest, ScoredRecord};

#[derive(Args, Debug)]
pub struct QueryArgs {
    /// Question to ask
    pub question: Option<String>,

    /// Image to search with (and show to the model)
    #[arg(long)]
    pub image: Option<PathBuf>,

    /// Number of sources to retrieve (defaults to query.top_k)
    #[arg(short = 'k', long = "top-k", value_parser = clap::value_parser!(u64).range(1..))]
    pub top_k: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct QueryOutput {
    pub query_id: Uuid,
    pub answer: String,
    pub sources: Vec<ScoredRecord>,
}

impl From<QueryAnswer> for QueryOutput {
    fn from(answer: QueryAnswer) -> Self {
        Self {
            query_id: answer.query_id,
            answer: answer.answer,
            sources: answer.sources,
        }
    }
}

impl CommandOutput for QueryOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![
            "--- Answer ---".to_string(),
            self.answer.clone(),
            String::new(),
            "--- Retrieved Sources ---".to_string(),
        ];
        if self.sources.is_empty() {
            lines.push("(none)".to_string());
        } else {
            lines.push(TableFormatter::new().format_sources(&self.sources));
        }
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(args: QueryArgs, config: &Config, json_mode: bool) -> Result<()> {
    let top_k = args
        .top_k
        .map_or(config.query.top_k, |k| usize::try_from(k).unwrap_or(usize::MAX));

    let mut request = QueryRequest {
        question: args.question,
        image: None,
        top_k,
    };
    if let Some(path) = &args.image {
        request = request.with_image(read_image(path).await?);
    }
    if request.question_text().is_none() && request.image.is_none() {
        return Err(RagError::EmptyQuery.into());
    }

    let rag = build_rag(config)?;
    if !rag.load_index().await.context("Failed to load index")? {
        return Err(RagError::IndexNotFound.into());
    }

    let spinner = create_spinner("Retrieving and generating...", json_mode);
    let result = rag.query(request).await;
    spinner.finish_and_clear();

    let answer = result.context("Query failed")?;
    output(&QueryOutput::from(answer), json_mode);
    Ok(())
}
