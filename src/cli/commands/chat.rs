//! Implementation of the `mmrag chat` command: a line-based interactive session.
//!
//! Each line is a question. `/image <path> [question]` searches with an image,
//! `/quit` ends the session. A failed query is reported and the session continues.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use console::style;
use tokio::io::{AsyncBufReadExt, BufReader};

use super::query::QueryOutput;
use super::{build_rag, read_image};
use crate::cli::output::progress::create_spinner;
use crate::cli::output::{output, CommandOutput};
use crate::domain::errors::RagError;
use crate::domain::models::{Config, QueryRequest};
use crate::services::MultimodalRag;

const HELP: &str = "Ask a question, or:\n  /image <path> [question]  search with an image\n  /help                     show this help\n  /quit                     leave";

#[derive(Args, Debug)]
pub struct ChatArgs {
    /// Number of sources to retrieve per question (defaults to query.top_k)
    #[arg(short = 'k', long = "top-k", value_parser = clap::value_parser!(u64).range(1..))]
    pub top_k: Option<u64>,
}

/// One parsed line of chat input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatInput {
    Empty,
    Help,
    Quit,
    Ask {
        question: Option<String>,
        image: Option<PathBuf>,
    },
}

impl ChatInput {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return Self::Empty;
        }

        let (command, rest) = line
            .split_once(char::is_whitespace)
            .map_or((line, ""), |(c, r)| (c, r.trim()));

        match command {
            "/quit" | "/exit" | "/q" => Self::Quit,
            "/help" | "/?" => Self::Help,
            "/image" => {
                let (path, question) = rest
                    .split_once(char::is_whitespace)
                    .map_or((rest, ""), |(p, q)| (p, q.trim()));
                Self::Ask {
                    question: (!question.is_empty()).then(|| question.to_string()),
                    image: (!path.is_empty()).then(|| PathBuf::from(path)),
                }
            }
            _ => Self::Ask {
                question: Some(line.to_string()),
                image: None,
            },
        }
    }
}

pub async fn execute(args: ChatArgs, config: &Config, json_mode: bool) -> Result<()> {
    let top_k = args
        .top_k
        .map_or(config.query.top_k, |k| usize::try_from(k).unwrap_or(usize::MAX));

    let rag = build_rag(config)?;
    if !rag.load_index().await.context("Failed to load index")? {
        return Err(RagError::IndexNotFound.into());
    }

    if !json_mode {
        println!(
            "{} {} records indexed. Type /help for commands.",
            style("mmrag chat").bold(),
            rag.store().count().await
        );
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        if !json_mode {
            print!("{} ", style(">").cyan().bold());
            std::io::stdout().flush().ok();
        }

        let Some(line) = lines.next_line().await.context("Failed to read input")? else {
            break;
        };

        match ChatInput::parse(&line) {
            ChatInput::Empty => {}
            ChatInput::Help => println!("{HELP}"),
            ChatInput::Quit => break,
            ChatInput::Ask { question, image } => {
                if let Err(err) = ask(&rag, question, image, top_k, json_mode).await {
                    report(&err, json_mode);
                }
            }
        }
    }

    Ok(())
}

async fn ask(
    rag: &MultimodalRag,
    question: Option<String>,
    image: Option<PathBuf>,
    top_k: usize,
    json_mode: bool,
) -> Result<()> {
    let mut request = QueryRequest {
        question,
        image: None,
        top_k,
    };
    if let Some(path) = image {
        request = request.with_image(read_image(&path).await?);
    }

    let spinner = create_spinner("Thinking...", json_mode);
    let result = rag.query(request).await;
    spinner.finish_and_clear();

    let answer = QueryOutput::from(result?);
    if json_mode {
        println!("{}", answer.to_json());
    } else {
        output(&answer, false);
        println!();
    }
    Ok(())
}

fn report(err: &anyhow::Error, json_mode: bool) {
    if json_mode {
        println!("{}", serde_json::json!({ "error": format!("{err:#}") }));
    } else {
        eprintln!("{} {err:#}", style("Error:").red().bold());
    }
}
