//! Command-line interface for `mmrag`.

pub mod commands;
pub mod output;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Multimodal retrieval-augmented generation over local documents and images
#[derive(Parser, Debug)]
#[command(name = "mmrag", version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Configuration file (defaults to .mmrag/config.yaml)
    #[arg(short, long, global = true, env = "MMRAG_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Ingest documents and images into the index
    Ingest(commands::ingest::IngestArgs),

    /// Ask a question and/or search with an image
    Query(commands::query::QueryArgs),

    /// Start an interactive question and answer session
    Chat(commands::chat::ChatArgs),

    /// Show what the index contains
    Status(commands::status::StatusArgs),
}

/// Report a failed command and exit with status 1.
pub fn handle_error(err: anyhow::Error, json_mode: bool) -> ! {
    if json_mode {
        let causes: Vec<String> = err.chain().skip(1).map(ToString::to_string).collect();
        println!(
            "{}",
            serde_json::json!({ "error": err.to_string(), "causes": causes })
        );
    } else {
        eprintln!("{} {err:#}", console::style("Error:").red().bold());
    }
    std::process::exit(1);
}
