//! mmrag CLI entry point.

use anyhow::Result;
use clap::Parser;

use multimodal_rag::cli::{commands, handle_error, Cli, Commands};
use multimodal_rag::domain::models::Config;
use multimodal_rag::infrastructure::config::ConfigLoader;
use multimodal_rag::infrastructure::logging::{LogConfig, LoggerImpl};

fn load_config(cli: &Cli) -> Result<Config> {
    match &cli.config {
        Some(path) => ConfigLoader::load_from_file(path),
        None => ConfigLoader::load(),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(err) => handle_error(err, cli.json),
    };

    let _logger = match LoggerImpl::init(&LogConfig::from_settings(&config.logging)) {
        Ok(logger) => logger,
        Err(err) => handle_error(err, cli.json),
    };

    let result = match cli.command {
        Commands::Ingest(args) => commands::ingest::execute(args, &config, cli.json).await,
        Commands::Query(args) => commands::query::execute(args, &config, cli.json).await,
        Commands::Chat(args) => commands::chat::execute(args, &config, cli.json).await,
        Commands::Status(args) => commands::status::execute(args, &config, cli.json).await,
    };

    if let Err(err) = result {
        handle_error(err, cli.json);
    }
}
