use anyhow::Result;
use clap::Parser;
use nft_marketplace_indexer::{config::IndexerProcessorConfig, processor::Processor};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "nft-marketplace-indexer")]
struct IndexerArgs {
    /// Path to the YAML config file
    #[arg(short, long)]
    config_path: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = IndexerArgs::parse();
    let config = IndexerProcessorConfig::load(&args.config_path)?;
    let processor = Processor::new(config);
    processor.run_processor().await
}
