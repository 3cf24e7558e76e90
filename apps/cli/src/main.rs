//! Grounder CLI: grounded question answering over a configured website.
//!
//! Fetches a fixed set of site pages, ranks text chunks against the question
//! with embeddings, and asks a chat model to answer only from that context,
//! with citations.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
