//! LeadEnrich CLI: incremental enrichment of business lead files.
//!
//! Finds businesses through the places index, fills review data, profiles
//! their websites and drafts outreach emails, without re-fetching data a
//! row already has.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
