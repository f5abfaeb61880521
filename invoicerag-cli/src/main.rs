//! # invoicerag
//!
//! Pipeline over an invoice dataset: download, chunk, build a vector
//! collection, then ask questions answered by Gemini.
//!
//! Usage:
//!   invoicerag download                  # data/invoices_data.json
//!   invoicerag chunk                     # data/chunks.json
//!   invoicerag build                     # ./vector_db/invoices_collection.json
//!   invoicerag query                     # interactive session
//!   invoicerag ask "Which vendor billed the most?"
//!   invoicerag search "Acme" -k 3        # JSON hits

mod commands;
mod config;
mod line_editor;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::config::Cli;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    commands::run(cli).await
}
