//! Craft Checker: is an item worth more crafted into something, or just sold?
//!
//! Run with `--help` for the available options.

mod app;
mod domain;
mod infra;
mod ui;
mod util;

#[cfg(test)]
mod test_support;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::domain::PricingMode;

#[derive(Parser, Debug)]
#[command(name = "craft_checker")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Check a single item (exact name or numeric ID) and exit
    #[arg(short, long)]
    pub item: Option<String>,

    /// Pricing mode: instant (trade now) or listed (place orders)
    #[arg(short, long)]
    pub mode: Option<PricingMode>,

    /// API key with the `unlocks` permission, used to flag new skins
    #[arg(long, env = "GW2_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Directory holding the stored knowledge file
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Only persist item names, not recipes
    #[arg(long)]
    pub no_store_recipes: bool,

    /// Number of recipes shown per report
    #[arg(short, long)]
    pub limit: Option<usize>,

    /// Verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    match app::run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) {
    // --verbose wins over RUST_LOG.
    let filter = if verbose {
        EnvFilter::new("craft_checker=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("craft_checker=info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
