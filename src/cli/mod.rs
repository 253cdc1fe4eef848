//! Command line interface.

mod profiles;
mod scrape;
mod serve;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::profile::Marketplace;
use crate::config::Config;

#[derive(Parser)]
#[command(name = "marketscrape")]
#[command(about = "Scrape Amazon and Flipkart product pages with a headless browser")]
#[command(version)]
pub struct Cli {
    /// Config file path (overrides auto-discovery)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape one product page and print it as JSON
    Scrape {
        /// Product page URL (short links are followed)
        url: String,
        /// Skip host detection and use this marketplace's selectors
        #[arg(short, long, value_parser = parse_marketplace)]
        marketplace: Option<Marketplace>,
        /// Do not follow redirects before loading the page
        #[arg(long)]
        no_resolve: bool,
        /// Pretty-print the JSON output
        #[arg(short, long)]
        pretty: bool,
    },

    /// Start the HTTP API server
    Serve {
        /// Address to bind: PORT, HOST, or HOST:PORT (default from config)
        #[arg(short, long)]
        bind: Option<String>,
    },

    /// List supported marketplaces
    Profiles,
}

fn parse_marketplace(s: &str) -> Result<Marketplace, String> {
    s.parse()
}

pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::load_with(cli.config.as_deref()).await;

    match cli.command {
        Commands::Scrape {
            url,
            marketplace,
            no_resolve,
            pretty,
        } => scrape::cmd_scrape(&config, &url, marketplace, !no_resolve, pretty).await,
        Commands::Serve { bind } => {
            let bind = bind.unwrap_or_else(|| config.bind.clone());
            serve::cmd_serve(&config, &bind).await
        }
        Commands::Profiles => profiles::cmd_profiles(),
    }
}
