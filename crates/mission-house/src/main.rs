// Copyright 2026 Mission House Contributors
// SPDX-License-Identifier: Apache-2.0

use anyhow::Result;
use clap::{Parser, Subcommand};
use mission_house::cli;
use mission_house::types::SchoolType;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "mission-house",
    about = "Mission House: property, catchment school and NAPLAN acquisition",
    version,
    after_help = "Run 'mission-house <command> --help' for details on each command."
)]
struct Cli {
    /// Configuration file (JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output results as compact JSON
    #[arg(long, global = true)]
    json: bool,

    /// Enable verbose/debug logging
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Acquire a realestate.com.au listing and enrich it with schools
    Property {
        /// Listing URL
        url: String,
        /// Save the property without looking up schools
        #[arg(long)]
        skip_schools: bool,
        /// Read the listing from a saved HTML file instead of loading it
        #[arg(long)]
        html: Option<PathBuf>,
    },
    /// Find the zoned primary and secondary schools for an address
    Schools {
        /// Street address
        address: String,
    },
    /// Look up NAPLAN results for a school
    Naplan {
        /// School name as searched on My School
        school: String,
        /// School category (primary, secondary); inferred from the name if omitted
        #[arg(long)]
        category: Option<SchoolType>,
    },
    /// Score a saved NAPLAN result set against the national benchmark
    Score {
        /// JSON file holding an assessment score set
        scores: PathBuf,
        /// School category (primary, secondary)
        #[arg(long)]
        category: SchoolType,
    },
    /// Fetch a URL over plain HTTP
    Fetch {
        /// URL to fetch
        url: String,
    },
}

fn init_tracing(verbose: bool, log_json: bool) {
    let default = if verbose { "mission_house=debug" } else { "mission_house=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if log_json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn dispatch(cli: Cli) -> Result<()> {
    let config = cli.config.as_deref();
    match cli.command {
        Commands::Property {
            url,
            skip_schools,
            html,
        } => {
            let pipeline = cli::build_pipeline(config)?;
            cli::property_cmd::run(&pipeline, &url, html.as_deref(), skip_schools).await
        }
        Commands::Schools { address } => {
            let pipeline = cli::build_pipeline(config)?;
            cli::schools_cmd::run(&pipeline, &address).await
        }
        Commands::Naplan { school, category } => {
            let pipeline = cli::build_pipeline(config)?;
            cli::naplan_cmd::run(&pipeline, &school, category).await
        }
        Commands::Score { scores, category } => cli::score_cmd::run(&scores, category).await,
        Commands::Fetch { url } => {
            let pipeline = cli::build_pipeline(config)?;
            cli::fetch_cmd::run(&pipeline, &url).await
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.json {
        cli::output::set_json();
    }
    init_tracing(cli.verbose, cli.log_json);
    tracing::debug!("mission-house v{}", env!("CARGO_PKG_VERSION"));

    let result = dispatch(cli).await;

    // 0 = success, 1 = error
    if let Err(e) = &result {
        if cli::output::is_json() {
            cli::output::print_json(&serde_json::json!({
                "error": true,
                "message": format!("{e:#}"),
            }));
        } else {
            eprintln!("  Error: {e:#}");
        }
        std::process::exit(1);
    }

    result
}
