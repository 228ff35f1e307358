//! org-decommission CLI
//!
//! Console front end: logs in (prompting for a second factor when asked),
//! scans the organization and, after explicit confirmation, deletes it.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use org_decommission::config::RunConfig;
use org_decommission::AssetCategory;

mod cli;

#[derive(Parser)]
#[command(name = "org-decommission")]
#[command(version)]
#[command(about = "Inventory and permanently delete every asset in an organization", long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Organization short name (overrides ORG_SHORT_NAME and the config file)
    #[arg(long, global = true)]
    org: Option<String>,

    /// Backend shard (overrides SHARD)
    #[arg(long, global = true)]
    shard: Option<String>,

    /// Public API region (overrides REGION)
    #[arg(long, global = true)]
    region: Option<String>,

    /// Enable debug logging when RUST_LOG is unset
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in, scan the organization and print the inventory
    Scan {
        #[command(flatten)]
        login: cli::LoginArgs,

        /// Print the inventory as JSON instead of a summary
        #[arg(long)]
        json: bool,
    },

    /// Scan, confirm, then delete the selected assets
    Decommission {
        #[command(flatten)]
        login: cli::LoginArgs,

        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,

        /// Only delete these categories (repeatable)
        #[arg(long = "category", value_name = "CATEGORY")]
        categories: Vec<AssetCategory>,
    },

    /// Print the effective configuration
    Config,
}

fn load_config(cli: &Cli) -> Result<RunConfig> {
    let path = cli.config.clone().unwrap_or_else(RunConfig::default_path);
    let mut config = RunConfig::load_from(&path)
        .with_context(|| format!("loading {}", path.display()))?;
    config.apply_env();
    if let Some(org) = &cli.org {
        config.org_short_name = org.clone();
    }
    if let Some(shard) = &cli.shard {
        config.shard = shard.clone();
    }
    if let Some(region) = &cli.region {
        config.region = region.clone();
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = load_config(&cli)?;

    match cli.command {
        Commands::Scan { login, json } => cli::scan::run(config, &login, json).await,
        Commands::Decommission {
            login,
            yes,
            categories,
        } => cli::decommission::run(config, &login, yes, categories).await,
        Commands::Config => {
            print!("{}", serde_yaml::to_string(&config)?);
            Ok(())
        }
    }
}
