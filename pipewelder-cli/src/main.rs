//! Pipewelder CLI
//!
//! Applies one action to every pipeline of every configured group.

mod commands;
mod config;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, handle_command};
use config::{CONFIG_FILE, Config};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "pipewelder")]
#[command(version, about = "Manage AWS Data Pipelines built from one shared template", long_about = None)]
struct Cli {
    /// Configuration file listing pipeline groups
    #[arg(long, global = true, default_value = CONFIG_FILE)]
    config: PathBuf,

    /// Group within the configuration to act on; defaults to all
    #[arg(long, global = true)]
    group: Option<String>,

    /// Region for groups that do not set one
    #[arg(long, global = true, env = "AWS_DEFAULT_REGION")]
    region: Option<String>,

    /// Control plane URL, overriding the regional endpoint
    #[arg(long, global = true, env = "PIPEWELDER_ENDPOINT")]
    endpoint: Option<String>,

    /// Root directory of the object storage
    #[arg(long, global = true, env = "PIPEWELDER_STORAGE_ROOT", default_value = ".")]
    storage_root: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "pipewelder=info,pipewelder_engine=info,pipewelder_client=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let config = Config {
        config_path: cli.config,
        group: cli.group,
        region: cli.region,
        endpoint: cli.endpoint,
        storage_root: cli.storage_root,
    };

    handle_command(cli.command, &config).await
}
