//! Commands module
//!
//! One subcommand per fleet action.

mod fleet;

use anyhow::Result;
use clap::Subcommand;
use pipewelder_engine::Action;

use crate::config::Config;

/// Top-level CLI commands
#[derive(Subcommand, Debug, Clone, Copy)]
pub enum Commands {
    /// Validate pipeline definitions with the control plane
    Validate,
    /// Put pipeline definitions without activating them
    PutDefinition,
    /// Upload pipeline files to each pipeline's myS3InputDir
    Upload,
    /// Activate pipelines, putting definitions first when needed
    Activate,
    /// Delete pipelines from the control plane
    Delete,
}

impl Commands {
    pub fn action(self) -> Action {
        match self {
            Commands::Validate => Action::Validate,
            Commands::PutDefinition => Action::PutDefinition,
            Commands::Upload => Action::Upload,
            Commands::Activate => Action::Activate,
            Commands::Delete => Action::Delete,
        }
    }
}

/// Handle a CLI command
///
/// Every command runs its action over each selected group in turn and
/// stops at the first group with a failure.
pub async fn handle_command(command: Commands, config: &Config) -> Result<()> {
    fleet::run_action(command.action(), config).await
}
