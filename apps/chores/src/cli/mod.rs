//! # Chores CLI Module
//!
//! This module implements the CLI interface for the chores host.
//!
//! ## Available Commands
//!
//! - `run` - Start the poll loop and the HTTP server
//! - `check` - Validate the configuration file
//! - `status` - Show persisted chore states
//! - `force` - Apply a force command to the persisted state

mod commands;

use clap::{Parser, Subcommand, ValueEnum};
use chores_core::ChoreError;
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// Chores - signal-driven household chore tracking
///
/// Chores move through inactive, pending, due, started and completed as
/// sensors report what happens in the house.
#[derive(Parser, Debug)]
#[command(name = "chores")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to the TOML configuration file
    #[arg(short = 'c', long, global = true, default_value = "chores.toml")]
    pub config: PathBuf,

    /// Path to the JSON state file
    #[arg(short = 's', long, global = true, default_value = "chores-state.json")]
    pub state: PathBuf,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the poll loop and HTTP server
    Run {
        /// Address to bind to (overrides `listen` in the config file)
        #[arg(short, long)]
        listen: Option<String>,
    },

    /// Validate the configuration file
    Check,

    /// Show chore states from the state file
    Status {
        /// Only this chore
        id: Option<String>,
    },

    /// Force a chore into a state and save the result
    Force {
        /// Chore id
        id: String,

        /// Target state
        #[arg(value_enum)]
        action: ForceAction,
    },
}

/// Target of a `force` command.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForceAction {
    Due,
    Inactive,
    Complete,
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub async fn execute(cli: Cli) -> Result<(), ChoreError> {
    let json_mode = cli.json_mode;

    match cli.command {
        Some(Commands::Run { listen }) => cmd_run(&cli.config, &cli.state, listen).await,
        Some(Commands::Check) => cmd_check(&cli.config, json_mode),
        Some(Commands::Status { id }) => {
            cmd_status(&cli.config, &cli.state, json_mode, id.as_deref())
        }
        Some(Commands::Force { id, action }) => {
            cmd_force(&cli.config, &cli.state, json_mode, &id, action)
        }
        None => cmd_status(&cli.config, &cli.state, json_mode, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_force_command() {
        let cli = Cli::try_parse_from(["chores", "--state", "s.json", "force", "laundry", "complete"])
            .expect("valid arguments");
        assert_eq!(cli.state, PathBuf::from("s.json"));
        assert!(matches!(
            cli.command,
            Some(Commands::Force { ref id, action: ForceAction::Complete }) if id == "laundry"
        ));
    }

    #[test]
    fn defaults() {
        let cli = Cli::try_parse_from(["chores"]).expect("valid arguments");
        assert_eq!(cli.config, PathBuf::from("chores.toml"));
        assert!(cli.command.is_none());
        assert!(!cli.json_mode);
    }

    #[test]
    fn rejects_unknown_force_action() {
        assert!(Cli::try_parse_from(["chores", "force", "laundry", "sideways"]).is_err());
    }
}
