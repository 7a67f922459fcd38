//! CLI commands implementation.
//!
//! This module contains the CLI parser and dispatches to command-specific modules.

mod blacklist;
mod notify;
mod run;
mod status;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::{load_settings_with_options, LoadOptions};

#[derive(Parser)]
#[command(name = "bridgefetch")]
#[command(about = "Fetch fresh Tor bridges through a supervised Tor client")]
#[command(version)]
pub struct Cli {
    /// Config file path (overrides auto-discovery)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Data directory for state files (overrides config and environment)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Resolve relative paths from current working directory instead of config file location
    #[arg(long, global = true)]
    cwd: bool,

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
    /// Bootstrap Tor, fetch bridge listings and report new bridges
    Run {
        /// Do not send a report
        #[arg(long)]
        no_notify: bool,
        /// Maximum number of fetch cycles (overrides config)
        #[arg(long)]
        max_cycles: Option<u32>,
        /// Keep cycling until this many new bridges are found (overrides config)
        #[arg(long)]
        min_new: Option<usize>,
    },

    /// Show persisted bridge counts, history and blacklist size
    Status,

    /// Manage the entry bridge blacklist
    Blacklist {
        #[command(subcommand)]
        command: BlacklistCommands,
    },

    /// Send a failure report (for wrappers when a run crashed)
    NotifyFailure {
        /// Message to include in the report
        message: Option<String>,
    },
}

#[derive(Subcommand)]
enum BlacklistCommands {
    /// List blacklisted bridges and failure counts
    List,
    /// Remove one bridge from the blacklist, or everything when omitted
    Clear {
        /// Exact bridge line to clear
        line: Option<String>,
    },
}

/// Run the CLI.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let options = LoadOptions {
        config_path: cli.config,
        use_cwd: cli.cwd,
        data_dir: cli.data_dir,
    };
    let (settings, config) = load_settings_with_options(options).await;

    match cli.command {
        Commands::Run {
            no_notify,
            max_cycles,
            min_new,
        } => {
            let args = run::RunArgs {
                no_notify,
                max_cycles,
                min_new,
            };
            let outcome = run::cmd_run(&settings, &config, args).await?;
            if outcome.is_failure() {
                std::process::exit(1);
            }
            Ok(())
        }
        Commands::Status => status::cmd_status(&settings).await,
        Commands::Blacklist { command } => match command {
            BlacklistCommands::List => blacklist::cmd_blacklist_list(&settings).await,
            BlacklistCommands::Clear { line } => {
                blacklist::cmd_blacklist_clear(&settings, line.as_deref()).await
            }
        },
        Commands::NotifyFailure { message } => {
            notify::cmd_notify_failure(&config, message.as_deref()).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_flags() {
        let cli = Cli::try_parse_from([
            "bridgefetch",
            "--data-dir",
            "/tmp/bf",
            "run",
            "--no-notify",
            "--max-cycles",
            "3",
        ])
        .unwrap();
        assert_eq!(cli.data_dir, Some(PathBuf::from("/tmp/bf")));
        match cli.command {
            Commands::Run {
                no_notify,
                max_cycles,
                min_new,
            } => {
                assert!(no_notify);
                assert_eq!(max_cycles, Some(3));
                assert_eq!(min_new, None);
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_parse_blacklist_clear() {
        let cli = Cli::try_parse_from(["bridgefetch", "blacklist", "clear", "obfs4 A B"]).unwrap();
        match cli.command {
            Commands::Blacklist {
                command: BlacklistCommands::Clear { line },
            } => assert_eq!(line.as_deref(), Some("obfs4 A B")),
            _ => panic!("expected blacklist clear"),
        }
    }
}
