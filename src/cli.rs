// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, Subcommand, ValueEnum};

/// Command-line arguments for `sdaflow`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "sdaflow",
    version,
    about = "Generate and run the settlement delineation job DAG.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `Sdaflow.toml` in the current working directory.
    #[arg(long, global = true, value_name = "PATH", default_value = "Sdaflow.toml")]
    pub config: String,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `SDAFLOW_LOG` or a default level will be used.
    #[arg(long, global = true, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Run the whole pipeline: generate, schedule and merge.
    Run {
        /// Generate into an in-memory store and print the DAG; run nothing.
        #[arg(long)]
        dry_run: bool,
    },
    /// Only generate jobs into the store.
    Generate,
    /// Schedule whatever is runnable in the store.
    Schedule,
    /// Reset `Running`/`Failed` jobs to `Runnable`, then schedule.
    Resume {
        /// Only reset states; do not start the scheduler.
        #[arg(long)]
        no_schedule: bool,
    },
    /// Print job counts by state.
    Status,
    /// Remove job descriptions and clear the store.
    Cleanup,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_flags_work_after_the_subcommand() {
        let args = CliArgs::try_parse_from(["sdaflow", "run", "--dry-run", "--config", "x.toml"]).unwrap();
        assert_eq!(args.config, "x.toml");
        assert!(matches!(args.command, Command::Run { dry_run: true }));
    }

    #[test]
    fn resume_defaults_to_scheduling() {
        let args = CliArgs::try_parse_from(["sdaflow", "resume"]).unwrap();
        assert!(matches!(args.command, Command::Resume { no_schedule: false }));
        assert_eq!(args.config, "Sdaflow.toml");
    }
}
