//! Command-line interface definitions.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Relays budget alert notifications to Synapse users.
#[derive(Parser, Debug)]
#[command(name = "budget-alert-relay", version, about, long_about = None)]
pub struct Cli {
    /// Path to an optional YAML configuration file.
    #[arg(short, long, env = "CONFIG_PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Returns the log level based on verbosity flags.
    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Serve invocations from the function host's runtime API.
    Serve,

    /// Handle a single SNS event read from a file ('-' for stdin).
    Handle {
        /// Path to the event JSON.
        event: PathBuf,
    },

    /// Print the recipient id embedded in a subject line.
    #[command(name = "parse-subject")]
    ParseSubject {
        /// The notification subject.
        subject: String,
    },

    /// Display the effective configuration.
    #[command(name = "config-show")]
    ConfigShow,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_handle_with_global_flags() {
        let cli = Cli::try_parse_from([
            "budget-alert-relay",
            "handle",
            "event.json",
            "--config",
            "relay.yaml",
            "-vv",
        ])
        .unwrap();

        assert_eq!(cli.config, Some(PathBuf::from("relay.yaml")));
        assert_eq!(cli.log_level(), "trace");
        assert!(matches!(cli.command, Commands::Handle { ref event } if event == &PathBuf::from("event.json")));
    }

    #[test]
    fn parses_parse_subject() {
        let cli = Cli::try_parse_from([
            "budget-alert-relay",
            "parse-subject",
            "AWS Budgets: service-catalog_3388489 ...hold",
        ])
        .unwrap();

        assert_eq!(cli.log_level(), "info");
        assert!(matches!(cli.command, Commands::ParseSubject { .. }));
    }
}
