//! Command-line interface definition.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// hl7gate - HL7 v2 message gateway
#[derive(Debug, Parser)]
#[command(name = "hl7gate")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, short, env = "HL7GATE_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug output
    #[arg(long, short = 'v', global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the gateway in the foreground
    Serve,

    /// Configuration commands
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Decode a message and print its tree as JSON
    Parse {
        /// Message file, stdin when absent
        file: Option<PathBuf>,

        /// Print compact JSON
        #[arg(long)]
        compact: bool,
    },

    /// Encode a JSON tree back into a message
    Encode {
        /// JSON tree file, stdin when absent
        file: Option<PathBuf>,

        /// Keep carriage returns between segments instead of newlines
        #[arg(long)]
        raw: bool,
    },

    /// Print the acknowledgment the gateway would send for a message
    Ack {
        /// Message file, stdin when absent
        file: Option<PathBuf>,

        /// Keep carriage returns between segments instead of newlines
        #[arg(long)]
        raw: bool,
    },

    /// Send a message to a gateway and print its acknowledgment
    Send {
        /// Gateway address
        #[arg(long, short, default_value = "127.0.0.1:2575")]
        to: SocketAddr,

        /// Message file, stdin when absent
        file: Option<PathBuf>,

        /// Timeout in seconds
        #[arg(long, default_value = "10")]
        timeout: u64,
    },

    /// Inspect the durable queue
    Queue {
        /// Queue database, overrides the configured path
        #[arg(long)]
        path: Option<PathBuf>,

        #[command(subcommand)]
        action: QueueAction,
    },
}

/// Configuration actions.
#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Dump current configuration
    Dump,

    /// Validate configuration
    Validate,

    /// Show configuration file path
    Path,
}

/// Queue actions.
#[derive(Debug, Subcommand)]
pub enum QueueAction {
    /// Print the number of queued messages
    Count,

    /// Print the oldest queued messages without removing them
    Peek {
        /// Number of messages
        #[arg(long, short = 'n', default_value = "10")]
        limit: usize,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_queue_peek() {
        let cli = Cli::try_parse_from(["hl7gate", "queue", "peek", "-n", "3"]).unwrap();
        match cli.command {
            Command::Queue {
                path: None,
                action: QueueAction::Peek { limit, json },
            } => {
                assert_eq!(limit, 3);
                assert!(!json);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn parses_send_with_address() {
        let cli =
            Cli::try_parse_from(["hl7gate", "send", "--to", "10.0.0.5:6661", "msg.hl7"]).unwrap();
        match cli.command {
            Command::Send { to, file, timeout } => {
                assert_eq!(to.port(), 6661);
                assert_eq!(file, Some(PathBuf::from("msg.hl7")));
                assert_eq!(timeout, 10);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["hl7gate", "serve", "--debug", "-c", "gw.toml"]).unwrap();
        assert!(cli.debug);
        assert_eq!(cli.config, Some(PathBuf::from("gw.toml")));
    }
}
