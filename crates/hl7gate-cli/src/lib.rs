//! CLI, gateway client, configuration file
//!
//! This crate provides the `hl7gate` command-line interface.

pub mod cli;
pub mod client;
pub mod commands;
pub mod config;
pub mod error;

pub use cli::Cli;
pub use client::GatewayClient;
pub use config::GatewaySettings;
pub use error::{CliError, CliResult};
