//! Subcommand implementations.

pub mod config;
pub mod message;
pub mod queue;
pub mod serve;
