//! hl7gate CLI entry point.

use std::process::ExitCode;

use clap::Parser;

use hl7gate_cli::cli::{Cli, Command, ConfigAction, QueueAction};
use hl7gate_cli::commands;
use hl7gate_cli::config::GatewaySettings;
use hl7gate_cli::error::CliResult;
use hl7gate_core::{TracingConfig, init_tracing};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> CliResult<()> {
    let settings = match cli.config {
        Some(ref path) => GatewaySettings::load_from(path)?,
        None => GatewaySettings::load()?,
    };

    // The daemon logs per config; one-shot tools stay quiet unless asked.
    let tracing = if cli.debug {
        TracingConfig::cli_debug()
    } else if matches!(cli.command, Command::Serve) {
        settings.tracing_config()?
    } else {
        TracingConfig::cli()
    };
    init_tracing(tracing)?;

    match cli.command {
        Command::Serve => commands::serve::run(&settings).await,
        Command::Config { action } => match action {
            ConfigAction::Dump => commands::config::dump(&settings, cli.config.as_deref()),
            ConfigAction::Validate => commands::config::validate(&settings),
            ConfigAction::Path => commands::config::path(&settings),
        },
        Command::Parse { file, compact } => commands::message::parse(file.as_deref(), compact),
        Command::Encode { file, raw } => commands::message::encode_tree(file.as_deref(), raw),
        Command::Ack { file, raw } => commands::message::ack(file.as_deref(), raw),
        Command::Send { to, file, timeout } => {
            commands::message::send(to, file.as_deref(), timeout).await
        }
        Command::Queue { path, action } => match action {
            QueueAction::Count => commands::queue::count(&settings, path.as_deref()).await,
            QueueAction::Peek { limit, json } => {
                commands::queue::peek(&settings, path.as_deref(), limit, json).await
            }
        },
    }
}
