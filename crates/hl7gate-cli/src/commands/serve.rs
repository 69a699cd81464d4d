//! Gateway daemon command.

use std::sync::Arc;

use tracing::info;

use hl7gate_server::{Gateway, LogNotifier, LoggingSink, SignalHandler};

use crate::config::GatewaySettings;
use crate::error::CliResult;

/// Runs the gateway until SIGINT or SIGTERM.
pub async fn run(settings: &GatewaySettings) -> CliResult<()> {
    let config = settings.to_gateway_config()?;
    info!(
        queue = %config.queue.path.display(),
        listeners = config.listeners.len(),
        "Starting gateway"
    );

    let gateway = Gateway::bind(config, Arc::new(LoggingSink::new()), Arc::new(LogNotifier)).await?;
    for (name, addr) in gateway.local_addrs()? {
        info!(listener = %name, %addr, "Listening");
    }

    let signals = SignalHandler::new();
    signals.spawn_listener();
    gateway.run(signals.shutdown_handle()).await?;
    Ok(())
}
