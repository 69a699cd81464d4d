//! Configuration commands.

use std::path::Path;

use crate::config::GatewaySettings;
use crate::error::{CliError, CliResult};

/// Dump the current configuration to stdout.
pub fn dump(settings: &GatewaySettings, path: Option<&Path>) -> CliResult<()> {
    let toml_str = toml::to_string_pretty(settings)
        .map_err(|e| CliError::Config(format!("failed to serialize config: {}", e)))?;
    let shown = path.map_or_else(GatewaySettings::default_path, Path::to_path_buf);
    println!("# config.toml ({})", shown.display());
    println!("{}", toml_str);
    Ok(())
}

/// Validate the configuration.
pub fn validate(settings: &GatewaySettings) -> CliResult<()> {
    settings.tracing_config()?;
    let config = settings.to_gateway_config()?;

    println!(
        "{} listener(s), queue at {}",
        config.listeners.len(),
        config.queue.path.display()
    );
    println!("Configuration is valid.");
    Ok(())
}

/// Show the configuration file and data paths.
pub fn path(settings: &GatewaySettings) -> CliResult<()> {
    println!("config: {}", GatewaySettings::default_path().display());
    println!("queue:  {}", settings.queue.resolved_path().display());
    Ok(())
}
