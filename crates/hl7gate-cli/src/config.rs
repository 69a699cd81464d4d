//! Gateway configuration file.
//!
//! All settings live in a single `config.toml` file at
//! `~/.config/hl7gate/config.toml` by default. Every field is optional.
//!
//! ```toml
//! [logging]
//! level = "info"
//! format = "json"
//!
//! [[listeners]]
//! name = "adt"
//! port = 2575
//!
//! [[listeners]]
//! name = "lab"
//! port = 2576
//!
//! [queue]
//! path = "/var/lib/hl7gate/queue.db"
//!
//! [monitor]
//! alert_level = 1000
//! stop_level = 10000
//! notification_target = "integration-team@example.org"
//! ```

use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use hl7gate_core::{TracingConfig, TracingOutputFormat};
use hl7gate_protocol::DEFAULT_BUFFER_LIMIT;
use hl7gate_server::{
    DEFAULT_BATCH_SIZE, DEFAULT_PORT, DEFAULT_TABLE, GatewayConfig, HandlerConfig, ListenerConfig,
    MonitorConfig, QueueConfig,
};

use crate::error::{CliError, CliResult};

// ---------------------------------------------------------------------------
// GatewaySettings (config.toml)
// ---------------------------------------------------------------------------

/// Configuration for the hl7gate gateway and tools.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewaySettings {
    /// Logging settings for `serve`.
    pub logging: LoggingSettings,

    /// TCP endpoints.
    pub listeners: Vec<ListenerSettings>,

    /// Durable queue.
    pub queue: QueueSettings,

    /// Queue depth monitor.
    pub monitor: MonitorSettings,

    /// Queue drain loop.
    pub handler: HandlerSettings,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            logging: LoggingSettings::default(),
            listeners: vec![ListenerSettings::default()],
            queue: QueueSettings::default(),
            monitor: MonitorSettings::default(),
            handler: HandlerSettings::default(),
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Level for hl7gate targets; `RUST_LOG` takes precedence.
    pub level: String,

    /// Output format: `pretty`, `compact` or `json`.
    pub format: TracingOutputFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: TracingOutputFormat::Json,
        }
    }
}

/// One TCP endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ListenerSettings {
    /// Name used in logs.
    pub name: String,

    /// Address to bind.
    pub address: IpAddr,

    /// Port to bind.
    pub port: u16,

    /// Frame buffer limit in bytes.
    pub buffer_limit: usize,

    /// Maximum concurrent connections.
    pub max_connections: usize,

    /// Acknowledgment write timeout in seconds.
    pub write_timeout_secs: u64,
}

impl Default for ListenerSettings {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            buffer_limit: DEFAULT_BUFFER_LIMIT,
            max_connections: 100,
            write_timeout_secs: 30,
        }
    }
}

impl ListenerSettings {
    fn to_listener_config(&self) -> ListenerConfig {
        ListenerConfig::new(&self.name, self.address, self.port)
            .with_buffer_limit(self.buffer_limit)
            .with_max_connections(self.max_connections)
            .with_write_timeout(Duration::from_secs(self.write_timeout_secs))
    }
}

/// Durable queue settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueSettings {
    /// Database file; defaults to the data directory.
    pub path: Option<PathBuf>,

    /// Table name.
    pub table: String,

    /// Items handed to the handler per round.
    pub batch_size: usize,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            path: None,
            table: DEFAULT_TABLE.to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl QueueSettings {
    /// Database file in effect.
    pub fn resolved_path(&self) -> PathBuf {
        self.path
            .clone()
            .unwrap_or_else(|| GatewaySettings::default_data_dir().join("queue.db"))
    }

    /// Runtime queue configuration, optionally for another database file.
    pub fn to_queue_config(&self, path_override: Option<&Path>) -> QueueConfig {
        let path = path_override
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.resolved_path());
        QueueConfig::new(path)
            .with_table(&self.table)
            .with_batch_size(self.batch_size)
    }
}

/// Queue monitor settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorSettings {
    /// Seconds between depth checks.
    pub check_interval_secs: u64,

    /// Depth at which alerts are raised.
    pub alert_level: u64,

    /// Depth at which ingestion pauses.
    pub stop_level: u64,

    /// Minimum seconds between repeated alerts.
    pub alert_interval_secs: u64,

    /// Alerts per backlog episode; 0 disables alerts.
    pub max_alerts: u32,

    /// Recipient passed to the notifier.
    pub notification_target: Option<String>,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        let defaults = MonitorConfig::default();
        Self {
            check_interval_secs: defaults.check_interval.as_secs(),
            alert_level: defaults.alert_level,
            stop_level: defaults.stop_level,
            alert_interval_secs: defaults.alert_interval.as_secs(),
            max_alerts: defaults.max_alerts,
            notification_target: None,
        }
    }
}

impl MonitorSettings {
    fn to_monitor_config(&self) -> MonitorConfig {
        let config = MonitorConfig::new(self.alert_level, self.stop_level)
            .with_check_interval(Duration::from_secs(self.check_interval_secs))
            .with_alert_pacing(
                Duration::from_secs(self.alert_interval_secs),
                self.max_alerts,
            );
        match self.notification_target {
            Some(ref target) => config.with_notification_target(target),
            None => config,
        }
    }
}

/// Handler settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HandlerSettings {
    /// Milliseconds to sleep when the queue is empty.
    pub idle_interval_ms: u64,
}

impl Default for HandlerSettings {
    fn default() -> Self {
        Self {
            idle_interval_ms: 1000,
        }
    }
}

impl GatewaySettings {
    /// Loads configuration from the default path.
    pub fn load() -> CliResult<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Loads configuration from a specific path.
    pub fn load_from(path: &Path) -> CliResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            CliError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::parse(&content)
    }

    /// Parses configuration text.
    pub fn parse(content: &str) -> CliResult<Self> {
        toml::from_str(content).map_err(|e| CliError::Config(format!("failed to parse config: {}", e)))
    }

    /// Returns the default configuration file path.
    pub fn default_path() -> PathBuf {
        Self::default_config_dir().join("config.toml")
    }

    /// Returns the default configuration directory.
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("hl7gate")
    }

    /// Returns the default data directory path.
    pub fn default_data_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("hl7gate")
    }

    /// Tracing configuration for the gateway daemon.
    pub fn tracing_config(&self) -> CliResult<TracingConfig> {
        Ok(TracingConfig::daemon()
            .with_level_name(&self.logging.level)?
            .with_format(self.logging.format))
    }

    /// Runtime configuration for the gateway, validated.
    pub fn to_gateway_config(&self) -> CliResult<GatewayConfig> {
        let config = GatewayConfig::new(self.queue.to_queue_config(None))
            .with_listeners(
                self.listeners
                    .iter()
                    .map(ListenerSettings::to_listener_config)
                    .collect(),
            )
            .with_monitor(self.monitor.to_monitor_config())
            .with_handler(HandlerConfig::new(Duration::from_millis(
                self.handler.idle_interval_ms,
            )));
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let settings = GatewaySettings::parse("").unwrap();
        assert_eq!(settings.listeners.len(), 1);
        assert_eq!(settings.listeners[0].port, 2575);
        assert_eq!(settings.queue.table, "hl7_queue");
        assert_eq!(settings.logging.format, TracingOutputFormat::Json);
        assert!(settings.to_gateway_config().is_ok());
    }

    #[test]
    fn full_file_round_trips_into_runtime_config() {
        let settings = GatewaySettings::parse(
            r#"
[logging]
level = "debug"
format = "compact"

[[listeners]]
name = "adt"
address = "127.0.0.1"
port = 6661
buffer_limit = 4096

[[listeners]]
name = "lab"
port = 6662
max_connections = 5

[queue]
path = "/tmp/gw.db"
table = "inbound"
batch_size = 16

[monitor]
check_interval_secs = 5
alert_level = 10
stop_level = 20
alert_interval_secs = 60
max_alerts = 1
notification_target = "ops"

[handler]
idle_interval_ms = 250
"#,
        )
        .unwrap();

        let config = settings.to_gateway_config().unwrap();
        assert_eq!(config.listeners.len(), 2);
        assert_eq!(config.listeners[0].socket_addr().to_string(), "127.0.0.1:6661");
        assert_eq!(config.listeners[0].buffer_limit, 4096);
        assert_eq!(config.listeners[1].max_connections, 5);
        assert_eq!(config.queue.path, PathBuf::from("/tmp/gw.db"));
        assert_eq!(config.queue.table, "inbound");
        assert_eq!(config.queue.batch_size, 16);
        assert_eq!(config.monitor.check_interval, Duration::from_secs(5));
        assert_eq!(config.monitor.stop_level, 20);
        assert_eq!(config.monitor.notification_target.as_deref(), Some("ops"));
        assert_eq!(config.handler.idle_interval, Duration::from_millis(250));

        let tracing = settings.tracing_config().unwrap();
        assert_eq!(tracing.output_format, TracingOutputFormat::Compact);
    }

    #[test]
    fn invalid_values_are_reported() {
        assert!(matches!(
            GatewaySettings::parse("[queue]\nbatch_size = \"many\""),
            Err(CliError::Config(_))
        ));

        let settings = GatewaySettings::parse("[logging]\nlevel = \"chatty\"").unwrap();
        assert!(matches!(settings.tracing_config(), Err(CliError::Tracing(_))));

        let settings = GatewaySettings::parse(
            "[[listeners]]\nname = \"a\"\n[[listeners]]\nname = \"a\"\nport = 1",
        )
        .unwrap();
        assert!(matches!(settings.to_gateway_config(), Err(CliError::Server(_))));
    }

    #[test]
    fn queue_path_override() {
        let settings = GatewaySettings::default();
        let config = settings.queue.to_queue_config(Some(Path::new("/data/other.db")));
        assert_eq!(config.path, PathBuf::from("/data/other.db"));
        assert!(settings.queue.resolved_path().ends_with("hl7gate/queue.db"));
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[handler]\nidle_interval_ms = 5\n").unwrap();

        let settings = GatewaySettings::load_from(&path).unwrap();
        assert_eq!(settings.handler.idle_interval_ms, 5);

        assert!(GatewaySettings::load_from(&dir.path().join("missing.toml")).is_err());
    }

    #[test]
    fn dump_is_valid_toml() {
        let text = toml::to_string_pretty(&GatewaySettings::default()).unwrap();
        let parsed = GatewaySettings::parse(&text).unwrap();
        assert_eq!(parsed.listeners[0].name, "default");
    }
}
