//! Gateway configuration.

use std::collections::HashSet;

use crate::error::{ServerError, ServerResult};
use crate::handler::HandlerConfig;
use crate::listener::ListenerConfig;
use crate::monitor::MonitorConfig;
use crate::queue::QueueConfig;

/// Runtime configuration for a whole gateway.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// One entry per TCP endpoint.
    pub listeners: Vec<ListenerConfig>,
    /// Durable queue shared by every listener.
    pub queue: QueueConfig,
    /// Queue depth monitor.
    pub monitor: MonitorConfig,
    /// Queue drain loop.
    pub handler: HandlerConfig,
}

impl GatewayConfig {
    /// Creates a configuration with one default listener.
    pub fn new(queue: QueueConfig) -> Self {
        Self {
            listeners: vec![ListenerConfig::default()],
            queue,
            monitor: MonitorConfig::default(),
            handler: HandlerConfig::default(),
        }
    }

    /// Builder: replace the listeners.
    pub fn with_listeners(mut self, listeners: Vec<ListenerConfig>) -> Self {
        self.listeners = listeners;
        self
    }

    /// Builder: set monitor configuration.
    pub fn with_monitor(mut self, monitor: MonitorConfig) -> Self {
        self.monitor = monitor;
        self
    }

    /// Builder: set handler configuration.
    pub fn with_handler(mut self, handler: HandlerConfig) -> Self {
        self.handler = handler;
        self
    }

    /// Checks cross-field constraints.
    pub fn validate(&self) -> ServerResult<()> {
        if self.listeners.is_empty() {
            return Err(ServerError::config("at least one listener is required"));
        }

        let mut names = HashSet::new();
        let mut endpoints = HashSet::new();
        for listener in &self.listeners {
            if !names.insert(listener.name.as_str()) {
                return Err(ServerError::config(format!(
                    "duplicate listener name: {}",
                    listener.name
                )));
            }
            if listener.port != 0 && !endpoints.insert(listener.socket_addr()) {
                return Err(ServerError::config(format!(
                    "listener {} reuses endpoint {}",
                    listener.name,
                    listener.socket_addr()
                )));
            }
            if listener.buffer_limit == 0 {
                return Err(ServerError::config(format!(
                    "listener {} has a zero buffer limit",
                    listener.name
                )));
            }
        }

        if self.monitor.stop_level == 0 {
            return Err(ServerError::config("monitor stop level must be positive"));
        }
        if self.monitor.check_interval.is_zero() {
            return Err(ServerError::config("monitor check interval must be positive"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};
    use std::time::Duration;

    fn base() -> GatewayConfig {
        GatewayConfig::new(QueueConfig::new("/tmp/hl7gate-test.db"))
    }

    #[test]
    fn default_gateway_is_valid() {
        let config = base();
        assert_eq!(config.listeners.len(), 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_empty_listeners() {
        let config = base().with_listeners(Vec::new());
        assert!(matches!(config.validate(), Err(ServerError::Config { .. })));
    }

    #[test]
    fn rejects_duplicate_names_and_endpoints() {
        let ip = IpAddr::V4(Ipv4Addr::LOCALHOST);
        let dup_name = base().with_listeners(vec![
            ListenerConfig::new("adt", ip, 2575),
            ListenerConfig::new("adt", ip, 2576),
        ]);
        assert!(dup_name.validate().is_err());

        let dup_port = base().with_listeners(vec![
            ListenerConfig::new("adt", ip, 2575),
            ListenerConfig::new("lab", ip, 2575),
        ]);
        assert!(dup_port.validate().is_err());

        let ephemeral = base().with_listeners(vec![
            ListenerConfig::new("adt", ip, 0),
            ListenerConfig::new("lab", ip, 0),
        ]);
        assert!(ephemeral.validate().is_ok());
    }

    #[test]
    fn rejects_zero_monitor_settings() {
        let config = base().with_monitor(MonitorConfig::new(0, 0));
        assert!(config.validate().is_err());

        let config = base()
            .with_monitor(MonitorConfig::default().with_check_interval(Duration::ZERO));
        assert!(config.validate().is_err());
    }
}
