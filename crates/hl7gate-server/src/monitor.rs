//! Queue depth monitor.
//!
//! Checks the queue depth on a fixed interval and:
//! - Sets the overflow flag at or above the stop level, clears it below
//! - Raises paced alerts at or above the alert level
//! - Records the outcome of every check in shared state

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::QueueResult;
use crate::notify::{Alert, AlertNotifier};
use crate::overflow::OverflowWriter;
use crate::queue::DurableQueue;
use crate::signals::ShutdownHandle;

/// Monitor configuration.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Time between depth checks.
    pub check_interval: Duration,
    /// Depth at which alerts are raised.
    pub alert_level: u64,
    /// Depth at which ingestion stops.
    pub stop_level: u64,
    /// Minimum time between two alerts of one episode.
    pub alert_interval: Duration,
    /// Maximum alerts per episode; zero disables alerts.
    pub max_alerts: u32,
    /// Recipient passed through to the notifier.
    pub notification_target: Option<String>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_secs(30),
            alert_level: 1_000,
            stop_level: 10_000,
            alert_interval: Duration::from_secs(900),
            max_alerts: 3,
            notification_target: None,
        }
    }
}

impl MonitorConfig {
    /// Creates a monitor config with the given levels.
    pub fn new(alert_level: u64, stop_level: u64) -> Self {
        Self {
            alert_level,
            stop_level,
            ..Default::default()
        }
    }

    /// Builder: set check interval.
    pub fn with_check_interval(mut self, interval: Duration) -> Self {
        self.check_interval = interval;
        self
    }

    /// Builder: set alert pacing.
    pub fn with_alert_pacing(mut self, interval: Duration, max_alerts: u32) -> Self {
        self.alert_interval = interval;
        self.max_alerts = max_alerts;
        self
    }

    /// Builder: set notification target.
    pub fn with_notification_target(mut self, target: impl Into<String>) -> Self {
        self.notification_target = Some(target.into());
        self
    }
}

/// What one depth check decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Observation {
    /// Whether the overflow flag should be set.
    pub overflowing: bool,
    /// Alert occurrence to raise, if any.
    pub alert: Option<u32>,
}

/// Monitor state.
#[derive(Debug, Clone, Default)]
pub struct MonitorState {
    /// Depth seen by the last successful check.
    pub last_depth: Option<u64>,
    /// Time of the last successful check.
    pub last_check: Option<DateTime<Utc>>,
    /// Overflow decision of the last successful check.
    pub overflowing: bool,
    /// Number of consecutive failed checks.
    pub consecutive_failures: u32,
    /// Last check error.
    pub last_error: Option<String>,
    /// Alerts raised in the current episode.
    pub alerts_sent: u32,
    /// When the last alert of this episode was raised.
    pub last_alert: Option<Instant>,
}

impl MonitorState {
    /// Creates an empty state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies a depth reading and decides overflow and alerting.
    ///
    /// There is no hysteresis: the flag follows `depth >= stop_level`. An
    /// alert episode starts when depth reaches `alert_level` and ends when it
    /// drops below it.
    pub fn observe(&mut self, depth: u64, config: &MonitorConfig, now: Instant) -> Observation {
        self.last_depth = Some(depth);
        self.last_check = Some(Utc::now());
        self.consecutive_failures = 0;
        self.last_error = None;
        self.overflowing = depth >= config.stop_level;

        if depth < config.alert_level {
            self.alerts_sent = 0;
            self.last_alert = None;
            return Observation {
                overflowing: self.overflowing,
                alert: None,
            };
        }

        let paced = self
            .last_alert
            .is_none_or(|last| now.duration_since(last) >= config.alert_interval);

        let alert = if self.alerts_sent < config.max_alerts && paced {
            self.alerts_sent += 1;
            self.last_alert = Some(now);
            Some(self.alerts_sent)
        } else {
            None
        };

        Observation {
            overflowing: self.overflowing,
            alert,
        }
    }

    /// Records a failed check.
    pub fn record_failure(&mut self, error: impl Into<String>) {
        self.consecutive_failures += 1;
        self.last_error = Some(error.into());
    }
}

/// Shared monitor state.
pub type SharedMonitorState = Arc<RwLock<MonitorState>>;

/// Creates a new shared monitor state.
pub fn new_monitor_state() -> SharedMonitorState {
    Arc::new(RwLock::new(MonitorState::new()))
}

/// Periodic queue depth check feeding the overflow flag.
pub struct QueueMonitor {
    config: MonitorConfig,
    queue: DurableQueue,
    writer: OverflowWriter,
    notifier: Arc<dyn AlertNotifier>,
    state: SharedMonitorState,
}

impl QueueMonitor {
    /// Creates a monitor. The writer moves in, making this the only task
    /// able to change the flag.
    pub fn new(
        config: MonitorConfig,
        queue: DurableQueue,
        writer: OverflowWriter,
        notifier: Arc<dyn AlertNotifier>,
    ) -> Self {
        Self {
            config,
            queue,
            writer,
            notifier,
            state: new_monitor_state(),
        }
    }

    /// Returns the shared state.
    pub fn state(&self) -> SharedMonitorState {
        self.state.clone()
    }

    /// Runs one depth check.
    pub async fn check(&self) -> QueueResult<u64> {
        let depth = match self.queue.count().await {
            Ok(depth) => depth,
            Err(e) => {
                self.state.write().await.record_failure(e.to_string());
                return Err(e);
            }
        };

        let observation = self
            .state
            .write()
            .await
            .observe(depth, &self.config, Instant::now());

        if self.writer.set(observation.overflowing) {
            if observation.overflowing {
                warn!(
                    depth,
                    stop_level = self.config.stop_level,
                    "Queue reached stop level, ingestion paused"
                );
            } else {
                info!(
                    depth,
                    stop_level = self.config.stop_level,
                    "Queue below stop level, ingestion resumed"
                );
            }
        }

        if let Some(occurrence) = observation.alert {
            let alert = Alert {
                depth,
                alert_level: self.config.alert_level,
                stop_level: self.config.stop_level,
                overflowing: observation.overflowing,
                occurrence,
                target: self.config.notification_target.clone(),
                raised_at: Utc::now(),
            };
            if let Err(e) = self.notifier.notify(&alert).await {
                warn!(error = %e, occurrence, "Failed to deliver queue alert");
            }
        }

        debug!(depth, overflowing = observation.overflowing, "Queue checked");
        Ok(depth)
    }

    /// Checks on every interval until shutdown.
    pub async fn run(self, shutdown: ShutdownHandle) {
        info!(
            interval_secs = self.config.check_interval.as_secs(),
            alert_level = self.config.alert_level,
            stop_level = self.config.stop_level,
            "Queue monitor started"
        );

        loop {
            if let Err(e) = self.check().await {
                warn!(error = %e, "Queue depth check failed");
            }

            tokio::select! {
                _ = tokio::time::sleep(self.config.check_interval) => {}
                _ = shutdown.wait() => break,
            }
        }

        info!("Queue monitor stopped");
    }
}
