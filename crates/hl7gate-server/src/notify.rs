//! Queue depth alerts.
//!
//! The monitor builds an [`Alert`] when the queue backs up and hands it to an
//! [`AlertNotifier`]. Delivery transports live outside this crate; the
//! shipped [`LogNotifier`] records the alert in the log.

use std::future::Future;
use std::pin::Pin;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;

use crate::error::BoxError;

/// A boxed future for dyn-compatible async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A queue backlog alert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Alert {
    /// Queue depth observed by the check that raised the alert.
    pub depth: u64,
    /// Depth at which alerts start.
    pub alert_level: u64,
    /// Depth at which ingestion stops.
    pub stop_level: u64,
    /// Whether ingestion is currently stopped.
    pub overflowing: bool,
    /// 1-based count of alerts raised in this episode.
    pub occurrence: u32,
    /// Configured recipient, opaque to the monitor.
    pub target: Option<String>,
    /// When the alert was raised.
    pub raised_at: DateTime<Utc>,
}

impl Alert {
    /// One-line summary suitable for a subject line.
    pub fn summary(&self) -> String {
        if self.overflowing {
            format!(
                "queue depth {} reached stop level {}, ingestion paused",
                self.depth, self.stop_level
            )
        } else {
            format!(
                "queue depth {} is above alert level {}",
                self.depth, self.alert_level
            )
        }
    }
}

/// Receives queue backlog alerts.
pub trait AlertNotifier: Send + Sync {
    /// Delivers one alert.
    fn notify<'a>(&'a self, alert: &'a Alert) -> BoxFuture<'a, Result<(), BoxError>>;
}

/// Notifier that writes alerts to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl AlertNotifier for LogNotifier {
    fn notify<'a>(&'a self, alert: &'a Alert) -> BoxFuture<'a, Result<(), BoxError>> {
        Box::pin(async move {
            warn!(
                depth = alert.depth,
                occurrence = alert.occurrence,
                target = alert.target.as_deref().unwrap_or("-"),
                "{}",
                alert.summary()
            );
            Ok(())
        })
    }
}
