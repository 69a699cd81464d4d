//! Gateway daemon: listeners, durable queue, monitor, handler.
//!
//! This crate provides the hl7gate server components:
//! - TCP listeners that frame, store and acknowledge HL7 messages
//! - A SQLite-backed durable queue with at-least-once delivery
//! - A queue monitor that pauses ingestion when the queue backs up
//! - A handler that drains the queue into a downstream sink
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use hl7gate_server::{
//!     Gateway, GatewayConfig, LogNotifier, LoggingSink, QueueConfig, SignalHandler,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = GatewayConfig::new(QueueConfig::new("queue.db"));
//!     let gateway =
//!         Gateway::bind(config, Arc::new(LoggingSink::new()), Arc::new(LogNotifier)).await?;
//!
//!     let signals = SignalHandler::new();
//!     signals.spawn_listener();
//!     gateway.run(signals.shutdown_handle()).await?;
//!     Ok(())
//! }
//! ```

mod config;
mod error;
mod gateway;
mod handler;
mod listener;
mod monitor;
mod notify;
mod overflow;
mod queue;
mod signals;

pub use config::GatewayConfig;
pub use error::{BoxError, QueueError, QueueResult, ServerError, ServerResult};
pub use gateway::Gateway;
pub use handler::{HandlerConfig, LoggingSink, PayloadSink, QueueHandler};
pub use listener::{DEFAULT_PORT, Listener, ListenerConfig};
pub use monitor::{
    MonitorConfig, MonitorState, Observation, QueueMonitor, SharedMonitorState, new_monitor_state,
};
pub use notify::{Alert, AlertNotifier, BoxFuture, LogNotifier};
pub use overflow::{OverflowFlag, OverflowWriter, overflow_channel};
pub use queue::{DEFAULT_BATCH_SIZE, DEFAULT_TABLE, DurableQueue, QueueConfig, QueueItem};
pub use signals::{ShutdownHandle, ShutdownSignal, SignalHandler};
