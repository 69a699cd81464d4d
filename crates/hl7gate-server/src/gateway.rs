//! Wires listeners, queue, monitor and handler into one running gateway.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::{error, info};

use crate::config::GatewayConfig;
use crate::error::{ServerError, ServerResult};
use crate::handler::{PayloadSink, QueueHandler};
use crate::listener::Listener;
use crate::monitor::{QueueMonitor, SharedMonitorState};
use crate::notify::AlertNotifier;
use crate::overflow::overflow_channel;
use crate::queue::DurableQueue;
use crate::signals::ShutdownHandle;

/// A gateway whose queue is open and whose endpoints are bound.
pub struct Gateway {
    queue: DurableQueue,
    listeners: Vec<Listener>,
    monitor: QueueMonitor,
    handler: QueueHandler,
}

impl Gateway {
    /// Validates the configuration, opens the queue and binds every listener.
    pub async fn bind(
        config: GatewayConfig,
        sink: Arc<dyn PayloadSink>,
        notifier: Arc<dyn AlertNotifier>,
    ) -> ServerResult<Self> {
        config.validate()?;

        let queue = DurableQueue::open(config.queue).await?;
        let (writer, flag) = overflow_channel();

        let mut listeners = Vec::with_capacity(config.listeners.len());
        for listener_config in config.listeners {
            listeners.push(Listener::bind(listener_config, queue.clone(), flag.clone()).await?);
        }

        let monitor = QueueMonitor::new(config.monitor, queue.clone(), writer, notifier);
        let handler = QueueHandler::new(config.handler, queue.clone(), sink);

        Ok(Self {
            queue,
            listeners,
            monitor,
            handler,
        })
    }

    /// The shared durable queue.
    pub fn queue(&self) -> &DurableQueue {
        &self.queue
    }

    /// Bound address of every listener, by name.
    pub fn local_addrs(&self) -> ServerResult<Vec<(String, SocketAddr)>> {
        self.listeners
            .iter()
            .map(|l| Ok((l.name().to_string(), l.local_addr()?)))
            .collect()
    }

    /// Monitor state, for inspection while running.
    pub fn monitor_state(&self) -> SharedMonitorState {
        self.monitor.state()
    }

    /// Runs every component until shutdown.
    ///
    /// A component that fails triggers shutdown for the others; the first
    /// failure is returned once everything has stopped.
    pub async fn run(self, shutdown: ShutdownHandle) -> ServerResult<()> {
        let mut tasks: JoinSet<ServerResult<()>> = JoinSet::new();

        let (monitor, handler) = (self.monitor, self.handler);
        let monitor_shutdown = shutdown.clone();
        tasks.spawn(async move {
            monitor.run(monitor_shutdown).await;
            Ok(())
        });
        let handler_shutdown = shutdown.clone();
        tasks.spawn(async move {
            handler.run(handler_shutdown).await;
            Ok(())
        });
        for listener in self.listeners {
            tasks.spawn(listener.run(shutdown.clone()));
        }

        info!(tasks = tasks.len(), "Gateway running");

        let mut first_error = None;
        while let Some(joined) = tasks.join_next().await {
            let failure = match joined {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => e,
                Err(e) => ServerError::Task {
                    name: "gateway component",
                    source: e,
                },
            };
            error!(error = %failure, "Gateway component failed, shutting down");
            shutdown.trigger();
            first_error.get_or_insert(failure);
        }

        info!("Gateway stopped");
        first_error.map_or(Ok(()), Err)
    }
}
