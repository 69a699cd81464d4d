//! Queue drain loop.
//!
//! The handler is the single consumer of the durable queue. Each round hands
//! one batch to a [`PayloadSink`]; an empty queue puts it to sleep for the
//! idle interval, anything else loops straight back.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tracing::{debug, info, warn};

use hl7gate_core::decode;

use crate::error::{BoxError, QueueResult};
use crate::notify::BoxFuture;
use crate::queue::{DurableQueue, QueueItem};
use crate::signals::ShutdownHandle;

/// Downstream consumer of queued payloads.
///
/// Returning an error stops the current batch; the failed item and
/// everything after it stay queued for the next round.
pub trait PayloadSink: Send + Sync {
    /// Processes one item.
    fn deliver<'a>(&'a self, item: &'a QueueItem) -> BoxFuture<'a, Result<(), BoxError>>;
}

/// Sink that decodes each payload and logs its header.
///
/// Payloads that do not decode are logged and still count as delivered, so
/// one malformed message cannot block the queue.
#[derive(Debug, Default)]
pub struct LoggingSink {
    delivered: AtomicU64,
    malformed: AtomicU64,
}

impl LoggingSink {
    /// Creates a new logging sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Items delivered so far, malformed ones included.
    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    /// Items that failed to decode.
    pub fn malformed(&self) -> u64 {
        self.malformed.load(Ordering::Relaxed)
    }
}

impl PayloadSink for LoggingSink {
    fn deliver<'a>(&'a self, item: &'a QueueItem) -> BoxFuture<'a, Result<(), BoxError>> {
        Box::pin(async move {
            match decode(&item.payload) {
                Ok(document) => info!(
                    sequence_id = item.sequence_id,
                    message_type = document.get("MSH.9.1").unwrap_or(""),
                    trigger = document.get("MSH.9.2").unwrap_or(""),
                    control_id = document.get("MSH.10").unwrap_or(""),
                    segments = document.segments.len(),
                    "Message delivered"
                ),
                Err(e) => {
                    self.malformed.fetch_add(1, Ordering::Relaxed);
                    warn!(
                        sequence_id = item.sequence_id,
                        error = %e,
                        "Undecodable message dropped"
                    );
                }
            }
            self.delivered.fetch_add(1, Ordering::Relaxed);
            Ok(())
        })
    }
}

/// Handler configuration.
#[derive(Debug, Clone)]
pub struct HandlerConfig {
    /// Sleep between rounds when the queue is empty, or after a failed round.
    pub idle_interval: Duration,
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            idle_interval: Duration::from_secs(1),
        }
    }
}

impl HandlerConfig {
    /// Creates a handler config with the given idle interval.
    pub fn new(idle_interval: Duration) -> Self {
        Self { idle_interval }
    }
}

/// Drains the durable queue into a sink.
pub struct QueueHandler {
    config: HandlerConfig,
    queue: DurableQueue,
    sink: Arc<dyn PayloadSink>,
}

impl QueueHandler {
    /// Creates a handler. Only one handler may drain a given queue.
    pub fn new(config: HandlerConfig, queue: DurableQueue, sink: Arc<dyn PayloadSink>) -> Self {
        Self {
            config,
            queue,
            sink,
        }
    }

    /// Runs one round. Returns the number of items available in it.
    pub async fn drain_once(&self) -> QueueResult<usize> {
        let sink = &self.sink;
        self.queue
            .process_all(|item| async move { sink.deliver(&item).await })
            .await
    }

    /// Drains until shutdown. The round in flight always completes.
    pub async fn run(self, shutdown: ShutdownHandle) {
        info!(
            idle_ms = self.config.idle_interval.as_millis() as u64,
            "Queue handler started"
        );

        while !shutdown.is_shutdown() {
            let idle = match self.drain_once().await {
                Ok(0) => true,
                Ok(available) => {
                    debug!(available, "Handler round complete");
                    false
                }
                Err(e) => {
                    warn!(error = %e, "Handler round failed");
                    true
                }
            };

            if idle {
                tokio::select! {
                    _ = tokio::time::sleep(self.config.idle_interval) => {}
                    _ = shutdown.wait() => break,
                }
            } else {
                tokio::task::yield_now().await;
            }
        }

        info!("Queue handler stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use crate::queue::QueueConfig;
    use crate::signals::SignalHandler;

    #[derive(Default)]
    struct FlakySink {
        seen: Mutex<Vec<String>>,
        fail_on: Option<String>,
    }

    impl PayloadSink for FlakySink {
        fn deliver<'a>(&'a self, item: &'a QueueItem) -> BoxFuture<'a, Result<(), BoxError>> {
            Box::pin(async move {
                if self.fail_on.as_deref() == Some(item.payload.as_str()) {
                    return Err(BoxError::from("sink rejected"));
                }
                self.seen.lock().unwrap().push(item.payload.clone());
                Ok(())
            })
        }
    }

    async fn queue_with(dir: &tempfile::TempDir, payloads: &[&str]) -> DurableQueue {
        let queue = DurableQueue::open(QueueConfig::new(dir.path().join("q.db")))
            .await
            .unwrap();
        for p in payloads {
            queue.enqueue(*p).await.unwrap();
        }
        queue
    }

    #[tokio::test]
    async fn logging_sink_counts_malformed_as_delivered() {
        let sink = LoggingSink::new();
        let good = QueueItem {
            sequence_id: 1,
            payload: "MSH|^~\\&|A|B|C|D|20240101||ADT^A01|42|P|2.5\rPID|1".to_string(),
        };
        let bad = QueueItem {
            sequence_id: 2,
            payload: "garbage".to_string(),
        };

        sink.deliver(&good).await.unwrap();
        sink.deliver(&bad).await.unwrap();

        assert_eq!(sink.delivered(), 2);
        assert_eq!(sink.malformed(), 1);
    }

    #[tokio::test]
    async fn drain_once_delivers_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let queue = queue_with(&dir, &["a", "b", "c"]).await;
        let sink = Arc::new(FlakySink::default());
        let handler = QueueHandler::new(HandlerConfig::default(), queue.clone(), sink.clone());

        assert_eq!(handler.drain_once().await.unwrap(), 3);
        assert_eq!(*sink.seen.lock().unwrap(), ["a", "b", "c"]);
        assert_eq!(queue.count().await.unwrap(), 0);
        assert_eq!(handler.drain_once().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn failed_item_stays_queued() {
        let dir = tempfile::tempdir().unwrap();
        let queue = queue_with(&dir, &["a", "b", "c"]).await;
        let sink = Arc::new(FlakySink {
            fail_on: Some("b".to_string()),
            ..Default::default()
        });
        let handler = QueueHandler::new(HandlerConfig::default(), queue.clone(), sink.clone());

        assert!(handler.drain_once().await.is_err());
        assert_eq!(*sink.seen.lock().unwrap(), ["a"]);
        assert_eq!(queue.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn run_drains_then_stops_on_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let queue = queue_with(&dir, &["x", "y"]).await;
        let sink = Arc::new(LoggingSink::new());
        let handler = QueueHandler::new(
            HandlerConfig::new(Duration::from_millis(10)),
            queue.clone(),
            sink.clone(),
        );

        let signals = SignalHandler::new();
        let task = tokio::spawn(handler.run(signals.shutdown_handle()));

        tokio::time::sleep(Duration::from_millis(100)).await;
        queue.enqueue("z").await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        signals.trigger_shutdown();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(sink.delivered(), 3);
        assert_eq!(queue.count().await.unwrap(), 0);
    }
}
