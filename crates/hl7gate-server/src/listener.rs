//! TCP listener for framed HL7 traffic.
//!
//! One [`Listener`] owns one endpoint. Each accepted connection runs in its
//! own task with its own [`Framer`]; for every complete frame it builds the
//! acknowledgment, stores the frame and writes the acknowledgment back.
//! Connection tasks are capped by a semaphore and joined on shutdown.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinSet;
use tracing::{Instrument, debug, error, info, info_span, warn};

use hl7gate_core::create_ack;
use hl7gate_protocol::{DEFAULT_BUFFER_LIMIT, Framer, encode_frame};

use crate::error::{ServerError, ServerResult};
use crate::overflow::OverflowFlag;
use crate::queue::DurableQueue;
use crate::signals::ShutdownHandle;

/// Default HL7 port.
pub const DEFAULT_PORT: u16 = 2575;

const READ_CHUNK: usize = 4096;

/// Pause after a failed accept, e.g. when out of file descriptors.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Listener configuration.
#[derive(Debug, Clone)]
pub struct ListenerConfig {
    /// Name used in logs.
    pub name: String,
    /// Address to bind.
    pub bind_address: IpAddr,
    /// Port to bind; 0 picks a free port.
    pub port: u16,
    /// Frame buffer limit per connection.
    pub buffer_limit: usize,
    /// Maximum concurrent connections.
    pub max_connections: usize,
    /// Timeout for writing one acknowledgment.
    pub write_timeout: Duration,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            bind_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            buffer_limit: DEFAULT_BUFFER_LIMIT,
            max_connections: 100,
            write_timeout: Duration::from_secs(30),
        }
    }
}

impl ListenerConfig {
    /// Creates a listener configuration.
    pub fn new(name: impl Into<String>, bind_address: IpAddr, port: u16) -> Self {
        Self {
            name: name.into(),
            bind_address,
            port,
            ..Default::default()
        }
    }

    /// Builder: set frame buffer limit.
    pub fn with_buffer_limit(mut self, limit: usize) -> Self {
        self.buffer_limit = limit;
        self
    }

    /// Builder: set max connections.
    pub fn with_max_connections(mut self, max: usize) -> Self {
        self.max_connections = max.max(1);
        self
    }

    /// Builder: set write timeout.
    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Socket address to bind.
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.port)
    }
}

/// A bound TCP endpoint feeding the durable queue.
pub struct Listener {
    config: ListenerConfig,
    listener: TcpListener,
    connection_semaphore: Arc<Semaphore>,
    queue: DurableQueue,
    overflow: OverflowFlag,
}

impl Listener {
    /// Binds the configured endpoint.
    pub async fn bind(
        config: ListenerConfig,
        queue: DurableQueue,
        overflow: OverflowFlag,
    ) -> ServerResult<Self> {
        let addr = config.socket_addr();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::bind(&config.name, addr, e))?;

        info!(
            listener = %config.name,
            addr = %listener.local_addr()?,
            "Listener bound"
        );

        let connection_semaphore = Arc::new(Semaphore::new(config.max_connections));

        Ok(Self {
            config,
            listener,
            connection_semaphore,
            queue,
            overflow,
        })
    }

    /// Returns the listener name.
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Returns the bound address.
    pub fn local_addr(&self) -> ServerResult<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Waits for a connection slot and accepts one connection.
    ///
    /// Returns `None` once shutdown fires.
    async fn accept(&self, shutdown: &ShutdownHandle) -> Option<ServerResult<Connection>> {
        let permit = tokio::select! {
            permit = self.connection_semaphore.clone().acquire_owned() => permit.ok()?,
            _ = shutdown.wait() => return None,
        };

        let accepted = tokio::select! {
            accepted = self.listener.accept() => accepted,
            _ = shutdown.wait() => return None,
        };

        Some(accepted.map_err(ServerError::from).map(|(stream, peer)| {
            debug!(listener = %self.config.name, %peer, "Accepted connection");
            Connection {
                stream,
                peer,
                framer: Framer::new(self.config.buffer_limit),
                write_timeout: self.config.write_timeout,
                queue: self.queue.clone(),
                overflow: self.overflow.clone(),
                _permit: permit,
            }
        }))
    }

    /// Accepts connections until shutdown, then closes the socket and joins
    /// every connection task.
    pub async fn run(self, shutdown: ShutdownHandle) -> ServerResult<()> {
        info!(listener = %self.config.name, "Listener started");
        let mut connections = JoinSet::new();

        loop {
            tokio::select! {
                accepted = self.accept(&shutdown) => match accepted {
                    Some(Ok(connection)) => {
                        let span = info_span!(
                            "connection",
                            listener = %self.config.name,
                            peer = %connection.peer
                        );
                        connections.spawn(connection.serve(shutdown.clone()).instrument(span));
                    }
                    Some(Err(e)) => {
                        error!(listener = %self.config.name, error = %e, "Failed to accept connection");
                        if !accept_backoff(&shutdown).await {
                            break;
                        }
                    }
                    None => break,
                },
                Some(joined) = connections.join_next(), if !connections.is_empty() => {
                    if let Err(e) = joined {
                        error!(listener = %self.config.name, error = %e, "Connection task failed");
                    }
                }
            }
        }

        let Self {
            config, listener, ..
        } = self;
        drop(listener);
        info!(
            listener = %config.name,
            open = connections.len(),
            "Listener closed, waiting for connections"
        );

        while let Some(joined) = connections.join_next().await {
            if let Err(e) = joined {
                error!(listener = %config.name, error = %e, "Connection task failed");
            }
        }

        info!(listener = %config.name, "Listener stopped");
        Ok(())
    }
}

/// Sleeps for [`ACCEPT_BACKOFF`]. Returns `false` if shutdown fired first.
async fn accept_backoff(shutdown: &ShutdownHandle) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(ACCEPT_BACKOFF) => true,
        _ = shutdown.wait() => false,
    }
}

/// One accepted client connection.
struct Connection {
    stream: TcpStream,
    peer: SocketAddr,
    framer: Framer,
    write_timeout: Duration,
    queue: DurableQueue,
    overflow: OverflowFlag,
    _permit: OwnedSemaphorePermit,
}

impl Connection {
    /// Reads until the peer closes, an error ends the connection, or shutdown
    /// fires. Frames already read are always handled.
    async fn serve(mut self, shutdown: ShutdownHandle) {
        let mut buf = vec![0u8; READ_CHUNK];
        let mut frames = 0u64;

        loop {
            let read = tokio::select! {
                read = self.stream.read(&mut buf) => read,
                _ = shutdown.wait() => break,
            };

            let n = match read {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) => {
                    warn!(error = %e, "Read failed");
                    break;
                }
            };

            for outcome in self.framer.push(&buf[..n]) {
                match outcome {
                    Ok(frame) => {
                        if let Err(e) = self.handle_frame(frame).await {
                            warn!(error = %e, "Closing connection");
                            return;
                        }
                        frames += 1;
                    }
                    Err(e) => warn!(error = %e, "Framing fault"),
                }
            }
        }

        debug!(frames, "Connection closed");
    }

    /// Stores one frame and acknowledges it.
    async fn handle_frame(&mut self, frame: String) -> ServerResult<()> {
        let Some(ack) = create_ack(&frame) else {
            warn!(len = frame.len(), "Frame has no MSH header, discarded");
            return Ok(());
        };

        if self.overflow.is_set() {
            warn!("Queue overflow, frame acknowledged but not stored");
        } else {
            let sequence_id = self.queue.enqueue(frame).await?;
            debug!(sequence_id, "Frame queued");
        }

        let bytes = encode_frame(&ack);
        match tokio::time::timeout(self.write_timeout, self.stream.write_all(&bytes)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(e.into()),
            Err(_) => Err(ServerError::timeout("write acknowledgment")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overflow::overflow_channel;
    use crate::queue::QueueConfig;
    use crate::signals::SignalHandler;

    const MESSAGE: &str = "MSH|^~\\&|ADT|EPIC|QDXI|CHB|20120103161618||ADT^A03|12586919|P|2.3\rPID|1";

    fn local_config() -> ListenerConfig {
        ListenerConfig::new("test", IpAddr::V4(Ipv4Addr::LOCALHOST), 0)
    }

    async fn read_frame(stream: &mut TcpStream) -> String {
        let mut framer = Framer::default();
        let mut buf = [0u8; 512];
        loop {
            let n = stream.read(&mut buf).await.unwrap();
            assert!(n > 0, "connection closed before a frame arrived");
            if let Some(frame) = framer.push(&buf[..n]).into_iter().next() {
                return frame.unwrap();
            }
        }
    }

    #[test]
    fn default_config() {
        let config = ListenerConfig::default();
        assert_eq!(config.port, 2575);
        assert_eq!(config.buffer_limit, DEFAULT_BUFFER_LIMIT);
        assert_eq!(config.socket_addr().to_string(), "0.0.0.0:2575");
    }

    #[tokio::test]
    async fn bind_conflict_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let queue = DurableQueue::open(QueueConfig::new(dir.path().join("q.db")))
            .await
            .unwrap();
        let (_writer, flag) = overflow_channel();

        let first = Listener::bind(local_config(), queue.clone(), flag.clone())
            .await
            .unwrap();
        let port = first.local_addr().unwrap().port();

        let mut config = local_config();
        config.port = port;
        let second = Listener::bind(config, queue, flag).await;
        assert!(matches!(second, Err(ServerError::Bind { .. })));
    }

    #[tokio::test]
    async fn frame_is_queued_and_acknowledged() {
        let dir = tempfile::tempdir().unwrap();
        let queue = DurableQueue::open(QueueConfig::new(dir.path().join("q.db")))
            .await
            .unwrap();
        let (_writer, flag) = overflow_channel();
        let listener = Listener::bind(local_config(), queue.clone(), flag)
            .await
            .unwrap();
        let addr = listener.local_addr().unwrap();

        let signals = SignalHandler::new();
        let task = tokio::spawn(listener.run(signals.shutdown_handle()));

        let mut client = TcpStream::connect(addr).await.unwrap();
        client.write_all(&encode_frame(MESSAGE)).await.unwrap();

        let ack = read_frame(&mut client).await;
        assert!(ack.starts_with("MSH|^~\\&|QDXI|CHB|ADT|EPIC|"));
        assert!(ack.ends_with("\rMSA|AA|12586919"));

        let stored = queue.peek(10).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].payload, MESSAGE);

        signals.trigger_shutdown();
        drop(client);
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn overflow_sheds_but_still_acknowledges() {
        let dir = tempfile::tempdir().unwrap();
        let queue = DurableQueue::open(QueueConfig::new(dir.path().join("q.db")))
            .await
            .unwrap();
        let (writer, flag) = overflow_channel();
        writer.set(true);
        let listener = Listener::bind(local_config(), queue.clone(), flag)
            .await
            .unwrap();
        let addr = listener.local_addr().unwrap();

        let signals = SignalHandler::new();
        let task = tokio::spawn(listener.run(signals.shutdown_handle()));

        let mut client = TcpStream::connect(addr).await.unwrap();
        client.write_all(&encode_frame(MESSAGE)).await.unwrap();
        let ack = read_frame(&mut client).await;
        assert!(ack.ends_with("MSA|AA|12586919"));
        assert_eq!(queue.count().await.unwrap(), 0);

        signals.trigger_shutdown();
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn headerless_frame_is_skipped_and_connection_stays_open() {
        let dir = tempfile::tempdir().unwrap();
        let queue = DurableQueue::open(QueueConfig::new(dir.path().join("q.db")))
            .await
            .unwrap();
        let (_writer, flag) = overflow_channel();
        let listener = Listener::bind(local_config(), queue.clone(), flag)
            .await
            .unwrap();
        let addr = listener.local_addr().unwrap();

        let signals = SignalHandler::new();
        let task = tokio::spawn(listener.run(signals.shutdown_handle()));

        let mut client = TcpStream::connect(addr).await.unwrap();
        client.write_all(&encode_frame("PID|1|no header")).await.unwrap();
        client.write_all(b"\x1Cstray").await.unwrap();
        client.write_all(&encode_frame(MESSAGE)).await.unwrap();

        let ack = read_frame(&mut client).await;
        assert!(ack.ends_with("MSA|AA|12586919"));
        assert_eq!(queue.count().await.unwrap(), 1);

        signals.trigger_shutdown();
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn storage_failure_closes_connection_without_ack() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("q.db");
        let queue = DurableQueue::open(QueueConfig::new(&path)).await.unwrap();
        let (_writer, flag) = overflow_channel();
        let listener = Listener::bind(local_config(), queue.clone(), flag)
            .await
            .unwrap();
        let addr = listener.local_addr().unwrap();

        let other = rusqlite::Connection::open(&path).unwrap();
        other.execute_batch("DROP TABLE hl7_queue").unwrap();
        drop(other);

        let signals = SignalHandler::new();
        let task = tokio::spawn(listener.run(signals.shutdown_handle()));

        let mut client = TcpStream::connect(addr).await.unwrap();
        client.write_all(&encode_frame(MESSAGE)).await.unwrap();

        let mut received = Vec::new();
        tokio::time::timeout(Duration::from_secs(5), client.read_to_end(&mut received))
            .await
            .unwrap()
            .unwrap();
        assert!(received.is_empty(), "unexpected reply: {received:?}");

        signals.trigger_shutdown();
        task.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn accept_backoff_waits_unless_shutting_down() {
        let signals = SignalHandler::new();
        let handle = signals.shutdown_handle();

        let started = tokio::time::Instant::now();
        assert!(accept_backoff(&handle).await);
        assert!(started.elapsed() >= ACCEPT_BACKOFF);

        signals.trigger_shutdown();
        let started = tokio::time::Instant::now();
        assert!(!accept_backoff(&handle).await);
        assert!(started.elapsed() < ACCEPT_BACKOFF);
    }
}
