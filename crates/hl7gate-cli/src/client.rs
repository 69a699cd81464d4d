//! TCP client for sending messages to a running gateway.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, warn};

use hl7gate_protocol::{Framer, encode_frame};

use crate::error::{CliError, CliResult};

/// Client that sends one framed message per call and waits for the ack.
pub struct GatewayClient {
    addr: SocketAddr,
    timeout: Duration,
}

impl GatewayClient {
    /// Creates a new gateway client.
    pub fn new(addr: SocketAddr, timeout: Duration) -> Self {
        Self { addr, timeout }
    }

    /// Returns the gateway address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Sends a message and returns the acknowledgment text.
    pub async fn send(&self, message: &str) -> CliResult<String> {
        debug!(addr = %self.addr, "connecting to gateway");

        let stream = tokio::time::timeout(self.timeout, TcpStream::connect(self.addr))
            .await
            .map_err(|_| {
                CliError::Connection(format!(
                    "connection timed out after {}s",
                    self.timeout.as_secs()
                ))
            })?
            .map_err(|e| CliError::Connection(format!("failed to connect to {}: {}", self.addr, e)))?;

        self.exchange(stream, message).await
    }

    /// Writes one frame and reads frames until the first complete one.
    async fn exchange(&self, mut stream: TcpStream, message: &str) -> CliResult<String> {
        tokio::time::timeout(self.timeout, async {
            stream.write_all(&encode_frame(message)).await?;
            stream.flush().await
        })
        .await
        .map_err(|_| CliError::Timeout("sending message".into()))??;

        debug!("message sent, waiting for acknowledgment");

        let mut framer = Framer::default();
        let mut buf = [0u8; 4096];
        tokio::time::timeout(self.timeout, async {
            loop {
                let n = stream.read(&mut buf).await?;
                if n == 0 {
                    return Err(CliError::Connection(
                        "gateway closed the connection without acknowledging".into(),
                    ));
                }
                for outcome in framer.push(&buf[..n]) {
                    match outcome {
                        Ok(ack) => return Ok(ack),
                        Err(e) => warn!(error = %e, "ignoring malformed reply bytes"),
                    }
                }
            }
        })
        .await
        .map_err(|_| CliError::Timeout("waiting for acknowledgment".into()))?
    }
}
