//! Sentinel-delimited framing.
//!
//! Each message travels between a start byte and an end byte:
//!
//! ```text
//! +------+-----------------------+------+
//! | 0x0B |  message text         | 0x1C |
//! +------+-----------------------+------+
//! ```
//!
//! Frame boundaries are decided by the sentinels alone, never by message
//! content. Reads from a socket can split a frame anywhere, so the
//! [`Framer`] carries partial data between calls.

use crate::DEFAULT_BUFFER_LIMIT;
use crate::error::{ProtocolError, ProtocolResult};

/// Start-of-frame sentinel.
pub const START_OF_FRAME: u8 = 0x0B;

/// End-of-frame sentinel.
pub const END_OF_FRAME: u8 = 0x1C;

/// Wraps a payload in frame sentinels.
///
/// # Example
///
/// ```rust
/// use hl7gate_protocol::encode_frame;
///
/// assert_eq!(encode_frame("MSA|AA|1"), b"\x0BMSA|AA|1\x1C");
/// ```
pub fn encode_frame(payload: &str) -> Vec<u8> {
    let mut buffer = Vec::with_capacity(payload.len() + 2);
    buffer.push(START_OF_FRAME);
    buffer.extend_from_slice(payload.as_bytes());
    buffer.push(END_OF_FRAME);
    buffer
}

/// Stateful scanner that turns a byte stream into frames.
///
/// One framer belongs to one connection. Bytes outside a frame are held
/// until the next sentinel decides their fate; the accumulation never grows
/// past the configured limit.
#[derive(Debug)]
pub struct Framer {
    buffer: Vec<u8>,
    limit: usize,
}

impl Default for Framer {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_LIMIT)
    }
}

impl Framer {
    /// Creates a framer whose accumulation is capped at `limit` bytes.
    pub fn new(limit: usize) -> Self {
        Self {
            buffer: Vec::new(),
            limit,
        }
    }

    /// Returns the buffer limit.
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Number of bytes carried over to the next [`push`](Self::push).
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Drops any partial frame.
    pub fn reset(&mut self) {
        self.buffer.clear();
    }

    /// Scans a chunk of bytes.
    ///
    /// Returns, in stream order, every frame completed by this chunk and
    /// every fault detected along the way. A start sentinel abandons any
    /// unterminated frame silently. Frame text is decoded lossily.
    ///
    /// ```rust
    /// use hl7gate_protocol::Framer;
    ///
    /// let mut framer = Framer::default();
    /// assert!(framer.push(b"\x0BMSH|^~\\&|A").is_empty());
    /// let frames = framer.push(b"|B\x1C");
    /// assert_eq!(frames, vec![Ok("MSH|^~\\&|A|B".to_string())]);
    /// ```
    pub fn push(&mut self, data: &[u8]) -> Vec<ProtocolResult<String>> {
        let mut results = Vec::new();

        for &byte in data {
            match byte {
                START_OF_FRAME => {
                    self.buffer.clear();
                    self.buffer.push(byte);
                }
                END_OF_FRAME => {
                    if self.buffer.first() == Some(&START_OF_FRAME) {
                        let frame = String::from_utf8_lossy(&self.buffer[1..]).into_owned();
                        results.push(Ok(frame));
                    } else {
                        results.push(Err(ProtocolError::FramingViolation {
                            discarded: self.buffer.len(),
                        }));
                    }
                    self.buffer.clear();
                }
                _ if self.buffer.len() < self.limit => self.buffer.push(byte),
                _ => {
                    self.buffer.clear();
                    results.push(Err(ProtocolError::BufferOverflow { limit: self.limit }));
                }
            }
        }

        results
    }
}
