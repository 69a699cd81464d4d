//! Sentinel-delimited framing for HL7 messages over TCP.
//!
//! This module defines the wire format shared by the gateway listener and
//! any client that talks to it.
//!
//! # Protocol Overview
//!
//! Each message is wrapped in two single-byte sentinels:
//! - `0x0B`: start of frame
//! - N bytes: message text, segments separated by carriage returns
//! - `0x1C`: end of frame
//!
//! Bytes between frames are ignored. An end sentinel with no preceding start
//! sentinel is a framing violation; an accumulation that reaches the buffer
//! limit is flushed and reported.
//!
//! # Example
//!
//! ```rust
//! use hl7gate_protocol::{Framer, encode_frame};
//!
//! let mut framer = Framer::default();
//! let frames = framer.push(&encode_frame("MSH|^~\\&|A"));
//! assert_eq!(frames, vec![Ok("MSH|^~\\&|A".to_string())]);
//! ```

mod error;
mod framing;

pub use error::{ProtocolError, ProtocolResult};
pub use framing::{END_OF_FRAME, Framer, START_OF_FRAME, encode_frame};

/// Default frame buffer limit (1 MB).
pub const DEFAULT_BUFFER_LIMIT: usize = 1024 * 1024;
