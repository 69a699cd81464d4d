//! Core types: message tree, structural codec, acknowledgments, tracing

pub mod ack;
pub mod codec;
pub mod error;
pub mod tracing;
pub mod tree;

pub use ack::{HeaderFields, create_ack};
pub use codec::{decode, encode};
pub use error::{CodecResult, FormatError};
pub use tracing::{TracingConfig, TracingError, TracingOutputFormat, init_tracing};
pub use tree::{
    Component, ComponentValue, Document, Encoding, Field, FieldValue, HEADER_SEGMENT, Segment,
    Subcomponent,
};
