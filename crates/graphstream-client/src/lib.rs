//! graphstream-client — emit graph mutations to a streaming graph server.
//!
//! Events are encoded as line-delimited JSON envelopes, optionally
//! buffered, and handed to a [`Transport`]: HTTP for a running
//! Gephi-compatible workspace, or any `Write` sink such as a file.

pub mod client;
pub mod error;
pub mod transport;

pub use client::{ClientBuilder, StreamingGraphClient};
pub use error::{ClientError, Result};
pub use transport::{
    HttpTransport, MemoryTransport, NullTransport, SinkTransport, Transport, TransportError,
};

pub use graphstream_core::{
    Attributes, ClientConfig, ElementId, Event, IntoAttributeValue, OpCode, StreamError,
};
