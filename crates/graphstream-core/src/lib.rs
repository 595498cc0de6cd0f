//! graphstream-core: Protocol types for streaming graph updates.
//!
//! This crate provides everything a graph streaming client needs that is
//! independent of how bytes are delivered:
//! - Element identifiers and attribute maps
//! - Graph mutation events and their operation codes
//! - Envelope encoding/decoding (line-delimited JSON)
//! - The hook pipeline applied to events before serialization
//! - Client configuration
//! - Common error types

pub mod config;
pub mod envelope;
pub mod error;
pub mod events;
mod finite;
pub mod hooks;
pub mod types;

pub use config::ClientConfig;
pub use error::StreamError;
pub use events::{Event, OpCode};
pub use hooks::{HookPipeline, HookStage, TimestampStage};
pub use types::{Attributes, ElementId, IntoAttributeValue, NonFinite};
