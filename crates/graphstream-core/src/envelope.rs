//! Envelope encoding: one compact JSON object per line, `\r\n` terminated.
//!
//! Buffered payloads are plain concatenations of envelopes. They are never
//! wrapped in an array or merged into a single object.

use serde_json::{Map, Value};

use crate::error::{Result, StreamError};
use crate::events::{Event, OpCode};
use crate::hooks::HookPipeline;

/// Terminator appended to every envelope.
pub const TERMINATOR: &str = "\r\n";

/// Encode an event mapping as a terminated envelope.
pub fn encode(mapping: &Map<String, Value>) -> Result<String> {
    let mut line = serde_json::to_string(mapping)?;
    line.push_str(TERMINATOR);
    Ok(line)
}

/// Run `event` through `hooks` and encode the result.
pub fn encode_event(event: &Event, hooks: &HookPipeline) -> Result<String> {
    encode(&hooks.apply(event.to_mapping()?))
}

/// Parse one envelope line. The terminator is optional.
pub fn decode_line(line: &str) -> Result<Map<String, Value>> {
    let trimmed = line.strip_suffix(TERMINATOR).unwrap_or(line);
    match serde_json::from_str::<Value>(trimmed)? {
        Value::Object(map) => Ok(map),
        other => Err(StreamError::MalformedEnvelope(format!(
            "expected a JSON object, got {other}"
        ))),
    }
}

/// Split a payload into its envelopes and parse each one.
///
/// Blank lines are skipped; a lone `\n` terminator is accepted as well.
pub fn decode_stream(payload: &str) -> Result<Vec<Map<String, Value>>> {
    payload
        .split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .filter(|line| !line.trim().is_empty())
        .map(decode_line)
        .collect()
}

/// The operation code of a decoded envelope, if it has a recognized one.
pub fn op_of(mapping: &Map<String, Value>) -> Option<OpCode> {
    mapping.keys().find_map(|k| k.parse().ok())
}
