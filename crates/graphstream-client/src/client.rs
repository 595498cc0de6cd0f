//! The streaming graph client: event buffering and dispatch.

use std::io::Write;

use graphstream_core::envelope::{self, TERMINATOR};
use graphstream_core::{
    Attributes, ClientConfig, ElementId, Event, HookPipeline, HookStage, TimestampStage,
};

use crate::error::Result;
use crate::transport::{HttpTransport, SinkTransport, Transport};

/// Configures hooks and flushing before a client is bound to a transport.
#[derive(Default)]
pub struct ClientBuilder {
    autoflush: bool,
    enable_timestamps: bool,
    event_hook: Option<Box<dyn HookStage>>,
    stages: Vec<Box<dyn HookStage>>,
}

impl ClientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take `autoflush` and `enable_timestamps` from a loaded config.
    pub fn with_config(self, config: &ClientConfig) -> Self {
        self.autoflush(config.autoflush)
            .enable_timestamps(config.enable_timestamps)
    }

    pub fn autoflush(mut self, autoflush: bool) -> Self {
        self.autoflush = autoflush;
        self
    }

    pub fn enable_timestamps(mut self, enabled: bool) -> Self {
        self.enable_timestamps = enabled;
        self
    }

    /// The caller's enrichment hook. Runs before every other stage, so it
    /// never sees the `t` timestamp and cannot override it.
    pub fn event_hook<S: HookStage + 'static>(mut self, hook: S) -> Self {
        self.event_hook = Some(Box::new(hook));
        self
    }

    /// An additional stage, run after the event hook in the order added.
    pub fn stage<S: HookStage + 'static>(mut self, stage: S) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    pub fn build<T: Transport>(self, transport: T) -> StreamingGraphClient<T> {
        let mut hooks = HookPipeline::new();
        if let Some(hook) = self.event_hook {
            hooks.push_boxed(hook);
        }
        for stage in self.stages {
            hooks.push_boxed(stage);
        }
        if self.enable_timestamps {
            hooks.push(TimestampStage::new());
        }

        StreamingGraphClient {
            transport,
            buffer: String::new(),
            autoflush: self.autoflush,
            hooks,
        }
    }
}

/// Converts graph mutations into envelopes and delivers them.
///
/// Add/change events are appended to an internal buffer and sent when
/// flushed. Deletions and [`clean`](Self::clean) are sent on their own,
/// immediately, and leave the buffer as it is.
///
/// Not synchronized: mutation takes `&mut self`, so sharing a client
/// across threads requires an external lock.
#[derive(Debug)]
pub struct StreamingGraphClient<T: Transport> {
    transport: T,
    buffer: String,
    autoflush: bool,
    hooks: HookPipeline,
}

impl<T: Transport> StreamingGraphClient<T> {
    /// Client with no hooks and autoflush off.
    pub fn new(transport: T) -> Self {
        ClientBuilder::new().build(transport)
    }

    // ── Node / Edge Operations ───────────────────────────────────

    /// Add a node. Sent immediately when `flush` is set or autoflush is on.
    pub fn add_node(
        &mut self,
        id: impl Into<ElementId>,
        attributes: Attributes,
        flush: bool,
    ) -> Result<()> {
        self.emit(Event::add_node(id).with_attributes(attributes), flush)
    }

    /// Change a node's attributes. Same buffering as [`add_node`](Self::add_node).
    pub fn change_node(
        &mut self,
        id: impl Into<ElementId>,
        attributes: Attributes,
        flush: bool,
    ) -> Result<()> {
        self.emit(Event::change_node(id).with_attributes(attributes), flush)
    }

    /// Delete a node, bypassing the buffer.
    pub fn delete_node(&mut self, id: impl Into<ElementId>) -> Result<()> {
        self.emit(Event::delete_node(id), true)
    }

    /// Add an edge. `source`, `target` and `directed` replace any caller
    /// attributes of the same name.
    pub fn add_edge(
        &mut self,
        id: impl Into<ElementId>,
        source: impl Into<ElementId>,
        target: impl Into<ElementId>,
        directed: bool,
        attributes: Attributes,
        flush: bool,
    ) -> Result<()> {
        let event = Event::add_edge(id, source, target)
            .directed(directed)
            .with_attributes(attributes);
        self.emit(event, flush)
    }

    /// Delete an edge, bypassing the buffer.
    pub fn delete_edge(&mut self, id: impl Into<ElementId>) -> Result<()> {
        self.emit(Event::delete_edge(id), true)
    }

    /// Ask the server to delete every node, bypassing the buffer.
    pub fn clean(&mut self) -> Result<()> {
        self.emit(Event::delete_all_nodes(), true)
    }

    /// Encode `event` and either buffer it or send it directly.
    ///
    /// `flush` only matters for buffered events; deletions are always sent
    /// straight away.
    pub fn emit(&mut self, event: Event, flush: bool) -> Result<()> {
        let line = envelope::encode_event(&event, &self.hooks)?;

        if event.is_direct_send() {
            if !self.buffer.is_empty() {
                tracing::warn!(
                    op = %event.op(),
                    id = %event.key(),
                    pending_bytes = self.buffer.len(),
                    "Direct send while buffered events are unflushed"
                );
            }
            return self.dispatch(&line);
        }

        self.buffer.push_str(&line);
        tracing::debug!(
            op = %event.op(),
            id = %event.key(),
            pending_bytes = self.buffer.len(),
            "Buffered graph event"
        );

        if flush || self.autoflush {
            self.flush()?;
        }
        Ok(())
    }

    /// Send everything buffered, then clear the buffer. No-op when empty.
    ///
    /// On failure the buffer is kept so the flush can be retried.
    pub fn flush(&mut self) -> Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }

        let payload = std::mem::take(&mut self.buffer);
        match self.dispatch(&payload) {
            Ok(()) => Ok(()),
            Err(e) => {
                tracing::warn!(
                    pending_bytes = payload.len(),
                    error = %e,
                    "Flush failed, keeping buffered events"
                );
                self.buffer = payload;
                Err(e)
            }
        }
    }

    fn dispatch(&mut self, payload: &str) -> Result<()> {
        let messages = payload.matches(TERMINATOR).count();
        let response = self.transport.send(payload)?;
        tracing::debug!(
            transport = self.transport.name(),
            bytes = payload.len(),
            messages,
            response_bytes = response.as_ref().map_or(0, String::len),
            "Sent graph update"
        );
        Ok(())
    }

    // ── Accessors ────────────────────────────────────────────────

    /// Encoded envelopes waiting for the next flush.
    pub fn pending(&self) -> &str {
        &self.buffer
    }

    pub fn pending_len(&self) -> usize {
        self.buffer.len()
    }

    pub fn autoflush(&self) -> bool {
        self.autoflush
    }

    pub fn hooks(&self) -> &HookPipeline {
        &self.hooks
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Give back the transport. Unflushed events are dropped.
    pub fn into_transport(self) -> T {
        if !self.buffer.is_empty() {
            tracing::warn!(
                pending_bytes = self.buffer.len(),
                "Client dropped with unflushed events"
            );
        }
        self.transport
    }
}

impl StreamingGraphClient<HttpTransport> {
    /// Client posting to [`ClientConfig::endpoint`], with autoflush and
    /// timestamps taken from the config.
    pub fn http(config: &ClientConfig) -> Result<Self> {
        let transport = HttpTransport::from_config(config)?;
        Ok(ClientBuilder::new().with_config(config).build(transport))
    }
}

impl<W: Write> StreamingGraphClient<SinkTransport<W>> {
    /// Client writing to `out`. Autoflush is always on for sinks.
    pub fn sink(out: W) -> Self {
        Self::sink_with(ClientBuilder::new(), out)
    }

    /// Like [`sink`](Self::sink), keeping the builder's hooks; its
    /// autoflush setting is overridden.
    pub fn sink_with(builder: ClientBuilder, out: W) -> Self {
        builder.autoflush(true).build(SinkTransport::new(out))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{MemoryTransport, TransportError};
    use crate::ClientError;
    use graphstream_core::envelope::decode_stream;
    use graphstream_core::StreamError;
    use serde_json::{json, Map, Value};

    fn buffered() -> StreamingGraphClient<MemoryTransport> {
        StreamingGraphClient::new(MemoryTransport::new())
    }

    fn terminated_lines(s: &str) -> usize {
        s.matches(TERMINATOR).count()
    }

    #[test]
    fn add_node_with_flush_sends_immediately() {
        let mut client = buffered();
        client
            .add_node("a", Attributes::new().with("label", "A"), true)
            .unwrap();

        assert_eq!(
            client.transport().payloads(),
            ["{\"an\":{\"a\":{\"label\":\"A\"}}}\r\n".to_string()]
        );
        assert!(client.pending().is_empty());
    }

    #[test]
    fn unflushed_calls_only_grow_the_buffer() {
        let mut client = buffered();

        client.add_node("a", Attributes::new(), false).unwrap();
        assert_eq!(terminated_lines(client.pending()), 1);

        client
            .change_node("a", Attributes::new().with("size", 3), false)
            .unwrap();
        assert_eq!(terminated_lines(client.pending()), 2);

        client
            .add_edge("e", "a", "b", true, Attributes::new(), false)
            .unwrap();
        assert_eq!(terminated_lines(client.pending()), 3);

        assert_eq!(client.transport().sends(), 0);
        assert!(client.pending().ends_with(TERMINATOR));
    }

    #[test]
    fn flush_sends_buffer_in_call_order() {
        let mut client = buffered();
        client.add_node("a", Attributes::new(), false).unwrap();
        client.add_node("a", Attributes::new(), false).unwrap();
        client.flush().unwrap();

        assert_eq!(
            client.transport().payloads(),
            ["{\"an\":{\"a\":{}}}\r\n{\"an\":{\"a\":{}}}\r\n".to_string()]
        );
        assert!(client.pending().is_empty());
    }

    #[test]
    fn flush_on_empty_buffer_is_a_no_op() {
        let mut client = buffered();
        client.flush().unwrap();
        assert_eq!(client.transport().sends(), 0);
    }

    #[test]
    fn autoflush_overrides_flush_false() {
        let mut client = ClientBuilder::new()
            .autoflush(true)
            .build(MemoryTransport::new());

        client.add_node(1, Attributes::new(), false).unwrap();
        client.change_node(1, Attributes::new(), false).unwrap();

        assert_eq!(client.transport().sends(), 2);
        assert!(client.pending().is_empty());
    }

    #[test]
    fn deletions_send_once_and_leave_buffer_untouched() {
        let mut client = buffered();
        client.add_node("pending", Attributes::new(), false).unwrap();
        let before = client.pending().to_string();

        client.delete_node("n1").unwrap();
        client.delete_edge("e1").unwrap();
        client.clean().unwrap();

        assert_eq!(
            client.transport().payloads(),
            [
                "{\"dn\":{\"n1\":{}}}\r\n".to_string(),
                "{\"de\":{\"e1\":{}}}\r\n".to_string(),
                "{\"dn\":{\"filter\":\"ALL\"}}\r\n".to_string(),
            ]
        );
        assert_eq!(client.pending(), before);
    }

    #[test]
    fn undirected_edge_envelope() {
        let mut client = buffered();
        client
            .add_edge(
                "e1",
                "n1",
                "n2",
                false,
                Attributes::new().with("weight", 3),
                true,
            )
            .unwrap();

        assert_eq!(
            client.transport().payloads(),
            ["{\"ae\":{\"e1\":{\"weight\":3,\"source\":\"n1\",\"target\":\"n2\",\"directed\":false}}}\r\n"
                .to_string()]
        );
    }

    #[test]
    fn timestamps_are_injected_into_every_event() {
        let mut client = ClientBuilder::new()
            .enable_timestamps(true)
            .build(MemoryTransport::new());

        let now = chrono::Utc::now().timestamp();
        client.add_node("a", Attributes::new(), false).unwrap();
        client
            .add_edge("e", "a", "b", true, Attributes::new(), false)
            .unwrap();
        client.flush().unwrap();
        client.delete_node("a").unwrap();

        let payloads = client.transport().payloads().join("");
        let envelopes = decode_stream(&payloads).unwrap();
        assert_eq!(envelopes.len(), 3);
        for envelope in envelopes {
            let (_, elements) = envelope.iter().next().unwrap();
            let (_, attrs) = elements.as_object().unwrap().iter().next().unwrap();
            let t = attrs["t"].as_i64().unwrap();
            assert!((t - now).abs() <= 1, "timestamp {t} too far from {now}");
        }
    }

    #[test]
    fn caller_hook_runs_before_timestamp() {
        fn stamp_everything(mut event: Map<String, Value>) -> Map<String, Value> {
            for elements in event.values_mut() {
                if let Value::Object(elements) = elements {
                    for attrs in elements.values_mut() {
                        if let Value::Object(attrs) = attrs {
                            attrs.insert("t".into(), json!(0));
                            attrs.insert("origin".into(), json!("crawler"));
                        }
                    }
                }
            }
            event
        }

        let mut client = ClientBuilder::new()
            .enable_timestamps(true)
            .event_hook(stamp_everything)
            .build(MemoryTransport::new());
        client.add_node("a", Attributes::new(), true).unwrap();

        let envelopes = decode_stream(&client.transport().payloads()[0]).unwrap();
        let attrs = &envelopes[0]["an"]["a"];
        assert_eq!(attrs["origin"], json!("crawler"));
        assert_ne!(attrs["t"], json!(0));
        assert!(attrs["t"].as_i64().unwrap() > 0);
        assert_eq!(client.hooks().stage_names(), vec!["fn", "timestamp"]);
    }

    #[test]
    fn extra_stages_run_between_hook_and_timestamp() {
        let client = ClientBuilder::new()
            .enable_timestamps(true)
            .stage(|m: Map<String, Value>| m)
            .event_hook(|m: Map<String, Value>| m)
            .build(MemoryTransport::new());
        assert_eq!(client.hooks().len(), 3);
        assert_eq!(client.hooks().stage_names()[2], "timestamp");
    }

    #[test]
    fn failed_flush_keeps_the_buffer() {
        let mut client = buffered();
        client.add_node("a", Attributes::new(), false).unwrap();
        client.transport_mut().fail_next_send("connection refused");

        let err = client.flush().unwrap_err();
        assert!(matches!(
            err,
            ClientError::Transport(TransportError::Custom { ref transport, .. }) if transport == "memory"
        ));
        assert_eq!(client.pending(), "{\"an\":{\"a\":{}}}\r\n");

        client.flush().unwrap();
        assert_eq!(client.transport().sends(), 1);
        assert!(client.pending().is_empty());
    }

    #[test]
    fn failed_flush_on_add_surfaces_the_error() {
        let mut client = buffered();
        client.transport_mut().fail_next_send("boom");

        assert!(client.add_node("a", Attributes::new(), true).is_err());
        assert_eq!(terminated_lines(client.pending()), 1);
    }

    #[test]
    fn user_defined_transport_errors_surface_unchanged() {
        struct BoundedQueue {
            capacity: usize,
            queued: Vec<String>,
        }

        impl Transport for BoundedQueue {
            fn send(
                &mut self,
                payload: &str,
            ) -> std::result::Result<Option<String>, TransportError> {
                if self.queued.len() == self.capacity {
                    return Err(TransportError::Custom {
                        transport: self.name().to_string(),
                        source: anyhow::anyhow!("queue full ({} payloads)", self.capacity),
                    });
                }
                self.queued.push(payload.to_string());
                Ok(None)
            }

            fn name(&self) -> &str {
                "bounded-queue"
            }
        }

        let mut client = StreamingGraphClient::new(BoundedQueue {
            capacity: 1,
            queued: Vec::new(),
        });
        client.delete_node("a").unwrap();

        match client.delete_node("b").unwrap_err() {
            ClientError::Transport(TransportError::Custom { transport, source }) => {
                assert_eq!(transport, "bounded-queue");
                assert_eq!(source.to_string(), "queue full (1 payloads)");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(
            client.transport().queued,
            ["{\"dn\":{\"a\":{}}}\r\n".to_string()]
        );
    }

    #[test]
    fn non_finite_attribute_never_reaches_the_transport() {
        let mut client = ClientBuilder::new()
            .autoflush(true)
            .build(MemoryTransport::new());

        let err = client
            .add_node(
                "a",
                Attributes::new().with("w", f64::NAN).with("i", f64::INFINITY),
                true,
            )
            .unwrap_err();
        assert!(matches!(
            err,
            ClientError::Stream(StreamError::NonFiniteNumber { ref key, .. }) if key == "w"
        ));

        let err = client
            .add_edge(
                "e",
                "a",
                "b",
                true,
                Attributes::new().with("weight", f32::NEG_INFINITY),
                false,
            )
            .unwrap_err();
        assert!(matches!(
            err,
            ClientError::Stream(StreamError::NonFiniteNumber { .. })
        ));

        assert_eq!(client.transport().sends(), 0);
        assert!(client.pending().is_empty());
    }

    #[test]
    fn sink_client_always_autoflushes() {
        let builder = ClientBuilder::new().autoflush(false);
        let mut client = StreamingGraphClient::sink_with(builder, Vec::new());
        assert!(client.autoflush());

        client.add_node("a", Attributes::new(), false).unwrap();
        client.delete_node("a").unwrap();

        let written = String::from_utf8(client.into_transport().into_inner()).unwrap();
        assert_eq!(written, "{\"an\":{\"a\":{}}}\r\n{\"dn\":{\"a\":{}}}\r\n");
    }

    #[test]
    fn borrowed_transport_outlives_client() {
        let mut memory = MemoryTransport::new();
        {
            let mut client = StreamingGraphClient::new(&mut memory);
            client.delete_node("x").unwrap();
        }
        assert_eq!(memory.payloads(), ["{\"dn\":{\"x\":{}}}\r\n".to_string()]);
    }

    #[test]
    fn emit_accepts_prebuilt_events() {
        let mut client = buffered();
        let event = Event::change_node(7).with_attributes(Attributes::new().with("color", "red"));
        client.emit(event, false).unwrap();
        assert_eq!(client.pending(), "{\"cn\":{\"7\":{\"color\":\"red\"}}}\r\n");
    }
}
