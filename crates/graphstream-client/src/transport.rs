//! Delivery of encoded payloads.
//!
//! A transport receives the raw text of one or more terminated envelopes
//! and either delivers it or fails with [`TransportError`]. There is no
//! silent-success default: the only transport that discards data is the
//! explicitly named [`NullTransport`].

use std::io::Write;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use reqwest::Url;

use graphstream_core::config::{ClientConfig, DEFAULT_BASE_URL};

/// Errors from delivering a payload.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Server rejected graph update with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Invalid endpoint URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Sink write failed: {0}")]
    Io(#[from] std::io::Error),

    /// Failure of a transport outside this crate, or of a test double.
    #[error("Transport {transport} failed: {source}")]
    Custom {
        transport: String,
        #[source]
        source: anyhow::Error,
    },
}

/// The single capability every delivery mechanism provides.
pub trait Transport {
    /// Deliver `payload` verbatim. Returns the server's response body when
    /// the transport has one.
    fn send(&mut self, payload: &str) -> Result<Option<String>, TransportError>;

    /// Short name used in logs.
    fn name(&self) -> &str;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send(&mut self, payload: &str) -> Result<Option<String>, TransportError> {
        (**self).send(payload)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn send(&mut self, payload: &str) -> Result<Option<String>, TransportError> {
        (**self).send(payload)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

// ── HTTP ──────────────────────────────────────────────────────────

/// Blocking HTTP POST to `<base_url>?operation=updateGraph`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    endpoint: Url,
}

impl HttpTransport {
    /// Transport for the local default workspace, [`DEFAULT_BASE_URL`].
    pub fn local() -> Result<Self, TransportError> {
        Self::new(DEFAULT_BASE_URL)
    }

    /// Transport for the given workspace base URL with default HTTP settings.
    pub fn new(base_url: &str) -> Result<Self, TransportError> {
        Self::from_config(&ClientConfig {
            base_url: base_url.to_string(),
            ..Default::default()
        })
    }

    /// Transport posting to [`ClientConfig::endpoint`].
    pub fn from_config(config: &ClientConfig) -> Result<Self, TransportError> {
        let endpoint =
            Url::parse(&config.endpoint()).map_err(|e| TransportError::InvalidUrl {
                url: config.base_url.clone(),
                reason: e.to_string(),
            })?;

        let mut builder = Client::builder();
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder.build()?;

        tracing::info!(endpoint = %endpoint, "Graph streaming endpoint configured");
        Ok(Self { client, endpoint })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

impl Transport for HttpTransport {
    fn send(&mut self, payload: &str) -> Result<Option<String>, TransportError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .header(CONTENT_TYPE, "application/json")
            .body(payload.to_string())
            .send()?;

        let status = response.status();
        let body = response.text()?;
        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(Some(body))
    }

    fn name(&self) -> &str {
        "http"
    }
}

// ── Sink ──────────────────────────────────────────────────────────

/// Writes payloads verbatim to any [`Write`] destination.
#[derive(Debug)]
pub struct SinkTransport<W: Write> {
    out: W,
}

impl<W: Write> SinkTransport<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn get_ref(&self) -> &W {
        &self.out
    }

    pub fn get_mut(&mut self) -> &mut W {
        &mut self.out
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Transport for SinkTransport<W> {
    fn send(&mut self, payload: &str) -> Result<Option<String>, TransportError> {
        self.out.write_all(payload.as_bytes())?;
        self.out.flush()?;
        Ok(None)
    }

    fn name(&self) -> &str {
        "sink"
    }
}

// ── Test doubles ──────────────────────────────────────────────────

/// Discards every payload. Meant for dry runs and tests only.
#[derive(Debug, Default, Clone)]
pub struct NullTransport {
    sends: usize,
    bytes: usize,
}

impl NullTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sends(&self) -> usize {
        self.sends
    }

    pub fn bytes(&self) -> usize {
        self.bytes
    }
}

impl Transport for NullTransport {
    fn send(&mut self, payload: &str) -> Result<Option<String>, TransportError> {
        self.sends += 1;
        self.bytes += payload.len();
        Ok(None)
    }

    fn name(&self) -> &str {
        "null"
    }
}

/// Records every payload in call order.
#[derive(Debug, Default, Clone)]
pub struct MemoryTransport {
    payloads: Vec<String>,
    fail_next: Option<String>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Payloads delivered so far, one entry per `send` call.
    pub fn payloads(&self) -> &[String] {
        &self.payloads
    }

    pub fn sends(&self) -> usize {
        self.payloads.len()
    }

    /// Make the next `send` fail with [`TransportError::Custom`] carrying `reason`.
    pub fn fail_next_send(&mut self, reason: impl Into<String>) {
        self.fail_next = Some(reason.into());
    }

    pub fn take_payloads(&mut self) -> Vec<String> {
        std::mem::take(&mut self.payloads)
    }
}

impl Transport for MemoryTransport {
    fn send(&mut self, payload: &str) -> Result<Option<String>, TransportError> {
        if let Some(reason) = self.fail_next.take() {
            return Err(TransportError::Custom {
                transport: self.name().to_string(),
                source: anyhow::anyhow!(reason),
            });
        }
        self.payloads.push(payload.to_string());
        Ok(None)
    }

    fn name(&self) -> &str {
        "memory"
    }
}
