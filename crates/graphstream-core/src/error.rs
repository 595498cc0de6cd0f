use thiserror::Error;

/// Errors raised while building, encoding, or configuring graph events.
#[derive(Error, Debug)]
pub enum StreamError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Attributes must serialize to a JSON object, got {0}")]
    InvalidAttributes(String),

    #[error("Attribute {key:?} is {value}, which JSON cannot represent")]
    NonFiniteNumber { key: String, value: f64 },

    #[error("Malformed envelope: {0}")]
    MalformedEnvelope(String),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

pub type Result<T> = std::result::Result<T, StreamError>;
