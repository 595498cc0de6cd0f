//! Error types for the graphstream-client crate.

use thiserror::Error;

use graphstream_core::StreamError;

use crate::transport::TransportError;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Event encoding error: {0}")]
    Stream(#[from] StreamError),
}

pub type Result<T> = std::result::Result<T, ClientError>;
