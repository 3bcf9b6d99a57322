use shared::error::{ProtocolError, ValidationError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("invalid endpoint '{url}': {source}")]
    InvalidEndpoint {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("unsupported endpoint scheme '{0}': expected http, https, ws or wss")]
    UnsupportedScheme(String),
    #[error("transport requires a running tokio runtime")]
    NoRuntime,
    #[error("websocket error: {0}")]
    Socket(#[from] Box<tokio_tungstenite::tungstenite::Error>),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error("handshake failed: {0}")]
    Handshake(&'static str),
    #[error("server refused namespace '{namespace}': {reason}")]
    Refused { namespace: String, reason: String },
    #[error("timed out after {0:?}")]
    Timeout(std::time::Duration),
    #[error("transport is closed")]
    Closed,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("session is already connected; disconnect first")]
    AlreadyConnected,
    #[error("failed to open transport: {0}")]
    Transport(#[from] TransportError),
}
