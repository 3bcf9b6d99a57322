use thiserror::Error;

/// Input rejected locally before anything reaches the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("nickname must not be empty")]
    EmptyNickname,
    #[error("message must not be empty")]
    EmptyMessage,
}

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed payload: {0}")]
    Json(#[from] serde_json::Error),
    #[error("empty packet")]
    Empty,
    #[error("unsupported packet type '{0}'")]
    UnsupportedPacket(char),
    #[error("malformed packet: {0}")]
    Malformed(&'static str),
    #[error("unknown event '{0}'")]
    UnknownEvent(String),
}
