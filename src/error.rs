//! Crate error type

use crate::codec::CodecError;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the relay
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Socket or stream I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A frame could not be serialized or parsed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A value fell outside the caller-declared domain
    #[error("value {value} is outside the declared domain")]
    OutOfRange { value: String },

    /// Invalid configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// A write to a peer stream failed or timed out
    #[error("write to connection {0} failed")]
    PeerWriteFailure(u64),

    /// The stream reached its end of life
    #[error("stream terminated")]
    StreamTerminated,
}

impl From<CodecError> for Error {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::OutOfRange(value) => Error::OutOfRange {
                value: value.to_string(),
            },
            CodecError::Frame(e) => Error::Json(e),
        }
    }
}
