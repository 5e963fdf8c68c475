//! Error types for the voice tutor

use thiserror::Error;

/// Result type alias for voice tutor operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the voice tutor
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Audio device error
    #[error("audio error: {0}")]
    Audio(String),

    /// PCM payload that cannot be decoded (odd length, bad interleave, bad base64)
    #[error("malformed pcm: {0}")]
    MalformedPcm(String),

    /// Live session error
    #[error("session error: {0}")]
    Session(String),

    /// Websocket transport error
    #[error("websocket error: {0}")]
    WebSocket(String),

    /// Web search error
    #[error("search error: {0}")]
    Search(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// URL parsing error
    #[error("url error: {0}")]
    Url(#[from] url::ParseError),
}
