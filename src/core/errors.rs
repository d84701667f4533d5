use thiserror::Error;

/// Maximum number of body characters kept in a `MalformedPage` error
pub const MALFORMED_SNIPPET_LEN: usize = 256;

#[derive(Error, Debug)]
pub enum ExchangeError {
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    #[error("Invalid secret encoding: {0}")]
    InvalidSecretEncoding(#[from] base64::DecodeError),

    #[error("Clock unavailable: {0}")]
    ClockUnavailable(String),

    #[error("Malformed page ({len} bytes): {reason}; body starts with {snippet:?}")]
    MalformedPage {
        len: usize,
        snippet: String,
        reason: String,
    },

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Request cancelled")]
    Cancelled,

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Deserialization error: {0}")]
    DeserializationError(String),

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("WebSocket already connected; create a new instance to reconnect")]
    AlreadyConnected,

    #[error("WebSocket not connected")]
    NotConnected,

    #[error("Configuration error: {0}")]
    ConfigError(#[from] crate::core::config::ConfigError),
}

/// Failures reported by the HTTP or WebSocket transport, passed through unmodified
#[derive(Error, Debug)]
pub enum TransportError {
    /// The exchange answered with a non-2xx status
    #[error("HTTP {code}: {message}")]
    Status { code: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),
}

impl ExchangeError {
    /// Build a `MalformedPage` error carrying the body size and a short prefix of it
    pub fn malformed_page(body: &[u8], reason: impl Into<String>) -> Self {
        let text = String::from_utf8_lossy(body);
        Self::MalformedPage {
            len: body.len(),
            snippet: text.chars().take(MALFORMED_SNIPPET_LEN).collect(),
            reason: reason.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::Transport(TransportError::Network(message.into()))
    }

    /// HTTP status reported by the exchange, if this is a status error
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Transport(TransportError::Status { code, .. }) => Some(*code),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ExchangeError {
    fn from(err: reqwest::Error) -> Self {
        Self::network(err.to_string())
    }
}
