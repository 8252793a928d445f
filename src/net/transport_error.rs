use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Broad classification of a transport failure.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransportErrorKind {
    /// The exchange was cancelled by its owner
    Cancelled,
    /// A timeout elapsed in the transport
    TimedOut,
    /// The connection could not be established or was dropped
    Connection,
    /// Too many redirects, or a redirect loop
    Redirect,
    /// The body could not be read or decoded
    Body,
    /// Anything else
    Other,
}

impl Display for TransportErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportErrorKind::Cancelled => write!(f, "cancelled"),
            TransportErrorKind::TimedOut => write!(f, "timed out"),
            TransportErrorKind::Connection => write!(f, "connection"),
            TransportErrorKind::Redirect => write!(f, "redirect"),
            TransportErrorKind::Body => write!(f, "body"),
            TransportErrorKind::Other => write!(f, "other"),
        }
    }
}

/// Terminal failure recorded on an exchange.
///
/// This is a value, not something that is propagated with `?`: the transport driver hands it to
/// [`HttpExchange::fail`](crate::net::HttpExchange::fail) and the consumer reads it back with
/// [`HttpExchange::error`](crate::net::HttpExchange::error).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{kind} error: {message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn new<S: Into<String>>(kind: TransportErrorKind, message: S) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn cancelled() -> Self {
        Self::new(TransportErrorKind::Cancelled, "exchange cancelled")
    }

    pub fn is_cancelled(&self) -> bool {
        self.kind == TransportErrorKind::Cancelled
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        let kind = if e.is_timeout() {
            TransportErrorKind::TimedOut
        } else if e.is_connect() {
            TransportErrorKind::Connection
        } else if e.is_redirect() {
            TransportErrorKind::Redirect
        } else if e.is_body() || e.is_decode() {
            TransportErrorKind::Body
        } else {
            TransportErrorKind::Other
        };

        Self::new(kind, e.to_string())
    }
}
