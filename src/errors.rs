use crate::config::ConfigError;
use crate::net::ReadyState;

/// Contract violations by the transport driver.
///
/// These are never produced by the network itself: a transport failure is recorded on the
/// exchange as a [`TransportError`](crate::net::TransportError) instead.
#[derive(Debug, thiserror::Error)]
pub enum ExchangeError {
    #[error("{op} is not allowed while the exchange is {state}")]
    InvalidTransition { op: &'static str, state: ReadyState },

    #[error("Request metadata has already been set")]
    RequestAlreadySet,

    #[error("Response metadata has already been set")]
    ResponseAlreadySet,

    #[error("Body limit of {limit} bytes exceeded ({attempted} bytes)")]
    BodyLimitExceeded { limit: usize, attempted: usize },

    #[error("Unknown text encoding: {0}")]
    UnknownEncoding(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(#[from] ConfigError),

    #[error("Exchange driver has shut down")]
    DriverClosed,
}

/// Failure to materialize a structured view of the body.
#[derive(Debug, thiserror::Error)]
pub enum MaterializeError {
    #[error("No response data received yet")]
    NoData,

    #[error("Parser error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Expected a JSON {expected}, found {found}")]
    UnexpectedShape {
        expected: &'static str,
        found: &'static str,
    },
}
