//! Events flowing into and out of the exchange worker.
//!
//! - [`TransportEvent`]: what the transport driver observed, in the order it observed it.
//! - [`ExchangeEvent`]: notifications for consumers of the exchange.

use crate::net::{ExchangeId, ReadyState, RequestMetadata, ResponseMetadata, TransportError};

/// Things a transport driver reports about one exchange
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// Outgoing request has been prepared
    Request(RequestMetadata),
    /// Connection is established and the request is in flight
    Opened,
    /// Status line and headers have arrived
    Response(ResponseMetadata),
    /// A chunk of body bytes
    Data(Vec<u8>),
    /// Request body upload progress
    UploadProgress { sent: u64, total: u64 },
    /// Body is complete
    Completed,
    /// Transport failed (or was cancelled)
    Failed(TransportError),
}

/// Notifications emitted while an exchange progresses
#[derive(Debug, Clone, PartialEq)]
pub enum ExchangeEvent {
    /// Ready state moved forward
    ReadyStateChanged { exchange_id: ExchangeId, state: ReadyState },
    /// Download progress increased
    DownloadProgress { exchange_id: ExchangeId, progress: f32 },
    /// Upload progress increased
    UploadProgress { exchange_id: ExchangeId, progress: f32 },
    /// Exchange reached `Done`. `error` is set when it ended abnormally
    Finished { exchange_id: ExchangeId, error: Option<TransportError> },
    /// The transport driver broke the event contract. The worker fails the exchange (a
    /// `Finished` follows) and stops
    Misuse { exchange_id: ExchangeId, message: String },
}

impl ExchangeEvent {
    pub fn exchange_id(&self) -> ExchangeId {
        match self {
            ExchangeEvent::ReadyStateChanged { exchange_id, .. }
            | ExchangeEvent::DownloadProgress { exchange_id, .. }
            | ExchangeEvent::UploadProgress { exchange_id, .. }
            | ExchangeEvent::Finished { exchange_id, .. }
            | ExchangeEvent::Misuse { exchange_id, .. } => *exchange_id,
        }
    }
}
