//! Exchange state and the types a transport driver feeds into it.

mod exchange;
pub mod materialize;
mod metadata;
mod progress;
mod ready_state;
mod transport_error;

pub use exchange::{ExchangeHandle, ExchangeId, ExchangeSnapshot, HttpExchange};
pub use metadata::{RequestMetadata, ResponseMetadata};
pub use progress::Progress;
pub use ready_state::ReadyState;
pub use transport_error::{TransportError, TransportErrorKind};
