//! Serialized delivery of transport events to an exchange.
//!
//! A transport driver rarely calls into an exchange from one place: connection callbacks, body
//! reads and cancellation come from different tasks. The [`ExchangeWorker`] funnels all of them
//! through one channel so the exchange only ever sees one mutator, in delivery order, and
//! broadcasts [`ExchangeEvent`]s for the presentation layer.

mod events;
mod worker;

pub use events::{ExchangeEvent, TransportEvent};
pub use worker::{DriverHandle, ExchangeWorker};
