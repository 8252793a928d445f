//! Lifecycle tracking for a single HTTP request/response exchange.
//!
//! [`HttpExchange`] holds the ready state, response head, buffered body and progress of one
//! exchange. A transport driver feeds it (directly or through a [`DriverHandle`]) and a
//! presentation layer reads it back as bytes, text or JSON.
pub mod config;
pub mod driver;
pub mod errors;
pub mod net;

pub use config::ExchangeConfig;
pub use driver::{DriverHandle, ExchangeEvent, TransportEvent};
pub use errors::{ExchangeError, MaterializeError};
pub use net::*;
