//! A small simulated deployment used by the end-to-end tests.
//!
//! An order service acts as the root of every transaction and reserves stock from an inventory
//! service reached over an in-process [`Network`]. Every request crosses the network as JSON, so
//! the transaction context is propagated exactly as it would be between processes. Each service
//! runs its own transaction manager and store, and every manager finalizes participants by
//! sending their invocations back over the network.

pub mod inventory;
pub mod network;
pub mod order;

pub use inventory::{InventoryService, Reservation, ReservationState};
pub use network::{Network, Request, Service};
pub use order::{Order, OrderService, OrderState};
use tcc_common::TryError;

/// Converts an interception failure into the error a service reports to its caller.
pub(crate) fn service_error(error: tcc_interceptor::Error) -> TryError {
    match error {
        tcc_interceptor::Error::Business(e) => e,
        e => TryError::business(e.to_string()),
    }
}
