//! Shared vocabulary of the TCC coordination core.
//!
//! This crate holds the values that cross service boundaries (transaction ids, phases and the
//! propagated [`TransactionContext`]) together with the error-kind hierarchy used to classify
//! failures raised from the Try phase.

pub mod context;
pub mod error;
pub mod kind;
pub mod status;
pub mod xid;

pub use context::TransactionContext;
pub use error::XidParseError;
pub use kind::{ErrorKind, TryError};
pub use status::TransactionStatus;
pub use xid::TransactionXid;
