//! Transaction infrastructure of the TCC coordination core.
//!
//! This crate provides the transaction record, its participants, the store abstraction and the
//! [`TransactionManager`] that drives transactions through their Try, Confirm and Cancel phases.
//! The active transactions of a call chain live in an explicit [`TransactionRegistry`] that the
//! caller threads through the chain.

pub mod config;
pub mod error;
pub mod manager;
pub mod memory;
pub mod participant;
pub mod registry;
pub mod repository;
pub mod transaction;

pub use config::ManagerConfig;
pub use error::{StoreError, StoreResult, TransactionError, TransactionResult};
pub use manager::{TccTxnManager, TransactionManager};
pub use memory::MemoryTransactionRepository;
pub use participant::{Invocation, Participant, Terminator, TerminatorError, TerminatorRef};
pub use registry::TransactionRegistry;
pub use repository::{TransactionRepository, TransactionRepositoryRef};
// Re-export commonly used types
pub use tcc_common::{TransactionContext, TransactionStatus, TransactionXid};
pub use transaction::{Transaction, TransactionRef, TransactionType};
