use std::error::Error;

use tcc_common::{TransactionStatus, TransactionXid};
use thiserror::Error;

use crate::participant::TerminatorError;

pub type StoreResult<T> = Result<T, StoreError>;

/// Errors reported by a [`TransactionRepository`](crate::TransactionRepository).
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("transaction {0} already exists")]
    Duplicate(TransactionXid),

    #[error("transaction {0} does not exist")]
    Missing(TransactionXid),

    #[error("transaction {xid} is stale: expected version {expected}, found {found}")]
    Stale {
        xid: TransactionXid,
        expected: u64,
        found: u64,
    },

    #[error(transparent)]
    External(#[from] Box<dyn Error + Send + Sync + 'static>),
}

pub type TransactionResult<T> = Result<T, TransactionError>;

#[derive(Error, Debug)]
pub enum TransactionError {
    /// The branch addressed by a propagated context does not exist (any more).
    #[error("transaction {0} not found")]
    NotFound(TransactionXid),

    #[error("no active transaction in the current call chain")]
    NoActiveTransaction,

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("participant {participant} of transaction {xid} failed while {status}")]
    Participant {
        xid: TransactionXid,
        participant: TransactionXid,
        status: TransactionStatus,
        #[source]
        source: TerminatorError,
    },

    #[error("failed to build async worker pool")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}

impl TransactionError {
    /// Returns `true` if this error reports a missing (already finalized) branch.
    #[inline]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
