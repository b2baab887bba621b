use std::fmt::Debug;
use std::sync::Arc;

use tcc_common::TransactionXid;

use crate::error::StoreResult;
use crate::transaction::Transaction;

pub type TransactionRepositoryRef = Arc<dyn TransactionRepository>;

/// Durable storage of transaction records.
///
/// Implementations must be safe for concurrent use across unrelated transactions. Updates are
/// versioned: a write succeeds only if the stored record still carries the version of the
/// transaction being written, which lets the manager detect a concurrent finalization of the
/// same branch.
pub trait TransactionRepository: Debug + Send + Sync {
    /// Persists a new transaction. Fails with [`StoreError::Duplicate`] if the xid is taken.
    ///
    /// [`StoreError::Duplicate`]: crate::StoreError::Duplicate
    fn create(&self, transaction: &Transaction) -> StoreResult<()>;

    /// Overwrites the stored record and advances the version of `transaction`.
    ///
    /// Fails with [`StoreError::Missing`] if the record is gone and with [`StoreError::Stale`]
    /// if it was updated by someone else in the meantime.
    ///
    /// [`StoreError::Missing`]: crate::StoreError::Missing
    /// [`StoreError::Stale`]: crate::StoreError::Stale
    fn update(&self, transaction: &mut Transaction) -> StoreResult<()>;

    /// Removes the record. Deleting a missing record is not an error.
    fn delete(&self, xid: &TransactionXid) -> StoreResult<()>;

    /// Loads a record by xid.
    fn find_by_xid(&self, xid: &TransactionXid) -> StoreResult<Option<Transaction>>;
}
