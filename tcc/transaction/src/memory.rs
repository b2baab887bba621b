use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tcc_common::TransactionXid;

use crate::error::{StoreError, StoreResult};
use crate::repository::TransactionRepository;
use crate::transaction::Transaction;

/// A [`TransactionRepository`] keeping records in memory.
#[derive(Debug, Default)]
pub struct MemoryTransactionRepository {
    transactions: DashMap<TransactionXid, Transaction>,
}

impl MemoryTransactionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    /// Returns a snapshot of all stored records.
    pub fn transactions(&self) -> Vec<Transaction> {
        self.transactions
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }
}

impl TransactionRepository for MemoryTransactionRepository {
    fn create(&self, transaction: &Transaction) -> StoreResult<()> {
        match self.transactions.entry(transaction.xid()) {
            Entry::Occupied(_) => Err(StoreError::Duplicate(transaction.xid())),
            Entry::Vacant(entry) => {
                entry.insert(transaction.clone());
                Ok(())
            }
        }
    }

    fn update(&self, transaction: &mut Transaction) -> StoreResult<()> {
        let xid = transaction.xid();
        // The shard lock held by `get_mut` makes the version check and the write atomic.
        let mut stored = self
            .transactions
            .get_mut(&xid)
            .ok_or(StoreError::Missing(xid))?;
        if stored.version() != transaction.version() {
            return Err(StoreError::Stale {
                xid,
                expected: transaction.version(),
                found: stored.version(),
            });
        }
        transaction.advance_version();
        *stored = transaction.clone();
        Ok(())
    }

    fn delete(&self, xid: &TransactionXid) -> StoreResult<()> {
        self.transactions.remove(xid);
        Ok(())
    }

    fn find_by_xid(&self, xid: &TransactionXid) -> StoreResult<Option<Transaction>> {
        Ok(self.transactions.get(xid).map(|entry| entry.value().clone()))
    }
}
