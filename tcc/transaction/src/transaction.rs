//! The transaction record and related functionality.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tcc_common::{TransactionContext, TransactionStatus, TransactionXid};

use crate::participant::{Participant, Terminator, TerminatorError};

/// Shared handle to a transaction registered in a call chain.
pub type TransactionRef = Arc<Mutex<Transaction>>;

/// Whether a transaction was started locally or joined from a propagated context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    Root,
    Branch,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    xid: TransactionXid,
    status: TransactionStatus,
    transaction_type: TransactionType,
    participants: Vec<Participant>,
    /// Last branch number handed out to a participant of this transaction.
    branch_seq: u32,
    /// Incremented by the store on every successful update.
    version: u64,
    /// Number of recovery attempts, maintained by recovery collaborators.
    retried_count: u32,
    created_at: DateTime<Utc>,
    last_updated_at: DateTime<Utc>,
}

impl Transaction {
    /// Creates a root transaction in the `Trying` phase.
    pub fn new_root(xid: TransactionXid) -> Self {
        Self::new(xid, TransactionStatus::Trying, TransactionType::Root)
    }

    /// Creates a branch transaction joining the transaction propagated by `context`.
    pub fn from_context(context: &TransactionContext) -> Self {
        Self::new(context.xid(), context.status(), TransactionType::Branch)
    }

    fn new(
        xid: TransactionXid,
        status: TransactionStatus,
        transaction_type: TransactionType,
    ) -> Self {
        let now = Utc::now();
        Self {
            xid,
            status,
            transaction_type,
            participants: Vec::new(),
            branch_seq: 0,
            version: 1,
            retried_count: 0,
            created_at: now,
            last_updated_at: now,
        }
    }

    #[inline]
    pub fn xid(&self) -> TransactionXid {
        self.xid
    }

    #[inline]
    pub fn status(&self) -> TransactionStatus {
        self.status
    }

    #[inline]
    pub fn transaction_type(&self) -> TransactionType {
        self.transaction_type
    }

    #[inline]
    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    #[inline]
    pub fn version(&self) -> u64 {
        self.version
    }

    #[inline]
    pub fn retried_count(&self) -> u32 {
        self.retried_count
    }

    #[inline]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[inline]
    pub fn last_updated_at(&self) -> DateTime<Utc> {
        self.last_updated_at
    }

    pub fn change_status(&mut self, status: TransactionStatus) {
        self.status = status;
    }

    pub fn enlist(&mut self, participant: Participant) {
        self.participants.push(participant);
    }

    /// Allocates the xid of the next participant branch.
    ///
    /// Branch xids share this transaction's global id; the sequence is persisted with the
    /// transaction on its next update.
    pub fn next_branch_xid(&mut self) -> TransactionXid {
        self.branch_seq += 1;
        self.xid.with_branch(self.branch_seq)
    }

    /// Returns the context to propagate to a participant branch in the current phase.
    pub fn context_for(&self, branch: TransactionXid) -> TransactionContext {
        TransactionContext::new(branch, self.status)
    }

    /// Records a successful write to the store.
    ///
    /// Stores call this after checking the stored version against [`Transaction::version`].
    pub fn advance_version(&mut self) {
        self.version += 1;
        self.last_updated_at = Utc::now();
    }

    /// Confirms every participant, stopping at the first failure.
    pub fn commit(
        &self,
        terminator: &dyn Terminator,
    ) -> Result<(), (TransactionXid, TerminatorError)> {
        for participant in &self.participants {
            participant
                .confirm(terminator)
                .map_err(|e| (participant.xid(), e))?;
        }
        Ok(())
    }

    /// Cancels every participant, stopping at the first failure.
    pub fn rollback(
        &self,
        terminator: &dyn Terminator,
    ) -> Result<(), (TransactionXid, TerminatorError)> {
        for participant in &self.participants {
            participant
                .cancel(terminator)
                .map_err(|e| (participant.xid(), e))?;
        }
        Ok(())
    }
}
