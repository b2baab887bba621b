use serde::{Deserialize, Serialize};

use crate::status::TransactionStatus;
use crate::xid::TransactionXid;

/// The transaction context propagated from a caller to a remote participant.
///
/// A context is immutable. Moving a participant to another phase produces a new context through
/// [`TransactionContext::with_status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionContext {
    transaction_xid: TransactionXid,
    status: TransactionStatus,
    /// Set by callers that invoke a method requiring a transaction. The core carries the flag
    /// across the wire and through [`TransactionContext::with_status`] without acting on it.
    #[serde(default)]
    mandatory: bool,
}

impl TransactionContext {
    #[inline]
    pub fn new(transaction_xid: TransactionXid, status: TransactionStatus) -> Self {
        Self {
            transaction_xid,
            status,
            mandatory: false,
        }
    }

    /// Returns a copy of this context marked as requiring an active transaction at the callee.
    #[inline]
    pub fn mandatory(self) -> Self {
        Self {
            mandatory: true,
            ..self
        }
    }

    /// Returns a new context for the same transaction in phase `status`.
    #[inline]
    pub fn with_status(&self, status: TransactionStatus) -> Self {
        Self { status, ..*self }
    }

    #[inline]
    pub fn xid(&self) -> TransactionXid {
        self.transaction_xid
    }

    #[inline]
    pub fn status(&self) -> TransactionStatus {
        self.status
    }

    #[inline]
    pub fn is_mandatory(&self) -> bool {
        self.mandatory
    }
}
