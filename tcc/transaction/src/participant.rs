//! Participants of a transaction and the terminator that finalizes them.

use std::error::Error;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tcc_common::{TransactionContext, TransactionStatus, TransactionXid};

pub type TerminatorError = Box<dyn Error + Send + Sync + 'static>;

pub type TerminatorRef = Arc<dyn Terminator>;

/// A recorded call to be replayed when a participant is confirmed or cancelled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invocation {
    target: String,
    method: String,
    args: Value,
}

impl Invocation {
    pub fn new(target: impl Into<String>, method: impl Into<String>, args: Value) -> Self {
        Self {
            target: target.into(),
            method: method.into(),
            args,
        }
    }

    #[inline]
    pub fn target(&self) -> &str {
        &self.target
    }

    #[inline]
    pub fn method(&self) -> &str {
        &self.method
    }

    #[inline]
    pub fn args(&self) -> &Value {
        &self.args
    }
}

/// A unit of work enlisted in a transaction, identified by its own branch xid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    xid: TransactionXid,
    confirm: Invocation,
    cancel: Invocation,
}

impl Participant {
    pub fn new(xid: TransactionXid, confirm: Invocation, cancel: Invocation) -> Self {
        Self {
            xid,
            confirm,
            cancel,
        }
    }

    #[inline]
    pub fn xid(&self) -> TransactionXid {
        self.xid
    }

    pub fn confirm(&self, terminator: &dyn Terminator) -> Result<(), TerminatorError> {
        let context = TransactionContext::new(self.xid, TransactionStatus::Confirming);
        terminator.invoke(&context, &self.confirm)
    }

    pub fn cancel(&self, terminator: &dyn Terminator) -> Result<(), TerminatorError> {
        let context = TransactionContext::new(self.xid, TransactionStatus::Cancelling);
        terminator.invoke(&context, &self.cancel)
    }
}

/// Executes the confirm or cancel invocation of a participant.
///
/// The context handed to the terminator carries the participant's xid and the phase being
/// applied, so a terminator that forwards the invocation to a remote service can propagate it
/// unchanged.
pub trait Terminator: Send + Sync {
    fn invoke(
        &self,
        context: &TransactionContext,
        invocation: &Invocation,
    ) -> Result<(), TerminatorError>;
}

impl<F> Terminator for F
where
    F: Fn(&TransactionContext, &Invocation) -> Result<(), TerminatorError> + Send + Sync,
{
    fn invoke(
        &self,
        context: &TransactionContext,
        invocation: &Invocation,
    ) -> Result<(), TerminatorError> {
        self(context, invocation)
    }
}
