//! Transaction manager trait and the default manager.
//!
//! The manager owns the lifecycle of transactions: it creates roots, joins propagated branches,
//! applies the Confirm and Cancel phases through the store and the participants' terminator, and
//! releases transactions from the call chain's registry.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use rayon::{ThreadPool, ThreadPoolBuilder};
use tcc_common::{TransactionContext, TransactionStatus, TransactionXid};

use crate::config::ManagerConfig;
use crate::error::{StoreError, TransactionError, TransactionResult};
use crate::participant::{Participant, TerminatorRef};
use crate::registry::TransactionRegistry;
use crate::repository::TransactionRepositoryRef;
use crate::transaction::{Transaction, TransactionRef};

/// Operations the coordination core needs from a transaction manager.
///
/// Every operation acts on the call chain described by `registry`. Implementations must be safe
/// for concurrent use by unrelated call chains.
pub trait TransactionManager: Send + Sync {
    /// Returns `true` if the call chain already has an active transaction.
    fn is_transaction_active(&self, registry: &TransactionRegistry) -> bool {
        registry.is_active()
    }

    /// Creates, persists and registers a new root transaction in the `Trying` phase.
    ///
    /// When `unique_identity` is given the xid is derived from it, so a duplicate root
    /// invocation is rejected by the store.
    fn begin(
        &self,
        registry: &mut TransactionRegistry,
        unique_identity: Option<&str>,
    ) -> TransactionResult<TransactionRef>;

    /// Creates, persists and registers a branch transaction for an inbound `Trying` context.
    fn propagation_new_begin(
        &self,
        registry: &mut TransactionRegistry,
        context: &TransactionContext,
    ) -> TransactionResult<TransactionRef>;

    /// Loads and registers the existing branch addressed by `context`.
    ///
    /// Fails with [`TransactionError::NotFound`] if no such branch is stored.
    fn propagation_exist_begin(
        &self,
        registry: &mut TransactionRegistry,
        context: &TransactionContext,
    ) -> TransactionResult<TransactionRef>;

    /// Moves the current transaction to `Confirming` and confirms its participants.
    ///
    /// With `async_commit` the call returns once the decision is durably recorded.
    fn commit(&self, registry: &TransactionRegistry, async_commit: bool) -> TransactionResult<()>;

    /// Moves the current transaction to `Cancelling` and cancels its participants.
    ///
    /// With `async_rollback` the call returns once the decision is durably recorded.
    fn rollback(
        &self,
        registry: &TransactionRegistry,
        async_rollback: bool,
    ) -> TransactionResult<()>;

    /// Adds `participant` to the current transaction and persists it.
    fn enlist_participant(
        &self,
        registry: &TransactionRegistry,
        participant: Participant,
    ) -> TransactionResult<()>;

    /// Releases `transaction` from the call chain.
    ///
    /// This never fails: releasing nothing, or a transaction that is not registered, is logged
    /// and otherwise ignored.
    fn clean_after_completion(
        &self,
        registry: &mut TransactionRegistry,
        transaction: Option<&TransactionRef>,
    );
}

/// The default [`TransactionManager`], backed by a [`TransactionRepository`] and a
/// [`Terminator`] that finalizes participants.
///
/// [`TransactionRepository`]: crate::TransactionRepository
/// [`Terminator`]: crate::Terminator
pub struct TccTxnManager {
    repository: TransactionRepositoryRef,
    terminator: TerminatorRef,
    /// Runs confirm and cancel phases requested asynchronously.
    workers: ThreadPool,
    /// Transactions whose confirm or cancel phase is running.
    in_flight: Arc<DashMap<TransactionXid, ()>>,
}

/// Exclusive right to finalize one transaction, released on drop.
struct FinalizationClaim {
    in_flight: Arc<DashMap<TransactionXid, ()>>,
    xid: TransactionXid,
}

impl Drop for FinalizationClaim {
    fn drop(&mut self) {
        self.in_flight.remove(&self.xid);
    }
}

impl TccTxnManager {
    pub fn new(
        repository: TransactionRepositoryRef,
        terminator: TerminatorRef,
        config: &ManagerConfig,
    ) -> TransactionResult<Self> {
        let workers = ThreadPoolBuilder::new()
            .num_threads(config.async_threads)
            .thread_name(|i| format!("tcc-async-{i}"))
            .build()?;
        Ok(Self {
            repository,
            terminator,
            workers,
            in_flight: Arc::new(DashMap::new()),
        })
    }

    #[inline]
    pub fn repository(&self) -> &TransactionRepositoryRef {
        &self.repository
    }

    fn current(registry: &TransactionRegistry) -> TransactionResult<TransactionRef> {
        registry
            .current()
            .cloned()
            .ok_or(TransactionError::NoActiveTransaction)
    }

    /// Claims the finalization of `xid`.
    ///
    /// A transaction already being finalized by another delivery is reported as
    /// [`TransactionError::NotFound`], the same as one that finished.
    fn claim(&self, xid: TransactionXid) -> TransactionResult<FinalizationClaim> {
        match self.in_flight.entry(xid) {
            Entry::Occupied(_) => Err(TransactionError::NotFound(xid)),
            Entry::Vacant(entry) => {
                entry.insert(());
                Ok(FinalizationClaim {
                    in_flight: self.in_flight.clone(),
                    xid,
                })
            }
        }
    }

    /// Claims, records and applies the phase decision for the current transaction.
    fn decide(
        &self,
        registry: &TransactionRegistry,
        status: TransactionStatus,
        in_background: bool,
    ) -> TransactionResult<()> {
        let transaction = Self::current(registry)?;
        let xid = transaction.lock().xid();
        let claim = self.claim(xid)?;
        self.record_decision(&mut transaction.lock(), status)?;
        self.finish(transaction, status, in_background, claim)
    }

    /// Durably records the phase decision for `transaction`.
    ///
    /// A branch that disappeared, or that a concurrent delivery already moved to `status`, is
    /// reported as [`TransactionError::NotFound`].
    fn record_decision(
        &self,
        transaction: &mut Transaction,
        status: TransactionStatus,
    ) -> TransactionResult<()> {
        transaction.change_status(status);
        match self.repository.update(transaction) {
            Ok(()) => Ok(()),
            Err(StoreError::Missing(xid)) => Err(TransactionError::NotFound(xid)),
            Err(StoreError::Stale { xid, .. })
                if self
                    .repository
                    .find_by_xid(&xid)?
                    .is_none_or(|stored| stored.status() == status) =>
            {
                Err(TransactionError::NotFound(xid))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn finish(
        &self,
        transaction: TransactionRef,
        status: TransactionStatus,
        in_background: bool,
        claim: FinalizationClaim,
    ) -> TransactionResult<()> {
        if !in_background {
            let outcome =
                finish_transaction(&self.repository, &self.terminator, &transaction, status);
            drop(claim);
            return outcome;
        }
        let repository = self.repository.clone();
        let terminator = self.terminator.clone();
        self.workers.spawn(move || {
            let xid = claim.xid;
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                finish_transaction(&repository, &terminator, &transaction, status)
            }));
            drop(claim);
            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::error!(
                    %xid,
                    %status,
                    error = %e,
                    "async transaction completion failed, left for recovery"
                ),
                Err(payload) => tracing::error!(
                    %xid,
                    %status,
                    panic = panic_message(payload.as_ref()),
                    "async transaction completion panicked, left for recovery"
                ),
            }
        });
        Ok(())
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("<non-string panic payload>")
}

/// Applies `status` to every participant, then deletes the record.
///
/// On failure the record stays in the store for recovery.
fn finish_transaction(
    repository: &TransactionRepositoryRef,
    terminator: &TerminatorRef,
    transaction: &TransactionRef,
    status: TransactionStatus,
) -> TransactionResult<()> {
    let transaction = transaction.lock();
    let xid = transaction.xid();
    let outcome = match status {
        TransactionStatus::Confirming => transaction.commit(terminator.as_ref()),
        TransactionStatus::Cancelling => transaction.rollback(terminator.as_ref()),
        TransactionStatus::Trying => Ok(()),
    };
    outcome.map_err(|(participant, source)| TransactionError::Participant {
        xid,
        participant,
        status,
        source,
    })?;
    repository.delete(&xid)?;
    tracing::debug!(%xid, %status, "transaction completed");
    Ok(())
}

impl TransactionManager for TccTxnManager {
    fn begin(
        &self,
        registry: &mut TransactionRegistry,
        unique_identity: Option<&str>,
    ) -> TransactionResult<TransactionRef> {
        let xid = unique_identity.map_or_else(
            TransactionXid::new_root,
            TransactionXid::from_unique_identity,
        );
        let transaction = Transaction::new_root(xid);
        self.repository.create(&transaction)?;
        tracing::debug!(%xid, "root transaction began");
        Ok(registry.register(transaction))
    }

    fn propagation_new_begin(
        &self,
        registry: &mut TransactionRegistry,
        context: &TransactionContext,
    ) -> TransactionResult<TransactionRef> {
        let transaction = Transaction::from_context(context);
        self.repository.create(&transaction)?;
        tracing::debug!(xid = %context.xid(), "branch transaction began");
        Ok(registry.register(transaction))
    }

    fn propagation_exist_begin(
        &self,
        registry: &mut TransactionRegistry,
        context: &TransactionContext,
    ) -> TransactionResult<TransactionRef> {
        let mut transaction = self
            .repository
            .find_by_xid(&context.xid())?
            .ok_or(TransactionError::NotFound(context.xid()))?;
        transaction.change_status(context.status());
        tracing::debug!(
            xid = %context.xid(),
            status = %context.status(),
            "branch transaction joined"
        );
        Ok(registry.register(transaction))
    }

    fn commit(&self, registry: &TransactionRegistry, async_commit: bool) -> TransactionResult<()> {
        self.decide(registry, TransactionStatus::Confirming, async_commit)
    }

    fn rollback(
        &self,
        registry: &TransactionRegistry,
        async_rollback: bool,
    ) -> TransactionResult<()> {
        self.decide(registry, TransactionStatus::Cancelling, async_rollback)
    }

    fn enlist_participant(
        &self,
        registry: &TransactionRegistry,
        participant: Participant,
    ) -> TransactionResult<()> {
        let transaction = Self::current(registry)?;
        let mut transaction = transaction.lock();
        transaction.enlist(participant);
        self.repository.update(&mut transaction)?;
        Ok(())
    }

    fn clean_after_completion(
        &self,
        registry: &mut TransactionRegistry,
        transaction: Option<&TransactionRef>,
    ) {
        let Some(transaction) = transaction else {
            return;
        };
        if registry.unregister(transaction) {
            return;
        }
        if registry.contains(transaction) {
            tracing::error!(
                xid = %transaction.lock().xid(),
                "illegal transaction when clean after completion"
            );
        } else {
            tracing::debug!(
                xid = %transaction.lock().xid(),
                "transaction already released"
            );
        }
    }
}
