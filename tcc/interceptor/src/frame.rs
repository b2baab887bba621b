use tcc_transaction::{TransactionManager, TransactionRef, TransactionRegistry};

/// Scope of one root or participant call.
///
/// Releases the bound transaction from the call chain when dropped, on every exit path.
pub(crate) struct TransactionFrame<'a, M: TransactionManager + ?Sized> {
    manager: &'a M,
    registry: &'a mut TransactionRegistry,
    transaction: Option<TransactionRef>,
}

impl<'a, M: TransactionManager + ?Sized> TransactionFrame<'a, M> {
    pub(crate) fn new(manager: &'a M, registry: &'a mut TransactionRegistry) -> Self {
        Self {
            manager,
            registry,
            transaction: None,
        }
    }

    #[inline]
    pub(crate) fn registry(&mut self) -> &mut TransactionRegistry {
        &mut *self.registry
    }

    pub(crate) fn bind(&mut self, transaction: TransactionRef) {
        self.transaction = Some(transaction);
    }
}

impl<M: TransactionManager + ?Sized> Drop for TransactionFrame<'_, M> {
    fn drop(&mut self) {
        self.manager
            .clean_after_completion(self.registry, self.transaction.as_ref());
    }
}
