//! Per call chain registry of active transactions.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::transaction::{Transaction, TransactionRef};

/// The stack of transactions active in one call chain.
///
/// A registry is owned by the call chain that created it and is handed down by `&mut` to every
/// intercepted call in that chain. Independent chains use independent registries, so no state is
/// shared between them.
#[derive(Debug, Default)]
pub struct TransactionRegistry {
    stack: Vec<TransactionRef>,
}

impl TransactionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        !self.stack.is_empty()
    }

    #[inline]
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Returns the innermost active transaction.
    #[inline]
    pub fn current(&self) -> Option<&TransactionRef> {
        self.stack.last()
    }

    /// Pushes `transaction` on the stack and returns its shared handle.
    pub fn register(&mut self, transaction: Transaction) -> TransactionRef {
        let transaction = Arc::new(Mutex::new(transaction));
        self.stack.push(transaction.clone());
        transaction
    }

    /// Returns `true` if `transaction` is registered anywhere in this chain.
    pub fn contains(&self, transaction: &TransactionRef) -> bool {
        self.stack.iter().any(|t| Arc::ptr_eq(t, transaction))
    }

    /// Pops `transaction` if it is the innermost active transaction.
    ///
    /// Returns `false` and leaves the stack untouched otherwise.
    pub fn unregister(&mut self, transaction: &TransactionRef) -> bool {
        match self.stack.last() {
            Some(current) if Arc::ptr_eq(current, transaction) => {
                self.stack.pop();
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use tcc_common::TransactionXid;

    use super::*;

    #[test]
    fn test_stack_order() {
        let mut registry = TransactionRegistry::new();
        assert!(!registry.is_active());

        let outer = registry.register(Transaction::new_root(TransactionXid::new_root()));
        let inner = registry.register(Transaction::new_root(TransactionXid::new_root()));
        assert_eq!(registry.depth(), 2);
        assert!(Arc::ptr_eq(registry.current().unwrap(), &inner));

        // Only the innermost transaction may leave.
        assert!(!registry.unregister(&outer));
        assert!(registry.unregister(&inner));
        assert!(!registry.unregister(&inner));
        assert!(registry.contains(&outer));
        assert!(registry.unregister(&outer));
        assert!(!registry.is_active());
    }
}
