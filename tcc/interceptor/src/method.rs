//! The view of an intercepted call that the interceptor works with.

use std::fmt;
use std::marker::PhantomData;

use tcc_common::{TransactionContext, TryError};
use tcc_transaction::TransactionRegistry;

use crate::compensable::{Compensable, Propagation};

/// An intercepted method call.
///
/// The call chain's [`TransactionRegistry`] is handed to [`MethodContext::proceed`] so the
/// business logic can enlist participants and make nested intercepted calls in the same chain.
pub trait MethodContext {
    /// The declared return type. Its [`Default`] value is returned by participant calls that
    /// only confirm or cancel a branch.
    type Output: Default;

    fn method_name(&self) -> &str;

    /// Returns the compensable configuration, or `None` if the method is not compensable.
    fn compensable(&self) -> Option<&Compensable>;

    /// Returns the transaction context propagated by the caller, if any.
    fn transaction_context(&self) -> Option<&TransactionContext>;

    /// Returns an identity distinguishing duplicate root invocations, if the method has one.
    fn unique_identity(&self) -> Option<&str> {
        None
    }

    /// Runs the business logic.
    fn proceed(&mut self, registry: &mut TransactionRegistry) -> Result<Self::Output, TryError>;
}

/// The part a call plays in a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodRole {
    /// Starts and finalizes a new transaction.
    Root,
    /// Acts on a branch of a transaction propagated by a remote caller.
    Provider,
    /// Runs without any transaction handling.
    Normal,
}

impl MethodRole {
    pub fn resolve(
        propagation: Propagation,
        is_transaction_active: bool,
        context: Option<&TransactionContext>,
    ) -> Self {
        match (context, propagation) {
            (Some(_), _) => Self::Provider,
            (None, Propagation::RequiresNew) => Self::Root,
            (None, _) if !is_transaction_active => Self::Root,
            (None, _) => Self::Normal,
        }
    }
}

/// Returns `false` if a mandatory method is called with no transaction to join.
pub fn is_legal_transaction_context(
    propagation: Propagation,
    is_transaction_active: bool,
    context: Option<&TransactionContext>,
) -> bool {
    propagation != Propagation::Mandatory || is_transaction_active || context.is_some()
}

/// A [`MethodContext`] built from a closure.
pub struct MethodCall<T, F> {
    name: String,
    compensable: Option<Compensable>,
    context: Option<TransactionContext>,
    unique_identity: Option<String>,
    body: F,
    _output: PhantomData<fn() -> T>,
}

impl<T, F> MethodCall<T, F>
where
    T: Default,
    F: FnMut(&mut TransactionRegistry) -> Result<T, TryError>,
{
    pub fn new(name: impl Into<String>, body: F) -> Self {
        Self {
            name: name.into(),
            compensable: None,
            context: None,
            unique_identity: None,
            body,
            _output: PhantomData,
        }
    }

    pub fn with_compensable(mut self, compensable: Compensable) -> Self {
        self.compensable = Some(compensable);
        self
    }

    pub fn with_context(mut self, context: Option<TransactionContext>) -> Self {
        self.context = context;
        self
    }

    pub fn with_unique_identity(mut self, identity: impl Into<String>) -> Self {
        self.unique_identity = Some(identity.into());
        self
    }
}

impl<T, F> MethodContext for MethodCall<T, F>
where
    T: Default,
    F: FnMut(&mut TransactionRegistry) -> Result<T, TryError>,
{
    type Output = T;

    #[inline]
    fn method_name(&self) -> &str {
        &self.name
    }

    #[inline]
    fn compensable(&self) -> Option<&Compensable> {
        self.compensable.as_ref()
    }

    #[inline]
    fn transaction_context(&self) -> Option<&TransactionContext> {
        self.context.as_ref()
    }

    #[inline]
    fn unique_identity(&self) -> Option<&str> {
        self.unique_identity.as_deref()
    }

    fn proceed(&mut self, registry: &mut TransactionRegistry) -> Result<T, TryError> {
        (self.body)(registry)
    }
}

impl<T, F> fmt::Debug for MethodCall<T, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodCall")
            .field("name", &self.name)
            .field("compensable", &self.compensable)
            .field("context", &self.context)
            .field("unique_identity", &self.unique_identity)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use tcc_common::{TransactionStatus, TransactionXid};

    use super::*;

    fn context() -> TransactionContext {
        TransactionContext::new(TransactionXid::new_root(), TransactionStatus::Trying)
    }

    #[test]
    fn test_resolve_root() {
        assert_eq!(
            MethodRole::resolve(Propagation::Required, false, None),
            MethodRole::Root
        );
        assert_eq!(
            MethodRole::resolve(Propagation::RequiresNew, true, None),
            MethodRole::Root
        );
    }

    #[test]
    fn test_resolve_provider_ignores_local_state() {
        let context = context();
        for propagation in [
            Propagation::Required,
            Propagation::Mandatory,
            Propagation::RequiresNew,
        ] {
            for active in [false, true] {
                assert_eq!(
                    MethodRole::resolve(propagation, active, Some(&context)),
                    MethodRole::Provider
                );
            }
        }
    }

    #[test]
    fn test_resolve_normal() {
        assert_eq!(
            MethodRole::resolve(Propagation::Required, true, None),
            MethodRole::Normal
        );
        assert_eq!(
            MethodRole::resolve(Propagation::Mandatory, true, None),
            MethodRole::Normal
        );
    }

    #[test]
    fn test_legal_transaction_context() {
        assert!(!is_legal_transaction_context(
            Propagation::Mandatory,
            false,
            None
        ));
        assert!(is_legal_transaction_context(
            Propagation::Mandatory,
            true,
            None
        ));
        assert!(is_legal_transaction_context(
            Propagation::Mandatory,
            false,
            Some(&context())
        ));
        assert!(is_legal_transaction_context(
            Propagation::Required,
            false,
            None
        ));
    }

    #[test]
    fn test_method_call() {
        let mut call = MethodCall::new("reserve", |_: &mut TransactionRegistry| Ok(7u32))
            .with_unique_identity("order-1");
        assert_eq!(call.method_name(), "reserve");
        assert!(call.compensable().is_none());
        assert_eq!(call.unique_identity(), Some("order-1"));
        assert_eq!(call.proceed(&mut TransactionRegistry::new()), Ok(7));
    }
}
