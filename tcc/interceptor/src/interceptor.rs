//! The compensable transaction interceptor.

use std::sync::Arc;

use tcc_common::{TransactionContext, TransactionStatus, TryError};
use tcc_transaction::{
    TransactionManager, TransactionRef, TransactionRegistry, TransactionResult,
};

use crate::compensable::Compensable;
use crate::config::InterceptorConfig;
use crate::delay_cancel::is_delay_cancel_error;
use crate::error::{Error, InterceptResult};
use crate::frame::TransactionFrame;
use crate::method::{MethodContext, MethodRole, is_legal_transaction_context};

/// Sequences [`TransactionManager`] operations around compensable method calls.
///
/// The interceptor holds no per call state; a single instance may serve any number of call
/// chains concurrently, each with its own [`TransactionRegistry`].
pub struct CompensableInterceptor<M: ?Sized> {
    manager: Arc<M>,
    config: InterceptorConfig,
}

impl<M: TransactionManager + ?Sized> CompensableInterceptor<M> {
    pub fn new(manager: Arc<M>, config: InterceptorConfig) -> Self {
        Self { manager, config }
    }

    #[inline]
    pub fn manager(&self) -> &Arc<M> {
        &self.manager
    }

    /// Runs `method` in the transaction role resolved for it.
    ///
    /// Business errors are returned unchanged as [`Error::Business`], after the rollback
    /// decision has been taken for a root call.
    pub fn intercept<C>(
        &self,
        registry: &mut TransactionRegistry,
        method: &mut C,
    ) -> InterceptResult<C::Output>
    where
        C: MethodContext + ?Sized,
    {
        let Some(compensable) = method.compensable().cloned() else {
            return Ok(method.proceed(registry)?);
        };
        let context = method.transaction_context().copied();
        let is_active = self.manager.is_transaction_active(registry);

        if !is_legal_transaction_context(compensable.propagation, is_active, context.as_ref()) {
            return Err(Error::MandatoryPropagation {
                method: method.method_name().to_owned(),
            });
        }

        match (
            MethodRole::resolve(compensable.propagation, is_active, context.as_ref()),
            context,
        ) {
            (MethodRole::Root, _) => self.root_method_proceed(registry, method, &compensable),
            (MethodRole::Provider, Some(context)) => {
                self.provider_method_proceed(registry, method, &compensable, &context)
            }
            (MethodRole::Provider, None) | (MethodRole::Normal, _) => {
                Ok(method.proceed(registry)?)
            }
        }
    }

    fn root_method_proceed<C>(
        &self,
        registry: &mut TransactionRegistry,
        method: &mut C,
        compensable: &Compensable,
    ) -> InterceptResult<C::Output>
    where
        C: MethodContext + ?Sized,
    {
        let mut frame = TransactionFrame::new(self.manager.as_ref(), registry);
        let transaction = self
            .manager
            .begin(frame.registry(), method.unique_identity())?;
        frame.bind(transaction.clone());

        let output = match method.proceed(frame.registry()) {
            Ok(output) => output,
            Err(error) => {
                if self.is_delay_cancel(&error, compensable) {
                    tracing::debug!(
                        xid = %transaction.lock().xid(),
                        %error,
                        "rollback delayed for compensable transaction"
                    );
                } else {
                    tracing::warn!(
                        transaction = %render(&transaction),
                        %error,
                        "compensable transaction trying failed"
                    );
                    if let Err(e) = self
                        .manager
                        .rollback(frame.registry(), compensable.async_cancel)
                    {
                        tracing::error!(
                            xid = %transaction.lock().xid(),
                            error = %e,
                            "rollback after trying failure failed"
                        );
                    }
                }
                return Err(error.into());
            }
        };

        self.manager
            .commit(frame.registry(), compensable.async_confirm)?;
        Ok(output)
    }

    fn provider_method_proceed<C>(
        &self,
        registry: &mut TransactionRegistry,
        method: &mut C,
        compensable: &Compensable,
        context: &TransactionContext,
    ) -> InterceptResult<C::Output>
    where
        C: MethodContext + ?Sized,
    {
        let mut frame = TransactionFrame::new(self.manager.as_ref(), registry);
        let status = context.status();
        let in_background = match status {
            TransactionStatus::Trying => {
                let transaction = self
                    .manager
                    .propagation_new_begin(frame.registry(), context)?;
                frame.bind(transaction);
                return Ok(method.proceed(frame.registry())?);
            }
            TransactionStatus::Confirming => compensable.async_confirm,
            TransactionStatus::Cancelling => compensable.async_cancel,
        };

        match self.finish_branch(&mut frame, context, in_background) {
            Err(e) if e.is_not_found() => {
                tracing::debug!(
                    xid = %context.xid(),
                    %status,
                    "branch already finished, duplicate delivery ignored"
                );
            }
            result => result?,
        }
        Ok(C::Output::default())
    }

    /// Loads the branch addressed by `context` and applies the phase it carries.
    fn finish_branch(
        &self,
        frame: &mut TransactionFrame<'_, M>,
        context: &TransactionContext,
        in_background: bool,
    ) -> TransactionResult<()> {
        let transaction = self
            .manager
            .propagation_exist_begin(frame.registry(), context)?;
        frame.bind(transaction);
        match context.status() {
            TransactionStatus::Confirming => self.manager.commit(frame.registry(), in_background),
            TransactionStatus::Cancelling => {
                self.manager.rollback(frame.registry(), in_background)
            }
            TransactionStatus::Trying => Ok(()),
        }
    }

    fn is_delay_cancel(&self, error: &TryError, compensable: &Compensable) -> bool {
        is_delay_cancel_error(
            error,
            self.config
                .delay_cancel_exceptions
                .iter()
                .chain(&compensable.delay_cancel_exceptions)
                .copied(),
        )
    }
}

impl<M: ?Sized> std::fmt::Debug for CompensableInterceptor<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompensableInterceptor")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn render(transaction: &TransactionRef) -> String {
    serde_json::to_string(&*transaction.lock())
        .unwrap_or_else(|e| format!("<unrenderable transaction: {e}>"))
}
