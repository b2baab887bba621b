use tcc_common::ErrorKind;

/// How a compensable method relates to a transaction already active in its call chain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Propagation {
    /// Join the propagated transaction, or start a new root if there is none.
    #[default]
    Required,
    /// Require a propagated or already active transaction.
    Mandatory,
    /// Start a new root transaction unless a context is propagated to the call.
    RequiresNew,
}

/// Per method compensable configuration.
#[derive(Debug, Clone, Default)]
pub struct Compensable {
    pub propagation: Propagation,
    /// Return from commit once the decision is recorded, confirming participants in background.
    pub async_confirm: bool,
    /// Return from rollback once the decision is recorded, cancelling participants in background.
    pub async_cancel: bool,
    /// Errors of these kinds, thrown by the Try phase, do not trigger an immediate rollback.
    pub delay_cancel_exceptions: Vec<&'static ErrorKind>,
}

impl Compensable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_propagation(mut self, propagation: Propagation) -> Self {
        self.propagation = propagation;
        self
    }

    pub fn with_async_confirm(mut self, async_confirm: bool) -> Self {
        self.async_confirm = async_confirm;
        self
    }

    pub fn with_async_cancel(mut self, async_cancel: bool) -> Self {
        self.async_cancel = async_cancel;
        self
    }

    pub fn with_delay_cancel_exception(mut self, kind: &'static ErrorKind) -> Self {
        self.delay_cancel_exceptions.push(kind);
        self
    }
}
