use tcc_common::ErrorKind;

#[derive(Debug, Clone, Default)]
pub struct InterceptorConfig {
    /// Process wide delay-cancel kinds, consulted together with each method's own set.
    pub delay_cancel_exceptions: Vec<&'static ErrorKind>,
}

impl InterceptorConfig {
    pub fn with_delay_cancel_exception(mut self, kind: &'static ErrorKind) -> Self {
        self.delay_cancel_exceptions.push(kind);
        self
    }
}
