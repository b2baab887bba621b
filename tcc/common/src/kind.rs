//! Error kinds raised by the Try phase of a compensable method.
//!
//! Kinds form an open hierarchy: every [`ErrorKind`] may name a parent kind, and a kind is
//! considered to be "a" kind `k` when `k` is the kind itself or one of its ancestors. Kinds are
//! declared as `static` items and compared by address, so two kinds sharing a name stay distinct:
//!
//! ```
//! use tcc_common::ErrorKind;
//! use tcc_common::kind::{OUTCOME_UNKNOWN, TIMEOUT};
//!
//! static GATEWAY_TIMEOUT: ErrorKind = ErrorKind::with_parent("gateway-timeout", &TIMEOUT);
//! static OTHER_TIMEOUT: ErrorKind = ErrorKind::new("timeout");
//!
//! assert!(GATEWAY_TIMEOUT.is_a(&TIMEOUT));
//! assert!(GATEWAY_TIMEOUT.is_a(&OUTCOME_UNKNOWN));
//! assert!(!TIMEOUT.is_a(&GATEWAY_TIMEOUT));
//! assert_ne!(OTHER_TIMEOUT, TIMEOUT);
//! ```

use std::fmt;

use thiserror::Error;

/// Root of every business failure.
pub static BUSINESS: ErrorKind = ErrorKind::new("business");
/// The outcome of the failed operation cannot be known without inspecting the remote side.
pub static OUTCOME_UNKNOWN: ErrorKind = ErrorKind::with_parent("outcome-unknown", &BUSINESS);
pub static TIMEOUT: ErrorKind = ErrorKind::with_parent("timeout", &OUTCOME_UNKNOWN);

#[derive(Debug)]
pub struct ErrorKind {
    name: &'static str,
    parent: Option<&'static ErrorKind>,
}

impl ErrorKind {
    pub const fn new(name: &'static str) -> Self {
        Self { name, parent: None }
    }

    pub const fn with_parent(name: &'static str, parent: &'static ErrorKind) -> Self {
        Self {
            name,
            parent: Some(parent),
        }
    }

    /// Returns `true` if this kind is `other` or one of its descendants.
    pub fn is_a(&self, other: &ErrorKind) -> bool {
        let mut current = Some(self);
        while let Some(kind) = current {
            if kind == other {
                return true;
            }
            current = kind.parent;
        }
        false
    }
}

impl PartialEq for ErrorKind {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self, other)
    }
}

impl Eq for ErrorKind {}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// A failure raised by the business logic of a compensable method.
///
/// The error carries its [`ErrorKind`] and an optional cause, so that policies can classify it
/// either by its own kind or by the kind of its root cause.
#[derive(Error, Debug, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct TryError {
    kind: &'static ErrorKind,
    message: String,
    #[source]
    cause: Option<Box<TryError>>,
}

impl TryError {
    pub fn new(kind: &'static ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            cause: None,
        }
    }

    /// Shorthand for an error of kind [`BUSINESS`].
    pub fn business(message: impl Into<String>) -> Self {
        Self::new(&BUSINESS, message)
    }

    pub fn caused_by(mut self, cause: TryError) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    #[inline]
    pub fn kind(&self) -> &'static ErrorKind {
        self.kind
    }

    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }

    #[inline]
    pub fn cause(&self) -> Option<&TryError> {
        self.cause.as_deref()
    }

    /// Returns the deepest error of the cause chain, or `None` if this error has no cause.
    pub fn root_cause(&self) -> Option<&TryError> {
        let mut root = self.cause()?;
        while let Some(next) = root.cause() {
            root = next;
        }
        Some(root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static INSUFFICIENT_FUNDS: ErrorKind =
        ErrorKind::with_parent("insufficient-funds", &BUSINESS);
    static LOCAL_TIMEOUT: ErrorKind = ErrorKind::new("timeout");

    #[test]
    fn test_kind_hierarchy() {
        assert!(TIMEOUT.is_a(&TIMEOUT));
        assert!(TIMEOUT.is_a(&OUTCOME_UNKNOWN));
        assert!(TIMEOUT.is_a(&BUSINESS));
        assert!(!OUTCOME_UNKNOWN.is_a(&TIMEOUT));
        assert!(!INSUFFICIENT_FUNDS.is_a(&OUTCOME_UNKNOWN));
    }

    #[test]
    fn test_same_name_kinds_are_distinct() {
        assert_eq!(LOCAL_TIMEOUT.to_string(), TIMEOUT.to_string());
        assert_ne!(LOCAL_TIMEOUT, TIMEOUT);
        assert!(!LOCAL_TIMEOUT.is_a(&OUTCOME_UNKNOWN));
        assert!(!TIMEOUT.is_a(&LOCAL_TIMEOUT));
        assert_ne!(
            TryError::new(&LOCAL_TIMEOUT, "read timed out"),
            TryError::new(&TIMEOUT, "read timed out")
        );
    }

    #[test]
    fn test_root_cause() {
        let leaf = TryError::new(&TIMEOUT, "socket read timed out");
        let middle = TryError::business("remote call failed").caused_by(leaf);
        let top = TryError::new(&INSUFFICIENT_FUNDS, "payment rejected").caused_by(middle);

        let root = top.root_cause().unwrap();
        assert_eq!(root.kind(), &TIMEOUT);
        assert_eq!(root.message(), "socket read timed out");
        assert!(TryError::business("alone").root_cause().is_none());
    }

    #[test]
    fn test_display() {
        let error = TryError::new(&INSUFFICIENT_FUNDS, "balance is 3");
        assert_eq!(error.to_string(), "insufficient-funds: balance is 3");
    }
}
