use miette::Diagnostic;
use tcc_common::TryError;
use tcc_transaction::TransactionError;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum Error {
    #[error("no active compensable transaction while propagation is mandatory for method {method}")]
    #[diagnostic(
        code(tcc::mandatory_propagation),
        help("call the method inside an active transaction or propagate a transaction context")
    )]
    MandatoryPropagation { method: String },

    #[error(transparent)]
    #[diagnostic(code(tcc::transaction))]
    Transaction(#[from] TransactionError),

    /// The business logic failed; the error is passed through unchanged.
    #[error(transparent)]
    #[diagnostic(code(tcc::business))]
    Business(#[from] TryError),
}

impl Error {
    /// Returns the business error, if the call failed in its business logic.
    pub fn as_business(&self) -> Option<&TryError> {
        match self {
            Self::Business(e) => Some(e),
            _ => None,
        }
    }
}

pub type InterceptResult<T> = std::result::Result<T, Error>;
