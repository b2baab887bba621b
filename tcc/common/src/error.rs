use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum XidParseError {
    #[error("missing branch separator in xid `{0}`")]
    MissingSeparator(String),

    #[error("invalid global transaction id in xid `{0}`")]
    InvalidGlobalId(String),

    #[error("invalid branch qualifier in xid `{0}`")]
    InvalidBranch(String),
}
