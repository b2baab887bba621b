//! Transaction identifiers.
//!
//! A [`TransactionXid`] is made of a global transaction id shared by the root transaction and
//! all of its branches, plus a branch qualifier. The root transaction always owns branch
//! [`TransactionXid::ROOT_BRANCH`]; every participant enlisted by the root receives the next
//! branch number from the root's sequence.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::XidParseError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TransactionXid {
    global_id: Uuid,
    branch: u32,
}

impl TransactionXid {
    /// The branch qualifier owned by a root transaction.
    pub const ROOT_BRANCH: u32 = 0;

    /// Creates a root xid with a fresh random global id.
    pub fn new_root() -> Self {
        Self {
            global_id: Uuid::new_v4(),
            branch: Self::ROOT_BRANCH,
        }
    }

    /// Creates a root xid whose global id is derived from a caller supplied identity.
    ///
    /// Two invocations carrying the same identity map to the same xid, which lets the
    /// transaction store reject the duplicate root.
    pub fn from_unique_identity(identity: &str) -> Self {
        Self {
            global_id: Uuid::new_v5(&Uuid::NAMESPACE_OID, identity.as_bytes()),
            branch: Self::ROOT_BRANCH,
        }
    }

    #[inline]
    pub fn new(global_id: Uuid, branch: u32) -> Self {
        Self { global_id, branch }
    }

    /// Returns the xid of branch `branch` within the same global transaction.
    #[inline]
    pub fn with_branch(&self, branch: u32) -> Self {
        Self {
            global_id: self.global_id,
            branch,
        }
    }

    #[inline]
    pub fn global_id(&self) -> Uuid {
        self.global_id
    }

    #[inline]
    pub fn branch(&self) -> u32 {
        self.branch
    }

    #[inline]
    pub fn is_root_branch(&self) -> bool {
        self.branch == Self::ROOT_BRANCH
    }
}

impl fmt::Display for TransactionXid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.global_id, self.branch)
    }
}

impl FromStr for TransactionXid {
    type Err = XidParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (global_id, branch) = s
            .rsplit_once(':')
            .ok_or_else(|| XidParseError::MissingSeparator(s.to_string()))?;
        let global_id =
            Uuid::parse_str(global_id).map_err(|_| XidParseError::InvalidGlobalId(s.to_string()))?;
        let branch = branch
            .parse()
            .map_err(|_| XidParseError::InvalidBranch(s.to_string()))?;
        Ok(Self { global_id, branch })
    }
}

impl TryFrom<String> for TransactionXid {
    type Error = XidParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TransactionXid> for String {
    fn from(xid: TransactionXid) -> Self {
        xid.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_display() {
        let xid = TransactionXid::new_root().with_branch(7);
        let parsed: TransactionXid = xid.to_string().parse().unwrap();
        assert_eq!(parsed, xid);
        assert_eq!(parsed.branch(), 7);
        assert!(!parsed.is_root_branch());
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            "no-separator".parse::<TransactionXid>(),
            Err(XidParseError::MissingSeparator(_))
        ));
        assert!(matches!(
            "not-a-uuid:1".parse::<TransactionXid>(),
            Err(XidParseError::InvalidGlobalId(_))
        ));
        let global_id = Uuid::new_v4();
        assert!(matches!(
            format!("{global_id}:x").parse::<TransactionXid>(),
            Err(XidParseError::InvalidBranch(_))
        ));
    }

    #[test]
    fn test_unique_identity_is_stable() {
        let a = TransactionXid::from_unique_identity("order-42");
        let b = TransactionXid::from_unique_identity("order-42");
        let c = TransactionXid::from_unique_identity("order-43");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.is_root_branch());
    }

    #[test]
    fn test_branches_share_global_id() {
        let root = TransactionXid::new_root();
        let branch = root.with_branch(3);
        assert_eq!(root.global_id(), branch.global_id());
        assert_ne!(root, branch);
    }
}
