use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// The phase a transaction, or a participant asked to act on it, is in.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    Trying,
    Confirming,
    Cancelling,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_names() {
        assert_eq!(TransactionStatus::Confirming.to_string(), "CONFIRMING");
        assert_eq!(
            "CANCELLING".parse::<TransactionStatus>().unwrap(),
            TransactionStatus::Cancelling
        );
    }
}
