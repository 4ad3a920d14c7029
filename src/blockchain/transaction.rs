use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use utoipa::ToSchema;

/// Sender id used for mining rewards; no real participant owns it
pub const REWARD_SENDER: &str = "0";

/// Amount credited to the miner of each block
pub const MINING_REWARD: u64 = 1;

/// Represents a transfer waiting in the pending pool or sealed in a block
///
/// The fields hold whatever JSON value was submitted; neither their types
/// nor the amount's sign or size are checked. Values are kept exactly as
/// received (an integer stays an integer, a string stays a string) so every
/// node re-hashes a block to the same digest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Transaction {
    /// Sender's identifier
    #[schema(value_type = String, example = "alice")]
    pub sender: Value,

    /// Recipient's identifier
    #[schema(value_type = String, example = "bob")]
    pub recipient: Value,

    /// Amount being transferred
    #[schema(value_type = f64, example = 10)]
    pub amount: Value,
}

impl Transaction {
    /// Creates a new transaction
    ///
    /// # Arguments
    ///
    /// * `sender` - The sender's identifier
    /// * `recipient` - The recipient's identifier
    /// * `amount` - The amount to transfer
    pub fn new(sender: impl Into<Value>, recipient: impl Into<Value>, amount: impl Into<Value>) -> Self {
        Transaction {
            sender: sender.into(),
            recipient: recipient.into(),
            amount: amount.into(),
        }
    }

    /// Creates the reward transaction paid to the miner of a block
    ///
    /// # Arguments
    ///
    /// * `recipient` - The identifier of the mining node
    pub fn new_reward(recipient: impl Into<Value>) -> Self {
        Transaction::new(REWARD_SENDER, recipient, MINING_REWARD)
    }

    /// Checks if the transaction is a mining reward
    pub fn is_reward(&self) -> bool {
        self.sender == REWARD_SENDER
    }

    /// The transaction as a JSON object, used by the canonical block hash
    pub(crate) fn canonical_value(&self) -> Value {
        json!({
            "sender": self.sender,
            "recipient": self.recipient,
            "amount": self.amount,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_transaction() {
        let transaction = Transaction::new("alice", "bob", 10u64);

        assert_eq!(transaction.sender, "alice");
        assert_eq!(transaction.recipient, "bob");
        assert_eq!(transaction.amount, json!(10));
        assert!(!transaction.is_reward());
    }

    #[test]
    fn test_reward_transaction() {
        let transaction = Transaction::new_reward("miner");

        assert_eq!(transaction.sender, REWARD_SENDER);
        assert_eq!(transaction.recipient, "miner");
        assert_eq!(transaction.amount, json!(MINING_REWARD));
        assert!(transaction.is_reward());
    }

    #[test]
    fn test_amount_keeps_json_form() {
        let integer: Transaction =
            serde_json::from_str(r#"{"sender":"a","recipient":"b","amount":5}"#).unwrap();
        let float: Transaction =
            serde_json::from_str(r#"{"sender":"a","recipient":"b","amount":5.5}"#).unwrap();

        assert_eq!(serde_json::to_string(&integer.amount).unwrap(), "5");
        assert_eq!(serde_json::to_string(&float.amount).unwrap(), "5.5");
    }

    #[test]
    fn test_any_json_value_is_accepted() {
        for (body, amount) in [
            (r#"{"sender":"a","recipient":"b","amount":-3}"#, json!(-3)),
            (r#"{"sender":"a","recipient":"b","amount":"10"}"#, json!("10")),
            (r#"{"sender":"a","recipient":"b","amount":null}"#, Value::Null),
            (r#"{"sender":"a","recipient":"b","amount":{"units":2}}"#, json!({"units": 2})),
        ] {
            let transaction: Transaction = serde_json::from_str(body).unwrap();
            assert_eq!(transaction.amount, amount, "{}", body);
        }

        let numeric_sender: Transaction =
            serde_json::from_str(r#"{"sender":5,"recipient":["b"],"amount":1}"#).unwrap();
        assert_eq!(numeric_sender.sender, json!(5));
        assert_eq!(numeric_sender.recipient, json!(["b"]));
    }

    #[test]
    fn test_missing_field_is_rejected() {
        let result: Result<Transaction, _> =
            serde_json::from_str(r#"{"sender":"a","recipient":"b"}"#);

        assert!(result.is_err());
    }
}
