use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use utoipa::ToSchema;

use super::transaction::Transaction;

/// Index of the genesis block
pub const GENESIS_INDEX: u64 = 1;

/// Proof carried by the genesis block
pub const GENESIS_PROOF: u64 = 100;

/// `previous_hash` of the genesis block: an all-zero SHA-256 hex digest
pub const GENESIS_PREVIOUS_HASH: &str =
    "0000000000000000000000000000000000000000000000000000000000000000";

/// Represents a block in the blockchain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Block {
    /// Position of the block in the chain, starting at 1
    pub index: u64,

    /// Seconds since the Unix epoch when the block was sealed
    #[schema(example = 1672574400.123456)]
    pub timestamp: f64,

    /// List of transactions included in this block
    pub transactions: Vec<Transaction>,

    /// Proof of work found against the previous block's proof
    pub proof: u64,

    /// Canonical hash of the previous block
    pub previous_hash: String,
}

impl Block {
    /// Creates a new block stamped with the current time
    ///
    /// # Arguments
    ///
    /// * `index` - The index of the block in the chain
    /// * `transactions` - The list of transactions to include in the block
    /// * `proof` - The proof of work
    /// * `previous_hash` - The hash of the previous block
    ///
    /// # Returns
    ///
    /// A new Block instance
    pub fn new(index: u64, transactions: Vec<Transaction>, proof: u64, previous_hash: String) -> Self {
        Block {
            index,
            timestamp: current_timestamp(),
            transactions,
            proof,
            previous_hash,
        }
    }

    /// Creates the genesis block every chain starts from
    pub fn genesis() -> Self {
        Block::new(
            GENESIS_INDEX,
            Vec::new(),
            GENESIS_PROOF,
            GENESIS_PREVIOUS_HASH.to_string(),
        )
    }

    /// Calculates the canonical hash of the block
    ///
    /// # Returns
    ///
    /// The SHA-256 hash of the block as a lowercase hexadecimal string
    pub fn hash(&self) -> String {
        canonical_hash(self)
    }
}

/// Hashes a block independently of how its fields were laid out in memory
/// or on the wire.
///
/// The block is rendered as a compact JSON object whose keys are sorted
/// lexicographically (nested transaction objects included), then hashed with
/// SHA-256. `serde_json::Map` is ordered by key, which gives the sorting; the
/// crate must not enable serde_json's `preserve_order` feature.
///
/// This encoding is used only for hashing. The wire format is whatever the
/// `Serialize` derive produces.
pub fn canonical_hash(block: &Block) -> String {
    let digest = Sha256::digest(canonical_encoding(block).as_bytes());
    hex::encode(digest)
}

fn canonical_encoding(block: &Block) -> String {
    let transactions: Vec<Value> = block
        .transactions
        .iter()
        .map(Transaction::canonical_value)
        .collect();

    let block_data = json!({
        "index": block.index,
        "timestamp": block.timestamp,
        "transactions": transactions,
        "proof": block.proof,
        "previous_hash": block.previous_hash,
    });

    block_data.to_string()
}

/// Current time as fractional seconds since the epoch, microsecond resolution
fn current_timestamp() -> f64 {
    Utc::now().timestamp_micros() as f64 / 1_000_000.0
}
