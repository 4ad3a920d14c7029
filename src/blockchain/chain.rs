use std::sync::Arc;

use log::{debug, info};
use parking_lot::Mutex;
use thiserror::Error;

use super::block::Block;
use super::pow::ProofOfWork;
use super::transaction::Transaction;
use super::validation;

/// Errors that can occur during ledger and consensus operations
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Peer {peer} unreachable: {reason}")]
    PeerUnreachable { peer: String, reason: String },

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Mining cancelled")]
    MiningCancelled,

    #[error("Mining worker failed: {0}")]
    Worker(String),

    #[error("Chain is empty")]
    EmptyChain,
}

/// Chain and pending pool, always locked together so that sealing a block
/// reads the tip, drains the pool and appends in one step
#[derive(Debug)]
struct LedgerState {
    chain: Vec<Block>,
    pending: Vec<Transaction>,
}

/// Represents the local ledger: the committed chain plus the pending pool
#[derive(Debug, Clone)]
pub struct Ledger {
    state: Arc<Mutex<LedgerState>>,

    /// Puzzle used to validate this ledger's chain
    pow: ProofOfWork,
}

impl Ledger {
    /// Creates a new ledger holding only the genesis block
    ///
    /// # Arguments
    ///
    /// * `pow` - The proof-of-work puzzle used by this chain
    pub fn new(pow: ProofOfWork) -> Self {
        Ledger {
            state: Arc::new(Mutex::new(LedgerState {
                chain: vec![Block::genesis()],
                pending: Vec::new(),
            })),
            pow,
        }
    }

    pub fn pow(&self) -> ProofOfWork {
        self.pow
    }

    /// Gets the last block in the chain
    ///
    /// # Returns
    ///
    /// A copy of the last block, or `EmptyChain` if the chain has no blocks
    pub fn last_block(&self) -> Result<Block, LedgerError> {
        self.state
            .lock()
            .chain
            .last()
            .cloned()
            .ok_or(LedgerError::EmptyChain)
    }

    /// Adds a transaction to the pending pool
    ///
    /// # Arguments
    ///
    /// * `transaction` - The transaction to add
    ///
    /// # Returns
    ///
    /// The index of the block that will include this transaction
    pub fn queue_transaction(&self, transaction: Transaction) -> Result<u64, LedgerError> {
        let mut state = self.state.lock();
        let next_index = state
            .chain
            .last()
            .map(|block| block.index + 1)
            .ok_or(LedgerError::EmptyChain)?;

        debug!(
            "Queued transaction {} -> {} for block {}",
            transaction.sender, transaction.recipient, next_index
        );
        state.pending.push(transaction);

        Ok(next_index)
    }

    /// Seals the pending pool into a new block and appends it
    ///
    /// The proof is not checked here; callers obtain it from
    /// [`ProofOfWork::find_proof`] against the last block's proof.
    ///
    /// # Arguments
    ///
    /// * `proof` - The proof of work for the new block
    /// * `previous_hash` - Hash to link to; defaults to the hash of the last block
    ///
    /// # Returns
    ///
    /// The newly sealed block
    pub fn mine_block(&self, proof: u64, previous_hash: Option<String>) -> Result<Block, LedgerError> {
        let mut state = self.state.lock();

        let previous_hash = match previous_hash {
            Some(hash) => hash,
            None => state
                .chain
                .last()
                .map(Block::hash)
                .ok_or(LedgerError::EmptyChain)?,
        };

        let transactions = std::mem::take(&mut state.pending);
        let block = Block::new(state.chain.len() as u64 + 1, transactions, proof, previous_hash);
        state.chain.push(block.clone());

        info!(
            "Sealed block {} with proof {} and {} transaction(s)",
            block.index,
            block.proof,
            block.transactions.len()
        );

        Ok(block)
    }

    /// Replaces the chain if `candidate` is strictly longer than the current one
    ///
    /// The candidate must already have passed validation. The length is
    /// compared again under the lock because the local chain may have grown
    /// since the candidate was chosen.
    ///
    /// # Returns
    ///
    /// true if the chain was replaced
    pub fn replace_chain(&self, candidate: Vec<Block>) -> bool {
        let mut state = self.state.lock();

        if candidate.len() <= state.chain.len() {
            return false;
        }

        state.chain = candidate;
        true
    }

    /// Gets the entire chain
    pub fn get_chain(&self) -> Vec<Block> {
        self.state.lock().chain.clone()
    }

    /// Number of blocks in the chain
    pub fn len(&self) -> usize {
        self.state.lock().chain.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().chain.is_empty()
    }

    /// Gets all pending transactions
    pub fn get_pending_transactions(&self) -> Vec<Transaction> {
        self.state.lock().pending.clone()
    }

    /// Validates the local chain
    pub fn is_valid(&self) -> bool {
        validation::is_valid_chain(&self.get_chain(), &self.pow)
    }
}
