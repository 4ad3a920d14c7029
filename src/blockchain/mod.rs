// Blockchain module
//
// This module contains the core ledger implementation including:
// - Block and transaction structures with canonical hashing
// - Proof of work puzzle
// - Chain validation
// - The ledger owning the chain and the pending pool

pub mod block;
pub mod chain;
pub mod pow;
pub mod transaction;
pub mod validation;

// Re-export main components for easier access
pub use block::Block;
pub use chain::{Ledger, LedgerError};
pub use pow::ProofOfWork;
pub use transaction::Transaction;
