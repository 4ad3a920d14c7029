// Network module
//
// Peer bookkeeping and chain reconciliation:
// - Peer registry
// - Chain retrieval from peers
// - Longest-valid-chain consensus

pub mod client;
pub mod consensus;
pub mod peers;

pub use client::{ChainResponse, ChainSource, HttpChainSource};
pub use consensus::resolve_conflicts;
pub use peers::PeerRegistry;
