//! A minimal proof-of-work ledger node.
//!
//! Each node keeps a hash-linked chain of blocks secured by a brute-force
//! proof-of-work puzzle, serves it over HTTP, and reconciles with its peers
//! by adopting the longest chain that validates.

pub mod api;
pub mod blockchain;
pub mod config;
pub mod network;
pub mod node;
