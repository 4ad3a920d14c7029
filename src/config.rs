//! Command-line and environment configuration for a ledger node.

use std::time::Duration;

use anyhow::{bail, Result};
use clap::Parser;

use crate::blockchain::pow::{DEFAULT_DIFFICULTY, MAX_DIFFICULTY};

/// Proof-of-work ledger node.
///
/// Serves the chain over HTTP, mines blocks on request and reconciles with
/// registered peers using the longest-valid-chain rule.
#[derive(Parser, Debug, Clone)]
#[command(name = "pow_ledger", version, about)]
pub struct Config {
    /// Address the HTTP server binds to.
    #[arg(long, env = "LEDGER_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port the HTTP server listens on.
    #[arg(long, short = 'p', env = "LEDGER_PORT", default_value_t = 5000)]
    pub port: u16,

    /// Leading zero hex digits a proof hash must have.
    #[arg(long, env = "LEDGER_DIFFICULTY", default_value_t = DEFAULT_DIFFICULTY)]
    pub difficulty: usize,

    /// Upper bound, in seconds, on fetching one peer's chain.
    #[arg(long = "peer-timeout-secs", env = "LEDGER_PEER_TIMEOUT", default_value_t = 5)]
    pub peer_timeout_secs: u64,

    /// Upper bound, in seconds, on a single proof search. Unbounded when omitted.
    #[arg(long = "mine-timeout-secs", env = "LEDGER_MINE_TIMEOUT")]
    pub mine_timeout_secs: Option<u64>,

    /// Peers registered at startup (repeatable, or comma separated in the env var).
    #[arg(long = "peer", env = "LEDGER_PEERS", value_delimiter = ',')]
    pub peers: Vec<String>,
}

impl Config {
    /// Rejects settings the node cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.difficulty == 0 || self.difficulty > MAX_DIFFICULTY {
            bail!(
                "difficulty must be between 1 and {}, got {}",
                MAX_DIFFICULTY,
                self.difficulty
            );
        }
        if self.peer_timeout_secs == 0 {
            bail!("peer timeout must be at least one second");
        }
        if self.mine_timeout_secs == Some(0) {
            bail!("mine timeout must be at least one second");
        }
        Ok(())
    }

    pub fn peer_timeout(&self) -> Duration {
        Duration::from_secs(self.peer_timeout_secs)
    }

    pub fn mine_timeout(&self) -> Option<Duration> {
        self.mine_timeout_secs.map(Duration::from_secs)
    }
}
