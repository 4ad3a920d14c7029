use std::time::Duration;

use futures::future::join_all;
use log::{debug, info, warn};

use super::client::{ChainResponse, ChainSource};
use super::peers::PeerRegistry;
use crate::blockchain::validation::validate_chain;
use crate::blockchain::{Block, Ledger, LedgerError};

/// Applies the longest-valid-chain rule against every registered peer
///
/// All peers are queried concurrently, each bounded by `fetch_timeout`.
/// Answers are then considered in sorted peer order: a chain becomes the
/// candidate when it is strictly longer than the best length seen so far
/// (seeded with the local length) and every link validates. Ties keep the
/// earlier candidate, so on equal length the local chain wins, and among
/// peers the lexicographically first address wins. Unreachable, hung or
/// malformed peers are skipped.
///
/// # Returns
///
/// true if the local chain was replaced
pub async fn resolve_conflicts(
    ledger: &Ledger,
    registry: &PeerRegistry,
    source: &dyn ChainSource,
    fetch_timeout: Duration,
) -> bool {
    if registry.is_empty() {
        debug!("No peers registered, keeping local chain");
        return false;
    }
    let peers = registry.peers();

    let fetches = peers.iter().map(|peer| async move {
        let result = match tokio::time::timeout(fetch_timeout, source.fetch_chain(peer)).await {
            Ok(result) => result,
            Err(_) => Err(LedgerError::PeerUnreachable {
                peer: peer.clone(),
                reason: format!("no answer within {:?}", fetch_timeout),
            }),
        };
        (peer, result)
    });
    let responses = join_all(fetches).await;

    let pow = ledger.pow();
    let mut max_length = ledger.len();
    let mut best: Option<(&String, Vec<Block>)> = None;

    for (peer, result) in responses {
        let ChainResponse { chain, len } = match result {
            Ok(response) => response,
            Err(err) => {
                warn!("Skipping peer {}: {}", peer, err);
                continue;
            }
        };

        if len != chain.len() {
            warn!(
                "Peer {} reported length {} but sent {} blocks",
                peer,
                len,
                chain.len()
            );
        }

        if chain.len() <= max_length {
            debug!(
                "Peer {} chain of {} blocks is not longer than {}",
                peer,
                chain.len(),
                max_length
            );
            continue;
        }

        if let Err(err) = validate_chain(&chain, &pow) {
            warn!("Rejecting chain from peer {}: {}", peer, err);
            continue;
        }

        max_length = chain.len();
        best = Some((peer, chain));
    }

    match best {
        Some((peer, chain)) => {
            let length = chain.len();
            if ledger.replace_chain(chain) {
                info!("Replaced local chain with {} blocks from peer {}", length, peer);
                true
            } else {
                info!("Local chain grew past peer {} during resolution, keeping it", peer);
                false
            }
        }
        None => {
            info!("Local chain of {} blocks is authoritative", ledger.len());
            false
        }
    }
}
