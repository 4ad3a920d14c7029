//! Process-wide node state shared by every request handler.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{error, info, warn};
use uuid::Uuid;

use crate::blockchain::{Block, Ledger, LedgerError, ProofOfWork, Transaction};
use crate::config::Config;
use crate::network::peers::parse_peer_address;
use crate::network::{resolve_conflicts, ChainSource, HttpChainSource, PeerRegistry};

/// A ledger node: its identity, its chain, and the peers it reconciles with
///
/// Mining and conflict resolution both rewrite the chain tip and are
/// serialised through `writer`. Queuing a transaction only touches the
/// pending pool and never waits on them.
pub struct Node {
    /// Random identifier receiving this node's mining rewards
    identifier: String,
    ledger: Ledger,
    peers: PeerRegistry,
    source: Arc<dyn ChainSource>,
    peer_timeout: Duration,
    mine_timeout: Option<Duration>,
    writer: tokio::sync::Mutex<()>,
    /// Cancellation flags of every `mine` call in flight, running or queued
    searches: parking_lot::Mutex<Vec<Arc<AtomicBool>>>,
}

/// Keeps a mining call's cancellation flag registered until the call returns
struct SearchGuard<'a> {
    searches: &'a parking_lot::Mutex<Vec<Arc<AtomicBool>>>,
    cancel: Arc<AtomicBool>,
}

impl<'a> SearchGuard<'a> {
    fn register(searches: &'a parking_lot::Mutex<Vec<Arc<AtomicBool>>>) -> Self {
        let cancel = Arc::new(AtomicBool::new(false));
        searches.lock().push(cancel.clone());
        SearchGuard { searches, cancel }
    }
}

impl Drop for SearchGuard<'_> {
    fn drop(&mut self) {
        self.searches
            .lock()
            .retain(|flag| !Arc::ptr_eq(flag, &self.cancel));
    }
}

impl Node {
    /// Creates a node with a fresh identifier
    ///
    /// # Arguments
    ///
    /// * `ledger` - The ledger this node owns
    /// * `source` - Where peer chains are fetched from during consensus
    /// * `peer_timeout` - Upper bound on fetching one peer's chain
    pub fn new(ledger: Ledger, source: Arc<dyn ChainSource>, peer_timeout: Duration) -> Self {
        Node {
            identifier: Uuid::new_v4().simple().to_string(),
            ledger,
            peers: PeerRegistry::new(),
            source,
            peer_timeout,
            mine_timeout: None,
            writer: tokio::sync::Mutex::new(()),
            searches: parking_lot::Mutex::new(Vec::new()),
        }
    }

    /// Builds a node talking to peers over HTTP from the process configuration
    pub fn from_config(config: &Config) -> Result<Self, reqwest::Error> {
        let ledger = Ledger::new(ProofOfWork::new(config.difficulty));
        let source = HttpChainSource::new(config.peer_timeout())?;

        let mut node = Node::new(ledger, Arc::new(source), config.peer_timeout());
        node.mine_timeout = config.mine_timeout();
        Ok(node)
    }

    /// Bounds every proof search; a search running longer is cancelled
    pub fn with_mine_timeout(mut self, timeout: Duration) -> Self {
        self.mine_timeout = Some(timeout);
        self
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn peers(&self) -> &PeerRegistry {
        &self.peers
    }

    /// Queues a transaction for the next block
    ///
    /// # Returns
    ///
    /// The index of the block that will include it
    pub fn submit_transaction(&self, transaction: Transaction) -> Result<u64, LedgerError> {
        self.ledger.queue_transaction(transaction)
    }

    /// Runs the full mining protocol
    ///
    /// Searches for a proof against the last block's proof on a blocking
    /// worker, queues this node's reward, then seals the pending pool.
    ///
    /// # Returns
    ///
    /// The newly sealed block, or `MiningCancelled` if the search was
    /// cancelled or timed out, including a cancel issued while this call
    /// was still waiting for another writer
    pub async fn mine(&self) -> Result<Block, LedgerError> {
        let guard = SearchGuard::register(&self.searches);
        let cancel = guard.cancel.clone();

        let _writer = self.writer.lock().await;

        let last_proof = self.ledger.last_block()?.proof;
        let pow = self.ledger.pow();

        let worker_cancel = cancel.clone();
        let search =
            tokio::task::spawn_blocking(move || pow.find_proof_until(last_proof, &worker_cancel));

        let joined = match self.mine_timeout {
            Some(limit) => match tokio::time::timeout(limit, search).await {
                Ok(joined) => joined,
                Err(_) => {
                    cancel.store(true, Ordering::Relaxed);
                    warn!("Proof search for {} exceeded {:?}, cancelled", last_proof, limit);
                    return Err(LedgerError::MiningCancelled);
                }
            },
            None => search.await,
        };

        let proof = match joined {
            Ok(Some(proof)) => proof,
            Ok(None) => {
                info!("Proof search for {} was cancelled", last_proof);
                return Err(LedgerError::MiningCancelled);
            }
            Err(err) => {
                error!("Proof search worker failed: {}", err);
                return Err(LedgerError::Worker(err.to_string()));
            }
        };

        self.ledger
            .queue_transaction(Transaction::new_reward(self.identifier.as_str()))?;
        self.ledger.mine_block(proof, None)
    }

    /// Cancels every mining call in flight, the running search and any
    /// call still queued behind it
    pub fn cancel_mining(&self) {
        for flag in self.searches.lock().iter() {
            flag.store(true, Ordering::Relaxed);
        }
    }

    /// Registers a batch of peers
    ///
    /// Every address is parsed before any is stored, so a bad address leaves
    /// the registry untouched.
    ///
    /// # Returns
    ///
    /// The full, sorted peer list after registration
    pub fn register_peers(&self, addresses: &[String]) -> Result<Vec<String>, LedgerError> {
        let locations = addresses
            .iter()
            .map(|address| parse_peer_address(address))
            .collect::<Result<Vec<_>, _>>()?;

        for location in locations {
            self.peers.insert(location);
        }

        Ok(self.peers.peers())
    }

    /// Runs one consensus round against all registered peers
    ///
    /// # Returns
    ///
    /// true if the local chain was replaced
    pub async fn resolve(&self) -> bool {
        let _writer = self.writer.lock().await;
        resolve_conflicts(&self.ledger, &self.peers, self.source.as_ref(), self.peer_timeout).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::testing::ledger_with_blocks;
    use crate::blockchain::transaction::REWARD_SENDER;
    use crate::blockchain::validation::is_valid_chain;
    use crate::network::client::mock::StaticChainSource;

    fn test_node(difficulty: usize, source: StaticChainSource) -> Node {
        Node::new(
            Ledger::new(ProofOfWork::new(difficulty)),
            Arc::new(source),
            Duration::from_secs(1),
        )
    }

    #[test]
    fn test_identifier_is_random_and_dashless() {
        let first = test_node(1, StaticChainSource::new());
        let second = test_node(1, StaticChainSource::new());

        assert_eq!(first.identifier().len(), 32);
        assert!(!first.identifier().contains('-'));
        assert_ne!(first.identifier(), second.identifier());
    }

    #[tokio::test]
    async fn test_queue_then_mine() {
        let node = test_node(3, StaticChainSource::new());
        let genesis = node.ledger().last_block().unwrap();

        let block_index = node
            .submit_transaction(Transaction::new("A", "B", 10u64))
            .unwrap();
        assert_eq!(block_index, 2);

        let block = node.mine().await.unwrap();

        assert_eq!(block.index, 2);
        assert_eq!(block.previous_hash, genesis.hash());
        assert!(node.ledger().pow().is_valid_proof(genesis.proof, block.proof));
        assert_eq!(block.transactions.len(), 2);
        assert!(block.transactions.contains(&Transaction::new("A", "B", 10u64)));

        let reward = block
            .transactions
            .iter()
            .find(|tx| tx.is_reward())
            .unwrap();
        assert_eq!(reward.sender, REWARD_SENDER);
        assert_eq!(reward.recipient, node.identifier());
        assert_eq!(reward.amount, serde_json::json!(1));

        assert!(node.ledger().get_pending_transactions().is_empty());
        assert!(node.ledger().is_valid());
    }

    #[tokio::test]
    async fn test_repeated_mining_builds_valid_chain() {
        let node = test_node(2, StaticChainSource::new());

        for _ in 0..4 {
            node.mine().await.unwrap();
        }

        let chain = node.ledger().get_chain();
        assert_eq!(chain.len(), 5);
        assert!(is_valid_chain(&chain, &node.ledger().pow()));
    }

    #[tokio::test]
    async fn test_mine_timeout_cancels_search() {
        // No 64-digit zero hash will turn up before the timeout.
        let node = test_node(64, StaticChainSource::new())
            .with_mine_timeout(Duration::from_millis(50));

        let result = node.mine().await;

        assert!(matches!(result, Err(LedgerError::MiningCancelled)));
        assert_eq!(node.ledger().len(), 1);
        assert!(node.ledger().get_pending_transactions().is_empty());
    }

    #[tokio::test]
    async fn test_cancel_mining_stops_search() {
        let node = Arc::new(test_node(64, StaticChainSource::new()));

        let miner = node.clone();
        let handle = tokio::spawn(async move { miner.mine().await });

        tokio::time::sleep(Duration::from_millis(50)).await;
        node.cancel_mining();

        let result = handle.await.unwrap();
        assert!(matches!(result, Err(LedgerError::MiningCancelled)));
        assert_eq!(node.ledger().len(), 1);
    }

    #[tokio::test]
    async fn test_cancel_mining_reaches_queued_miner() {
        let node = Arc::new(test_node(64, StaticChainSource::new()));

        let running = node.clone();
        let running = tokio::spawn(async move { running.mine().await });
        let queued = node.clone();
        let queued = tokio::spawn(async move { queued.mine().await });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(node.searches.lock().len(), 2);
        node.cancel_mining();

        for handle in [running, queued] {
            let result = tokio::time::timeout(Duration::from_secs(5), handle)
                .await
                .unwrap()
                .unwrap();
            assert!(matches!(result, Err(LedgerError::MiningCancelled)));
        }
        assert!(node.searches.lock().is_empty());
        assert_eq!(node.ledger().len(), 1);
    }

    fn contested_node(peer_chain: Vec<Block>) -> Node {
        let source = StaticChainSource::new()
            .with_hanging_peer("hung:1")
            .with_chain("peer:1", peer_chain);
        let node = Node::new(
            Ledger::new(ProofOfWork::new(2)),
            Arc::new(source),
            Duration::from_millis(200),
        );
        node.register_peers(&["hung:1".to_string(), "peer:1".to_string()])
            .unwrap();
        node
    }

    #[tokio::test]
    async fn test_mine_waiting_on_resolve_extends_adopted_chain() {
        let peer_chain = ledger_with_blocks(2, 4).get_chain();
        let node = contested_node(peer_chain.clone());

        let (replaced, mined) = tokio::join!(node.resolve(), node.mine());

        assert!(replaced);
        let block = mined.unwrap();
        let peer_tip = peer_chain.last().unwrap();
        assert_eq!(block.index, peer_tip.index + 1);
        assert_eq!(block.previous_hash, peer_tip.hash());

        let chain = node.ledger().get_chain();
        assert_eq!(chain.len(), peer_chain.len() + 1);
        assert_eq!(&chain[..peer_chain.len()], &peer_chain[..]);
        assert_eq!(chain.last(), Some(&block));
        assert!(node.ledger().is_valid());
    }

    #[tokio::test]
    async fn test_resolve_waiting_on_mine_adopts_peer_chain() {
        let peer_chain = ledger_with_blocks(2, 4).get_chain();
        let node = contested_node(peer_chain.clone());

        let (mined, replaced) = tokio::join!(node.mine(), node.resolve());

        assert_eq!(mined.unwrap().index, 2);
        assert!(replaced);
        assert_eq!(node.ledger().get_chain(), peer_chain);
        assert!(node.ledger().is_valid());
    }

    #[test]
    fn test_register_peers_is_all_or_nothing() {
        let node = test_node(1, StaticChainSource::new());

        let peers = node
            .register_peers(&["http://b:2".to_string(), "a:1".to_string()])
            .unwrap();
        assert_eq!(peers, vec!["a:1", "b:2"]);

        let result = node.register_peers(&["c:3".to_string(), "bad:port".to_string()]);
        assert!(matches!(result, Err(LedgerError::InvalidInput(_))));
        assert_eq!(node.peers().peers(), vec!["a:1", "b:2"]);
    }

    #[tokio::test]
    async fn test_resolve_adopts_longer_peer_chain() {
        let longer = ledger_with_blocks(2, 4).get_chain();
        let node = test_node(2, StaticChainSource::new().with_chain("peer:1", longer.clone()));
        node.register_peers(&["peer:1".to_string()]).unwrap();

        assert!(node.resolve().await);
        assert_eq!(node.ledger().get_chain(), longer);

        assert!(!node.resolve().await);
    }
}
