use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::blockchain::{Block, LedgerError};

/// Chain-retrieval payload, served at `GET /chain` and read from peers
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ChainResponse {
    /// The blocks in the chain
    pub chain: Vec<Block>,

    /// The length of the chain
    pub len: usize,
}

impl From<Vec<Block>> for ChainResponse {
    fn from(chain: Vec<Block>) -> Self {
        ChainResponse {
            len: chain.len(),
            chain,
        }
    }
}

/// Where consensus reads peer chains from
#[async_trait]
pub trait ChainSource: Send + Sync {
    /// Fetches the chain of the peer at network location `peer`
    async fn fetch_chain(&self, peer: &str) -> Result<ChainResponse, LedgerError>;
}

/// Fetches peer chains over HTTP
#[derive(Debug, Clone)]
pub struct HttpChainSource {
    client: reqwest::Client,
}

impl HttpChainSource {
    /// Creates a client whose requests give up after `timeout`
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait]
impl ChainSource for HttpChainSource {
    async fn fetch_chain(&self, peer: &str) -> Result<ChainResponse, LedgerError> {
        let unreachable = |reason: String| LedgerError::PeerUnreachable {
            peer: peer.to_string(),
            reason,
        };

        let url = format!("http://{}/chain", peer);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| unreachable(format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(unreachable(format!("HTTP {}", response.status())));
        }

        response
            .json::<ChainResponse>()
            .await
            .map_err(|e| unreachable(format!("malformed chain response: {}", e)))
    }
}

#[cfg(test)]
pub(crate) mod mock {
    use std::collections::HashMap;
    use std::time::Duration;

    use super::*;

    /// Serves fixed chains; peers without an entry are unreachable and
    /// peers marked as hanging never answer
    #[derive(Debug, Default)]
    pub(crate) struct StaticChainSource {
        responses: HashMap<String, ChainResponse>,
        hanging: Vec<String>,
    }

    impl StaticChainSource {
        pub(crate) fn new() -> Self {
            Self::default()
        }

        pub(crate) fn with_chain(mut self, peer: &str, chain: Vec<Block>) -> Self {
            self.responses.insert(peer.to_string(), ChainResponse::from(chain));
            self
        }

        pub(crate) fn with_hanging_peer(mut self, peer: &str) -> Self {
            self.hanging.push(peer.to_string());
            self
        }
    }

    #[async_trait]
    impl ChainSource for StaticChainSource {
        async fn fetch_chain(&self, peer: &str) -> Result<ChainResponse, LedgerError> {
            if self.hanging.iter().any(|hanging| hanging == peer) {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }

            self.responses
                .get(peer)
                .cloned()
                .ok_or_else(|| LedgerError::PeerUnreachable {
                    peer: peer.to_string(),
                    reason: "connection refused".to_string(),
                })
        }
    }
}
