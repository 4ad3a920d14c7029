use std::sync::Arc;

use dashmap::DashSet;
use log::info;
use reqwest::Url;

use crate::blockchain::LedgerError;

/// Set of known peers, keyed by network location (`host[:port]`)
#[derive(Debug, Clone, Default)]
pub struct PeerRegistry {
    peers: Arc<DashSet<String>>,
}

impl PeerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a peer by address
    ///
    /// Accepts `http://host:port/path`, `host:port` or `host`; scheme and
    /// path are dropped. Registering the same location twice is a no-op.
    ///
    /// # Returns
    ///
    /// The network location that was stored
    pub fn register_peer(&self, address: &str) -> Result<String, LedgerError> {
        let location = parse_peer_address(address)?;
        self.insert(location.clone());
        Ok(location)
    }

    /// Inserts an already parsed network location
    pub(crate) fn insert(&self, location: String) {
        if self.peers.insert(location.clone()) {
            info!("Registered peer {}", location);
        }
    }

    /// All known peers in sorted order
    pub fn peers(&self) -> Vec<String> {
        let mut peers: Vec<String> = self.peers.iter().map(|peer| peer.key().clone()).collect();
        peers.sort();
        peers
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}

/// Extracts the network location (`host[:port]`) from a peer address
pub fn parse_peer_address(address: &str) -> Result<String, LedgerError> {
    let address = address.trim();
    if address.is_empty() {
        return Err(LedgerError::InvalidInput("peer address is empty".to_string()));
    }

    let candidate = if address.contains("://") {
        address.to_string()
    } else {
        format!("http://{}", address)
    };

    let url = Url::parse(&candidate)
        .map_err(|e| LedgerError::InvalidInput(format!("invalid peer address {:?}: {}", address, e)))?;

    let host = match url.host_str() {
        Some(host) if !host.is_empty() => host,
        _ => {
            return Err(LedgerError::InvalidInput(format!(
                "peer address {:?} has no host",
                address
            )))
        }
    };

    Ok(match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    })
}
