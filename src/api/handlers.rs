use actix_web::{web, HttpResponse, Responder};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use crate::blockchain::{Block, LedgerError, Transaction};
use crate::network::ChainResponse;
use crate::node::Node;

/// Data structure for the node state
pub type NodeData = web::Data<Node>;

/// Request for the transaction endpoint
///
/// Any JSON value is accepted for each field, `null` included. A field is
/// missing only when its key is absent, and missing fields are reported by
/// name.
#[derive(Serialize, Deserialize, ToSchema)]
pub struct TransactionRequest {
    /// The sender's identifier
    #[serde(default, deserialize_with = "present")]
    #[schema(value_type = Option<String>, example = "alice")]
    pub sender: Option<Value>,

    /// The recipient's identifier
    #[serde(default, deserialize_with = "present")]
    #[schema(value_type = Option<String>, example = "bob")]
    pub recipient: Option<Value>,

    /// The amount to transfer
    #[serde(default, deserialize_with = "present")]
    #[schema(value_type = Option<f64>, example = 10)]
    pub amount: Option<Value>,
}

/// Maps a present key to `Some`, even when its value is `null`
fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

impl TransactionRequest {
    fn into_transaction(self) -> Result<Transaction, LedgerError> {
        match (self.sender, self.recipient, self.amount) {
            (Some(sender), Some(recipient), Some(amount)) => {
                Ok(Transaction::new(sender, recipient, amount))
            }
            (sender, recipient, amount) => {
                let missing: Vec<&str> = [
                    ("sender", sender.is_none()),
                    ("recipient", recipient.is_none()),
                    ("amount", amount.is_none()),
                ]
                .iter()
                .filter(|(_, absent)| *absent)
                .map(|(field, _)| *field)
                .collect();

                Err(LedgerError::InvalidInput(format!(
                    "Missing values: {}",
                    missing.join(", ")
                )))
            }
        }
    }
}

/// Response for the transaction endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct TransactionResponse {
    /// The message
    pub message: String,

    /// The index of the block that will include this transaction
    pub block_index: u64,
}

/// Response for the mine endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct MineResponse {
    /// The message
    pub message: String,

    /// Index of the newly sealed block
    pub index: u64,

    /// Seconds since the epoch when the block was sealed
    pub timestamp: f64,

    /// Transactions sealed in the block, reward included
    pub transactions: Vec<Transaction>,

    /// Proof of work of the block
    pub proof: u64,

    /// Hash of the previous block
    pub previous_hash: String,
}

impl From<Block> for MineResponse {
    fn from(block: Block) -> Self {
        MineResponse {
            message: "New block Forged".to_string(),
            index: block.index,
            timestamp: block.timestamp,
            transactions: block.transactions,
            proof: block.proof,
            previous_hash: block.previous_hash,
        }
    }
}

/// Response for the validate endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct ValidationResponse {
    /// Whether every link of the local chain validates
    pub valid: bool,

    /// The length of the chain
    pub len: usize,
}

/// Request for the register nodes endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct RegisterNodesRequest {
    /// Peer addresses, e.g. `http://192.168.0.5:5000`
    pub nodes: Option<Vec<String>>,
}

/// Response for the register nodes endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct RegisterNodesResponse {
    /// The message
    pub message: String,

    /// All known peers after registration
    pub node_list: Vec<String>,
}

/// Response for the list nodes endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct NodesResponse {
    /// Number of known peers
    pub count: usize,

    /// Known peers in sorted order
    pub node_list: Vec<String>,
}

/// Response for the resolve endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct ResolveResponse {
    /// The message
    pub message: String,

    /// Whether the local chain was replaced
    pub replaced: bool,

    /// The chain after resolution
    pub new_chain: Vec<Block>,
}

/// Maps a ledger error to a JSON error response
fn error_response(err: &LedgerError) -> HttpResponse {
    let body = serde_json::json!({ "error": err.to_string() });

    match err {
        LedgerError::InvalidInput(_) => HttpResponse::BadRequest().json(body),
        LedgerError::MiningCancelled => HttpResponse::ServiceUnavailable().json(body),
        _ => HttpResponse::InternalServerError().json(body),
    }
}

/// Greeting
#[utoipa::path(
    get,
    path = "/index",
    responses(
        (status = 200, description = "Node is up", body = String)
    )
)]
pub async fn index() -> impl Responder {
    HttpResponse::Ok().body("Hello, Blockchain.")
}

/// Create a new transaction
///
/// Adds a new transaction to the pending pool
#[utoipa::path(
    post,
    path = "/transactions/new",
    request_body = TransactionRequest,
    responses(
        (status = 201, description = "Transaction queued", body = TransactionResponse),
        (status = 400, description = "Missing or malformed transaction fields")
    )
)]
pub async fn new_transaction(
    node: NodeData,
    transaction_req: web::Json<TransactionRequest>,
) -> impl Responder {
    let transaction = match transaction_req.into_inner().into_transaction() {
        Ok(transaction) => transaction,
        Err(err) => return error_response(&err),
    };

    match node.submit_transaction(transaction) {
        Ok(block_index) => HttpResponse::Created().json(TransactionResponse {
            message: format!("Transaction will be added to block {}", block_index),
            block_index,
        }),
        Err(err) => error_response(&err),
    }
}

/// Get all pending transactions
///
/// Returns all transactions waiting to be included in a block
#[utoipa::path(
    get,
    path = "/transactions/pending",
    responses(
        (status = 200, description = "Pending transactions retrieved successfully", body = Vec<Transaction>)
    )
)]
pub async fn get_pending_transactions(node: NodeData) -> impl Responder {
    HttpResponse::Ok().json(node.ledger().get_pending_transactions())
}

/// Mine a new block
///
/// Finds the next proof, pays this node its reward and seals the pending pool
#[utoipa::path(
    get,
    path = "/mine",
    responses(
        (status = 200, description = "Block mined successfully", body = MineResponse),
        (status = 503, description = "Proof search was cancelled or timed out"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn mine(node: NodeData) -> impl Responder {
    match node.mine().await {
        Ok(block) => HttpResponse::Ok().json(MineResponse::from(block)),
        Err(err) => error_response(&err),
    }
}

/// Get the full chain
///
/// This is also the chain-retrieval endpoint peers call during consensus
#[utoipa::path(
    get,
    path = "/chain",
    responses(
        (status = 200, description = "Chain retrieved successfully", body = ChainResponse)
    )
)]
pub async fn full_chain(node: NodeData) -> impl Responder {
    HttpResponse::Ok().json(ChainResponse::from(node.ledger().get_chain()))
}

/// Check if the local chain is valid
#[utoipa::path(
    get,
    path = "/validate",
    responses(
        (status = 200, description = "Chain validation status", body = ValidationResponse)
    )
)]
pub async fn validate_chain(node: NodeData) -> impl Responder {
    let ledger = node.ledger();

    HttpResponse::Ok().json(ValidationResponse {
        valid: ledger.is_valid(),
        len: ledger.len(),
    })
}

/// Register peers
///
/// Adds every address in the list to the peer registry. An empty list adds
/// nothing and echoes the current peers.
#[utoipa::path(
    post,
    path = "/nodes/register",
    request_body = RegisterNodesRequest,
    responses(
        (status = 200, description = "Peers registered", body = RegisterNodesResponse),
        (status = 400, description = "Missing node list or invalid address")
    )
)]
pub async fn register_nodes(
    node: NodeData,
    register_req: web::Json<RegisterNodesRequest>,
) -> impl Responder {
    let addresses = match register_req.into_inner().nodes {
        Some(addresses) => addresses,
        None => {
            return error_response(&LedgerError::InvalidInput(
                "Please supply a valid list of nodes".to_string(),
            ))
        }
    };

    match node.register_peers(&addresses) {
        Ok(node_list) => HttpResponse::Ok().json(RegisterNodesResponse {
            message: "New nodes have been added.".to_string(),
            node_list,
        }),
        Err(err) => error_response(&err),
    }
}

/// List known peers
#[utoipa::path(
    get,
    path = "/nodes",
    responses(
        (status = 200, description = "Known peers", body = NodesResponse)
    )
)]
pub async fn list_nodes(node: NodeData) -> impl Responder {
    let peers = node.peers();

    HttpResponse::Ok().json(NodesResponse {
        count: peers.len(),
        node_list: peers.peers(),
    })
}

/// Run consensus
///
/// Replaces the local chain with the longest valid peer chain, if any is longer
#[utoipa::path(
    get,
    path = "/nodes/resolve",
    responses(
        (status = 200, description = "Consensus round finished", body = ResolveResponse)
    )
)]
pub async fn consensus(node: NodeData) -> impl Responder {
    let replaced = node.resolve().await;
    let message = if replaced {
        "Our chain was replaced."
    } else {
        "Our chain is authoritative."
    };

    HttpResponse::Ok().json(ResolveResponse {
        message: message.to_string(),
        replaced,
        new_chain: node.ledger().get_chain(),
    })
}
