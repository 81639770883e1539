use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bitcoin::{BlockHash, Txid};
use log::{debug, trace};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use super::http_trait::HttpClient;
use super::structs::{
    BlockResponse, BlockchainInfoResponse, HeaderResponse, RpcRequest, RpcResponse, TxResponse,
};
use crate::auth::Auth;
use crate::error::{Error, Result};

const WORK_QUEUE_FULL: &str = "Work queue depth exceeded";
const MAX_ATTEMPTS: usize = 5;

/// JSON-RPC client for bitcoind.
///
/// Generic over the HTTP client implementation, allowing consumers to provide
/// their own HTTP client by implementing the `HttpClient` trait.
#[derive(Clone)]
pub struct RpcClient<H: HttpClient> {
    http_client: H,
    url: String,
    credentials: Option<(String, String)>,
    next_id: Arc<AtomicU64>,
}

impl<H: HttpClient> RpcClient<H> {
    /// Create a new RPC client. Cookie files are read once, here.
    pub fn new(url: impl Into<String>, auth: &Auth, http_client: H) -> Result<Self> {
        Ok(Self {
            http_client,
            url: url.into(),
            credentials: auth.credentials()?,
            next_id: Arc::new(AtomicU64::new(0)),
        })
    }

    /// Calls `method` and decodes its result.
    pub async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = serde_json::to_string(&RpcRequest {
            jsonrpc: "2.0",
            id,
            method,
            params,
        })?;
        trace!("rpc {method} id={id}");

        let response: RpcResponse<T> = serde_json::from_str(&self.post(&body).await?)?;
        unwrap_response(method, response)
    }

    /// Sends one JSON-RPC batch calling `method` once per entry of `params`.
    /// Results come back in the order of `params`.
    pub async fn batch<T: DeserializeOwned>(&self, method: &str, params: Vec<Value>) -> Result<Vec<T>> {
        if params.is_empty() {
            return Ok(Vec::new());
        }
        let count = params.len() as u64;
        let first = self.next_id.fetch_add(count, Ordering::Relaxed);
        let requests: Vec<RpcRequest> = params
            .into_iter()
            .zip(first..)
            .map(|(params, id)| RpcRequest {
                jsonrpc: "2.0",
                id,
                method,
                params,
            })
            .collect();
        debug!("rpc batch {method} x{count}");

        let body = serde_json::to_string(&requests)?;
        let responses: Vec<RpcResponse<T>> = serde_json::from_str(&self.post(&body).await?)?;

        let mut by_id: HashMap<u64, RpcResponse<T>> = HashMap::with_capacity(responses.len());
        for response in responses {
            let id = response
                .id
                .ok_or_else(|| Error::InvalidResponse("batch item without id".to_string()))?;
            by_id.insert(id, response);
        }
        (first..first + count)
            .map(|id| {
                let response = by_id.remove(&id).ok_or(Error::MissingBatchItem(id))?;
                unwrap_response(method, response)
            })
            .collect()
    }

    async fn post(&self, body: &str) -> Result<String> {
        let mut attempts = 0;
        loop {
            attempts += 1;
            let response = self
                .http_client
                .post_json(&self.url, body, self.credentials.as_ref())
                .await?;
            if !response.contains(WORK_QUEUE_FULL) {
                return Ok(response);
            }
            if attempts >= MAX_ATTEMPTS {
                return Err(Error::WorkQueueFull(attempts));
            }
            tokio::time::sleep(Duration::from_millis(500)).await;
        }
    }

    pub async fn best_block_hash(&self) -> Result<BlockHash> {
        self.call("getbestblockhash", json!([])).await
    }

    pub async fn blockchain_info(&self) -> Result<BlockchainInfoResponse> {
        self.call("getblockchaininfo", json!([])).await
    }

    pub async fn block_hash(&self, height: u32) -> Result<BlockHash> {
        self.call("getblockhash", json!([height])).await
    }

    pub async fn block_hashes(&self, heights: &[u32]) -> Result<Vec<BlockHash>> {
        let params = heights.iter().map(|height| json!([height])).collect();
        self.batch("getblockhash", params).await
    }

    pub async fn block_header(&self, hash: &BlockHash) -> Result<HeaderResponse> {
        self.call("getblockheader", json!([hash, true])).await
    }

    pub async fn block_headers(&self, hashes: &[BlockHash]) -> Result<Vec<HeaderResponse>> {
        let params = hashes.iter().map(|hash| json!([hash, true])).collect();
        self.batch("getblockheader", params).await
    }

    /// `getblock` at verbosity 3: every input carries its spent output.
    pub async fn block(&self, hash: &BlockHash) -> Result<BlockResponse> {
        self.call("getblock", json!([hash, 3])).await
    }

    /// `getrawtransaction` at verbosity 2. Without `block_hash` the node needs
    /// `-txindex` to find transactions outside the mempool.
    pub async fn raw_transaction(
        &self,
        txid: &Txid,
        block_hash: Option<&BlockHash>,
    ) -> Result<TxResponse> {
        let params = match block_hash {
            Some(block_hash) => json!([txid, 2, block_hash]),
            None => json!([txid, 2]),
        };
        self.call("getrawtransaction", params).await
    }
}

fn unwrap_response<T>(method: &str, response: RpcResponse<T>) -> Result<T> {
    match (response.error, response.result) {
        (Some(error), _) => Err(Error::Rpc {
            method: method.to_string(),
            code: error.code,
            message: error.message,
        }),
        (None, Some(result)) => Ok(result),
        (None, None) => Err(Error::EmptyResult(method.to_string())),
    }
}
