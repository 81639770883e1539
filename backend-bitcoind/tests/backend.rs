use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use backend_bitcoind::{Auth, BitcoindBackend, Error, HttpClient, Result, RpcClient};
use bitcoin::Amount;
use serde_json::{json, Value};
use spindex_core::ChainBackend;

const BLOCK_HASH: &str = "00000000000000000002a7c4c1e48d76c5a37902165a270156b7a8d72728a054";
const FUNDING_BLOCK: &str = "0000000000000000000320283a032748cef8227873ff4872689bf23f1cda83a5";
const FUNDING_TXID: &str = "a1075db55d416d3ca199f55b6084e2115b9345e16c5cf302fc80e9d5fbf5d48d";
const TAPROOT_SPK: &str = "51205a1e61f898173040e20616d43e9f496fba90338a39faa1ed98fcbaeee4dd9be5";

/// Answers single calls by method name and counts them.
#[derive(Clone, Default)]
struct Node {
    results: Arc<HashMap<&'static str, Value>>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl Node {
    fn with(results: Vec<(&'static str, Value)>) -> Self {
        Self {
            results: Arc::new(results.into_iter().collect()),
            calls: Arc::default(),
        }
    }

    fn answer(&self, request: &Value) -> Value {
        let method = request["method"].as_str().unwrap_or_default();
        self.calls.lock().unwrap().push(method.to_string());
        match self.results.get(method) {
            Some(result) => json!({"result": result, "error": null, "id": request["id"]}),
            None => json!({
                "result": null,
                "error": {"code": -32601, "message": "Method not found"},
                "id": request["id"]
            }),
        }
    }
}

#[async_trait]
impl HttpClient for Node {
    async fn post_json(
        &self,
        _url: &str,
        json_body: &str,
        _credentials: Option<&(String, String)>,
    ) -> Result<String> {
        let request: Value = serde_json::from_str(json_body)?;
        let response = match request.as_array() {
            Some(batch) => Value::Array(batch.iter().map(|r| self.answer(r)).collect()),
            None => self.answer(&request),
        };
        Ok(response.to_string())
    }
}

fn backend(node: Node) -> BitcoindBackend<Node> {
    BitcoindBackend::new(RpcClient::new("http://localhost:18443", &Auth::None, node).unwrap())
}

fn block(prevout: Option<Value>) -> Value {
    let mut input = json!({
        "txid": FUNDING_TXID,
        "vout": 1,
        "scriptSig": {"asm": "", "hex": ""},
        "txinwitness": ["0000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000"],
    });
    if let Some(prevout) = prevout {
        input["prevout"] = prevout;
    }
    json!({
        "hash": BLOCK_HASH,
        "height": 850_001,
        "time": 1_720_000_000,
        "previousblockhash": FUNDING_BLOCK,
        "tx": [
            {
                "txid": "b3f2a7c0e4d5c6b7a8998a7b6c5d4e3f2a1b0c9d8e7f6a5b4c3d2e1f0a1b2c3d",
                "vin": [input],
                "vout": [{"value": 0.0009, "n": 0, "scriptPubKey": {"hex": TAPROOT_SPK}}]
            }
        ]
    })
}

#[tokio::test]
async fn unresolved_prevouts_are_fetched_from_the_funding_transaction() {
    let node = Node::with(vec![
        ("getblock", block(None)),
        (
            "getrawtransaction",
            json!({
                "txid": FUNDING_TXID,
                "blockhash": FUNDING_BLOCK,
                "vin": [],
                "vout": [
                    {"value": 0.5, "n": 0, "scriptPubKey": {"hex": "0014000102030405060708090a0b0c0d0e0f10111213"}},
                    {"value": 0.001, "n": 1, "scriptPubKey": {"hex": TAPROOT_SPK}}
                ]
            }),
        ),
        (
            "getblockheader",
            json!({"hash": FUNDING_BLOCK, "height": 850_000, "time": 1_719_999_000}),
        ),
    ]);
    let backend = backend(node.clone());

    let block = backend.block(&BLOCK_HASH.parse().unwrap()).await.unwrap();
    let prevout = block.txs[0].inputs[0].prevout.as_ref().unwrap();
    assert_eq!(prevout.height, 850_000);
    assert_eq!(prevout.txout.value, Amount::from_sat(100_000));
    assert!(prevout.txout.script_pubkey.is_p2tr());

    assert_eq!(
        *node.calls.lock().unwrap(),
        vec!["getblock", "getrawtransaction", "getblockheader"]
    );
}

#[tokio::test]
async fn inline_prevouts_need_no_extra_calls() {
    let prevout = json!({"height": 849_000, "value": 0.001, "scriptPubKey": {"hex": TAPROOT_SPK}});
    let node = Node::with(vec![("getblock", block(Some(prevout)))]);
    let backend = backend(node.clone());

    let block = backend.block(&BLOCK_HASH.parse().unwrap()).await.unwrap();
    assert_eq!(block.txs[0].inputs[0].prevout.as_ref().unwrap().height, 849_000);
    assert_eq!(*node.calls.lock().unwrap(), vec!["getblock"]);
}

#[tokio::test]
async fn batched_lookups_keep_height_order() {
    let node = Node::with(vec![
        ("getblockhash", json!(BLOCK_HASH)),
        ("getblockchaininfo", json!({"blocks": 850_001, "bestblockhash": BLOCK_HASH})),
    ]);
    let backend = backend(node.clone());

    assert_eq!(backend.tip_height().await.unwrap(), 850_001);
    let hashes = backend.block_hashes(&[1, 2, 3]).await.unwrap();
    assert_eq!(hashes.len(), 3);
    assert_eq!(node.calls.lock().unwrap().len(), 4);
}

#[tokio::test]
async fn node_errors_name_the_failing_call() {
    let backend = backend(Node::default());
    let err = backend.best_block_hash().await.unwrap_err();
    assert!(err.to_string().contains("getbestblockhash"), "{err}");

    let client = RpcClient::new("http://localhost:18443", &Auth::None, Node::default()).unwrap();
    assert!(matches!(
        client.best_block_hash().await,
        Err(Error::Rpc { code: -32601, .. })
    ));
}
