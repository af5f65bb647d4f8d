use common::indexer::RPC_TIMEOUT;
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{json, Value};

use crate::types::{UtxoBlock, UtxoTransaction};

/// `getblockhash` for a height above the tip.
pub const RPC_INVALID_PARAMETER: i64 = -8;

#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("node error {code}: {message}")]
    Node { code: i64, message: String },

    #[error("{0} returned no result")]
    EmptyResult(String),
}

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

/// JSON-RPC 1.0 client for bitcoind and its forks (dogecoind included).
#[derive(Debug, Clone)]
pub struct UtxoRpcClient {
    http: Client,
    url: String,
    user: Option<String>,
    password: Option<String>,
}

impl UtxoRpcClient {
    pub fn new(url: &str, user: Option<String>, password: Option<String>) -> eyre::Result<Self> {
        let http = Client::builder().timeout(RPC_TIMEOUT).build()?;
        Ok(Self {
            http,
            url: url.to_string(),
            user,
            password,
        })
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, RpcError> {
        let body = json!({
            "jsonrpc": "1.0",
            "id": "payment-indexer",
            "method": method,
            "params": params,
        });

        let mut request = self.http.post(&self.url).json(&body);
        if let Some(user) = &self.user {
            request = request.basic_auth(user, self.password.as_ref());
        }

        // Errors come back with a non-2xx status and a JSON body.
        let response: RpcResponse<T> = request.send().await?.json().await?;
        if let Some(error) = response.error {
            return Err(RpcError::Node {
                code: error.code,
                message: error.message,
            });
        }
        response
            .result
            .ok_or_else(|| RpcError::EmptyResult(method.to_string()))
    }

    pub async fn block_count(&self) -> Result<u64, RpcError> {
        self.call("getblockcount", json!([])).await
    }

    pub async fn block_hash(&self, height: u64) -> Result<String, RpcError> {
        self.call("getblockhash", json!([height])).await
    }

    /// Verbosity `2` inlines decoded transactions; anything lower asks for
    /// the `true` form every fork understands, which lists txids only.
    pub async fn block(&self, hash: &str, verbosity: u8) -> Result<UtxoBlock, RpcError> {
        let params = if verbosity >= 2 {
            json!([hash, verbosity])
        } else {
            json!([hash, true])
        };
        self.call("getblock", params).await
    }

    pub async fn raw_transaction(&self, txid: &str) -> Result<UtxoTransaction, RpcError> {
        self.call("getrawtransaction", json!([txid, 1])).await
    }
}
