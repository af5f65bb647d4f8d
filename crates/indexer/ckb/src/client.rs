use common::indexer::RPC_TIMEOUT;
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{json, Value};

use crate::types::CkbBlock;

#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("node error {code}: {message}")]
    Node { code: i64, message: String },
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

/// JSON-RPC 2.0 client for a CKB node.
#[derive(Debug, Clone)]
pub struct CkbRpcClient {
    http: Client,
    url: String,
}

impl CkbRpcClient {
    pub fn new(url: &str) -> eyre::Result<Self> {
        let http = Client::builder().timeout(RPC_TIMEOUT).build()?;
        Ok(Self {
            http,
            url: url.to_string(),
        })
    }

    /// `Ok(None)` when the node answers with a `null` result.
    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<Option<T>, RpcError> {
        let body = json!({
            "id": 1,
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
        });

        let response: RpcResponse<T> = self
            .http
            .post(&self.url)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if let Some(error) = response.error {
            return Err(RpcError::Node {
                code: error.code,
                message: error.message,
            });
        }
        Ok(response.result)
    }

    pub async fn tip_block_number(&self) -> Result<Option<String>, RpcError> {
        self.call("get_tip_block_number", json!([])).await
    }

    pub async fn block_by_number(&self, number: u64) -> Result<Option<CkbBlock>, RpcError> {
        self.call("get_block_by_number", json!([format!("{:#x}", number)]))
            .await
    }
}
