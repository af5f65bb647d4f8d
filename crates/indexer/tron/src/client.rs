use common::indexer::RPC_TIMEOUT;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use crate::types::TronBlock;

/// Minimal client for the full-node HTTP API (`/wallet/*`).
#[derive(Debug, Clone)]
pub struct TronClient {
    http: Client,
    base_url: String,
    api_key: Option<String>,
}

impl TronClient {
    pub fn new(base_url: &str, api_key: Option<String>) -> eyre::Result<Self> {
        let http = Client::builder().timeout(RPC_TIMEOUT).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    async fn post<T: DeserializeOwned>(&self, path: &str, body: Value) -> eyre::Result<T> {
        let mut request = self
            .http
            .post(format!("{}{}", self.base_url, path))
            .json(&body);
        if let Some(key) = &self.api_key {
            request = request.header("TRON-PRO-API-KEY", key);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(eyre::eyre!("{} returned status {}", path, response.status()));
        }
        Ok(response.json::<T>().await?)
    }

    pub async fn now_block(&self) -> eyre::Result<TronBlock> {
        self.post("/wallet/getnowblock", json!({})).await
    }

    /// An empty object comes back for heights the node has not reached.
    pub async fn block_by_num(&self, number: u64) -> eyre::Result<TronBlock> {
        self.post("/wallet/getblockbynum", json!({ "num": number }))
            .await
    }
}
