//! Operational alert channel.
//!
//! Scanners raise alerts for conditions an operator has to look at: transfers
//! that could not be tied to an order, scan cycles failing with non-transient
//! errors and chains that stopped advancing. Delivery is best effort and never
//! blocks the scanner on failure.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};

use crate::config::AlertConfig;

const MAX_RETRIES: u32 = 3;
const RETRY_DELAY_SECS: u64 = 2;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Alert {
    UnmatchedTransfer {
        chain: String,
        tx_hash: String,
        sender: Option<String>,
        recipient: String,
        token_id: i64,
        amount: String,
    },
    ScanFailure {
        chain: String,
        block_number: u64,
        error: String,
    },
    StaleChain {
        chain: String,
        last_block: u64,
        stalled_secs: u64,
    },
}

impl Alert {
    pub fn chain(&self) -> &str {
        match self {
            Alert::UnmatchedTransfer { chain, .. }
            | Alert::ScanFailure { chain, .. }
            | Alert::StaleChain { chain, .. } => chain,
        }
    }

    pub fn summary(&self) -> String {
        match self {
            Alert::UnmatchedTransfer {
                chain,
                tx_hash,
                sender,
                recipient,
                token_id,
                amount,
            } => format!(
                "[{}] unmatched transfer {} from {} to {} (token {}, amount {})",
                chain,
                tx_hash,
                sender.as_deref().unwrap_or("unknown"),
                recipient,
                token_id,
                amount
            ),
            Alert::ScanFailure {
                chain,
                block_number,
                error,
            } => format!("[{}] scan failed at block {}: {}", chain, block_number, error),
            Alert::StaleChain {
                chain,
                last_block,
                stalled_secs,
            } => format!(
                "[{}] no progress for {}s, last processed block {}",
                chain, stalled_secs, last_block
            ),
        }
    }
}

#[async_trait]
pub trait Alerter: Send + Sync {
    async fn send(&self, alert: Alert);
}

/// Writes alerts to the log only. Used when no webhook is configured.
#[derive(Debug, Clone, Default)]
pub struct LogAlerter;

#[async_trait]
impl Alerter for LogAlerter {
    async fn send(&self, alert: Alert) {
        warn!(chain = alert.chain(), "ALERT {}", alert.summary());
    }
}

/// Posts alerts as JSON to an HTTP endpoint.
#[derive(Debug, Clone)]
pub struct WebhookAlerter {
    client: Client,
    url: String,
}

impl WebhookAlerter {
    pub fn new(url: impl Into<String>, timeout: Duration) -> eyre::Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    async fn post(&self, alert: &Alert) -> eyre::Result<()> {
        let body = json!({
            "text": alert.summary(),
            "alert": alert,
        });

        let response = self.client.post(&self.url).json(&body).send().await?;
        if !response.status().is_success() {
            return Err(eyre::eyre!("webhook returned status {}", response.status()));
        }
        Ok(())
    }
}

#[async_trait]
impl Alerter for WebhookAlerter {
    async fn send(&self, alert: Alert) {
        warn!(chain = alert.chain(), "ALERT {}", alert.summary());

        for attempt in 1..=MAX_RETRIES {
            match self.post(&alert).await {
                Ok(()) => {
                    info!("Alert delivered to webhook");
                    return;
                }
                Err(e) => {
                    warn!(
                        "Failed to deliver alert (attempt {}/{}): {:?}",
                        attempt, MAX_RETRIES, e
                    );
                    if attempt < MAX_RETRIES {
                        tokio::time::sleep(Duration::from_secs(RETRY_DELAY_SECS)).await;
                    }
                }
            }
        }
    }
}

pub fn alerter_from_config(cfg: &AlertConfig) -> eyre::Result<Arc<dyn Alerter>> {
    match &cfg.webhook_url {
        Some(url) if !url.is_empty() => Ok(Arc::new(WebhookAlerter::new(
            url.clone(),
            Duration::from_secs(cfg.timeout_secs),
        )?)),
        _ => Ok(Arc::new(LogAlerter)),
    }
}
