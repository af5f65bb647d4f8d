use config::{Config, File};
use dotenv::dotenv;
use eyre::{eyre, Result};
use serde::{de::DeserializeOwned, Deserialize};

fn config_from_env() -> Result<AppConfig> {
    dotenv().ok();

    let settings = Config::builder()
        .add_source(File::with_name("config.yaml").required(false))
        .add_source(
            config::Environment::default()
                .separator("__")
                .list_separator(",")
                .try_parsing(true),
        )
        .build()?;

    settings.try_deserialize().map_err(eyre::Error::from)
}

pub trait LoadFromEnv: Sized + DeserializeOwned {
    fn load() -> Result<Self>;
}

#[derive(Deserialize, Debug, Clone)]
pub struct AppConfig {
    pub indexer: Option<IndexerConfig>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
}

/// Settings shared by every chain family.
#[derive(Deserialize, Debug, Clone)]
pub struct ChainConfig {
    pub name: String,
    pub http_rpc_url: String,
    pub chain_id: u64,
    /// Blocks kept between the scan frontier and the tip.
    #[serde(default = "default_confirmations")]
    pub confirmations: u64,
    /// Blocks fetched in parallel while catching up. `1` disables catch-up mode.
    #[serde(default = "default_concurrency")]
    pub concurrency: u64,
    /// Idle poll interval once the scanner reaches the confirmation frontier.
    pub block_time_ms: u64,
    #[serde(default = "default_retry_interval_ms")]
    pub retry_interval_ms: u64,
    #[serde(default = "default_catch_up_retry_interval_ms")]
    pub catch_up_retry_interval_ms: u64,
    /// Merchant receiving addresses watched on this chain.
    pub recipients: Vec<String>,
    pub native_token_id: i64,
}

#[derive(Deserialize, Debug, Clone)]
pub struct TokenContractConfig {
    pub token_id: i64,
    pub contract: String,
}

#[derive(Deserialize, Debug, Clone)]
pub struct EvmConfig {
    pub common: ChainConfig,
    #[serde(default)]
    pub tokens: Vec<TokenContractConfig>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct TronConfig {
    pub common: ChainConfig,
    #[serde(default)]
    pub tokens: Vec<TokenContractConfig>,
    /// Sent as `TRON-PRO-API-KEY` when set.
    pub api_key: Option<String>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct UtxoConfig {
    pub common: ChainConfig,
    pub rpc_user: Option<String>,
    pub rpc_password: Option<String>,
    /// `2` asks the node for decoded transactions inline; nodes that only
    /// understand `1` get each transaction fetched separately.
    #[serde(default = "default_block_verbosity")]
    pub block_verbosity: u8,
}

#[derive(Deserialize, Debug, Clone)]
pub struct UdtConfig {
    pub token_id: i64,
    pub type_code_hash: String,
    pub type_args: String,
}

#[derive(Deserialize, Debug, Clone)]
pub struct CkbConfig {
    pub common: ChainConfig,
    pub lock_code_hash: String,
    #[serde(default)]
    pub udts: Vec<UdtConfig>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct ChainsConfig {
    pub ethereum: Option<EvmConfig>,
    pub bsc: Option<EvmConfig>,
    pub tron: Option<TronConfig>,
    pub bitcoin: Option<UtxoConfig>,
    pub dogecoin: Option<UtxoConfig>,
    pub ckb: Option<CkbConfig>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct IndexerSettings {
    /// Minimum staleness window. Slow chains get ten block times instead.
    pub stale_after_secs: u64,
    pub monitor_interval_secs: u64,
}

impl Default for IndexerSettings {
    fn default() -> Self {
        Self {
            stale_after_secs: 600,
            monitor_interval_secs: 60,
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct AlertConfig {
    pub webhook_url: Option<String>,
    #[serde(default = "default_alert_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            timeout_secs: default_alert_timeout_secs(),
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct IndexerConfig {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub settings: IndexerSettings,
    #[serde(default)]
    pub alert: AlertConfig,
    #[serde(default)]
    pub chains: ChainsConfig,
}

fn default_confirmations() -> u64 {
    6
}

fn default_concurrency() -> u64 {
    1
}

fn default_retry_interval_ms() -> u64 {
    3_000
}

fn default_catch_up_retry_interval_ms() -> u64 {
    10_000
}

fn default_block_verbosity() -> u8 {
    2
}

fn default_alert_timeout_secs() -> u64 {
    10
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("chain {0}: http_rpc_url must not be empty")]
    MissingRpcUrl(String),

    #[error("chain {0}: concurrency must be >= 1")]
    InvalidConcurrency(String),

    #[error("chain {0}: at least one recipient address is required")]
    NoRecipients(String),

    #[error("chain {0}: block_time_ms must be > 0")]
    InvalidBlockTime(String),

    #[error("chain id {0} is configured more than once")]
    DuplicateChainId(u64),

    #[error("no chains configured")]
    NoChains,
}

impl ChainConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.http_rpc_url.trim().is_empty() {
            return Err(ConfigError::MissingRpcUrl(self.name.clone()));
        }
        if self.concurrency == 0 {
            return Err(ConfigError::InvalidConcurrency(self.name.clone()));
        }
        if self.recipients.is_empty() {
            return Err(ConfigError::NoRecipients(self.name.clone()));
        }
        if self.block_time_ms == 0 {
            return Err(ConfigError::InvalidBlockTime(self.name.clone()));
        }
        Ok(())
    }
}

impl ChainsConfig {
    /// Common sections of every configured chain, in a fixed order.
    pub fn configured(&self) -> Vec<&ChainConfig> {
        let mut chains = Vec::new();
        if let Some(c) = &self.ethereum {
            chains.push(&c.common);
        }
        if let Some(c) = &self.bsc {
            chains.push(&c.common);
        }
        if let Some(c) = &self.tron {
            chains.push(&c.common);
        }
        if let Some(c) = &self.bitcoin {
            chains.push(&c.common);
        }
        if let Some(c) = &self.dogecoin {
            chains.push(&c.common);
        }
        if let Some(c) = &self.ckb {
            chains.push(&c.common);
        }
        chains
    }
}

impl IndexerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let chains = self.chains.configured();
        if chains.is_empty() {
            return Err(ConfigError::NoChains);
        }

        let mut seen = std::collections::HashSet::new();
        for chain in chains {
            chain.validate()?;
            if !seen.insert(chain.chain_id) {
                return Err(ConfigError::DuplicateChainId(chain.chain_id));
            }
        }
        Ok(())
    }
}

impl LoadFromEnv for IndexerConfig {
    fn load() -> Result<Self> {
        let cfg = config_from_env()?
            .indexer
            .ok_or_else(|| eyre!("Configuration for the 'indexer' service is missing."))?;
        cfg.validate()?;
        Ok(cfg)
    }
}
