use crate::farm_rates::StaticFarmRates;
use crate::lending::LendingConfig;
use config::{Config, ConfigError, File};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::env;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Protocol {
    /// Chain identifier used for subgraph selection, price keys and pool keys
    #[serde(default = "default_chain")]
    pub chain: String,
}

fn default_chain() -> String {
    "optimism".to_string()
}

impl Default for Protocol {
    fn default() -> Self {
        Self {
            chain: default_chain(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Subgraph {
    /// chain -> GraphQL endpoint
    #[serde(default = "default_subgraph_urls")]
    pub urls: HashMap<String, String>,
    #[serde(default = "default_subgraph_timeout_seconds")]
    pub timeout_seconds: u64,
    #[serde(default = "default_subgraph_max_retries")]
    pub max_retries: usize,
    #[serde(default = "default_retry_base_ms")]
    pub retry_base_ms: u64,
}

fn default_subgraph_urls() -> HashMap<String, String> {
    HashMap::from([(
        "optimism".to_string(),
        "https://api.thegraph.com/subgraphs/name/extrafi/extrasubgraph".to_string(),
    )])
}
fn default_subgraph_timeout_seconds() -> u64 {
    30
}
fn default_subgraph_max_retries() -> usize {
    3
}
fn default_retry_base_ms() -> u64 {
    250
}

impl Default for Subgraph {
    fn default() -> Self {
        Self {
            urls: default_subgraph_urls(),
            timeout_seconds: default_subgraph_timeout_seconds(),
            max_retries: default_subgraph_max_retries(),
            retry_base_ms: default_retry_base_ms(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct PriceService {
    #[serde(default = "default_price_service_url")]
    pub base_url: String,
    #[serde(default = "default_price_service_timeout_seconds")]
    pub timeout_seconds: u64,
}

fn default_price_service_url() -> String {
    "https://coins.llama.fi".to_string()
}
fn default_price_service_timeout_seconds() -> u64 {
    15
}

impl Default for PriceService {
    fn default() -> Self {
        Self {
            base_url: default_price_service_url(),
            timeout_seconds: default_price_service_timeout_seconds(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Rpc {
    /// HTTP endpoint used to read LP pair reserves
    #[serde(default = "default_rpc_http_url")]
    pub http_url: String,
}

fn default_rpc_http_url() -> String {
    "https://mainnet.optimism.io".to_string()
}

impl Default for Rpc {
    fn default() -> Self {
        Self {
            http_url: default_rpc_http_url(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Vaults {
    #[serde(default = "default_vault_max_concurrency")]
    pub max_concurrency: usize,
}

fn default_vault_max_concurrency() -> usize {
    8
}

impl Default for Vaults {
    fn default() -> Self {
        Self {
            max_concurrency: default_vault_max_concurrency(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Settings {
    #[serde(default)]
    pub protocol: Protocol,
    #[serde(default)]
    pub subgraph: Subgraph,
    #[serde(default)]
    pub price_service: PriceService,
    #[serde(default)]
    pub rpc: Rpc,
    #[serde(default)]
    pub lending: LendingConfig,
    #[serde(default)]
    pub vaults: Vaults,
    /// pair address -> farming APR (percentage)
    #[serde(default)]
    pub farm_rates: HashMap<String, Decimal>,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        Self::from_file("Config.toml")
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::from(path.as_ref()))
            .build()?;

        let mut settings: Self = s.try_deserialize()?;
        settings.apply_env_overrides();
        Ok(settings)
    }

    /// Environment variable overrides (`YIELD_*`), applied after the file.
    pub fn apply_env_overrides(&mut self) {
        if let Some(chain) = non_empty_env("YIELD_CHAIN") {
            self.protocol.chain = chain.to_lowercase();
        }
        if let Some(url) = non_empty_env("YIELD_SUBGRAPH_URL") {
            self.subgraph.urls.insert(self.protocol.chain.clone(), url);
        }
        if let Some(url) = non_empty_env("YIELD_PRICE_SERVICE_URL") {
            self.price_service.base_url = url;
        }
        if let Some(url) = non_empty_env("YIELD_RPC_HTTP_URL") {
            self.rpc.http_url = url;
        }
    }

    pub fn subgraph_timeout(&self) -> Duration {
        Duration::from_secs(self.subgraph.timeout_seconds)
    }

    pub fn price_service_timeout(&self) -> Duration {
        Duration::from_secs(self.price_service.timeout_seconds)
    }

    pub fn farm_rate_table(&self) -> StaticFarmRates {
        StaticFarmRates::new(self.farm_rates.iter().map(|(pair, apr)| (pair, *apr)))
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
