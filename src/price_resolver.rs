//! # Price Resolver
//!
//! Maps token addresses to their latest known price, symbol and decimals for
//! one chain. Prices come from a [`PriceSource`] in a single batch request; the
//! resulting [`PriceMap`] is read-only for the rest of the pipeline and never
//! fails a lookup: an address the source could not price resolves to
//! [`PriceLookup::Unpriced`].

use crate::types::{RawFarmVault, RawLendingReserve};
use anyhow::{Context, Result};
use async_trait::async_trait;
use indexmap::IndexMap;
use log::{debug, warn};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use url::Url;

/// Latest price of one token as reported by the price service.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TokenPrice {
    #[serde(default)]
    pub symbol: String,
    pub price: Decimal,
    #[serde(default)]
    pub decimals: Option<u32>,
    #[serde(default)]
    pub timestamp: Option<u64>,
    #[serde(default)]
    pub confidence: Option<f64>,
}

/// Result of a price lookup. Missing entries are a normal outcome, not an error.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PriceLookup<'a> {
    Priced(&'a TokenPrice),
    Unpriced,
}

impl<'a> PriceLookup<'a> {
    pub fn price(&self) -> Option<Decimal> {
        match self {
            PriceLookup::Priced(p) => Some(p.price),
            PriceLookup::Unpriced => None,
        }
    }

    pub fn symbol(&self) -> Option<&'a str> {
        match self {
            PriceLookup::Priced(p) if !p.symbol.is_empty() => Some(p.symbol.as_str()),
            _ => None,
        }
    }

    pub fn decimals(&self) -> Option<u32> {
        match self {
            PriceLookup::Priced(p) => p.decimals,
            PriceLookup::Unpriced => None,
        }
    }

    /// USD value of `amount` whole tokens; unpriced tokens are worth 0.
    pub fn value_of(&self, amount: Decimal) -> Decimal {
        self.price()
            .and_then(|p| amount.checked_mul(p))
            .unwrap_or(Decimal::ZERO)
    }
}

/// `"<chain>:<lowercased address>"`
pub fn coin_key(chain: &str, address: &str) -> String {
    format!("{}:{}", chain, address.trim().to_lowercase())
}

/// Token prices keyed by [`coin_key`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriceMap {
    prices: HashMap<String, TokenPrice>,
}

impl PriceMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the map from a price service response, normalizing key case.
    pub fn from_response(response: HashMap<String, TokenPrice>) -> Self {
        let prices = response
            .into_iter()
            .map(|(key, price)| (key.to_lowercase(), price))
            .collect();
        Self { prices }
    }

    pub fn insert(&mut self, chain: &str, address: &str, price: TokenPrice) {
        self.prices.insert(coin_key(chain, address), price);
    }

    pub fn lookup(&self, chain: &str, address: &str) -> PriceLookup<'_> {
        match self.prices.get(&coin_key(chain, address)) {
            Some(price) => PriceLookup::Priced(price),
            None => PriceLookup::Unpriced,
        }
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }
}

/// Token addresses that need a price: reserves' underlying tokens, then the
/// vaults' token0/token1. Deduplicated case-insensitively in first-seen order;
/// the first spelling of each address is kept.
pub fn collect_token_addresses<'a>(
    reserves: impl IntoIterator<Item = &'a RawLendingReserve>,
    vaults: impl IntoIterator<Item = &'a RawFarmVault>,
) -> Vec<String> {
    let mut seen: IndexMap<String, String> = IndexMap::new();
    let candidates = reserves
        .into_iter()
        .map(|r| r.underlying_token_address.as_str())
        .chain(
            vaults
                .into_iter()
                .flat_map(|v| [v.token0.as_str(), v.token1.as_str()]),
        );

    for address in candidates {
        let trimmed = address.trim();
        if trimmed.is_empty() {
            continue;
        }
        seen.entry(trimmed.to_lowercase())
            .or_insert_with(|| trimmed.to_string());
    }
    seen.into_values().collect()
}

/// Price service contract: one batch request for all addresses of a chain.
///
/// Implementations return entries keyed `"<chain>:<address>"` and leave out
/// addresses they cannot price. Only a failure of the whole request is an error.
#[async_trait]
pub trait PriceSource: Send + Sync {
    async fn fetch_prices(
        &self,
        chain: &str,
        addresses: &[String],
    ) -> Result<HashMap<String, TokenPrice>>;
}

#[derive(Debug, Deserialize)]
struct LlamaPriceResponse {
    #[serde(default)]
    coins: HashMap<String, serde_json::Value>,
}

impl LlamaPriceResponse {
    /// Entries without a usable price are left out, so they resolve as unpriced.
    fn into_prices(self) -> HashMap<String, TokenPrice> {
        self.coins
            .into_iter()
            .filter_map(|(key, entry)| match serde_json::from_value::<TokenPrice>(entry) {
                Ok(price) => Some((key, price)),
                Err(e) => {
                    debug!("skipping price entry {}: {}", key, e);
                    None
                }
            })
            .collect()
    }
}

/// DefiLlama coins API client (`/prices/current/{coins}`).
#[derive(Clone)]
pub struct LlamaPriceClient {
    base_url: Url,
    client: reqwest::Client,
}

impl LlamaPriceClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .with_context(|| format!("invalid price service url: {}", base_url))?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build price service http client")?;
        Ok(Self { base_url, client })
    }

    fn request_url(&self, chain: &str, addresses: &[String]) -> Result<Url> {
        let coins: Vec<String> = addresses
            .iter()
            .map(|address| format!("{}:{}", chain, address))
            .collect();
        let path = format!("prices/current/{}", coins.join(","));
        let mut base = self.base_url.clone();
        if !base.path().ends_with('/') {
            let with_slash = format!("{}/", base.path());
            base.set_path(&with_slash);
        }
        base.join(&path).context("failed to build price request url")
    }
}

#[async_trait]
impl PriceSource for LlamaPriceClient {
    async fn fetch_prices(
        &self,
        chain: &str,
        addresses: &[String],
    ) -> Result<HashMap<String, TokenPrice>> {
        if addresses.is_empty() {
            return Ok(HashMap::new());
        }

        let url = self.request_url(chain, addresses)?;
        debug!("Requesting {} prices from {}", addresses.len(), self.base_url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("price service request failed")?;

        if !response.status().is_success() {
            return Err(anyhow::anyhow!(
                "price service HTTP error: {}",
                response.status()
            ));
        }

        let bytes = response
            .bytes()
            .await
            .context("price service response read failed")?;
        let parsed: LlamaPriceResponse =
            serde_json::from_slice(&bytes).context("price service JSON parse failed")?;

        let prices = parsed.into_prices();

        let missing = addresses.len().saturating_sub(prices.len());
        if missing > 0 {
            warn!("{} of {} tokens have no price on {}", missing, addresses.len(), chain);
        }
        Ok(prices)
    }
}
