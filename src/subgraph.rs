//! # Subgraph Source
//!
//! Fetches the full set of farm vaults and lending reserves for one chain as a
//! single GraphQL document. Retries with exponential backoff live here, not in
//! the aggregator.

use crate::types::SubgraphSnapshot;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use log::{debug, warn};
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::time::Duration;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::Retry;

/// Vaults and lending reserves with every field the metrics engines read.
pub const POOLS_QUERY: &str = r#"{
  vaults {
    id
    vaultId
    blockNumber
    blockTimestamp
    pair
    token0
    token1
    stable
    paused
    frozen
    borrowingEnabled
    maxLeverage
    totalLp
    debtPositionId0
    debtPositionId1
  },
  lendingReservePools {
    id
    reserveId
    underlyingTokenAddress
    eTokenAddress
    totalLiquidity
    totalBorrows
    borrowingRate
  }
}"#;

/// Raw data source contract: one point-in-time snapshot per call, no pagination.
#[async_trait]
pub trait RawDataSource: Send + Sync {
    async fn fetch_snapshot(&self, chain: &str) -> Result<SubgraphSnapshot>;
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    data: Option<SubgraphSnapshot>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

impl GraphQlResponse {
    fn into_snapshot(self) -> Result<SubgraphSnapshot> {
        if !self.errors.is_empty() {
            let messages: Vec<&str> = self.errors.iter().map(|e| e.message.as_str()).collect();
            return Err(anyhow!("subgraph returned errors: {}", messages.join("; ")));
        }
        self.data.ok_or_else(|| anyhow!("subgraph response has no data"))
    }
}

/// GraphQL client for the protocol subgraph, one endpoint per chain.
#[derive(Clone)]
pub struct SubgraphClient {
    endpoints: HashMap<String, String>,
    client: reqwest::Client,
    max_retries: usize,
    retry_base_ms: u64,
}

impl SubgraphClient {
    pub fn new(
        endpoints: HashMap<String, String>,
        timeout: Duration,
        max_retries: usize,
        retry_base_ms: u64,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build subgraph http client")?;
        Ok(Self {
            endpoints,
            client,
            max_retries,
            retry_base_ms,
        })
    }

    pub fn endpoint(&self, chain: &str) -> Option<&str> {
        self.endpoints.get(chain).map(String::as_str)
    }

    async fn query_once(&self, url: &str) -> Result<SubgraphSnapshot> {
        let response = self
            .client
            .post(url)
            .json(&json!({ "query": POOLS_QUERY }))
            .send()
            .await
            .context("subgraph request failed")?;

        if !response.status().is_success() {
            return Err(anyhow!("subgraph HTTP error: {}", response.status()));
        }

        let bytes = response
            .bytes()
            .await
            .context("subgraph response read failed")?;
        let parsed: GraphQlResponse =
            serde_json::from_slice(&bytes).context("subgraph JSON parse failed")?;
        parsed.into_snapshot()
    }
}

/// Delays of 2x, 4x, 8x ... `retry_base_ms`, capped at 10s, one per retry.
fn backoff_delays(retry_base_ms: u64, max_retries: usize) -> impl Iterator<Item = Duration> {
    ExponentialBackoff::from_millis(2)
        .factor(retry_base_ms.max(1))
        .max_delay(Duration::from_secs(10))
        .take(max_retries)
}

#[async_trait]
impl RawDataSource for SubgraphClient {
    async fn fetch_snapshot(&self, chain: &str) -> Result<SubgraphSnapshot> {
        let url = self
            .endpoint(chain)
            .ok_or_else(|| anyhow!("no subgraph endpoint configured for chain {}", chain))?;

        let strategy = backoff_delays(self.retry_base_ms, self.max_retries).map(jitter);

        let mut attempt = 0usize;
        let snapshot = Retry::start(strategy, || {
            attempt += 1;
            let current = attempt;
            async move {
                self.query_once(url).await.map_err(|e| {
                    warn!("subgraph fetch for {} failed (attempt {}): {:#}", chain, current, e);
                    e
                })
            }
        })
        .await?;

        debug!(
            "subgraph snapshot for {}: {} vaults, {} reserves",
            chain,
            snapshot.vaults.len(),
            snapshot.lending_reserve_pools.len()
        );
        Ok(snapshot)
    }
}
