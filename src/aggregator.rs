//! # Pool Aggregator
//!
//! Root of the pipeline. One call to [`PoolAggregator::get_pools_data`] walks
//! the stages of [`PipelineStage`] in order:
//!
//! 1. **FetchingRaw**: one subgraph snapshot for the configured chain
//! 2. **ExtractingAddresses**: deduplicated token addresses needing a price
//! 3. **Pricing**: a single batch request to the price service
//! 4. **ComputingLending**: TVL/APY for reserves holding liquidity
//! 5. **ComputingVaults**: TVL/APY for live vaults holding LP
//! 6. **Assembling**: unified [`PoolRecord`]s, lending first, then vaults
//! 7. **Filtering**: drop records with a non-finite TVL or APY
//!
//! Nothing is cached between calls. Only a failed upstream fetch (subgraph or
//! price service) fails the call; every per-item problem is absorbed into
//! zeroed metrics.

use crate::farm_rates::FarmRateSource;
use crate::lending::{compute_lend_pool_apy, compute_lend_pool_tvl, LendingConfig};
use crate::lp_unwrap::LpUnwrapper;
use crate::metrics;
use crate::price_resolver::{collect_token_addresses, PriceMap, PriceSource};
use crate::settings::Settings;
use crate::subgraph::RawDataSource;
use crate::types::conversions::decimal_to_f64;
use crate::types::{
    PoolKind, PoolRecord, ProtocolDescriptor, RawFarmVault, RawLendingReserve, PROJECT, PROTOCOL,
};
use crate::utils::{format_chain, keep_finite, pool_key};
use crate::vault_metrics::{compute_vault_metrics, VaultEngineContext, VaultMetrics};
use log::{debug, info, warn};
use std::sync::Arc;
use std::time::Instant;
use tracing::instrument;

/// Stages of one aggregation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    FetchingRaw,
    ExtractingAddresses,
    Pricing,
    ComputingLending,
    ComputingVaults,
    Assembling,
    Filtering,
    Done,
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PipelineStage::FetchingRaw => "fetching-raw",
            PipelineStage::ExtractingAddresses => "extracting-addresses",
            PipelineStage::Pricing => "pricing",
            PipelineStage::ComputingLending => "computing-lending",
            PipelineStage::ComputingVaults => "computing-vaults",
            PipelineStage::Assembling => "assembling",
            PipelineStage::Filtering => "filtering",
            PipelineStage::Done => "done",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AggregatorError {
    #[error("raw data fetch failed for {chain}: {source:#}")]
    RawFetch {
        chain: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("price fetch failed for {chain}: {source:#}")]
    PriceFetch {
        chain: String,
        #[source]
        source: anyhow::Error,
    },
}

/// Tunables of the aggregator, usually taken from [`Settings`].
#[derive(Debug, Clone)]
pub struct AggregatorConfig {
    pub chain: String,
    pub lending: LendingConfig,
    pub vault_max_concurrency: usize,
}

impl AggregatorConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            chain: settings.protocol.chain.clone(),
            lending: settings.lending.clone(),
            vault_max_concurrency: settings.vaults.max_concurrency,
        }
    }
}

/// Lending reserve paired with its computed metrics.
struct LendingResult<'a> {
    reserve: &'a RawLendingReserve,
    symbol: Option<String>,
    tvl_usd: rust_decimal::Decimal,
    apy: rust_decimal::Decimal,
}

pub struct PoolAggregator {
    config: AggregatorConfig,
    raw_source: Arc<dyn RawDataSource>,
    price_source: Arc<dyn PriceSource>,
    unwrapper: Arc<dyn LpUnwrapper>,
    farm_rates: Arc<dyn FarmRateSource>,
}

impl PoolAggregator {
    pub fn new(
        config: AggregatorConfig,
        raw_source: Arc<dyn RawDataSource>,
        price_source: Arc<dyn PriceSource>,
        unwrapper: Arc<dyn LpUnwrapper>,
        farm_rates: Arc<dyn FarmRateSource>,
    ) -> Self {
        Self {
            config,
            raw_source,
            price_source,
            unwrapper,
            farm_rates,
        }
    }

    /// Protocol display name and landing page.
    pub fn descriptor() -> ProtocolDescriptor {
        PROTOCOL
    }

    pub fn chain(&self) -> &str {
        &self.config.chain
    }

    fn enter(stage: &mut PipelineStage, next: PipelineStage) {
        debug!("pipeline: {} -> {}", stage, next);
        *stage = next;
    }

    /// Builds the full, ordered list of pool records for the configured chain.
    #[instrument(skip(self), fields(chain = %self.config.chain))]
    pub async fn get_pools_data(&self) -> Result<Vec<PoolRecord>, AggregatorError> {
        let started = Instant::now();
        let chain = self.config.chain.as_str();
        let mut stage = PipelineStage::FetchingRaw;

        let snapshot = self.raw_source.fetch_snapshot(chain).await.map_err(|source| {
            metrics::increment_upstream_failure("subgraph");
            AggregatorError::RawFetch {
                chain: chain.to_string(),
                source,
            }
        })?;

        Self::enter(&mut stage, PipelineStage::ExtractingAddresses);
        let reserves: Vec<&RawLendingReserve> = snapshot
            .lending_reserve_pools
            .iter()
            .filter(|r| {
                if r.total_liquidity_units().is_none() {
                    warn!("reserve {}: unparsable totalLiquidity {:?}", r.id, r.total_liquidity);
                }
                r.has_liquidity()
            })
            .collect();
        let vaults: Vec<RawFarmVault> = snapshot
            .vaults
            .iter()
            .filter(|v| v.is_eligible())
            .cloned()
            .collect();
        let addresses = collect_token_addresses(reserves.iter().copied(), &snapshot.vaults);
        debug!(
            "{} reserves with liquidity, {} eligible vaults, {} tokens to price",
            reserves.len(),
            vaults.len(),
            addresses.len()
        );

        Self::enter(&mut stage, PipelineStage::Pricing);
        let response = self
            .price_source
            .fetch_prices(chain, &addresses)
            .await
            .map_err(|source| {
                metrics::increment_upstream_failure("prices");
                AggregatorError::PriceFetch {
                    chain: chain.to_string(),
                    source,
                }
            })?;
        let prices = PriceMap::from_response(response);

        Self::enter(&mut stage, PipelineStage::ComputingLending);
        let lending: Vec<LendingResult<'_>> = reserves
            .iter()
            .copied()
            .map(|reserve| {
                let lookup = prices.lookup(chain, &reserve.underlying_token_address);
                LendingResult {
                    reserve,
                    symbol: lookup.symbol().map(str::to_string),
                    tvl_usd: compute_lend_pool_tvl(reserve, lookup),
                    apy: compute_lend_pool_apy(reserve, &self.config.lending),
                }
            })
            .collect();

        Self::enter(&mut stage, PipelineStage::ComputingVaults);
        let ctx = VaultEngineContext {
            unwrapper: self.unwrapper.as_ref(),
            farm_rates: self.farm_rates.as_ref(),
            lending: &self.config.lending,
            max_concurrency: self.config.vault_max_concurrency,
        };
        let vault_metrics = compute_vault_metrics(
            &vaults,
            chain,
            &prices,
            &snapshot.lending_reserve_pools,
            &ctx,
        )
        .await;

        Self::enter(&mut stage, PipelineStage::Assembling);
        let chain_label = format_chain(chain);
        let mut records: Vec<PoolRecord> = Vec::with_capacity(lending.len() + vault_metrics.len());
        records.extend(lending.iter().map(|l| lending_record(l, chain, &chain_label)));
        records.extend(vault_metrics.iter().map(|m| vault_record(m, chain, &chain_label)));

        Self::enter(&mut stage, PipelineStage::Filtering);
        let assembled = records.len();
        records.retain(keep_finite);
        let dropped = assembled - records.len();
        if dropped > 0 {
            warn!("dropped {} pool records with non-finite TVL or APY", dropped);
            metrics::increment_pools_dropped(dropped as u64);
        }

        Self::enter(&mut stage, PipelineStage::Done);
        let lending_count = records
            .iter()
            .filter(|r| r.pool_meta == PoolKind::Lending.label())
            .count();
        metrics::increment_pools_emitted("lending", lending_count as u64);
        metrics::increment_pools_emitted("leveraged_farming", (records.len() - lending_count) as u64);
        metrics::record_pipeline_duration(started.elapsed());
        info!(
            "{} pools on {}: {} lending, {} vaults ({:?})",
            records.len(),
            chain,
            lending_count,
            records.len() - lending_count,
            started.elapsed()
        );
        Ok(records)
    }
}

fn lending_record(result: &LendingResult<'_>, chain: &str, chain_label: &str) -> PoolRecord {
    PoolRecord {
        pool: pool_key(&result.reserve.e_token_address, chain),
        chain: chain_label.to_string(),
        project: PROJECT.to_string(),
        symbol: result.symbol.clone(),
        underlying_tokens: vec![result.reserve.underlying_token_address.clone()],
        pool_meta: PoolKind::Lending.label().to_string(),
        tvl_usd: decimal_to_f64(result.tvl_usd),
        apy_base: decimal_to_f64(result.apy),
    }
}

fn vault_record(metrics: &VaultMetrics, chain: &str, chain_label: &str) -> PoolRecord {
    PoolRecord {
        pool: pool_key(&metrics.pair, chain),
        chain: chain_label.to_string(),
        project: PROJECT.to_string(),
        symbol: metrics.symbol(),
        underlying_tokens: vec![metrics.token0.clone(), metrics.token1.clone()],
        pool_meta: PoolKind::LeveragedFarming.label().to_string(),
        tvl_usd: decimal_to_f64(metrics.tvl_usd),
        apy_base: decimal_to_f64(metrics.base_apy),
    }
}
