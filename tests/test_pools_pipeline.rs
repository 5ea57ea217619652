//! Integration tests for the pool aggregation pipeline
//!
//! Tests cover:
//! - Record ordering (lending first, then vaults)
//! - Eligibility filters (empty reserves, paused or empty vaults)
//! - USD valuation with missing prices
//! - Upstream failure reporting
//!
//! All collaborators are in-memory; no network access is needed.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use extra_finance_yields::aggregator::{AggregatorConfig, AggregatorError, PoolAggregator};
use extra_finance_yields::farm_rates::StaticFarmRates;
use extra_finance_yields::lending::LendingConfig;
use extra_finance_yields::lp_unwrap::{UnwrapError, LpUnwrapper, UnwrapRequest, UnwrappedLp};
use extra_finance_yields::price_resolver::{PriceMap, PriceSource, TokenPrice};
use extra_finance_yields::subgraph::RawDataSource;
use extra_finance_yields::types::{RawFarmVault, RawLendingReserve, SubgraphSnapshot};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

const CHAIN: &str = "optimism";
const USDC: &str = "0x7F5c764cBc14f9669B88837ca1490cCa17c31607";
const WETH: &str = "0x4200000000000000000000000000000000000006";
const OP: &str = "0x4200000000000000000000000000000000000042";
const UNKNOWN: &str = "0x00000000000000000000000000000000000000ff";

struct StaticSource(SubgraphSnapshot);

#[async_trait]
impl RawDataSource for StaticSource {
    async fn fetch_snapshot(&self, _chain: &str) -> Result<SubgraphSnapshot> {
        Ok(self.0.clone())
    }
}

struct DownSource;

#[async_trait]
impl RawDataSource for DownSource {
    async fn fetch_snapshot(&self, _chain: &str) -> Result<SubgraphSnapshot> {
        Err(anyhow!("subgraph unavailable"))
    }
}

/// Serves a fixed price table and counts how often it is asked.
struct TablePrices {
    table: HashMap<String, TokenPrice>,
    calls: AtomicUsize,
    fail: bool,
}

impl TablePrices {
    fn new(entries: &[(&str, &str, &str, u32)]) -> Self {
        let table = entries
            .iter()
            .map(|(address, symbol, price, decimals)| {
                (
                    format!("{}:{}", CHAIN, address),
                    TokenPrice {
                        symbol: symbol.to_string(),
                        price: Decimal::from_str(price).unwrap(),
                        decimals: Some(*decimals),
                        timestamp: Some(1_700_000_000),
                        confidence: Some(0.99),
                    },
                )
            })
            .collect();
        Self {
            table,
            calls: AtomicUsize::new(0),
            fail: false,
        }
    }

    fn failing() -> Self {
        let mut prices = Self::new(&[]);
        prices.fail = true;
        prices
    }
}

#[async_trait]
impl PriceSource for TablePrices {
    async fn fetch_prices(
        &self,
        _chain: &str,
        addresses: &[String],
    ) -> Result<HashMap<String, TokenPrice>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(anyhow!("price service unavailable"));
        }
        Ok(self
            .table
            .iter()
            .filter(|(key, _)| {
                addresses
                    .iter()
                    .any(|a| key.eq_ignore_ascii_case(&format!("{}:{}", CHAIN, a)))
            })
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }
}

/// Values every known pair at a fixed USD amount; unknown pairs fail.
struct FixedUnwrapper(HashMap<String, Decimal>);

#[async_trait]
impl LpUnwrapper for FixedUnwrapper {
    async fn unwrap_lp(
        &self,
        request: &UnwrapRequest,
        _prices: &PriceMap,
    ) -> Result<UnwrappedLp, UnwrapError> {
        match self.0.get(&request.pair.to_lowercase()) {
            Some(usd) => Ok(UnwrappedLp {
                token0_usd: *usd,
                token1_usd: Decimal::ZERO,
            }),
            None => Err(UnwrapError::EmptySupply(request.pair.clone())),
        }
    }
}

fn reserve(id: &str, underlying: &str, e_token: &str, liquidity: &str) -> RawLendingReserve {
    RawLendingReserve {
        id: format!("0xreserve{}", id),
        reserve_id: id.to_string(),
        underlying_token_address: underlying.to_string(),
        e_token_address: e_token.to_string(),
        total_liquidity: liquidity.to_string(),
        total_borrows: "0".to_string(),
        borrowing_rate: "0".to_string(),
    }
}

fn vault(id: &str, pair: &str, total_lp: &str, paused: bool) -> RawFarmVault {
    RawFarmVault {
        id: format!("0xvault{}", id),
        vault_id: id.to_string(),
        pair: pair.to_string(),
        token0: WETH.to_string(),
        token1: OP.to_string(),
        paused,
        total_lp: total_lp.to_string(),
        ..Default::default()
    }
}

fn config() -> AggregatorConfig {
    AggregatorConfig {
        chain: CHAIN.to_string(),
        lending: LendingConfig::default(),
        vault_max_concurrency: 4,
    }
}

fn aggregator(
    snapshot: SubgraphSnapshot,
    prices: Arc<TablePrices>,
    unwrapper: FixedUnwrapper,
) -> PoolAggregator {
    PoolAggregator::new(
        config(),
        Arc::new(StaticSource(snapshot)),
        prices,
        Arc::new(unwrapper),
        Arc::new(StaticFarmRates::new([("0xpair1", Decimal::from(20))])),
    )
}

fn default_prices() -> Arc<TablePrices> {
    Arc::new(TablePrices::new(&[
        (USDC, "USDC", "2", 6),
        (WETH, "WETH", "1800", 18),
        (OP, "OP", "1.5", 18),
    ]))
}

fn mixed_snapshot() -> SubgraphSnapshot {
    SubgraphSnapshot {
        vaults: vec![
            vault("1", "0xPAIR1", "1000", false),
            vault("2", "0xPAIR2", "1000", true),
            vault("3", "0xPAIR3", "0", false),
        ],
        lending_reserve_pools: vec![
            // 1000 USDC at $2
            reserve("1", USDC, "0xETOKEN1", "1000000000"),
            reserve("2", WETH, "0xETOKEN2", "0"),
        ],
    }
}

#[tokio::test]
async fn lending_records_come_before_vault_records() {
    let unwrapper = FixedUnwrapper(HashMap::from([("0xpair1".to_string(), Decimal::from(500))]));
    let records = aggregator(mixed_snapshot(), default_prices(), unwrapper)
        .get_pools_data()
        .await
        .unwrap();

    let metas: Vec<&str> = records.iter().map(|r| r.pool_meta.as_str()).collect();
    assert_eq!(metas, vec!["Lending Pool", "Leveraged Yield Farming"]);
    assert!(records.iter().all(|r| r.project == "extra-finance"));
    assert!(records.iter().all(|r| r.chain == "Optimism"));
}

#[tokio::test]
async fn lending_tvl_is_liquidity_times_price() {
    let records = aggregator(mixed_snapshot(), default_prices(), FixedUnwrapper(HashMap::new()))
        .get_pools_data()
        .await
        .unwrap();

    let lending = &records[0];
    assert_eq!(lending.pool, "0xetoken1-optimism");
    assert_eq!(lending.symbol.as_deref(), Some("USDC"));
    assert_eq!(lending.underlying_tokens, vec![USDC.to_string()]);
    assert!((lending.tvl_usd - 2000.0).abs() < 1e-9);
    assert_eq!(lending.apy_base, 0.0);
}

#[tokio::test]
async fn paused_and_empty_vaults_are_excluded() {
    let unwrapper = FixedUnwrapper(HashMap::from([
        ("0xpair1".to_string(), Decimal::from(500)),
        ("0xpair2".to_string(), Decimal::from(500)),
        ("0xpair3".to_string(), Decimal::from(500)),
    ]));
    let records = aggregator(mixed_snapshot(), default_prices(), unwrapper)
        .get_pools_data()
        .await
        .unwrap();

    let vaults: Vec<&str> = records
        .iter()
        .filter(|r| r.pool_meta == "Leveraged Yield Farming")
        .map(|r| r.pool.as_str())
        .collect();
    assert_eq!(vaults, vec!["0xpair1-optimism"]);

    let vault = records.iter().find(|r| r.pool == "0xpair1-optimism").unwrap();
    assert_eq!(vault.symbol.as_deref(), Some("WETH-OP"));
    assert_eq!(vault.underlying_tokens, vec![WETH.to_string(), OP.to_string()]);
    assert!((vault.tvl_usd - 500.0).abs() < 1e-9);
    assert!((vault.apy_base - 20.0).abs() < 1e-9);
}

#[tokio::test]
async fn zero_liquidity_reserve_is_not_emitted() {
    let records = aggregator(mixed_snapshot(), default_prices(), FixedUnwrapper(HashMap::new()))
        .get_pools_data()
        .await
        .unwrap();

    assert!(records.iter().all(|r| r.pool != "0xetoken2-optimism"));
}

#[tokio::test]
async fn unpriced_tokens_yield_zero_tvl_without_failing() {
    let snapshot = SubgraphSnapshot {
        vaults: vec![],
        lending_reserve_pools: vec![reserve("9", UNKNOWN, "0xETOKEN9", "123456789")],
    };
    let records = aggregator(snapshot, default_prices(), FixedUnwrapper(HashMap::new()))
        .get_pools_data()
        .await
        .unwrap();

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].tvl_usd, 0.0);
    assert_eq!(records[0].symbol, None);
}

#[tokio::test]
async fn failed_unwrap_keeps_vault_with_zero_tvl() {
    let records = aggregator(mixed_snapshot(), default_prices(), FixedUnwrapper(HashMap::new()))
        .get_pools_data()
        .await
        .unwrap();

    let vault = records.iter().find(|r| r.pool == "0xpair1-optimism").unwrap();
    assert_eq!(vault.tvl_usd, 0.0);
    assert!(records.iter().all(|r| r.tvl_usd.is_finite() && r.apy_base.is_finite()));
}

#[tokio::test]
async fn prices_are_fetched_once_per_run() {
    let prices = default_prices();
    let agg = aggregator(mixed_snapshot(), Arc::clone(&prices), FixedUnwrapper(HashMap::new()));
    agg.get_pools_data().await.unwrap();
    assert_eq!(prices.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn repeated_runs_serialize_identically() {
    let unwrapper = FixedUnwrapper(HashMap::from([("0xpair1".to_string(), Decimal::from(500))]));
    let agg = aggregator(mixed_snapshot(), default_prices(), unwrapper);

    let first = serde_json::to_string(&agg.get_pools_data().await.unwrap()).unwrap();
    let second = serde_json::to_string(&agg.get_pools_data().await.unwrap()).unwrap();
    assert_eq!(first, second);
    assert!(first.contains("\"tvlUsd\""));
    assert!(first.contains("\"apyBase\""));
    assert!(first.contains("\"underlyingTokens\""));
}

#[tokio::test]
async fn raw_fetch_failure_is_reported() {
    let agg = PoolAggregator::new(
        config(),
        Arc::new(DownSource),
        default_prices(),
        Arc::new(FixedUnwrapper(HashMap::new())),
        Arc::new(StaticFarmRates::default()),
    );
    match agg.get_pools_data().await {
        Err(AggregatorError::RawFetch { chain, .. }) => assert_eq!(chain, CHAIN),
        other => panic!("expected RawFetch, got {:?}", other),
    }
}

#[tokio::test]
async fn price_fetch_failure_is_reported() {
    let agg = aggregator(
        mixed_snapshot(),
        Arc::new(TablePrices::failing()),
        FixedUnwrapper(HashMap::new()),
    );
    let err = agg.get_pools_data().await.unwrap_err();
    assert!(matches!(err, AggregatorError::PriceFetch { .. }));
    assert!(err.to_string().contains("price service unavailable"));
}

#[tokio::test]
async fn empty_snapshot_produces_no_records() {
    let records = aggregator(
        SubgraphSnapshot::default(),
        default_prices(),
        FixedUnwrapper(HashMap::new()),
    )
    .get_pools_data()
    .await
    .unwrap();
    assert!(records.is_empty());
}

#[tokio::test]
async fn liquidity_above_decimal_range_is_emitted() {
    let cheap = "0x00000000000000000000000000000000000000cc";
    let snapshot = SubgraphSnapshot {
        vaults: vec![],
        // 2e11 tokens at 18 decimals
        lending_reserve_pools: vec![reserve(
            "5",
            cheap,
            "0xETOKEN5",
            "200000000000000000000000000000",
        )],
    };
    let prices = Arc::new(TablePrices::new(&[(cheap, "CHEAP", "0.0001", 18)]));
    let records = aggregator(snapshot, prices, FixedUnwrapper(HashMap::new()))
        .get_pools_data()
        .await
        .unwrap();

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].pool, "0xetoken5-optimism");
    assert!((records[0].tvl_usd - 20_000_000.0).abs() < 1e-6);
}
