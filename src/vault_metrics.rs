//! # Leverage Vault Metrics
//!
//! Effective TVL and base APY for leveraged farming vaults.
//!
//! A vault's own capital is its LP holding, valued by unwrapping the pair into
//! its two underlying tokens. Borrowed capital comes from up to two lending
//! reserves referenced by `debtPositionId0/1`; it adds to the deployed TVL and
//! its reserve rate is blended into the vault APY weighted by USD value.
//!
//! Each vault is computed independently. A failed unwrap zeroes that vault's
//! own capital and the batch carries on.

use crate::farm_rates::FarmRateSource;
use crate::lending::{compute_lend_pool_apy, LendingConfig};
use crate::lp_unwrap::{LpUnwrapper, UnwrapRequest};
use crate::price_resolver::PriceMap;
use crate::types::conversions::u256_to_decimal;
use crate::types::{RawFarmVault, RawLendingReserve};
use futures::stream::{self, StreamExt};
use log::{debug, warn};
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};

/// Collaborators and knobs the vault engine needs besides the raw records.
pub struct VaultEngineContext<'a> {
    pub unwrapper: &'a dyn LpUnwrapper,
    pub farm_rates: &'a dyn FarmRateSource,
    pub lending: &'a LendingConfig,
    /// Upper bound on vaults computed at once
    pub max_concurrency: usize,
}

/// Borrowed capital drawn from one lending reserve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebtContribution {
    pub reserve_id: String,
    pub borrowed_usd: Decimal,
    pub reserve_apy: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultMetrics {
    pub vault_id: String,
    pub pair: String,
    pub token0: String,
    pub token1: String,
    pub token0_symbol: Option<String>,
    pub token1_symbol: Option<String>,
    pub stable: bool,
    /// Vault's own deposited capital
    pub base_tvl_usd: Decimal,
    pub debts: Vec<DebtContribution>,
    /// Own capital plus borrowed capital
    pub tvl_usd: Decimal,
    pub farm_apr: Decimal,
    /// False when the pair has no configured farm rate and `farm_apr` is a 0 fallback
    pub farm_rate_configured: bool,
    pub base_apy: Decimal,
}

impl VaultMetrics {
    /// `<symbol0>-<symbol1>` when both symbols are known.
    pub fn symbol(&self) -> Option<String> {
        match (&self.token0_symbol, &self.token1_symbol) {
            (Some(s0), Some(s1)) => Some(format!("{}-{}", s0, s1)),
            _ => None,
        }
    }

    pub fn borrowed_usd(&self) -> Decimal {
        self.debts.iter().map(|d| d.borrowed_usd).sum()
    }
}

/// USD-weighted mean of the farming rate on own capital and each reserve rate
/// on its borrowed capital. With no capital at all the farming rate is returned.
pub fn blend_apy(own_usd: Decimal, farm_apr: Decimal, debts: &[DebtContribution]) -> Decimal {
    let mut weight = own_usd;
    let mut weighted = match own_usd.checked_mul(farm_apr) {
        Some(v) => v,
        None => return farm_apr,
    };
    for debt in debts {
        let term = match debt.borrowed_usd.checked_mul(debt.reserve_apy) {
            Some(v) => v,
            None => return farm_apr,
        };
        weight += debt.borrowed_usd;
        weighted += term;
    }
    if weight.is_zero() {
        return farm_apr;
    }
    weighted.checked_div(weight).unwrap_or(farm_apr)
}

/// Borrowed capital of a reserve, in USD, and its lending APY.
pub fn debt_contribution(
    reserve: &RawLendingReserve,
    chain: &str,
    prices: &PriceMap,
    lending: &LendingConfig,
) -> DebtContribution {
    let lookup = prices.lookup(chain, &reserve.underlying_token_address);
    let borrowed_usd = match (reserve.total_borrows_units(), lookup.decimals()) {
        (Some(units), Some(decimals)) if !units.is_zero() => match u256_to_decimal(units, decimals) {
            Ok(amount) => lookup.value_of(amount),
            Err(e) => {
                warn!(
                    "reserve {}: borrows {} not representable: {}",
                    reserve.id, reserve.total_borrows, e
                );
                Decimal::ZERO
            }
        },
        _ => Decimal::ZERO,
    };
    DebtContribution {
        reserve_id: reserve.reserve_id.clone(),
        borrowed_usd,
        reserve_apy: compute_lend_pool_apy(reserve, lending),
    }
}

fn index_reserves(reserves: &[RawLendingReserve]) -> HashMap<&str, &RawLendingReserve> {
    reserves
        .iter()
        .map(|r| {
            let key = if r.reserve_id.trim().is_empty() {
                r.id.trim()
            } else {
                r.reserve_id.trim()
            };
            (key, r)
        })
        .collect()
}

async fn compute_single_vault(
    vault: &RawFarmVault,
    chain: &str,
    prices: &PriceMap,
    reserves: &HashMap<&str, &RawLendingReserve>,
    ctx: &VaultEngineContext<'_>,
) -> VaultMetrics {
    let token0_symbol = prices.lookup(chain, &vault.token0).symbol().map(str::to_string);
    let token1_symbol = prices.lookup(chain, &vault.token1).symbol().map(str::to_string);

    let base_tvl_usd = match vault.total_lp_units() {
        Some(lp_amount) => {
            let request = UnwrapRequest {
                chain: chain.to_string(),
                pair: vault.pair.clone(),
                lp_amount,
                token0: vault.token0.clone(),
                token1: vault.token1.clone(),
            };
            match ctx.unwrapper.unwrap_lp(&request, prices).await {
                Ok(unwrapped) => unwrapped.total_usd(),
                Err(e) => {
                    warn!("vault {} ({}): LP unwrap failed: {}", vault.vault_id, vault.pair, e);
                    crate::metrics::increment_unwrap_failures();
                    Decimal::ZERO
                }
            }
        }
        None => {
            warn!("vault {}: unparsable totalLp {:?}", vault.vault_id, vault.total_lp);
            Decimal::ZERO
        }
    };

    // both slots may reference the same reserve; its borrows count once
    let mut matched: HashSet<&str> = HashSet::new();
    let debts: Vec<DebtContribution> = vault
        .debt_position_ids()
        .filter_map(|id| match reserves.get(id) {
            Some(reserve) if matched.insert(id) => {
                Some(debt_contribution(reserve, chain, prices, ctx.lending))
            }
            Some(_) => {
                debug!("vault {}: debt position {} listed twice", vault.vault_id, id);
                None
            }
            None => {
                debug!("vault {}: debt position {} has no matching reserve", vault.vault_id, id);
                None
            }
        })
        .collect();

    let configured_apr = ctx.farm_rates.farm_apr(chain, &vault.pair).await;
    if configured_apr.is_none() {
        debug!(
            "vault {}: no farm rate configured for pair {}, using 0",
            vault.vault_id, vault.pair
        );
    }
    let farm_rate_configured = configured_apr.is_some();
    let farm_apr = configured_apr.unwrap_or(Decimal::ZERO);

    let borrowed: Decimal = debts.iter().map(|d| d.borrowed_usd).sum();
    let tvl_usd = base_tvl_usd + borrowed;
    let base_apy = blend_apy(base_tvl_usd, farm_apr, &debts);

    VaultMetrics {
        vault_id: vault.vault_id.clone(),
        pair: vault.pair.clone(),
        token0: vault.token0.clone(),
        token1: vault.token1.clone(),
        token0_symbol,
        token1_symbol,
        stable: vault.stable,
        base_tvl_usd,
        debts,
        tvl_usd,
        farm_apr,
        farm_rate_configured,
        base_apy,
    }
}

/// Computes metrics for every vault passed in, in input order.
///
/// The caller filters out paused and empty vaults beforehand. Vaults run
/// concurrently up to `ctx.max_concurrency`; results keep source order.
pub async fn compute_vault_metrics(
    vaults: &[RawFarmVault],
    chain: &str,
    prices: &PriceMap,
    reserves: &[RawLendingReserve],
    ctx: &VaultEngineContext<'_>,
) -> Vec<VaultMetrics> {
    let reserves_by_id = index_reserves(reserves);
    let reserves_by_id = &reserves_by_id;

    stream::iter(
        vaults
            .iter()
            .map(|vault| compute_single_vault(vault, chain, prices, reserves_by_id, ctx)),
    )
    .buffered(ctx.max_concurrency.max(1))
    .collect()
    .await
}
