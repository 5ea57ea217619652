// src/lending.rs
//
// Lending reserve metrics: USD TVL from total liquidity and an annualized
// percentage yield from the indexer's raw borrowing rate.

use crate::price_resolver::PriceLookup;
use crate::types::conversions::{base_units_to_decimal, parse_decimal_str, u256_to_decimal};
use crate::types::RawLendingReserve;
use log::{debug, warn};
use rust_decimal::{Decimal, MathematicalOps};
use serde::Deserialize;

/// Seconds in a 365-day year.
pub const SECONDS_PER_YEAR: u64 = 31_536_000;

/// How the indexer expresses `borrowingRate` once scaled down by `rate_decimals`.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RateBasis {
    /// Annual rate, compounded `compounding_periods_per_year` times.
    Annual,
    /// Rate per compounding period (per block or per second).
    PerPeriod,
}

impl Default for RateBasis {
    fn default() -> Self {
        RateBasis::Annual
    }
}

/// Compounding convention of the lending protocol.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct LendingConfig {
    #[serde(default = "default_rate_decimals")]
    pub rate_decimals: u32,
    #[serde(default)]
    pub rate_basis: RateBasis,
    #[serde(default = "default_compounding_periods_per_year")]
    pub compounding_periods_per_year: u64,
}

fn default_rate_decimals() -> u32 {
    18
}

fn default_compounding_periods_per_year() -> u64 {
    SECONDS_PER_YEAR
}

impl Default for LendingConfig {
    fn default() -> Self {
        Self {
            rate_decimals: default_rate_decimals(),
            rate_basis: RateBasis::default(),
            compounding_periods_per_year: default_compounding_periods_per_year(),
        }
    }
}

/// USD value of a reserve's total liquidity. Zero when the price, the token
/// decimals or the liquidity figure is unknown.
pub fn compute_lend_pool_tvl(reserve: &RawLendingReserve, price: PriceLookup<'_>) -> Decimal {
    let decimals = match price.decimals() {
        Some(d) => d,
        None => return Decimal::ZERO,
    };
    let liquidity = match reserve.total_liquidity_units() {
        Some(v) if !v.is_zero() => v,
        _ => return Decimal::ZERO,
    };
    match u256_to_decimal(liquidity, decimals) {
        Ok(amount) => price.value_of(amount),
        Err(e) => {
            warn!(
                "reserve {}: liquidity {} not representable: {}",
                reserve.id, reserve.total_liquidity, e
            );
            Decimal::ZERO
        }
    }
}

/// Annual percentage yield of a reserve's borrowing rate.
///
/// The raw rate is scaled down by `rate_decimals`, turned into a per-period
/// rate and compounded over `compounding_periods_per_year`:
/// `((1 + p)^n - 1) * 100`. Zero, negative or malformed rates yield 0.
pub fn compute_lend_pool_apy(reserve: &RawLendingReserve, config: &LendingConfig) -> Decimal {
    let raw = match parse_decimal_str(&reserve.borrowing_rate) {
        Ok(v) => v,
        Err(e) => {
            debug!("reserve {}: malformed borrowing rate: {}", reserve.id, e);
            return Decimal::ZERO;
        }
    };
    rate_to_apy(raw, config).unwrap_or(Decimal::ZERO)
}

fn rate_to_apy(raw: Decimal, config: &LendingConfig) -> Option<Decimal> {
    if raw <= Decimal::ZERO || config.compounding_periods_per_year == 0 {
        return Some(Decimal::ZERO);
    }
    let rate = base_units_to_decimal(raw, config.rate_decimals).ok()?;
    let periods = config.compounding_periods_per_year;
    let per_period = match config.rate_basis {
        RateBasis::Annual => rate.checked_div(Decimal::from(periods))?,
        RateBasis::PerPeriod => rate,
    };
    let growth = (Decimal::ONE + per_period).checked_powu(periods)?;
    let apy = (growth - Decimal::ONE).checked_mul(Decimal::ONE_HUNDRED)?;
    Some(apy.max(Decimal::ZERO))
}
