//! # LP Unwrap
//!
//! A farm vault's `pair` is itself an LP token with no listed price, so its
//! value is recovered by decomposing the vault's LP holding into the two
//! underlying token amounts and pricing those.
//!
//! [`LpUnwrapper`] is the seam the vault engine depends on;
//! [`UniswapV2LpUnwrapper`] implements it on-chain for constant-product pairs
//! (Uniswap V2, Velodrome/Aerodrome stable and volatile pools).

use crate::contracts::IUniswapV2Pair;
use crate::normalization::{lp_share_of_reserve, normalize_amount};
use crate::price_resolver::PriceMap;
use crate::types::conversions::string_to_address;
use async_trait::async_trait;
use ethers::prelude::Middleware;
use ethers::types::U256;
use log::debug;
use rust_decimal::Decimal;
use std::sync::Arc;

/// Which LP position to decompose.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnwrapRequest {
    pub chain: String,
    pub pair: String,
    /// LP amount held, in LP base units
    pub lp_amount: U256,
    pub token0: String,
    pub token1: String,
}

/// USD value of each side of an unwrapped LP position.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UnwrappedLp {
    pub token0_usd: Decimal,
    pub token1_usd: Decimal,
}

impl UnwrappedLp {
    pub fn total_usd(&self) -> Decimal {
        self.token0_usd + self.token1_usd
    }
}

#[derive(Debug, thiserror::Error)]
pub enum UnwrapError {
    #[error("invalid pair address {0}")]
    InvalidPair(String),
    #[error("pair {pair} call failed: {reason}")]
    Call { pair: String, reason: String },
    #[error("pair {0} has no LP supply")]
    EmptySupply(String),
}

#[async_trait]
pub trait LpUnwrapper: Send + Sync {
    async fn unwrap_lp(
        &self,
        request: &UnwrapRequest,
        prices: &PriceMap,
    ) -> Result<UnwrappedLp, UnwrapError>;
}

/// On-chain unwrapper reading `getReserves()` and `totalSupply()` of the pair.
pub struct UniswapV2LpUnwrapper<M> {
    provider: Arc<M>,
}

impl<M: Middleware + 'static> UniswapV2LpUnwrapper<M> {
    pub fn new(provider: Arc<M>) -> Self {
        Self { provider }
    }
}

/// Values the owned share of both reserves with the resolved prices.
/// Tokens without a price or without known decimals are worth 0.
pub fn value_reserves(
    request: &UnwrapRequest,
    reserves: (U256, U256),
    total_supply: U256,
    prices: &PriceMap,
) -> UnwrappedLp {
    let side = |reserve: U256, token: &str| -> Decimal {
        let lookup = prices.lookup(&request.chain, token);
        let decimals = match lookup.decimals() {
            Some(d) => d,
            None => return Decimal::ZERO,
        };
        let owned = lp_share_of_reserve(reserve, request.lp_amount, total_supply);
        lookup.value_of(normalize_amount(owned, decimals))
    };

    UnwrappedLp {
        token0_usd: side(reserves.0, &request.token0),
        token1_usd: side(reserves.1, &request.token1),
    }
}

#[async_trait]
impl<M: Middleware + 'static> LpUnwrapper for UniswapV2LpUnwrapper<M> {
    async fn unwrap_lp(
        &self,
        request: &UnwrapRequest,
        prices: &PriceMap,
    ) -> Result<UnwrappedLp, UnwrapError> {
        let pair_address = string_to_address(&request.pair)
            .map_err(|_| UnwrapError::InvalidPair(request.pair.clone()))?;
        let pair = IUniswapV2Pair::new(pair_address, Arc::clone(&self.provider));

        let call_err = |e: ethers::contract::ContractError<M>| UnwrapError::Call {
            pair: request.pair.clone(),
            reason: e.to_string(),
        };

        let reserves_call = pair.get_reserves();
        let supply_call = pair.total_supply();
        let ((reserve0, reserve1, _), total_supply) =
            tokio::try_join!(reserves_call.call(), supply_call.call()).map_err(call_err)?;

        if total_supply.is_zero() {
            return Err(UnwrapError::EmptySupply(request.pair.clone()));
        }
        debug!(
            "pair {}: reserves=({}, {}) supply={} lp={}",
            request.pair, reserve0, reserve1, total_supply, request.lp_amount
        );

        Ok(value_reserves(
            request,
            (U256::from(reserve0), U256::from(reserve1)),
            total_supply,
            prices,
        ))
    }
}
