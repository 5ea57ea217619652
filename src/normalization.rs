// src/normalization.rs
//
// Integer helpers for decomposing an LP position into underlying token amounts
// and bringing base-unit amounts into human scale.

use crate::types::conversions::u256_to_decimal;
use ethers::types::U256;
use rust_decimal::Decimal;

/// Safe multiply then divide: (a * b) / denom with U256, returning floor.
/// Falls back to U512 for the product so large reserves do not saturate.
#[inline]
pub fn mul_div_floor(a: U256, b: U256, denom: U256) -> U256 {
    if a.is_zero() || b.is_zero() || denom.is_zero() {
        return U256::zero();
    }
    let prod = a.full_mul(b);
    let quotient = prod / ethers::types::U512::from(denom);
    U256::try_from(quotient).unwrap_or(U256::MAX)
}

/// Amount of one pair reserve owned by `lp_amount` out of `total_supply` LP tokens.
///
/// Returns zero when the pair has no supply; a share larger than the supply is
/// capped at the whole reserve.
pub fn lp_share_of_reserve(reserve: U256, lp_amount: U256, total_supply: U256) -> U256 {
    if total_supply.is_zero() {
        return U256::zero();
    }
    let owned = lp_amount.min(total_supply);
    mul_div_floor(reserve, owned, total_supply)
}

/// Normalize a base-unit amount (U256) into human-decimal Decimal using token decimals
pub fn normalize_amount(amount: U256, decimals: u32) -> Decimal {
    u256_to_decimal(amount, decimals).unwrap_or(Decimal::ZERO)
}
