use ethers::types::{Address, U256};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::str::FromStr;

// Subgraph numerics arrive as decimal strings ("1000000000000000000000")
pub fn parse_decimal_str(raw: &str) -> Result<Decimal, ConversionError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ConversionError::InvalidDecimal("empty string".to_string()));
    }
    Decimal::from_str(trimmed)
        .or_else(|_| Decimal::from_scientific(trimmed))
        .map_err(|e| ConversionError::InvalidDecimal(format!("{}: {}", trimmed, e)))
}

// Para cantidades en unidades base del token
pub fn base_units_to_decimal(raw: Decimal, decimals: u32) -> Result<Decimal, ConversionError> {
    if decimals > 28 {
        return Err(ConversionError::Overflow);
    }
    let divisor = Decimal::from(10u128.pow(decimals));
    raw.checked_div(divisor).ok_or(ConversionError::Overflow)
}

/// Largest power of ten a U256 can hold.
const MAX_U256_DECIMALS: u32 = 77;
/// Largest scale a Decimal can carry.
const MAX_DECIMAL_SCALE: u32 = 28;

/// Base units -> whole tokens. The amount is split at `10^decimals` in U256
/// first, so only the whole-token part has to fit in a Decimal.
pub fn u256_to_decimal(value: U256, decimals: u32) -> Result<Decimal, ConversionError> {
    if decimals > MAX_U256_DECIMALS {
        return Err(ConversionError::Overflow);
    }
    let (whole, frac) = value.div_mod(U256::exp10(decimals as usize));
    let whole = Decimal::from_str(&whole.to_string()).map_err(|_| ConversionError::Overflow)?;

    // fractional digits beyond Decimal's scale are truncated
    let (frac, scale) = if decimals > MAX_DECIMAL_SCALE {
        (
            frac / U256::exp10((decimals - MAX_DECIMAL_SCALE) as usize),
            MAX_DECIMAL_SCALE,
        )
    } else {
        (frac, decimals)
    };
    let frac = Decimal::try_from_i128_with_scale(frac.as_u128() as i128, scale)
        .map_err(|_| ConversionError::Overflow)?;

    whole.checked_add(frac).ok_or(ConversionError::Overflow)
}

pub fn parse_u256_str(raw: &str) -> Result<U256, ConversionError> {
    U256::from_dec_str(raw.trim()).map_err(|e| ConversionError::InvalidDecimal(e.to_string()))
}

/// Subgraph BigInt amount in base units. Plain integers of any size up to
/// U256 are read exactly; decimal or scientific notation is truncated.
pub fn parse_base_units(raw: &str) -> Result<U256, ConversionError> {
    if let Ok(value) = parse_u256_str(raw) {
        return Ok(value);
    }
    let value = parse_decimal_str(raw)?;
    if value.is_sign_negative() {
        return Err(ConversionError::InvalidDecimal(format!("negative amount: {}", raw.trim())));
    }
    parse_u256_str(&value.trunc().to_string())
}

/// Output boundary: Decimal -> f64. NaN when the value has no f64 representation,
/// so the aggregator's finiteness gate drops it.
pub fn decimal_to_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(f64::NAN)
}

pub fn string_to_address(s: &str) -> Result<Address, ConversionError> {
    Address::from_str(s.trim()).map_err(|e| ConversionError::InvalidAddress(e.to_string()))
}

#[derive(Debug, thiserror::Error)]
pub enum ConversionError {
    #[error("Invalid decimal: {0}")]
    InvalidDecimal(String),
    #[error("Overflow in conversion")]
    Overflow,
    #[error("Invalid address: {0}")]
    InvalidAddress(String),
}
