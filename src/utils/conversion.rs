//! Type conversion and formatting utilities.
//!
//! Functions for converting raw on-chain integers (U256, u128, decimal strings)
//! into decimal-adjusted f64 values, and for normalizing addresses.

use alloy::primitives::{Address, U256};
use bigdecimal::BigDecimal;
use num_bigint::BigInt;
use num_traits::ToPrimitive;
use once_cell::sync::Lazy;
use std::str::FromStr;

// ============================================
// Address Formatting
// ============================================

/// Lower-case, trimmed form of an address string. Cache keys and
/// comparisons always go through this.
pub fn normalize_address(address: &str) -> String {
    address.trim().to_lowercase()
}

/// Lower-case `0x`-prefixed hex form of an alloy address.
pub fn address_to_string(address: &Address) -> String {
    format!("{:#x}", address)
}

// ============================================
// U256 Conversions
// ============================================

/// Convert U256 to f64 with decimal adjustment using BigDecimal for precision.
///
/// # Example
/// ```ignore
/// let value = U256::from(1_000_000_000_000_000_000u128); // 1e18
/// let adjusted = u256_to_f64(value, 18); // Returns 1.0
/// ```
pub fn u256_to_f64(value: U256, decimals: u32) -> f64 {
    u256_to_f64_safe(value, decimals).unwrap_or(0.0)
}

/// None if the value cannot be converted to a finite f64.
fn u256_to_f64_safe(value: U256, decimals: u32) -> Option<f64> {
    // Convert U256 to BigDecimal via bytes (faster than string parsing)
    let bytes: [u8; 32] = value.to_le_bytes();
    let big_int = BigInt::from_bytes_le(num_bigint::Sign::Plus, &bytes);
    let big_value = BigDecimal::from(big_int);

    let adjusted = big_value / big_pow10(decimals);

    let result = adjusted.to_f64()?;

    if result.is_finite() {
        Some(result)
    } else {
        None
    }
}

/// Convert a u128 value (e.g. position liquidity) to f64 with decimal adjustment.
///
/// Goes through BigDecimal to avoid precision loss from a direct cast
/// for values larger than 2^53.
pub fn u128_to_f64(value: u128, decimals: u32) -> f64 {
    let big_value = BigDecimal::from(value);

    let adjusted = if decimals == 0 { big_value } else { big_value / big_pow10(decimals) };

    adjusted.to_f64().unwrap_or(0.0)
}

// ============================================
// String to f64 Conversions
// ============================================

/// Parse a decimal string of a raw integer amount to f64 with decimal adjustment.
///
/// The explorer reports balances as base-10 strings of the raw on-chain value.
///
/// # Returns
/// * `Some(f64)` if parsing succeeds and value is valid, `None` otherwise
pub fn str_to_f64_with_decimals(value_str: &str, decimals: u32) -> Option<f64> {
    let big_value = BigDecimal::from_str(value_str.trim()).ok()?;

    let adjusted = big_value / big_pow10(decimals);

    let result = adjusted.to_f64()?;

    if result.is_finite() && result >= 0.0 {
        Some(result)
    } else {
        None
    }
}

/// Parse an optional numeric string as returned by the price index
/// (`"0.0012"`, `null`, `""`). Anything unparsable is treated as zero.
pub fn parse_decimal_str(value: Option<&str>) -> f64 {
    value
        .and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite() && *v >= 0.0)
        .unwrap_or(0.0)
}

// ============================================
// Internal Helpers
// ============================================

static POW10_CACHE: Lazy<[BigDecimal; 37]> =
    Lazy::new(|| std::array::from_fn(|i| BigDecimal::from(BigInt::from(10u32).pow(i as u32))));

/// Compute 10^exp as BigDecimal.
fn big_pow10(exp: u32) -> BigDecimal {
    if (exp as usize) < POW10_CACHE.len() {
        POW10_CACHE[exp as usize].clone()
    } else {
        BigDecimal::from(BigInt::from(10u32).pow(exp))
    }
}
