//! Price conversion utilities for concentrated-liquidity pools.
//!
//! Extracting sqrtPriceX96 from a pool's packed `slot0` storage word.

use alloy::primitives::U256;

// ============================================
// Constants
// ============================================

/// Constant: 2^96 (Q64.96 fixed point scaling factor)
/// Value: 79228162514264337593543950336.0
pub(crate) const Q96: f64 = 79228162514264337593543950336.0;

pub(crate) const Q96_INV: f64 = 1.0 / Q96;

/// Width of the sqrtPriceX96 field at the bottom of `slot0` (uint160).
const SQRT_PRICE_BITS: usize = 160;

// ============================================
// slot0 Decoding
// ============================================

/// Extract sqrtPriceX96 from the raw 32-byte `slot0` word of a pool.
///
/// Layout (lowest bits first): sqrtPriceX96 (160), tick (24),
/// observationIndex (16), observationCardinality (16),
/// observationCardinalityNext (16), feeProtocol (8), unlocked (8).
pub fn sqrt_price_x96_from_slot0(slot0: U256) -> U256 {
    let mask = (U256::from(1u8) << SQRT_PRICE_BITS) - U256::from(1u8);
    slot0 & mask
}

/// Convert a sqrtPriceX96 value to an f64 sqrt price (sqrtPriceX96 / 2^96).
pub fn sqrt_price_x96_to_sqrt_price(sqrt_price_x96: U256) -> f64 {
    let raw: f64 = sqrt_price_x96.to_string().parse().unwrap_or(0.0);
    raw * Q96_INV
}
