//! Tick math for concentrated-liquidity positions.
//!
//! Implements tick-to-sqrt-price conversion following TickMath.sol's
//! bit-decomposition approach, and the three-regime amount derivation
//! for a position given the pool's current sqrt price.
//!
//! Everything here is f64. Results are display-grade approximations and
//! will not match the chain to the last wei.

use alloy::primitives::U256;

use super::conversion::u128_to_f64;
use super::price::sqrt_price_x96_to_sqrt_price;

// ============================================
// Precomputed Constants
// ============================================

/// Valid tick range (TickMath.sol MIN_TICK / MAX_TICK).
pub const MIN_TICK: i32 = -887272;
pub const MAX_TICK: i32 = 887272;

// Multipliers for tick_to_sqrt_price: 1.0001^(-0.5 * 2^i) for i = 0..19,
// each the f64 nearest the exact value.
const TICK_MULTIPLIERS: [f64; 20] = [
    0.9999500037496876,    // 1.0001^(-0.5)
    0.9999000099990001,    // 1.0001^(-1)
    0.9998000299960005,    // 1.0001^(-2)
    0.9996000999800035,    // 1.0001^(-4)
    0.999200359880033,     // 1.0001^(-8)
    0.9984013591843874,    // 1.0001^(-16)
    0.9968052740212322,    // 1.0001^(-32)
    0.9936207543165438,    // 1.0001^(-64)
    0.9872822034085776,    // 1.0001^(-128)
    0.974726149167296,     // 1.0001^(-256)
    0.950091065870506,     // 1.0001^(-512)
    0.902673033446954,     // 1.0001^(-1024)
    0.8148186053123259,    // 1.0001^(-2048)
    0.6639293595631239,    // 1.0001^(-4096)
    0.4408021944898999,    // 1.0001^(-8192)
    0.19430657466711154,   // 1.0001^(-16384)
    0.037755044958865794,  // 1.0001^(-32768)
    0.0014254434198459772, // 1.0001^(-65536)
    2.031888943182195e-6,  // 1.0001^(-131072)
    4.128572677426057e-12, // 1.0001^(-262144)
];

// ============================================
// Tick to Price Conversion
// ============================================

/// Convert a tick to its sqrt price: 1.0001^(tick / 2).
///
/// Ticks outside [MIN_TICK, MAX_TICK] are clamped.
pub fn tick_to_sqrt_price(tick: i32) -> f64 {
    let clamped_tick = tick.clamp(MIN_TICK, MAX_TICK);
    let abs_tick = clamped_tick.unsigned_abs();

    let ratio = TICK_MULTIPLIERS
        .iter()
        .enumerate()
        .filter(|(bit, _)| abs_tick & (1 << bit) != 0)
        .fold(1.0_f64, |acc, (_, multiplier)| acc * multiplier);

    // Multipliers encode negative exponents; positive ticks take the reciprocal
    if clamped_tick > 0 {
        1.0 / ratio
    } else {
        ratio
    }
}

// ============================================
// Position Amounts
// ============================================

/// Decimal-adjusted token amounts held by a position.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PositionAmounts {
    pub amount0: f64,
    pub amount1: f64,
}

/// Raw (not decimal-adjusted) amounts for `liquidity` between two sqrt prices
/// at the current sqrt price.
///
/// - price at or below the range: everything is token0
/// - price inside the range: split between both tokens
/// - price at or above the range: everything is token1
pub fn amounts_for_liquidity(
    liquidity: f64,
    sqrt_price: f64,
    sqrt_lower: f64,
    sqrt_upper: f64,
) -> (f64, f64) {
    if !liquidity.is_finite() || liquidity <= 0.0 {
        return (0.0, 0.0);
    }
    if !(sqrt_price.is_finite() && sqrt_lower.is_finite() && sqrt_upper.is_finite()) {
        return (0.0, 0.0);
    }
    if sqrt_lower <= 0.0 || sqrt_upper <= 0.0 {
        return (0.0, 0.0);
    }

    let (sqrt_lower, sqrt_upper) = if sqrt_lower > sqrt_upper {
        (sqrt_upper, sqrt_lower)
    } else {
        (sqrt_lower, sqrt_upper)
    };

    let (amount0, amount1) = if sqrt_price <= sqrt_lower {
        let a0 = liquidity * (sqrt_upper - sqrt_lower) / (sqrt_upper * sqrt_lower);
        (a0, 0.0)
    } else if sqrt_price < sqrt_upper {
        let a0 = liquidity * (sqrt_upper - sqrt_price) / (sqrt_upper * sqrt_price);
        let a1 = liquidity * (sqrt_price - sqrt_lower);
        (a0, a1)
    } else {
        let a1 = liquidity * (sqrt_upper - sqrt_lower);
        (0.0, a1)
    };

    let sanitize = |v: f64| if v.is_finite() && v > 0.0 { v } else { 0.0 };
    (sanitize(amount0), sanitize(amount1))
}

/// Token amounts for a position, scaled down by `decimals` on both sides.
///
/// Returns zero amounts for empty positions or an inverted/degenerate range.
pub fn position_amounts(
    liquidity: u128,
    sqrt_price_x96: U256,
    tick_lower: i32,
    tick_upper: i32,
    decimals: u32,
) -> PositionAmounts {
    if liquidity == 0 || tick_lower >= tick_upper {
        return PositionAmounts::default();
    }

    let liquidity = u128_to_f64(liquidity, 0);
    let sqrt_price = sqrt_price_x96_to_sqrt_price(sqrt_price_x96);
    let sqrt_lower = tick_to_sqrt_price(tick_lower);
    let sqrt_upper = tick_to_sqrt_price(tick_upper);

    let (raw0, raw1) = amounts_for_liquidity(liquidity, sqrt_price, sqrt_lower, sqrt_upper);
    let scale = 10f64.powi(decimals as i32);

    PositionAmounts {
        amount0: raw0 / scale,
        amount1: raw1 / scale,
    }
}

#[cfg(test)]
mod tests {
    use super::super::price::Q96;
    use super::*;

    fn sqrt_price_x96_for_tick(tick: i32) -> U256 {
        let value = tick_to_sqrt_price(tick) * Q96;
        U256::from(value as u128)
    }

    fn assert_close(actual: f64, expected: f64) {
        let tolerance = expected.abs() * 1e-9 + 1e-12;
        assert!(
            (actual - expected).abs() <= tolerance,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn test_tick_to_sqrt_price_matches_pow() {
        for tick in [
            MIN_TICK, -524_288, -262_144, -200_000, -887, -1, 0, 1, 60, 1234, 200_000,
            262_144, 524_288, MAX_TICK,
        ] {
            let expected = 1.0001_f64.powf(tick as f64 / 2.0);
            let actual = tick_to_sqrt_price(tick);
            assert!(
                (actual / expected - 1.0).abs() < 1e-9,
                "tick {tick}: expected {expected}, got {actual}"
            );
        }
        assert_eq!(tick_to_sqrt_price(0), 1.0);
    }

    #[test]
    fn test_deepest_multiplier_is_exact() {
        // Only the top bit set: the product is the last multiplier alone
        let expected = 1.0001_f64.powf(-262_144.0 / 2.0);
        let actual = tick_to_sqrt_price(-262_144);
        assert!((actual / expected - 1.0).abs() < 1e-10, "got {actual}, expected {expected}");
        assert!((tick_to_sqrt_price(MIN_TICK) * tick_to_sqrt_price(MAX_TICK) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_range_below_price_is_all_token1() {
        let liquidity = 1_000_000_000_000_000_000u128;
        let amounts =
            position_amounts(liquidity, sqrt_price_x96_for_tick(0), -1000, -500, 18);

        assert_eq!(amounts.amount0, 0.0);
        let expected = tick_to_sqrt_price(-500) - tick_to_sqrt_price(-1000);
        assert_close(amounts.amount1, expected);
    }

    #[test]
    fn test_range_above_price_is_all_token0() {
        let liquidity = 1_000_000_000_000_000_000u128;
        let amounts = position_amounts(liquidity, sqrt_price_x96_for_tick(0), 500, 1000, 18);

        assert_eq!(amounts.amount1, 0.0);
        let lower = tick_to_sqrt_price(500);
        let upper = tick_to_sqrt_price(1000);
        assert_close(amounts.amount0, (upper - lower) / (upper * lower));
    }

    #[test]
    fn test_in_range_splits_between_tokens() {
        let liquidity = 1_000_000_000_000_000_000u128;
        let amounts = position_amounts(liquidity, sqrt_price_x96_for_tick(0), -600, 600, 18);

        let lower = tick_to_sqrt_price(-600);
        let upper = tick_to_sqrt_price(600);
        assert_close(amounts.amount0, (upper - 1.0) / upper);
        assert_close(amounts.amount1, 1.0 - lower);
        // Symmetric range around price 1 holds roughly equal amounts
        assert!((amounts.amount0 / amounts.amount1 - 1.0).abs() < 0.05);
    }

    #[test]
    fn test_empty_or_inverted_positions_hold_nothing() {
        let price = sqrt_price_x96_for_tick(0);
        assert_eq!(position_amounts(0, price, -600, 600, 18), PositionAmounts::default());
        assert_eq!(
            position_amounts(1_000_000, price, 600, -600, 18),
            PositionAmounts::default()
        );
    }

    #[test]
    fn test_price_on_lower_bound_counts_as_below() {
        let (a0, a1) = amounts_for_liquidity(100.0, 1.0, 1.0, 2.0);
        assert_close(a0, 100.0 * (2.0 - 1.0) / 2.0);
        assert_eq!(a1, 0.0);

        let (a0, a1) = amounts_for_liquidity(100.0, 2.0, 1.0, 2.0);
        assert_eq!(a0, 0.0);
        assert_close(a1, 100.0);
    }
}
