//! Input and price validation constants and helper functions.
//!
//! Two kinds of checks live here:
//!
//! 1. WALLET ADDRESSES: requests carry a raw string; anything that is not a
//!    `0x`-prefixed, 40-hex-digit address is rejected before any upstream call.
//!
//! 2. PRICES: quotes from the price index are trusted only when the backing
//!    pool is deep enough. A thin market can print any price, so the
//!    liquidity floor suppresses those quotes instead of valuing them.

// ============================================
// Price Validation Constants
// ============================================

/// Minimum pool reserve (USD) for a token quote to be trusted.
/// Below this the price is forced to zero and the entry is flagged.
pub const MIN_LIQUIDITY_USD: f64 = 1_000.0;

/// Expected length of a wallet address including the `0x` prefix.
pub const WALLET_ADDRESS_LEN: usize = 42;

// ============================================
// Wallet Address Validation
// ============================================

/// Check that a wallet string is `0x` followed by exactly 40 hex digits.
pub fn is_valid_wallet_address(wallet: &str) -> bool {
    if wallet.len() != WALLET_ADDRESS_LEN {
        return false;
    }
    match wallet.strip_prefix("0x") {
        Some(hex) => hex.chars().all(|c| c.is_ascii_hexdigit()),
        None => false,
    }
}

// ============================================
// Price Validation Helpers
// ============================================

/// Check whether a pool reserve is deep enough to trust its quoted price.
#[inline]
pub fn has_sufficient_liquidity(liquidity_usd: f64) -> bool {
    liquidity_usd.is_finite() && liquidity_usd >= MIN_LIQUIDITY_USD
}

// ============================================
// Rounding
// ============================================

/// Round to a fixed number of decimal places. Non-finite input rounds to 0.
#[inline]
pub fn round_to(value: f64, decimals: u32) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wallet_address_validation() {
        assert!(is_valid_wallet_address(
            "0xAAAAaaaaAAAAaaaaAAAAaaaaAAAAaaaaAAAAaaaa"
        ));
        assert!(is_valid_wallet_address(
            "0x0123456789abcdef0123456789abcdef01234567"
        ));

        // Wrong length
        assert!(!is_valid_wallet_address("0x1234"));
        assert!(!is_valid_wallet_address(
            "0x0123456789abcdef0123456789abcdef012345678"
        ));
        // Missing prefix, same length
        assert!(!is_valid_wallet_address(
            "000123456789abcdef0123456789abcdef01234567"
        ));
        // Non-hex digit
        assert!(!is_valid_wallet_address(
            "0x0123456789abcdef0123456789abcdef0123456g"
        ));
    }

    #[test]
    fn test_liquidity_floor() {
        assert!(!has_sufficient_liquidity(0.0));
        assert!(!has_sufficient_liquidity(999.99));
        assert!(has_sufficient_liquidity(1_000.0));
        assert!(!has_sufficient_liquidity(f64::NAN));
    }

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(0.01000000001, 2), 0.01);
        assert_eq!(round_to(1.23456, 4), 1.2346);
        assert_eq!(round_to(f64::INFINITY, 2), 0.0);
    }
}
