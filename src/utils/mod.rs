//! Utility functions for the tracker.
//!
//! This module is organized into focused submodules:
//!
//! - [`validation`] - Wallet address checks, liquidity floor, rounding
//! - [`conversion`] - Type conversions (U256, u128, decimal strings, addresses)
//! - [`tick_math`] - Concentrated-liquidity tick and amount calculations
//! - [`price`] - slot0 decoding and sqrtPriceX96 conversion

mod conversion;
mod price;
mod tick_math;
mod validation;

// ============================================
// Common Constants
// ============================================

/// Decimals assumed for the native coin and for LP constituent tokens.
pub const DEFAULT_DECIMALS: u32 = 18;

// ============================================
// Re-exports
// ============================================

// Conversion utilities
pub use conversion::{
    address_to_string, normalize_address, parse_decimal_str, str_to_f64_with_decimals,
    u128_to_f64, u256_to_f64,
};

// Price conversion utilities
pub use price::{sqrt_price_x96_from_slot0, sqrt_price_x96_to_sqrt_price};

// Tick math utilities
pub use tick_math::{amounts_for_liquidity, position_amounts, tick_to_sqrt_price, PositionAmounts};

// Validation utilities
pub use validation::{
    has_sufficient_liquidity, is_valid_wallet_address, round_to, MIN_LIQUIDITY_USD,
};
