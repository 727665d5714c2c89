//! Wallet valuation.
//!
//! - [`PortfolioService`] - native, staked, rewards and fungible tokens, plus
//!   the presale and L2 staking views
//! - [`LpValuator`] - concentrated-liquidity positions
//!
//! Data-quality problems (thin markets, missing prices, failed reads) are
//! reported as `warning` fields on the affected entry, never as errors.

mod holdings;
mod lp;
mod models;
mod portfolio;
mod pricing;

pub use holdings::WARN_CONTRACT_READ;
pub use lp::{pool_address_from_description, LpValuator, PositionOutcome};
pub use models::{
    LpEntry, LpValuation, PepuEntry, PortfolioValuation, PresaleEntry, PresaleValuation,
    StakingEntry, StakingValuation, TokenEntry,
};
pub use portfolio::{PortfolioError, PortfolioService};
pub use pricing::{WARN_LOW_LIQUIDITY, WARN_LP_DATA, WARN_MISSING_PRICE, WARN_PRICE_ERROR};
