//! Upstream data sources.
//!
//! Each source sits behind a trait so the valuation services can be built
//! against real clients in production and in-memory doubles in tests.

pub mod chain;
pub mod explorer;
pub mod price_index;

pub use chain::{ChainReader, PositionInfo, RpcChainClient};
pub use explorer::{BlockscoutClient, Explorer, NftInstance, TokenBalance};
pub use price_index::{GeckoTerminalClient, PriceIndex, TokenInfo};
