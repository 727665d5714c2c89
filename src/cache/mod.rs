//! Shared quote cache.
//!
//! One process-wide [`QuoteCache`] is created at startup and shared by every
//! request path and the snapshot job.

mod quote_cache;

pub use quote_cache::{
    dedup_normalized, NativeQuote, PriceUpdate, QuoteCache, TokenMetadata, TokenQuote,
};
