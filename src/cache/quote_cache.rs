use std::time::Duration;

use chrono::{DateTime, Utc};
use moka::future::Cache;
use serde::Serialize;
use tokio::sync::RwLock;

use crate::config::CacheSettings;
use crate::utils::normalize_address;

/// Last known market data for one token.
///
/// `fetched_at` is the time of the last successful *price* lookup. An entry
/// created only by a metadata lookup has `fetched_at = None` and is stale.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TokenQuote {
    pub price_usd: f64,
    pub liquidity_usd: f64,
    pub icon_url: Option<String>,
    pub name: Option<String>,
    pub symbol: Option<String>,
    pub volume_24h_usd: Option<f64>,
    pub price_change_24h_pct: Option<f64>,
    pub fetched_at: Option<DateTime<Utc>>,
}

impl TokenQuote {
    /// A zero price means "unknown", never "worthless".
    pub fn has_price(&self) -> bool {
        self.price_usd > 0.0 && self.price_usd.is_finite()
    }
}

/// Price fields returned by a batch lookup for one token.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriceUpdate {
    pub price_usd: f64,
    pub liquidity_usd: f64,
    pub volume_24h_usd: Option<f64>,
    pub price_change_24h_pct: Option<f64>,
}

/// Descriptive fields returned by a single-token lookup.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TokenMetadata {
    pub name: Option<String>,
    pub symbol: Option<String>,
    pub icon_url: Option<String>,
}

/// Native coin quote (singleton).
#[derive(Debug, Clone, Serialize)]
pub struct NativeQuote {
    pub price_usd: f64,
    pub icon_url: Option<String>,
    pub fetched_at: DateTime<Utc>,
}

/// Process-wide token quote cache.
///
/// Entries are never expired by time: a stale quote stays readable as the
/// fallback when a refresh fails, and `is_stale` tells callers when to
/// refresh. Size is bounded by `max_capacity` (moka's TinyLFU eviction).
///
/// Every write is a whole-entry replace. Merging writes go through moka's
/// per-key upsert so a price refresh and an icon refresh racing on the same
/// token cannot drop each other's fields. No cross-entry consistency.
pub struct QuoteCache {
    quotes: Cache<String, TokenQuote>,
    native: RwLock<Option<NativeQuote>>,
    ttl: Duration,
}

impl QuoteCache {
    pub fn new(ttl: Duration, max_capacity: u64) -> Self {
        let quotes = Cache::builder().max_capacity(max_capacity).build();

        Self {
            quotes,
            native: RwLock::new(None),
            ttl,
        }
    }

    pub fn from_settings(settings: &CacheSettings) -> Self {
        Self::new(Duration::from_secs(settings.ttl_secs), settings.max_capacity)
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub async fn get(&self, token: &str) -> Option<TokenQuote> {
        self.quotes.get(&normalize_address(token)).await
    }

    pub async fn put(&self, token: &str, quote: TokenQuote) {
        self.quotes.insert(normalize_address(token), quote).await;
    }

    /// True if the token is absent, was never priced, or its price is older than the TTL.
    pub async fn is_stale(&self, token: &str, now: DateTime<Utc>) -> bool {
        match self.get(token).await {
            Some(quote) => self.is_expired(quote.fetched_at, now),
            None => true,
        }
    }

    /// Normalized, deduplicated subset of `tokens` that needs a price refresh.
    pub async fn stale_tokens(&self, tokens: &[String], now: DateTime<Utc>) -> Vec<String> {
        let mut stale = Vec::new();
        for token in dedup_normalized(tokens) {
            if self.is_stale(&token, now).await {
                stale.push(token);
            }
        }
        stale
    }

    /// Normalized, deduplicated subset of `tokens` with no cached icon.
    pub async fn tokens_missing_icon(&self, tokens: &[String]) -> Vec<String> {
        let mut missing = Vec::new();
        for token in dedup_normalized(tokens) {
            let has_icon = self
                .get(&token)
                .await
                .is_some_and(|quote| quote.icon_url.is_some());
            if !has_icon {
                missing.push(token);
            }
        }
        missing
    }

    /// Merge a successful price lookup, keeping descriptive fields.
    pub async fn apply_price(&self, token: &str, update: PriceUpdate, fetched_at: DateTime<Utc>) {
        self.quotes
            .entry(normalize_address(token))
            .and_upsert_with(|existing| {
                let mut quote = existing.map(|entry| entry.into_value()).unwrap_or_default();
                quote.price_usd = update.price_usd;
                quote.liquidity_usd = update.liquidity_usd;
                quote.volume_24h_usd = update.volume_24h_usd;
                quote.price_change_24h_pct = update.price_change_24h_pct;
                quote.fetched_at = Some(fetched_at);
                std::future::ready(quote)
            })
            .await;
    }

    /// Merge a metadata lookup. Known fields are never overwritten with `None`,
    /// and price freshness is left untouched.
    pub async fn apply_metadata(&self, token: &str, metadata: TokenMetadata) {
        self.quotes
            .entry(normalize_address(token))
            .and_upsert_with(|existing| {
                let mut quote = existing.map(|entry| entry.into_value()).unwrap_or_default();
                if metadata.icon_url.is_some() {
                    quote.icon_url = metadata.icon_url;
                }
                if metadata.name.is_some() {
                    quote.name = metadata.name;
                }
                if metadata.symbol.is_some() {
                    quote.symbol = metadata.symbol;
                }
                std::future::ready(quote)
            })
            .await;
    }

    pub async fn native(&self) -> Option<NativeQuote> {
        self.native.read().await.clone()
    }

    pub async fn put_native(&self, quote: NativeQuote) {
        *self.native.write().await = Some(quote);
    }

    pub async fn native_is_stale(&self, now: DateTime<Utc>) -> bool {
        let fetched_at = self.native.read().await.as_ref().map(|q| q.fetched_at);
        self.is_expired(fetched_at, now)
    }

    fn is_expired(&self, fetched_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        let Some(fetched_at) = fetched_at else {
            return true;
        };
        // A timestamp ahead of `now` (clock skew) counts as fresh
        match (now - fetched_at).to_std() {
            Ok(age) => age > self.ttl,
            Err(_) => false,
        }
    }
}

/// Lower-case and deduplicate, preserving first-seen order.
pub fn dedup_normalized(tokens: &[String]) -> Vec<String> {
    let mut seen = std::collections::HashSet::with_capacity(tokens.len());
    tokens
        .iter()
        .map(|t| normalize_address(t))
        .filter(|t| seen.insert(t.clone()))
        .collect()
}
