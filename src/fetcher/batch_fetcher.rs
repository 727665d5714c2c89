use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::{future::join_all, stream, StreamExt};
use log::{debug, info, warn};
use tokio::time::Instant;

use crate::cache::{dedup_normalized, NativeQuote, QuoteCache};
use crate::clients::PriceIndex;
use crate::config::FetcherSettings;

/// Hard upper bound on addresses per batch request.
pub const MAX_BATCH_SIZE: usize = 30;

/// Concurrent single-token metadata lookups
const METADATA_CONCURRENCY: usize = 8;

const METADATA_RETRY_DELAY: Duration = Duration::from_millis(500);

/// Which retry profile a caller runs under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchMode {
    /// Interactive request, latency bounded.
    #[default]
    Fast,
    /// Background snapshot, completeness over latency.
    Log,
}

impl FetchMode {
    pub fn from_log_flag(log_mode: bool) -> Self {
        if log_mode {
            FetchMode::Log
        } else {
            FetchMode::Fast
        }
    }

    fn metadata_attempts(self) -> u32 {
        match self {
            FetchMode::Fast => 2,
            FetchMode::Log => 3,
        }
    }
}

/// Instant a fast-mode request has to answer by. Log mode runs unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline(Option<Instant>);

impl Deadline {
    pub fn for_mode(mode: FetchMode, budget: Duration) -> Self {
        match mode {
            FetchMode::Fast => Self(Some(Instant::now() + budget)),
            FetchMode::Log => Self(None),
        }
    }

    pub fn unbounded() -> Self {
        Self(None)
    }

    /// `None` once the deadline passes before `future` completes.
    pub async fn run<F: Future>(&self, future: F) -> Option<F::Output> {
        match self.0 {
            None => Some(future.await),
            Some(at) => tokio::time::timeout_at(at, future).await.ok(),
        }
    }
}

/// `retries` is the total number of attempts per batch; `delay` is slept
/// between rounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub retries: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(retries: u32, delay: Duration) -> Self {
        Self { retries, delay }
    }

    fn attempts(&self) -> u32 {
        self.retries.max(1)
    }
}

/// Outcome of one price refresh.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct FetchReport {
    pub refreshed: usize,
    /// Addresses whose batch never succeeded; their cached value is untouched
    pub failed: Vec<String>,
}

/// Refreshes the quote cache from the price index in batches.
#[derive(Clone)]
pub struct BatchPriceFetcher {
    index: Arc<dyn PriceIndex>,
    cache: Arc<QuoteCache>,
    batch_size: usize,
    fast: RetryPolicy,
    log: RetryPolicy,
}

impl BatchPriceFetcher {
    pub fn new(index: Arc<dyn PriceIndex>, cache: Arc<QuoteCache>, settings: &FetcherSettings) -> Self {
        Self {
            index,
            cache,
            batch_size: settings.batch_size.clamp(1, MAX_BATCH_SIZE),
            fast: RetryPolicy::new(
                settings.fast_retries,
                Duration::from_millis(settings.fast_delay_ms),
            ),
            log: RetryPolicy::new(
                settings.log_retries,
                Duration::from_millis(settings.log_delay_ms),
            ),
        }
    }

    pub fn cache(&self) -> &Arc<QuoteCache> {
        &self.cache
    }

    pub fn policy(&self, mode: FetchMode) -> RetryPolicy {
        match mode {
            FetchMode::Fast => self.fast,
            FetchMode::Log => self.log,
        }
    }

    /// Refresh only the tokens whose quote is absent or older than the TTL.
    pub async fn refresh_stale(&self, tokens: &[String], mode: FetchMode) -> FetchReport {
        let stale = self.cache.stale_tokens(tokens, Utc::now()).await;
        if stale.is_empty() {
            return FetchReport::default();
        }
        self.refresh_prices(&stale, self.policy(mode)).await
    }

    /// [`Self::refresh_stale`] cut short at `deadline`. On expiry the
    /// caller proceeds with whatever the cache holds.
    pub async fn refresh_stale_by(
        &self,
        tokens: &[String],
        mode: FetchMode,
        deadline: Deadline,
    ) -> Option<FetchReport> {
        let report = deadline.run(self.refresh_stale(tokens, mode)).await;
        if report.is_none() {
            warn!("Price refresh hit the request deadline, using cached quotes");
        }
        report
    }

    /// Batch price refresh.
    ///
    /// Every address of a successful batch gets a quote; addresses the index
    /// omitted are written with price and liquidity 0. A failed batch is
    /// re-queued until `policy.retries` attempts are spent.
    pub async fn refresh_prices(&self, tokens: &[String], policy: RetryPolicy) -> FetchReport {
        let tokens = dedup_normalized(tokens);
        let mut pending: Vec<Vec<String>> = tokens
            .chunks(self.batch_size)
            .map(|chunk| chunk.to_vec())
            .collect();

        let mut report = FetchReport::default();

        for attempt in 1..=policy.attempts() {
            if pending.is_empty() {
                break;
            }
            if attempt > 1 {
                debug!(
                    "Retrying {} price batches (attempt {}/{}) in {:?}",
                    pending.len(),
                    attempt,
                    policy.attempts(),
                    policy.delay
                );
                tokio::time::sleep(policy.delay).await;
            }

            let results = join_all(pending.iter().map(|batch| self.index.token_prices(batch))).await;

            let mut failed = Vec::new();
            for (batch, result) in pending.into_iter().zip(results) {
                match result {
                    Ok(prices) => {
                        let fetched_at = Utc::now();
                        for token in &batch {
                            let update = prices.get(token).cloned().unwrap_or_default();
                            self.cache.apply_price(token, update, fetched_at).await;
                        }
                        report.refreshed += batch.len();
                    },
                    Err(e) => {
                        warn!(
                            "Price batch of {} tokens failed (attempt {}/{}): {:#}",
                            batch.len(),
                            attempt,
                            policy.attempts(),
                            e
                        );
                        failed.push(batch);
                    },
                }
            }
            pending = failed;
        }

        report.failed = pending.into_iter().flatten().collect();
        if !report.failed.is_empty() {
            warn!(
                "Gave up on {} token prices after {} attempts",
                report.failed.len(),
                policy.attempts()
            );
        }

        report
    }

    /// Single-token metadata lookups for icon, name and symbol.
    /// Never touches price freshness; known fields are never cleared.
    pub async fn refresh_metadata(&self, tokens: &[String], mode: FetchMode) {
        let tokens = dedup_normalized(tokens);
        if tokens.is_empty() {
            return;
        }
        let attempts = mode.metadata_attempts();

        stream::iter(tokens)
            .map(|token| async move {
                for attempt in 1..=attempts {
                    match self.index.token_info(&token).await {
                        Ok(info) => {
                            self.cache.apply_metadata(&token, info.metadata).await;
                            return;
                        },
                        Err(e) if attempt == attempts => {
                            debug!("No metadata for {}: {:#}", token, e);
                        },
                        Err(_) => tokio::time::sleep(METADATA_RETRY_DELAY).await,
                    }
                }
            })
            .buffer_unordered(METADATA_CONCURRENCY)
            .collect::<Vec<()>>()
            .await;
    }

    /// Native quote, refreshed when stale. Falls back to the stale value
    /// (or `None`) when every attempt fails.
    pub async fn refresh_native(&self, mode: FetchMode) -> Option<NativeQuote> {
        if !self.cache.native_is_stale(Utc::now()).await {
            return self.cache.native().await;
        }

        let policy = self.policy(mode);
        let previous = self.cache.native().await;

        for attempt in 1..=policy.attempts() {
            if attempt > 1 {
                tokio::time::sleep(policy.delay).await;
            }
            match self.index.native_info().await {
                Ok(info) if info.price.price_usd > 0.0 => {
                    let quote = NativeQuote {
                        price_usd: info.price.price_usd,
                        icon_url: info
                            .metadata
                            .icon_url
                            .or_else(|| previous.as_ref().and_then(|q| q.icon_url.clone())),
                        fetched_at: Utc::now(),
                    };
                    self.cache.put_native(quote.clone()).await;
                    info!("Native quote refreshed: ${}", quote.price_usd);
                    return Some(quote);
                },
                Ok(_) => warn!("Native quote returned no price (attempt {})", attempt),
                Err(e) => warn!("Native quote failed (attempt {}): {:#}", attempt, e),
            }
        }

        previous
    }
}
