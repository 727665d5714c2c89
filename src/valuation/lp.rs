use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::{Address, U256};
use anyhow::{anyhow, Context, Result};
use futures::{stream, StreamExt};
use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::cache::QuoteCache;
use crate::clients::{ChainReader, Explorer, NftInstance, PositionInfo};
use crate::config::FetcherSettings;
use crate::fetcher::{BatchPriceFetcher, Deadline, FetchMode};
use crate::utils::{address_to_string, position_amounts, round_to, PositionAmounts, DEFAULT_DECIMALS};

use super::models::{LpEntry, LpValuation};
use super::pricing::{WARN_LP_DATA, WARN_MISSING_PRICE};

static POOL_ADDRESS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"Pool Address: (0x[a-fA-F0-9]{40})").expect("valid pool address pattern")
});

/// Pool address embedded in a position NFT's description text.
pub fn pool_address_from_description(description: &str) -> Option<String> {
    POOL_ADDRESS
        .captures(description)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_lowercase())
}

fn unavailable() -> LpValuation {
    LpValuation {
        warning: Some(WARN_LP_DATA.to_string()),
        ..Default::default()
    }
}

/// Result of valuing one position.
#[derive(Debug, Clone, PartialEq)]
pub enum PositionOutcome {
    /// Both sides priced.
    Valued(LpEntry),
    /// Zero liquidity: not reported.
    Empty,
    /// Reported with zero USD value and a warning.
    Degraded(LpEntry),
}

impl PositionOutcome {
    fn into_entry(self) -> Option<LpEntry> {
        match self {
            PositionOutcome::Valued(entry) | PositionOutcome::Degraded(entry) => Some(entry),
            PositionOutcome::Empty => None,
        }
    }
}

/// Chain-side view of a position before pricing.
#[derive(Debug)]
enum ChainState {
    Empty,
    Ready {
        id: String,
        pool: String,
        info: PositionInfo,
        amounts: PositionAmounts,
    },
    Failed {
        id: String,
        pool: Option<String>,
        info: Option<PositionInfo>,
    },
}

impl ChainState {
    fn tokens(&self) -> Vec<String> {
        match self {
            ChainState::Ready { info, .. } => vec![info.token0.clone(), info.token1.clone()],
            _ => Vec::new(),
        }
    }
}

/// Values a wallet's concentrated-liquidity positions.
///
/// Amounts come from floating-point tick math and approximate the chain's
/// integer results. Both constituents are assumed to have 18 decimals.
#[derive(Clone)]
pub struct LpValuator {
    explorer: Arc<dyn Explorer>,
    chain: Arc<dyn ChainReader>,
    fetcher: BatchPriceFetcher,
    position_manager: Address,
    workers: usize,
    position_timeout: Duration,
    request_timeout: Duration,
}

impl LpValuator {
    pub fn new(
        explorer: Arc<dyn Explorer>,
        chain: Arc<dyn ChainReader>,
        fetcher: BatchPriceFetcher,
        position_manager: Address,
        settings: &FetcherSettings,
    ) -> Self {
        Self {
            explorer,
            chain,
            fetcher,
            position_manager,
            workers: settings.lp_workers.max(1),
            position_timeout: Duration::from_secs(settings.position_timeout_secs),
            request_timeout: Duration::from_secs(settings.request_timeout_secs),
        }
    }

    pub fn position_manager(&self) -> Address {
        self.position_manager
    }

    fn cache(&self) -> &QuoteCache {
        self.fetcher.cache()
    }

    pub async fn value_wallet(&self, wallet: &str, mode: FetchMode) -> LpValuation {
        let deadline = Deadline::for_mode(mode, self.request_timeout);

        let nfts = match deadline.run(self.explorer.nft_instances(wallet)).await {
            Some(Ok(nfts)) => nfts,
            Some(Err(e)) => {
                warn!("Failed to list positions for {}: {:#}", wallet, e);
                return unavailable();
            },
            None => {
                warn!("Listing positions for {} hit the request deadline", wallet);
                return unavailable();
            },
        };

        let manager = address_to_string(&self.position_manager);
        let held: Vec<NftInstance> = nfts
            .into_iter()
            .filter(|nft| nft.collection == manager)
            .collect();

        if held.is_empty() {
            return LpValuation::default();
        }

        // Chain reads fan out; results are put back in listing order
        let reads = stream::iter(held.into_iter().enumerate())
            .map(|(index, nft)| async move { (index, self.read_position(nft).await) })
            .buffer_unordered(self.workers)
            .collect::<Vec<(usize, ChainState)>>();
        let Some(mut states) = deadline.run(reads).await else {
            warn!("Position reads for {} hit the request deadline", wallet);
            return unavailable();
        };
        states.sort_by_key(|(index, _)| *index);

        let tokens: Vec<String> = states.iter().flat_map(|(_, state)| state.tokens()).collect();
        self.fetcher.refresh_stale_by(&tokens, mode, deadline).await;

        let mut outcomes = Vec::with_capacity(states.len());
        for (_, state) in states {
            outcomes.push(self.price_position(state).await);
        }

        assemble(outcomes)
    }

    async fn read_position(&self, nft: NftInstance) -> ChainState {
        let id = nft.token_id.clone();
        match tokio::time::timeout(self.position_timeout, self.read_chain_state(&nft)).await {
            Ok(state) => state,
            Err(_) => {
                warn!("Position {} timed out after {:?}", id, self.position_timeout);
                ChainState::Failed {
                    id,
                    pool: nft.description.as_deref().and_then(pool_address_from_description),
                    info: None,
                }
            },
        }
    }

    async fn read_chain_state(&self, nft: &NftInstance) -> ChainState {
        let id = nft.token_id.clone();
        let pool = nft
            .description
            .as_deref()
            .and_then(pool_address_from_description);

        let info = match self.read_info(&id).await {
            Ok(info) => info,
            Err(e) => {
                warn!("positions({}) failed: {:#}", id, e);
                return ChainState::Failed {
                    id,
                    pool,
                    info: None,
                };
            },
        };

        if info.liquidity == 0 {
            return ChainState::Empty;
        }

        let Some(pool) = pool else {
            debug!("No pool address in metadata of position {}", id);
            return ChainState::Failed {
                id,
                pool: None,
                info: Some(info),
            };
        };

        match self.read_sqrt_price(&pool).await {
            Ok(sqrt_price_x96) => {
                let amounts = position_amounts(
                    info.liquidity,
                    sqrt_price_x96,
                    info.tick_lower,
                    info.tick_upper,
                    DEFAULT_DECIMALS,
                );
                ChainState::Ready {
                    id,
                    pool,
                    info,
                    amounts,
                }
            },
            Err(e) => {
                warn!("Pool price read for position {} failed: {:#}", id, e);
                ChainState::Failed {
                    id,
                    pool: Some(pool),
                    info: Some(info),
                }
            },
        }
    }

    async fn read_info(&self, id: &str) -> Result<PositionInfo> {
        let token_id: U256 = id
            .parse()
            .map_err(|e| anyhow!("invalid position id {id:?}: {e}"))?;
        self.chain.position(self.position_manager, token_id).await
    }

    async fn read_sqrt_price(&self, pool: &str) -> Result<U256> {
        let pool: Address = pool.parse().context("invalid pool address")?;
        let sqrt_price_x96 = self.chain.pool_sqrt_price_x96(pool).await?;
        if sqrt_price_x96.is_zero() {
            anyhow::bail!("pool {pool} is not initialized");
        }
        Ok(sqrt_price_x96)
    }

    async fn price_position(&self, state: ChainState) -> PositionOutcome {
        let (id, pool, info, amounts) = match state {
            ChainState::Empty => return PositionOutcome::Empty,
            ChainState::Failed { id, pool, info } => {
                return PositionOutcome::Degraded(LpEntry {
                    position_id: id,
                    pool_address: pool,
                    token0: info.as_ref().map(|i| i.token0.clone()),
                    token1: info.as_ref().map(|i| i.token1.clone()),
                    amount0: 0.0,
                    amount1: 0.0,
                    price0_usd: 0.0,
                    price1_usd: 0.0,
                    amount0_usd: 0.0,
                    amount1_usd: 0.0,
                    total_usd: 0.0,
                    warning: Some(WARN_LP_DATA.to_string()),
                });
            },
            ChainState::Ready {
                id,
                pool,
                info,
                amounts,
            } => (id, pool, info, amounts),
        };

        let price0 = self.known_price(&info.token0).await;
        let price1 = self.known_price(&info.token1).await;

        let mut entry = LpEntry {
            position_id: id,
            pool_address: Some(pool),
            token0: Some(info.token0),
            token1: Some(info.token1),
            amount0: amounts.amount0,
            amount1: amounts.amount1,
            price0_usd: price0.unwrap_or(0.0),
            price1_usd: price1.unwrap_or(0.0),
            amount0_usd: 0.0,
            amount1_usd: 0.0,
            total_usd: 0.0,
            warning: None,
        };

        match (price0, price1) {
            (Some(p0), Some(p1)) => {
                let usd0 = amounts.amount0 * p0;
                let usd1 = amounts.amount1 * p1;
                entry.amount0_usd = round_to(usd0, 4);
                entry.amount1_usd = round_to(usd1, 4);
                entry.total_usd = round_to(usd0 + usd1, 4);
                PositionOutcome::Valued(entry)
            },
            _ => {
                entry.warning = Some(WARN_MISSING_PRICE.to_string());
                PositionOutcome::Degraded(entry)
            },
        }
    }

    async fn known_price(&self, token: &str) -> Option<f64> {
        self.cache()
            .get(token)
            .await
            .filter(|quote| quote.has_price())
            .map(|quote| quote.price_usd)
    }
}

/// Drop empty positions, sort descending by value (stable), total to 2 dp.
fn assemble(outcomes: Vec<PositionOutcome>) -> LpValuation {
    let mut positions: Vec<LpEntry> = outcomes
        .into_iter()
        .filter_map(PositionOutcome::into_entry)
        .collect();
    positions.sort_by(|a, b| b.total_usd.total_cmp(&a.total_usd));

    let total: f64 = positions.iter().map(|p| p.total_usd).sum();

    LpValuation {
        positions,
        total_value_usd: round_to(total.max(0.0), 2),
        warning: None,
    }
}
