//! In-memory doubles for the upstream seams, shared by unit tests.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use alloy::primitives::{Address, U256};
use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rustc_hash::FxHashMap;

use crate::cache::{PriceUpdate, TokenMetadata};
use crate::clients::{ChainReader, Explorer, NftInstance, PositionInfo, PriceIndex, TokenBalance, TokenInfo};
use crate::db::{SnapshotStore, WalletSnapshot};

/// `amount * 10^18` as a raw balance string.
pub fn units(amount: u64) -> String {
    format!("{amount}000000000000000000")
}

pub fn wei(amount: u64) -> U256 {
    U256::from(amount) * U256::from(10u64).pow(U256::from(18u64))
}

// ── Price index ─────────────────────────────────────────────────────

#[derive(Default)]
pub struct FakePriceIndex {
    pub prices: Mutex<FxHashMap<String, PriceUpdate>>,
    pub metadata: Mutex<FxHashMap<String, TokenMetadata>>,
    pub native: Mutex<Option<TokenInfo>>,
    /// Number of upcoming batch calls that fail before any succeeds
    pub failing_batches: AtomicUsize,
    pub batch_calls: AtomicUsize,
    pub info_calls: AtomicUsize,
    pub native_calls: AtomicUsize,
    pub batches: Mutex<Vec<Vec<String>>>,
}

impl FakePriceIndex {
    pub fn with_price(self, token: &str, price_usd: f64, liquidity_usd: f64) -> Self {
        self.prices.lock().unwrap().insert(
            token.to_lowercase(),
            PriceUpdate {
                price_usd,
                liquidity_usd,
                ..Default::default()
            },
        );
        self
    }

    pub fn with_icon(self, token: &str, icon: &str) -> Self {
        self.metadata.lock().unwrap().insert(
            token.to_lowercase(),
            TokenMetadata {
                icon_url: Some(icon.to_string()),
                ..Default::default()
            },
        );
        self
    }

    pub fn with_native(self, price_usd: f64) -> Self {
        *self.native.lock().unwrap() = Some(TokenInfo {
            metadata: TokenMetadata {
                icon_url: Some("https://icons/pepu.png".to_string()),
                ..Default::default()
            },
            price: PriceUpdate {
                price_usd,
                ..Default::default()
            },
        });
        self
    }

    pub fn fail_next_batches(self, count: usize) -> Self {
        self.failing_batches.store(count, Ordering::SeqCst);
        self
    }

    pub fn total_calls(&self) -> usize {
        self.batch_calls.load(Ordering::SeqCst)
            + self.info_calls.load(Ordering::SeqCst)
            + self.native_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PriceIndex for FakePriceIndex {
    async fn token_prices(&self, tokens: &[String]) -> Result<FxHashMap<String, PriceUpdate>> {
        self.batch_calls.fetch_add(1, Ordering::SeqCst);
        self.batches.lock().unwrap().push(tokens.to_vec());

        let failing = self
            .failing_batches
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if failing.is_ok() {
            bail!("429 Too Many Requests");
        }

        let prices = self.prices.lock().unwrap();
        Ok(tokens
            .iter()
            .filter_map(|t| prices.get(t).map(|p| (t.clone(), p.clone())))
            .collect())
    }

    async fn token_info(&self, token: &str) -> Result<TokenInfo> {
        self.info_calls.fetch_add(1, Ordering::SeqCst);
        let metadata = self
            .metadata
            .lock()
            .unwrap()
            .get(token)
            .cloned()
            .ok_or_else(|| anyhow!("404 Not Found"))?;
        Ok(TokenInfo {
            metadata,
            price: PriceUpdate::default(),
        })
    }

    async fn native_info(&self) -> Result<TokenInfo> {
        self.native_calls.fetch_add(1, Ordering::SeqCst);
        self.native
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| anyhow!("native quote unavailable"))
    }
}

// ── Explorer ────────────────────────────────────────────────────────

#[derive(Default)]
pub struct FakeExplorer {
    /// `None` makes the native balance lookup fail
    pub native: Option<f64>,
    pub tokens: Vec<TokenBalance>,
    pub tokens_fail: bool,
    pub nfts: Vec<NftInstance>,
    pub nfts_fail: bool,
    /// Added latency on the token and NFT listings
    pub delay: Option<Duration>,
    pub calls: AtomicUsize,
}

impl FakeExplorer {
    pub fn with_native(mut self, amount: f64) -> Self {
        self.native = Some(amount);
        self
    }

    pub fn with_token(mut self, address: &str, symbol: &str, raw_value: &str) -> Self {
        self.tokens.push(TokenBalance {
            address: address.to_lowercase(),
            name: Some(format!("{symbol} Token")),
            symbol: Some(symbol.to_string()),
            decimals: 18,
            raw_value: raw_value.to_string(),
        });
        self
    }

    pub fn with_nft(mut self, collection: &str, token_id: &str, description: Option<&str>) -> Self {
        self.nfts.push(NftInstance {
            token_id: token_id.to_string(),
            collection: collection.to_lowercase(),
            description: description.map(str::to_string),
        });
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

async fn lag(delay: Option<Duration>) {
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }
}

#[async_trait]
impl Explorer for FakeExplorer {
    async fn native_balance(&self, _wallet: &str) -> Result<f64> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.native.ok_or_else(|| anyhow!("explorer unavailable"))
    }

    async fn token_balances(&self, _wallet: &str) -> Result<Vec<TokenBalance>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        lag(self.delay).await;
        if self.tokens_fail {
            bail!("explorer unavailable");
        }
        Ok(self.tokens.clone())
    }

    async fn nft_instances(&self, _wallet: &str) -> Result<Vec<NftInstance>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        lag(self.delay).await;
        if self.nfts_fail {
            bail!("explorer unavailable");
        }
        Ok(self.nfts.clone())
    }
}

// ── Chain ───────────────────────────────────────────────────────────

#[derive(Default)]
pub struct FakeChain {
    pub staked: FxHashMap<Address, U256>,
    pub rewards: FxHashMap<Address, U256>,
    pub deposits: FxHashMap<Address, U256>,
    pub positions: FxHashMap<U256, PositionInfo>,
    pub pool_prices: FxHashMap<Address, U256>,
    /// Added latency on every read
    pub delay: Option<Duration>,
    pub calls: AtomicUsize,
}

impl FakeChain {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChainReader for FakeChain {
    async fn staked_amount(&self, pool: Address, _wallet: Address) -> Result<U256> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        lag(self.delay).await;
        self.staked
            .get(&pool)
            .copied()
            .ok_or_else(|| anyhow!("execution reverted"))
    }

    async fn pending_rewards(&self, pool: Address, _wallet: Address) -> Result<U256> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        lag(self.delay).await;
        self.rewards
            .get(&pool)
            .copied()
            .ok_or_else(|| anyhow!("execution reverted"))
    }

    async fn presale_deposits(&self, presale: Address, _wallet: Address) -> Result<U256> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        lag(self.delay).await;
        self.deposits
            .get(&presale)
            .copied()
            .ok_or_else(|| anyhow!("execution reverted"))
    }

    async fn position(&self, _manager: Address, token_id: U256) -> Result<PositionInfo> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        lag(self.delay).await;
        self.positions
            .get(&token_id)
            .cloned()
            .ok_or_else(|| anyhow!("Invalid token ID"))
    }

    async fn pool_sqrt_price_x96(&self, pool: Address) -> Result<U256> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        lag(self.delay).await;
        self.pool_prices
            .get(&pool)
            .copied()
            .ok_or_else(|| anyhow!("storage read failed"))
    }
}

// ── Store ───────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MemoryStore {
    pub tracked: Mutex<Vec<String>>,
    pub snapshots: Mutex<Vec<WalletSnapshot>>,
}

impl MemoryStore {
    pub fn tracking(wallets: &[&str]) -> Self {
        let store = Self::default();
        *store.tracked.lock().unwrap() = wallets.iter().map(|w| w.to_string()).collect();
        store
    }
}

#[async_trait]
impl SnapshotStore for MemoryStore {
    async fn tracked_wallets(&self) -> Result<Vec<String>> {
        Ok(self.tracked.lock().unwrap().clone())
    }

    async fn track_wallets(&self, wallets: &[String]) -> Result<()> {
        let mut tracked = self.tracked.lock().unwrap();
        for wallet in wallets {
            if !tracked.contains(wallet) {
                tracked.push(wallet.clone());
            }
        }
        Ok(())
    }

    async fn insert_snapshot(&self, snapshot: &WalletSnapshot) -> Result<()> {
        self.snapshots.lock().unwrap().push(snapshot.clone());
        Ok(())
    }

    async fn history(&self, wallets: &[String]) -> Result<BTreeMap<String, Vec<WalletSnapshot>>> {
        let mut rows: Vec<WalletSnapshot> = self
            .snapshots
            .lock()
            .unwrap()
            .iter()
            .filter(|s| wallets.contains(&s.wallet))
            .cloned()
            .collect();
        rows.sort_by_key(|s| s.timestamp);

        let mut grouped: BTreeMap<String, Vec<WalletSnapshot>> = BTreeMap::new();
        for row in rows {
            grouped.entry(row.wallet.clone()).or_default().push(row);
        }
        Ok(grouped)
    }
}

pub fn snapshot(wallet: &str, timestamp: DateTime<Utc>, pepu_usd: f64) -> WalletSnapshot {
    WalletSnapshot {
        wallet: wallet.to_string(),
        timestamp,
        pepu_usd,
        l2_usd: 0.0,
        lp_usd: 0.0,
        presale_usd: 0.0,
    }
}
