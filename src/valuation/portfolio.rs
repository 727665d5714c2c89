use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::Address;
use anyhow::{anyhow, Context, Result};
use log::{debug, warn};
use thiserror::Error;

use crate::cache::{NativeQuote, QuoteCache};
use crate::clients::{ChainReader, Explorer, TokenBalance};
use crate::config::{ContractSettings, FetcherSettings, TokenContract};
use crate::fetcher::{BatchPriceFetcher, Deadline, FetchMode};
use crate::utils::{
    address_to_string, is_valid_wallet_address, normalize_address, round_to, u256_to_f64,
    DEFAULT_DECIMALS,
};

use super::lp::LpValuator;
use super::models::{LpValuation, PepuEntry, PortfolioValuation, TokenEntry};
use super::pricing::{trusted_price, WARN_PRICE_ERROR};

/// Errors that void a whole valuation response.
#[derive(Debug, Error)]
pub enum PortfolioError {
    #[error("Invalid wallet address format.")]
    InvalidAddress,
    #[error("Failed to fetch native balance: {0}")]
    NativeBalance(String),
}

/// A configured contract holding a per-wallet token balance.
#[derive(Debug, Clone)]
pub(crate) struct ContractTarget {
    pub name: String,
    pub contract: Address,
    pub token: String,
    pub decimals: u32,
}

impl ContractTarget {
    fn parse(config: &TokenContract) -> Result<Self> {
        Ok(Self {
            name: config.name.clone(),
            contract: config
                .contract
                .parse()
                .with_context(|| format!("Invalid contract address for {}", config.name))?,
            token: normalize_address(&config.token),
            decimals: config.decimals,
        })
    }
}

/// Orchestrates explorer, chain and price reads into wallet valuations.
#[derive(Clone)]
pub struct PortfolioService {
    pub(crate) explorer: Arc<dyn Explorer>,
    pub(crate) chain: Arc<dyn ChainReader>,
    pub(crate) fetcher: BatchPriceFetcher,
    pub(crate) lp: LpValuator,
    pub(crate) native_staking: Address,
    pub(crate) presales: Vec<ContractTarget>,
    pub(crate) staking_pools: Vec<ContractTarget>,
    pub(crate) request_timeout: Duration,
}

impl PortfolioService {
    pub fn new(
        explorer: Arc<dyn Explorer>,
        chain: Arc<dyn ChainReader>,
        fetcher: BatchPriceFetcher,
        contracts: &ContractSettings,
        settings: &FetcherSettings,
    ) -> Result<Self> {
        let position_manager: Address = contracts
            .position_manager
            .parse()
            .context("Invalid position manager address")?;
        let native_staking: Address = contracts
            .staking
            .parse()
            .context("Invalid staking contract address")?;

        let presales = contracts
            .presales
            .iter()
            .map(ContractTarget::parse)
            .collect::<Result<Vec<_>>>()?;
        let staking_pools = contracts
            .staking_pools
            .iter()
            .map(ContractTarget::parse)
            .collect::<Result<Vec<_>>>()?;

        let lp = LpValuator::new(
            explorer.clone(),
            chain.clone(),
            fetcher.clone(),
            position_manager,
            settings,
        );

        Ok(Self {
            explorer,
            chain,
            fetcher,
            lp,
            native_staking,
            presales,
            staking_pools,
            request_timeout: Duration::from_secs(settings.request_timeout_secs),
        })
    }

    pub fn cache(&self) -> &Arc<QuoteCache> {
        self.fetcher.cache()
    }

    /// Full wallet valuation: native, staked, rewards and fungible tokens.
    /// LP positions are reported separately by [`Self::lp_positions`].
    pub async fn portfolio(
        &self,
        wallet: &str,
        mode: FetchMode,
    ) -> Result<PortfolioValuation, PortfolioError> {
        let (wallet, owner) = parse_wallet(wallet)?;
        let deadline = self.deadline(mode);

        let (native, staked, rewards, balances) = tokio::join!(
            deadline.run(self.explorer.native_balance(&wallet)),
            deadline.run(self.chain.staked_amount(self.native_staking, owner)),
            deadline.run(self.chain.pending_rewards(self.native_staking, owner)),
            deadline.run(self.explorer.token_balances(&wallet)),
        );

        let native = bounded_read(native).map_err(|e| {
            warn!("Native balance for {} failed: {:#}", wallet, e);
            PortfolioError::NativeBalance(e.to_string())
        })?;
        let staked = bounded_read(staked)
            .map(|v| u256_to_f64(v, DEFAULT_DECIMALS))
            .unwrap_or_else(|e| {
                warn!("Staked amount for {} failed: {:#}", wallet, e);
                0.0
            });
        let rewards = bounded_read(rewards)
            .map(|v| u256_to_f64(v, DEFAULT_DECIMALS))
            .unwrap_or_else(|e| {
                warn!("Pending rewards for {} failed: {:#}", wallet, e);
                0.0
            });

        let manager = address_to_string(&self.lp.position_manager());
        let balances: Vec<TokenBalance> = bounded_read(balances)
            .unwrap_or_else(|e| {
                warn!("Token balances for {} failed: {:#}", wallet, e);
                Vec::new()
            })
            .into_iter()
            .filter(|b| b.address != manager)
            .collect();

        let addresses: Vec<String> = balances.iter().map(|b| b.address.clone()).collect();
        let refreshed = deadline
            .run(async {
                tokio::join!(
                    self.fetcher.refresh_native(mode),
                    self.refresh_tokens(&addresses, mode),
                )
            })
            .await;
        if refreshed.is_none() {
            warn!("Price refresh for {} hit the request deadline, using cached quotes", wallet);
        }

        let native_quote = self.cache().native().await;
        let native_pepu = pepu_entry("Wallet Balance", native, native_quote.as_ref());
        let staked_pepu = pepu_entry("Staked PEPU", staked, native_quote.as_ref());
        let unclaimed_rewards = pepu_entry("Unclaimed Rewards", rewards, native_quote.as_ref());

        let mut tokens = Vec::with_capacity(balances.len());
        for balance in balances {
            tokens.push(self.token_entry(balance).await);
        }
        sort_by_value_desc(&mut tokens, |t| t.total_usd);

        let mut valuation = PortfolioValuation {
            native_pepu,
            staked_pepu,
            unclaimed_rewards,
            tokens,
            total_value_usd: 0.0,
        };
        valuation.total_value_usd = round_to((valuation.pepu_usd() + valuation.tokens_usd()).max(0.0), 2);

        debug!(
            "Valued {} at ${} ({} tokens)",
            wallet,
            valuation.total_value_usd,
            valuation.tokens.len()
        );
        Ok(valuation)
    }

    pub async fn lp_positions(
        &self,
        wallet: &str,
        mode: FetchMode,
    ) -> Result<LpValuation, PortfolioError> {
        let (wallet, _) = parse_wallet(wallet)?;
        Ok(self.lp.value_wallet(&wallet, mode).await)
    }

    /// Icons for tokens that have none, prices for stale ones.
    pub(crate) async fn refresh_tokens(&self, tokens: &[String], mode: FetchMode) {
        let missing_icon = self.cache().tokens_missing_icon(tokens).await;
        tokio::join!(
            self.fetcher.refresh_metadata(&missing_icon, mode),
            self.fetcher.refresh_stale(tokens, mode),
        );
    }

    /// One budget for every upstream read of a fast-mode request.
    pub(crate) fn deadline(&self, mode: FetchMode) -> Deadline {
        Deadline::for_mode(mode, self.request_timeout)
    }

    async fn token_entry(&self, balance: TokenBalance) -> TokenEntry {
        let amount = balance.amount();
        let quote = self.cache().get(&balance.address).await;
        let price = trusted_price(quote.as_ref());

        let name = balance
            .name
            .or_else(|| quote.as_ref().and_then(|q| q.name.clone()))
            .unwrap_or_else(|| "Unknown".to_string());
        let symbol = balance
            .symbol
            .or_else(|| quote.as_ref().and_then(|q| q.symbol.clone()))
            .unwrap_or_default();

        TokenEntry {
            name,
            symbol,
            contract: balance.address,
            amount,
            price_usd: price.price_usd,
            liquidity_usd: price.liquidity_usd,
            total_usd: price.value_of(amount),
            icon_url: price.icon_url,
            warning: price.warning.map(str::to_string),
        }
    }
}

/// Validate and normalize a wallet before any upstream call.
pub(crate) fn parse_wallet(wallet: &str) -> Result<(String, Address), PortfolioError> {
    let wallet = wallet.trim();
    if !is_valid_wallet_address(wallet) {
        return Err(PortfolioError::InvalidAddress);
    }
    let owner: Address = wallet.parse().map_err(|_| PortfolioError::InvalidAddress)?;
    Ok((normalize_address(wallet), owner))
}

/// Flatten a deadline-bounded read; expiry counts as a failed read.
pub(crate) fn bounded_read<T>(read: Option<Result<T>>) -> Result<T> {
    read.unwrap_or_else(|| Err(anyhow!("request deadline exceeded")))
}

fn pepu_entry(label: &str, amount: f64, quote: Option<&NativeQuote>) -> PepuEntry {
    let price_usd = quote
        .map(|q| q.price_usd)
        .filter(|p| *p > 0.0 && p.is_finite())
        .unwrap_or(0.0);

    PepuEntry {
        label: label.to_string(),
        amount,
        price_usd,
        total_usd: if price_usd > 0.0 { amount * price_usd } else { 0.0 },
        icon: quote.and_then(|q| q.icon_url.clone()),
        warning: (price_usd == 0.0).then(|| WARN_PRICE_ERROR.to_string()),
    }
}

/// Stable sort, highest value first.
pub(crate) fn sort_by_value_desc<T>(items: &mut [T], value: impl Fn(&T) -> f64) {
    items.sort_by(|a, b| value(b).total_cmp(&value(a)));
}
