use std::future::IntoFuture;
use std::time::Duration;

use alloy::primitives::{Address, U256};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use anyhow::{Context, Result};
use async_trait::async_trait;
use url::Url;

use crate::abis::{INonfungiblePositionManager, IPresale, IStakingPool};
use crate::utils::{address_to_string, sqrt_price_x96_from_slot0};

/// On-chain state of one position NFT.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionInfo {
    pub token0: String,
    pub token1: String,
    pub tick_lower: i32,
    pub tick_upper: i32,
    pub liquidity: u128,
}

/// Contract reads the valuation paths depend on.
///
/// Every call may revert or time out; callers decide whether a failure
/// degrades one entry or voids the response.
#[async_trait]
pub trait ChainReader: Send + Sync {
    /// Amount staked by `wallet` in a `poolStakers`-style staking pool.
    async fn staked_amount(&self, pool: Address, wallet: Address) -> Result<U256>;

    /// Unclaimed rewards of `wallet` in a staking pool.
    async fn pending_rewards(&self, pool: Address, wallet: Address) -> Result<U256>;

    /// Tokens bought by `wallet` in a presale contract.
    async fn presale_deposits(&self, presale: Address, wallet: Address) -> Result<U256>;

    /// `positions(tokenId)` on the position manager.
    async fn position(&self, manager: Address, token_id: U256) -> Result<PositionInfo>;

    /// Current sqrtPriceX96 of a pool, read from raw storage slot 0.
    async fn pool_sqrt_price_x96(&self, pool: Address) -> Result<U256>;
}

/// JSON-RPC backed [`ChainReader`].
#[derive(Clone)]
pub struct RpcChainClient {
    provider: DynProvider,
    timeout: Duration,
}

impl RpcChainClient {
    pub fn new(rpc_url: &str, timeout: Duration) -> Result<Self> {
        let url = Url::parse(rpc_url).context("Invalid RPC URL")?;

        let client = ProviderBuilder::new().connect_http(url);

        Ok(Self {
            provider: DynProvider::new(client),
            timeout,
        })
    }

    /// Bound a single RPC call by the configured timeout.
    async fn bounded<T, E, F>(&self, what: &str, call: F) -> Result<T>
    where
        F: IntoFuture<Output = std::result::Result<T, E>>,
        E: std::error::Error + Send + Sync + 'static,
    {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result.with_context(|| format!("{what} failed")),
            Err(_) => anyhow::bail!("{what} timed out after {:?}", self.timeout),
        }
    }
}

#[async_trait]
impl ChainReader for RpcChainClient {
    async fn staked_amount(&self, pool: Address, wallet: Address) -> Result<U256> {
        let contract = IStakingPool::new(pool, &self.provider);
        let stake = self
            .bounded("poolStakers", contract.poolStakers(wallet).call())
            .await?;
        Ok(stake.amount)
    }

    async fn pending_rewards(&self, pool: Address, wallet: Address) -> Result<U256> {
        let contract = IStakingPool::new(pool, &self.provider);
        self.bounded("getRewards", contract.getRewards(wallet).call())
            .await
    }

    async fn presale_deposits(&self, presale: Address, wallet: Address) -> Result<U256> {
        let contract = IPresale::new(presale, &self.provider);
        self.bounded("userDeposits", contract.userDeposits(wallet).call())
            .await
    }

    async fn position(&self, manager: Address, token_id: U256) -> Result<PositionInfo> {
        let contract = INonfungiblePositionManager::new(manager, &self.provider);
        let position = self
            .bounded("positions", contract.positions(token_id).call())
            .await?;

        Ok(PositionInfo {
            token0: address_to_string(&position.token0),
            token1: address_to_string(&position.token1),
            tick_lower: position.tickLower.as_i32(),
            tick_upper: position.tickUpper.as_i32(),
            liquidity: position.liquidity,
        })
    }

    async fn pool_sqrt_price_x96(&self, pool: Address) -> Result<U256> {
        let slot0 = self
            .bounded(
                "slot0 storage read",
                self.provider.get_storage_at(pool, U256::ZERO),
            )
            .await?;
        Ok(sqrt_price_x96_from_slot0(slot0))
    }
}
