use futures::future::join_all;
use log::warn;

use crate::fetcher::{Deadline, FetchMode};
use crate::utils::{address_to_string, round_to, u256_to_f64};

use super::models::{PresaleEntry, PresaleValuation, StakingEntry, StakingValuation};
use super::portfolio::{bounded_read, parse_wallet, sort_by_value_desc, ContractTarget, PortfolioError, PortfolioService};
use super::pricing::trusted_price;

pub const WARN_CONTRACT_READ: &str = "Failed to read contract data";

impl PortfolioService {
    /// Allocations bought in the configured presale contracts.
    pub async fn presales(
        &self,
        wallet: &str,
        mode: FetchMode,
    ) -> Result<PresaleValuation, PortfolioError> {
        let (wallet, owner) = parse_wallet(wallet)?;
        let deadline = self.deadline(mode);

        let reads = join_all(self.presales.iter().map(|target| async move {
            let amount = bounded_read(
                deadline
                    .run(self.chain.presale_deposits(target.contract, owner))
                    .await,
            )
            .map(|raw| u256_to_f64(raw, target.decimals));
            (target, amount)
        }))
        .await;

        self.refresh_targets(&self.presales, mode, deadline).await;

        let mut presales = Vec::with_capacity(reads.len());
        for (target, amount) in reads {
            let (amount, read_warning) = match amount {
                Ok(amount) => (amount, None),
                Err(e) => {
                    warn!("{} deposits for {} failed: {:#}", target.name, wallet, e);
                    (0.0, Some(WARN_CONTRACT_READ))
                },
            };

            let quote = self.cache().get(&target.token).await;
            let price = trusted_price(quote.as_ref());

            presales.push(PresaleEntry {
                name: target.name.clone(),
                contract: address_to_string(&target.contract),
                token: target.token.clone(),
                amount,
                price_usd: price.price_usd,
                total_usd: price.value_of(amount),
                icon_url: price.icon_url,
                warning: read_warning.or(price.warning).map(str::to_string),
            });
        }
        sort_by_value_desc(&mut presales, |p| p.total_usd);

        let total: f64 = presales.iter().map(|p| p.total_usd).sum();
        Ok(PresaleValuation {
            presales,
            total_value_usd: round_to(total.max(0.0), 2),
        })
    }

    /// Stakes and unclaimed rewards in the configured L2 staking pools.
    pub async fn staking(
        &self,
        wallet: &str,
        mode: FetchMode,
    ) -> Result<StakingValuation, PortfolioError> {
        let (wallet, owner) = parse_wallet(wallet)?;
        let deadline = self.deadline(mode);

        let reads = join_all(self.staking_pools.iter().map(|target| async move {
            let (staked, rewards) = tokio::join!(
                deadline.run(self.chain.staked_amount(target.contract, owner)),
                deadline.run(self.chain.pending_rewards(target.contract, owner)),
            );
            (target, bounded_read(staked), bounded_read(rewards))
        }))
        .await;

        self.refresh_targets(&self.staking_pools, mode, deadline).await;

        let mut positions = Vec::with_capacity(reads.len());
        for (target, staked, rewards) in reads {
            let mut read_failed = false;
            let mut scaled = |result: anyhow::Result<alloy::primitives::U256>, what: &str| match result {
                Ok(raw) => u256_to_f64(raw, target.decimals),
                Err(e) => {
                    warn!("{} {} for {} failed: {:#}", target.name, what, wallet, e);
                    read_failed = true;
                    0.0
                },
            };
            let staked = scaled(staked, "stake");
            let rewards = scaled(rewards, "rewards");

            let quote = self.cache().get(&target.token).await;
            let price = trusted_price(quote.as_ref());
            let warning = if read_failed {
                Some(WARN_CONTRACT_READ)
            } else {
                price.warning
            };

            positions.push(StakingEntry {
                name: target.name.clone(),
                contract: address_to_string(&target.contract),
                token: target.token.clone(),
                staked,
                rewards,
                price_usd: price.price_usd,
                total_usd: price.value_of(staked + rewards),
                icon_url: price.icon_url,
                warning: warning.map(str::to_string),
            });
        }
        sort_by_value_desc(&mut positions, |p| p.total_usd);

        let total: f64 = positions.iter().map(|p| p.total_usd).sum();
        Ok(StakingValuation {
            positions,
            total_value_usd: round_to(total.max(0.0), 2),
        })
    }

    async fn refresh_targets(&self, targets: &[ContractTarget], mode: FetchMode, deadline: Deadline) {
        if targets.is_empty() {
            return;
        }
        let tokens: Vec<String> = targets.iter().map(|t| t.token.clone()).collect();
        if deadline.run(self.refresh_tokens(&tokens, mode)).await.is_none() {
            warn!("Price refresh hit the request deadline, using cached quotes");
        }
    }
}
