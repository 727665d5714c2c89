use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::utils::round_to;
use crate::valuation::{LpValuation, PortfolioValuation, PresaleValuation, StakingValuation};

/// One periodic valuation of a tracked wallet (PostgreSQL `wallet_history`).
///
/// - `pepu_usd`: native balance, staked PEPU and unclaimed rewards
/// - `l2_usd`: fungible L2 tokens plus L2 staking pools
/// - `lp_usd`: concentrated-liquidity positions
/// - `presale_usd`: presale allocations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletSnapshot {
    pub wallet: String,
    pub timestamp: DateTime<Utc>,
    pub pepu_usd: f64,
    pub l2_usd: f64,
    pub lp_usd: f64,
    pub presale_usd: f64,
}

impl WalletSnapshot {
    pub fn from_valuations(
        wallet: &str,
        timestamp: DateTime<Utc>,
        portfolio: &PortfolioValuation,
        lp: &LpValuation,
        presales: &PresaleValuation,
        staking: &StakingValuation,
    ) -> Self {
        Self {
            wallet: wallet.to_lowercase(),
            timestamp,
            pepu_usd: round_to(portfolio.pepu_usd(), 2),
            l2_usd: round_to(portfolio.tokens_usd() + staking.total_value_usd, 2),
            lp_usd: round_to(lp.total_value_usd, 2),
            presale_usd: round_to(presales.total_value_usd, 2),
        }
    }
}

/// A snapshot as returned by history reads (the wallet is the group key).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryPoint {
    pub timestamp: DateTime<Utc>,
    pub pepu_usd: f64,
    pub l2_usd: f64,
    pub lp_usd: f64,
    pub presale_usd: f64,
}

impl From<WalletSnapshot> for HistoryPoint {
    fn from(snapshot: WalletSnapshot) -> Self {
        Self {
            timestamp: snapshot.timestamp,
            pepu_usd: snapshot.pepu_usd,
            l2_usd: snapshot.l2_usd,
            lp_usd: snapshot.lp_usd,
            presale_usd: snapshot.presale_usd,
        }
    }
}
