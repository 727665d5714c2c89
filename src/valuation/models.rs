use serde::Serialize;

/// Native coin line item (wallet balance, staked, unclaimed rewards).
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PepuEntry {
    pub label: String,
    pub amount: f64,
    pub price_usd: f64,
    pub total_usd: f64,
    pub icon: Option<String>,
    pub warning: Option<String>,
}

/// One fungible token holding.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TokenEntry {
    pub name: String,
    pub symbol: String,
    pub contract: String,
    pub amount: f64,
    pub price_usd: f64,
    pub liquidity_usd: f64,
    pub total_usd: f64,
    pub icon_url: Option<String>,
    pub warning: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PortfolioValuation {
    pub native_pepu: PepuEntry,
    pub staked_pepu: PepuEntry,
    pub unclaimed_rewards: PepuEntry,
    /// Descending by `total_usd`, ties in explorer order
    pub tokens: Vec<TokenEntry>,
    pub total_value_usd: f64,
}

impl PortfolioValuation {
    /// Native, staked and rewards combined.
    pub fn pepu_usd(&self) -> f64 {
        self.native_pepu.total_usd + self.staked_pepu.total_usd + self.unclaimed_rewards.total_usd
    }

    pub fn tokens_usd(&self) -> f64 {
        self.tokens.iter().map(|t| t.total_usd).sum()
    }

    /// Raw amount held of `contract`, 0 when absent.
    pub fn token_amount(&self, contract: &str) -> f64 {
        self.tokens
            .iter()
            .find(|t| t.contract.eq_ignore_ascii_case(contract))
            .map(|t| t.amount)
            .unwrap_or(0.0)
    }
}

/// One concentrated-liquidity position.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct LpEntry {
    pub position_id: String,
    pub pool_address: Option<String>,
    pub token0: Option<String>,
    pub token1: Option<String>,
    pub amount0: f64,
    pub amount1: f64,
    pub price0_usd: f64,
    pub price1_usd: f64,
    pub amount0_usd: f64,
    pub amount1_usd: f64,
    pub total_usd: f64,
    pub warning: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Default)]
pub struct LpValuation {
    pub positions: Vec<LpEntry>,
    pub total_value_usd: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PresaleEntry {
    pub name: String,
    pub contract: String,
    pub token: String,
    pub amount: f64,
    pub price_usd: f64,
    pub total_usd: f64,
    pub icon_url: Option<String>,
    pub warning: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Default)]
pub struct PresaleValuation {
    pub presales: Vec<PresaleEntry>,
    pub total_value_usd: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StakingEntry {
    pub name: String,
    pub contract: String,
    pub token: String,
    pub staked: f64,
    pub rewards: f64,
    pub price_usd: f64,
    pub total_usd: f64,
    pub icon_url: Option<String>,
    pub warning: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Default)]
pub struct StakingValuation {
    pub positions: Vec<StakingEntry>,
    pub total_value_usd: f64,
}
