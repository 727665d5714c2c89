use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::db::HistoryPoint;
use crate::fetcher::FetchMode;
use crate::valuation::{LpValuation, PortfolioValuation, PresaleValuation, StakingValuation};

use super::error::ApiError;
use super::state::AppState;

#[derive(Debug, Deserialize)]
pub struct WalletQuery {
    #[serde(default)]
    pub wallet: String,
    /// Slow, thorough retries for background-style callers
    #[serde(default)]
    pub log_mode: Option<bool>,
}

impl WalletQuery {
    fn mode(&self) -> FetchMode {
        FetchMode::from_log_flag(self.log_mode.unwrap_or(false))
    }
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    /// Comma-separated wallet addresses
    #[serde(default)]
    pub wallets: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub signature: String,
}

#[derive(Debug, Serialize)]
pub struct Health {
    pub status: &'static str,
}

pub async fn portfolio(
    State(state): State<Arc<AppState>>,
    Query(query): Query<WalletQuery>,
) -> Result<Json<PortfolioValuation>, ApiError> {
    let valuation = state.portfolio.portfolio(&query.wallet, query.mode()).await?;
    Ok(Json(valuation))
}

pub async fn lp_positions(
    State(state): State<Arc<AppState>>,
    Query(query): Query<WalletQuery>,
) -> Result<Json<LpValuation>, ApiError> {
    let valuation = state.portfolio.lp_positions(&query.wallet, query.mode()).await?;
    Ok(Json(valuation))
}

pub async fn presales(
    State(state): State<Arc<AppState>>,
    Query(query): Query<WalletQuery>,
) -> Result<Json<PresaleValuation>, ApiError> {
    let valuation = state.portfolio.presales(&query.wallet, query.mode()).await?;
    Ok(Json(valuation))
}

pub async fn staking(
    State(state): State<Arc<AppState>>,
    Query(query): Query<WalletQuery>,
) -> Result<Json<StakingValuation>, ApiError> {
    let valuation = state.portfolio.staking(&query.wallet, query.mode()).await?;
    Ok(Json(valuation))
}

pub async fn history(
    State(state): State<Arc<AppState>>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<BTreeMap<String, Vec<HistoryPoint>>>, ApiError> {
    let history = state
        .history
        .wallet_history(&query.wallets, &query.message, &query.signature)
        .await?;
    Ok(Json(history))
}

pub async fn health() -> Json<Health> {
    Json(Health { status: "ok" })
}
