use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;

use alloy::primitives::{Address, Signature};
use log::{info, warn};
use thiserror::Error;

use crate::config::HistorySettings;
use crate::db::{HistoryPoint, SnapshotStore};
use crate::fetcher::FetchMode;
use crate::utils::{address_to_string, normalize_address};
use crate::valuation::PortfolioService;

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("No valid wallet addresses provided.")]
    NoWallets,
    #[error("Signature verification failed: {0}")]
    Signature(String),
    #[error("Failed to verify wallet {symbol} balance.")]
    GateUnavailable { symbol: String },
    #[error("Minimum {minimum} {symbol} required to view history.")]
    InsufficientBalance { minimum: String, symbol: String },
    #[error("Failed to load wallet history: {0}")]
    Store(String),
}

/// Signature-gated reads of the snapshot history.
///
/// The signer of an EIP-191 personal message must hold the configured gate
/// token. Requested wallets are added to the tracked set as a side effect,
/// so the snapshot job starts recording them.
#[derive(Clone)]
pub struct HistoryService {
    portfolio: Arc<PortfolioService>,
    store: Arc<dyn SnapshotStore>,
    settings: HistorySettings,
}

impl HistoryService {
    pub fn new(
        portfolio: Arc<PortfolioService>,
        store: Arc<dyn SnapshotStore>,
        settings: HistorySettings,
    ) -> Self {
        Self {
            portfolio,
            store,
            settings,
        }
    }

    pub async fn wallet_history(
        &self,
        wallets_csv: &str,
        message: &str,
        signature: &str,
    ) -> Result<BTreeMap<String, Vec<HistoryPoint>>, HistoryError> {
        let wallets = parse_wallet_list(wallets_csv);
        if wallets.is_empty() {
            return Err(HistoryError::NoWallets);
        }

        let signer = recover_signer(message, signature)?;
        self.check_gate(signer).await?;

        self.store
            .track_wallets(&wallets)
            .await
            .map_err(|e| HistoryError::Store(format!("{e:#}")))?;

        let history = self
            .store
            .history(&wallets)
            .await
            .map_err(|e| HistoryError::Store(format!("{e:#}")))?;

        info!(
            "Served history for {} wallets to {}",
            wallets.len(),
            address_to_string(&signer)
        );

        Ok(history
            .into_iter()
            .map(|(wallet, rows)| (wallet, rows.into_iter().map(HistoryPoint::from).collect()))
            .collect())
    }

    async fn check_gate(&self, signer: Address) -> Result<(), HistoryError> {
        let symbol = self.settings.gate_symbol.clone();
        let portfolio = self
            .portfolio
            .portfolio(&address_to_string(&signer), FetchMode::Fast)
            .await
            .map_err(|e| {
                warn!("Gate check for {} failed: {}", signer, e);
                HistoryError::GateUnavailable {
                    symbol: symbol.clone(),
                }
            })?;

        let held = portfolio.token_amount(&self.settings.gate_token);
        if held < self.settings.gate_min_amount {
            return Err(HistoryError::InsufficientBalance {
                minimum: group_thousands(self.settings.gate_min_amount),
                symbol,
            });
        }
        Ok(())
    }
}

/// Comma-separated list; entries not starting with `0x` are dropped.
fn parse_wallet_list(csv: &str) -> Vec<String> {
    let mut wallets: Vec<String> = Vec::new();
    for wallet in csv.split(',').map(str::trim) {
        if !wallet.starts_with("0x") {
            continue;
        }
        let wallet = normalize_address(wallet);
        if !wallets.contains(&wallet) {
            wallets.push(wallet);
        }
    }
    wallets
}

/// Signer of an EIP-191 `personal_sign` message.
pub fn recover_signer(message: &str, signature: &str) -> Result<Address, HistoryError> {
    let signature = Signature::from_str(signature.trim())
        .map_err(|e| HistoryError::Signature(e.to_string()))?;
    signature
        .recover_address_from_msg(message)
        .map_err(|e| HistoryError::Signature(e.to_string()))
}

/// `2000000.0` -> `"2,000,000"`.
fn group_thousands(value: f64) -> String {
    let digits = format!("{:.0}", value.abs());
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    if value < 0.0 {
        out.insert(0, '-');
    }
    out
}
