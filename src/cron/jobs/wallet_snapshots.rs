//! Job to snapshot the valuation of every tracked wallet.
//!
//! Runs the valuations in log mode (many retries, long delays) since nobody
//! is waiting on the result. A wallet that fails is logged and skipped, as
//! is one whose LP listing or contract reads failed: a zero written for an
//! unread component would show up as a drop in the history.

use anyhow::Result;
use chrono::Utc;
use log::{error, info, warn};
use thiserror::Error;

use crate::db::{SnapshotStore, WalletSnapshot};
use crate::fetcher::FetchMode;
use crate::valuation::{PortfolioError, PortfolioService, WARN_CONTRACT_READ};

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error(transparent)]
    Valuation(#[from] PortfolioError),
    #[error("incomplete valuation: {0}")]
    Incomplete(String),
}

/// Value one wallet across all views.
pub async fn snapshot_wallet(
    service: &PortfolioService,
    wallet: &str,
) -> Result<WalletSnapshot, SnapshotError> {
    let mode = FetchMode::Log;

    let portfolio = service.portfolio(wallet, mode).await?;
    let (lp, presales, staking) = tokio::join!(
        service.lp_positions(wallet, mode),
        service.presales(wallet, mode),
        service.staking(wallet, mode),
    );
    let (lp, presales, staking) = (lp?, presales?, staking?);

    if let Some(warning) = &lp.warning {
        return Err(SnapshotError::Incomplete(warning.clone()));
    }
    let contract_failed = presales
        .presales
        .iter()
        .map(|p| &p.warning)
        .chain(staking.positions.iter().map(|p| &p.warning))
        .any(|w| w.as_deref() == Some(WARN_CONTRACT_READ));
    if contract_failed {
        return Err(SnapshotError::Incomplete(WARN_CONTRACT_READ.to_string()));
    }

    Ok(WalletSnapshot::from_valuations(
        wallet,
        Utc::now(),
        &portfolio,
        &lp,
        &presales,
        &staking,
    ))
}

/// Returns the number of snapshots written.
pub async fn run(service: &PortfolioService, store: &dyn SnapshotStore) -> Result<usize> {
    info!("Starting wallet_snapshots job...");
    let start = std::time::Instant::now();

    let wallets = store.tracked_wallets().await?;
    if wallets.is_empty() {
        info!("No tracked wallets to snapshot");
        return Ok(0);
    }

    let mut written = 0;
    for wallet in &wallets {
        let snapshot = match snapshot_wallet(service, wallet).await {
            Ok(snapshot) => snapshot,
            Err(SnapshotError::Incomplete(reason)) => {
                warn!("Skipping snapshot for {}: {}", wallet, reason);
                continue;
            },
            Err(e) => {
                error!("Failed to value wallet {}: {}", wallet, e);
                continue;
            },
        };

        match store.insert_snapshot(&snapshot).await {
            Ok(()) => written += 1,
            Err(e) => error!("Failed to store snapshot for {}: {:#}", wallet, e),
        }
    }

    info!(
        "Snapshotted {}/{} wallets in {:?}",
        written,
        wallets.len(),
        start.elapsed()
    );
    Ok(written)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::cache::QuoteCache;
    use crate::config::{ContractSettings, FetcherSettings, TokenContract};
    use crate::fetcher::BatchPriceFetcher;
    use crate::testing::{units, FakeChain, FakeExplorer, FakePriceIndex, MemoryStore};

    const GOOD: &str = "0x3333333333333333333333333333333333333333";
    const TOKEN: &str = "0x00000000000000000000000000000000000000a1";

    fn explorer() -> FakeExplorer {
        FakeExplorer::default()
            .with_native(1_000.0)
            .with_token(TOKEN, "TKA", &units(4))
    }

    fn service() -> PortfolioService {
        service_with(explorer(), FakeChain::default(), Vec::new())
    }

    fn service_with(
        explorer: FakeExplorer,
        chain: FakeChain,
        presales: Vec<TokenContract>,
    ) -> PortfolioService {
        let settings = FetcherSettings {
            log_retries: 1,
            log_delay_ms: 1,
            ..Default::default()
        };
        let contracts = ContractSettings {
            staking: "0xf0163C18F8D3fC8D5b4cA15e07D0F9f75460335F".to_string(),
            position_manager: "0x00000000000000000000000000000000000000f1".to_string(),
            presales,
            staking_pools: Vec::new(),
        };
        let index = FakePriceIndex::default()
            .with_native(0.01)
            .with_price(TOKEN, 2.5, 50_000.0)
            .with_icon(TOKEN, "https://icons/a.png");
        let cache = Arc::new(QuoteCache::new(Duration::from_secs(300), 1_000));
        let fetcher = BatchPriceFetcher::new(Arc::new(index), cache, &settings);
        PortfolioService::new(
            Arc::new(explorer),
            Arc::new(chain),
            fetcher,
            &contracts,
            &settings,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_snapshots_tracked_wallets_and_skips_invalid() {
        let store = MemoryStore::tracking(&[GOOD, "not-a-wallet"]);

        let written = run(&service(), &store).await.unwrap();

        assert_eq!(written, 1);
        let snapshots = store.snapshots.lock().unwrap().clone();
        assert_eq!(snapshots.len(), 1);
        let snapshot = &snapshots[0];
        assert_eq!(snapshot.wallet, GOOD);
        assert_eq!(snapshot.pepu_usd, 10.0);
        assert_eq!(snapshot.l2_usd, 10.0);
        assert_eq!(snapshot.lp_usd, 0.0);
        assert_eq!(snapshot.presale_usd, 0.0);
    }

    #[tokio::test]
    async fn test_failed_lp_listing_writes_no_snapshot() {
        let explorer = FakeExplorer {
            nfts_fail: true,
            ..explorer()
        };
        let service = service_with(explorer, FakeChain::default(), Vec::new());
        let store = MemoryStore::tracking(&[GOOD]);

        let written = run(&service, &store).await.unwrap();

        assert_eq!(written, 0);
        assert!(store.snapshots.lock().unwrap().is_empty());
        assert!(matches!(
            snapshot_wallet(&service, GOOD).await,
            Err(SnapshotError::Incomplete(_))
        ));
    }

    #[tokio::test]
    async fn test_failed_presale_read_writes_no_snapshot() {
        let presale = TokenContract {
            name: "Presale".to_string(),
            contract: "0x00000000000000000000000000000000000000e1".to_string(),
            token: TOKEN.to_string(),
            decimals: 18,
        };
        // No deposit configured on the fake chain, so the read reverts
        let service = service_with(explorer(), FakeChain::default(), vec![presale]);
        let store = MemoryStore::tracking(&[GOOD]);

        assert_eq!(run(&service, &store).await.unwrap(), 0);
        assert!(store.snapshots.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_no_tracked_wallets() {
        let store = MemoryStore::default();
        assert_eq!(run(&service(), &store).await.unwrap(), 0);
    }
}
