//! Cron scheduler for periodic background tasks.
//!
//! Runs jobs like:
//! - Snapshotting the valuation of every tracked wallet into PostgreSQL

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use log::{error, info};
use tokio_cron_scheduler::{Job, JobScheduler};
use tokio_util::sync::CancellationToken;

use crate::config::HistorySettings;
use crate::db::SnapshotStore;
use crate::valuation::PortfolioService;

use super::jobs;

/// Cron scheduler that manages periodic background jobs.
pub struct CronScheduler {
    service: Arc<PortfolioService>,
    store: Arc<dyn SnapshotStore>,
    settings: Arc<CronSettings>,
}

/// Configuration for cron job intervals
#[derive(Debug, Clone)]
pub struct CronSettings {
    /// Interval for snapshotting tracked wallets - default 1 hour
    pub wallet_snapshot_interval_secs: u64,
}

impl Default for CronSettings {
    fn default() -> Self {
        Self {
            wallet_snapshot_interval_secs: 3600,
        }
    }
}

impl From<&HistorySettings> for CronSettings {
    fn from(history: &HistorySettings) -> Self {
        Self {
            wallet_snapshot_interval_secs: history.snapshot_interval_secs.max(1),
        }
    }
}

impl CronScheduler {
    pub fn new(
        service: Arc<PortfolioService>,
        store: Arc<dyn SnapshotStore>,
        settings: CronSettings,
    ) -> Self {
        Self {
            service,
            store,
            settings: Arc::new(settings),
        }
    }

    /// Starts the cron scheduler and runs until cancellation.
    pub async fn run(&self, cancellation_token: CancellationToken) -> Result<()> {
        let mut scheduler = JobScheduler::new().await?;

        self.register_wallet_snapshots_job(&scheduler).await?;

        scheduler.start().await?;
        info!("Cron scheduler started");

        cancellation_token.cancelled().await;
        info!("Cron scheduler shutting down...");

        scheduler.shutdown().await?;
        Ok(())
    }

    async fn register_wallet_snapshots_job(&self, scheduler: &JobScheduler) -> Result<()> {
        let service = self.service.clone();
        let store = self.store.clone();
        let interval = self.settings.wallet_snapshot_interval_secs;

        let job = Job::new_repeated_async(Duration::from_secs(interval), move |_uuid, _lock| {
            let service = service.clone();
            let store = store.clone();
            Box::pin(async move {
                if let Err(e) = jobs::wallet_snapshots::run(&service, store.as_ref()).await {
                    error!("Failed to snapshot wallets: {:#}", e);
                }
            })
        })?;

        scheduler.add(job).await?;
        info!("Registered wallet_snapshots job (every {}s)", interval);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval_from_history_settings() {
        let history = HistorySettings {
            snapshot_interval_secs: 0,
            ..Default::default()
        };
        assert_eq!(CronSettings::from(&history).wallet_snapshot_interval_secs, 1);
        assert_eq!(
            CronSettings::from(&HistorySettings::default()).wallet_snapshot_interval_secs,
            3600
        );
    }
}
