use std::collections::BTreeMap;

use anyhow::Result;
use async_trait::async_trait;

pub mod models;
pub mod postgres;

pub use models::{HistoryPoint, WalletSnapshot};
pub use postgres::PostgresClient;

/// Persistence for tracked wallets and their periodic snapshots.
///
/// PostgreSQL in production ([`PostgresClient`]); the snapshot job and the
/// history service only see this trait.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn tracked_wallets(&self) -> Result<Vec<String>>;

    /// Idempotent: already tracked wallets are left as they are.
    async fn track_wallets(&self, wallets: &[String]) -> Result<()>;

    async fn insert_snapshot(&self, snapshot: &WalletSnapshot) -> Result<()>;

    /// Snapshots of `wallets`, grouped by wallet, oldest first.
    async fn history(&self, wallets: &[String]) -> Result<BTreeMap<String, Vec<WalletSnapshot>>>;
}
