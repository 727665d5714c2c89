use std::collections::BTreeMap;

use anyhow::Result;
use async_trait::async_trait;
use log::error;

use crate::db::models::WalletSnapshot;
use crate::db::postgres::PostgresClient;
use crate::db::SnapshotStore;

#[async_trait]
impl SnapshotStore for PostgresClient {
    // ==================== TRACKED WALLETS ====================

    async fn tracked_wallets(&self) -> Result<Vec<String>> {
        let client = self.pool.get().await?;
        let rows = client
            .query("SELECT wallet FROM tracked_wallets ORDER BY wallet", &[])
            .await?;

        Ok(rows.iter().map(|row| row.get("wallet")).collect())
    }

    async fn track_wallets(&self, wallets: &[String]) -> Result<()> {
        if wallets.is_empty() {
            return Ok(());
        }
        let client = self.pool.get().await?;
        let query = r#"
            INSERT INTO tracked_wallets (wallet)
            SELECT * FROM UNNEST($1::text[])
            ON CONFLICT (wallet) DO NOTHING
        "#;

        client.execute(query, &[&wallets]).await.map_err(|e| {
            error!("Failed to track {} wallets: {:?}", wallets.len(), e);
            e
        })?;

        Ok(())
    }

    // ==================== WALLET HISTORY ====================

    async fn insert_snapshot(&self, snapshot: &WalletSnapshot) -> Result<()> {
        let client = self.pool.get().await?;
        let query = r#"
            INSERT INTO wallet_history (wallet, timestamp, pepu_usd, l2_usd, lp_usd, presale_usd)
            VALUES ($1, $2, $3, $4, $5, $6)
        "#;

        client
            .execute(
                query,
                &[
                    &snapshot.wallet,
                    &snapshot.timestamp,
                    &snapshot.pepu_usd,
                    &snapshot.l2_usd,
                    &snapshot.lp_usd,
                    &snapshot.presale_usd,
                ],
            )
            .await
            .map_err(|e| {
                error!("Failed to insert snapshot for {}: {:?}", snapshot.wallet, e);
                e
            })?;

        Ok(())
    }

    async fn history(&self, wallets: &[String]) -> Result<BTreeMap<String, Vec<WalletSnapshot>>> {
        let client = self.pool.get().await?;
        let query = r#"
            SELECT wallet, timestamp, pepu_usd, l2_usd, lp_usd, presale_usd
            FROM wallet_history
            WHERE wallet = ANY($1::text[])
            ORDER BY timestamp ASC
        "#;

        let rows = client.query(query, &[&wallets]).await?;

        let mut grouped: BTreeMap<String, Vec<WalletSnapshot>> = BTreeMap::new();
        for row in &rows {
            let snapshot = WalletSnapshot {
                wallet: row.get("wallet"),
                timestamp: row.get("timestamp"),
                pepu_usd: row.get::<_, Option<f64>>("pepu_usd").unwrap_or(0.0),
                l2_usd: row.get::<_, Option<f64>>("l2_usd").unwrap_or(0.0),
                lp_usd: row.get::<_, Option<f64>>("lp_usd").unwrap_or(0.0),
                presale_usd: row.get::<_, Option<f64>>("presale_usd").unwrap_or(0.0),
            };
            grouped
                .entry(snapshot.wallet.clone())
                .or_default()
                .push(snapshot);
        }

        Ok(grouped)
    }
}
