pub mod wallet_snapshots;
