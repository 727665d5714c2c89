pub mod abis;
pub mod cache;
pub mod clients;
pub mod config;
pub mod cron;
pub mod db;
pub mod fetcher;
pub mod history;
pub mod server;
pub mod utils;
pub mod valuation;

#[cfg(test)]
pub(crate) mod testing;

pub use cache::QuoteCache;
pub use clients::{BlockscoutClient, GeckoTerminalClient, RpcChainClient};
pub use config::Settings;
pub use cron::{CronScheduler, CronSettings};
pub use db::{PostgresClient, SnapshotStore};
pub use fetcher::BatchPriceFetcher;
pub use history::HistoryService;
pub use server::{run_server, AppState};
pub use valuation::PortfolioService;
