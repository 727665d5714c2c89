#[allow(clippy::module_inception)]
mod config;

pub use config::{
    CacheSettings, ContractSettings, FetcherSettings, HistorySettings, NetworkSettings,
    PostgresSettings, ServerSettings, Settings, TokenContract,
};
