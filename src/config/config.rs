use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

/// HTTP server bind configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

/// Upstream endpoints for the single supported network.
///
/// - Explorer: Blockscout API v2 (balances, NFT instances)
/// - Price index: GeckoTerminal API v2 (token prices, reserves, icons)
/// - RPC: JSON-RPC node for contract reads and storage slots
#[derive(Debug, Deserialize, Clone)]
pub struct NetworkSettings {
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,
    #[serde(default = "default_explorer_url")]
    pub explorer_url: String,
    #[serde(default = "default_price_index_url")]
    pub price_index_url: String,
    /// Price-index network slug for L2 tokens
    #[serde(default = "default_network_id")]
    pub network_id: String,
    /// The native coin is quoted from its L1 listing
    #[serde(default = "default_native_network_id")]
    pub native_network_id: String,
    #[serde(default = "default_native_token")]
    pub native_token: String,
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
    #[serde(default = "default_rpc_timeout_secs")]
    pub rpc_timeout_secs: u64,
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            rpc_url: default_rpc_url(),
            explorer_url: default_explorer_url(),
            price_index_url: default_price_index_url(),
            network_id: default_network_id(),
            native_network_id: default_native_network_id(),
            native_token: default_native_token(),
            http_timeout_secs: default_http_timeout_secs(),
            rpc_timeout_secs: default_rpc_timeout_secs(),
        }
    }
}

impl NetworkSettings {
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_secs(self.rpc_timeout_secs)
    }
}

fn default_rpc_url() -> String {
    "https://rpc-pepe-unchained-gupg0lo9wf.t.conduit.xyz".to_string()
}

fn default_explorer_url() -> String {
    "https://explorer-pepe-unchained-gupg0lo9wf.t.conduit.xyz/api/v2".to_string()
}

fn default_price_index_url() -> String {
    "https://api.geckoterminal.com/api/v2".to_string()
}

fn default_network_id() -> String {
    "pepe-unchained".to_string()
}

fn default_native_network_id() -> String {
    "eth".to_string()
}

fn default_native_token() -> String {
    "0xadd39272e83895e7d3f244f696b7a25635f34234".to_string()
}

fn default_http_timeout_secs() -> u64 {
    30
}

fn default_rpc_timeout_secs() -> u64 {
    30
}

/// A contract holding a per-wallet token balance (presale or staking pool).
#[derive(Debug, Deserialize, Clone)]
pub struct TokenContract {
    pub name: String,
    pub contract: String,
    /// Token the balance is denominated in (quoted via the price index)
    pub token: String,
    #[serde(default = "default_decimals")]
    pub decimals: u32,
}

fn default_decimals() -> u32 {
    18
}

/// On-chain contract addresses.
#[derive(Debug, Deserialize, Clone)]
pub struct ContractSettings {
    /// Native-coin staking pool (`poolStakers` / `getRewards`)
    #[serde(default = "default_staking_contract")]
    pub staking: String,
    /// Concentrated-liquidity position manager (position NFTs)
    pub position_manager: String,
    #[serde(default)]
    pub presales: Vec<TokenContract>,
    /// L2 token staking pools sharing the native staking ABI
    #[serde(default)]
    pub staking_pools: Vec<TokenContract>,
}

fn default_staking_contract() -> String {
    "0xf0163C18F8D3fC8D5b4cA15e07D0F9f75460335F".to_string()
}

/// Quote cache sizing and freshness.
#[derive(Debug, Deserialize, Clone)]
pub struct CacheSettings {
    #[serde(default = "default_cache_ttl_secs")]
    pub ttl_secs: u64,
    #[serde(default = "default_cache_max_capacity")]
    pub max_capacity: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            ttl_secs: default_cache_ttl_secs(),
            max_capacity: default_cache_max_capacity(),
        }
    }
}

fn default_cache_ttl_secs() -> u64 {
    300
}

fn default_cache_max_capacity() -> u64 {
    50_000
}

/// Price fetching, retry and fan-out configuration.
///
/// Two retry profiles:
/// - Fast: interactive requests, bounded latency (few retries, short delay)
/// - Log: background snapshots, completeness over latency
#[derive(Debug, Deserialize, Clone)]
pub struct FetcherSettings {
    /// Addresses per batch price request (hard upstream limit is 30)
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_fast_retries")]
    pub fast_retries: u32,
    #[serde(default = "default_fast_delay_ms")]
    pub fast_delay_ms: u64,
    #[serde(default = "default_log_retries")]
    pub log_retries: u32,
    #[serde(default = "default_log_delay_ms")]
    pub log_delay_ms: u64,
    /// Concurrent LP positions processed per request
    #[serde(default = "default_lp_workers")]
    pub lp_workers: usize,
    /// Upper bound on every upstream read of one fast-mode request
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Upper bound on the chain reads for a single LP position
    #[serde(default = "default_position_timeout_secs")]
    pub position_timeout_secs: u64,
}

impl Default for FetcherSettings {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            fast_retries: default_fast_retries(),
            fast_delay_ms: default_fast_delay_ms(),
            log_retries: default_log_retries(),
            log_delay_ms: default_log_delay_ms(),
            lp_workers: default_lp_workers(),
            request_timeout_secs: default_request_timeout_secs(),
            position_timeout_secs: default_position_timeout_secs(),
        }
    }
}

fn default_batch_size() -> usize {
    30
}

fn default_fast_retries() -> u32 {
    2
}

fn default_fast_delay_ms() -> u64 {
    1_000
}

fn default_log_retries() -> u32 {
    10
}

fn default_log_delay_ms() -> u64 {
    5_000
}

fn default_lp_workers() -> usize {
    10
}

fn default_request_timeout_secs() -> u64 {
    25
}

fn default_position_timeout_secs() -> u64 {
    20
}

/// PostgreSQL database connection configuration.
///
/// Used for storing:
/// - Tracked wallets
/// - Periodic wallet valuation snapshots
#[derive(Debug, Deserialize, Clone)]
pub struct PostgresSettings {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
}

fn default_pool_size() -> usize {
    16
}

/// Wallet history snapshots and access gating.
#[derive(Debug, Deserialize, Clone)]
pub struct HistorySettings {
    #[serde(default = "default_snapshot_interval_secs")]
    pub snapshot_interval_secs: u64,
    /// Token a signer must hold to read history
    #[serde(default = "default_gate_token")]
    pub gate_token: String,
    #[serde(default = "default_gate_symbol")]
    pub gate_symbol: String,
    #[serde(default = "default_gate_min_amount")]
    pub gate_min_amount: f64,
}

impl Default for HistorySettings {
    fn default() -> Self {
        Self {
            snapshot_interval_secs: default_snapshot_interval_secs(),
            gate_token: default_gate_token(),
            gate_symbol: default_gate_symbol(),
            gate_min_amount: default_gate_min_amount(),
        }
    }
}

fn default_snapshot_interval_secs() -> u64 {
    3600
}

fn default_gate_token() -> String {
    "0x73d070ec589d9f889fdf3b16fb1b828cecef320b".to_string()
}

fn default_gate_symbol() -> String {
    "PBTC".to_string()
}

fn default_gate_min_amount() -> f64 {
    2_000_000.0
}

/// Root application configuration.
///
/// Loaded from `config.yaml` at startup, with `PEPU__<SECTION>__<KEY>`
/// environment variables taking precedence.
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub network: NetworkSettings,
    pub contracts: ContractSettings,
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub fetcher: FetcherSettings,
    pub postgres: PostgresSettings,
    #[serde(default)]
    pub history: HistorySettings,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::with_name("config"))
            .add_source(Environment::with_prefix("PEPU").separator("__"))
            .build()?;

        let settings: Settings = s.try_deserialize()?;

        Ok(settings)
    }
}
