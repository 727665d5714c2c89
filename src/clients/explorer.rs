use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use crate::utils::{normalize_address, str_to_f64_with_decimals, DEFAULT_DECIMALS};

/// Upper bound on NFT listing pages followed for one wallet.
const MAX_NFT_PAGES: usize = 20;

/// One fungible balance as reported by the explorer.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenBalance {
    /// Lower-case contract address
    pub address: String,
    pub name: Option<String>,
    pub symbol: Option<String>,
    pub decimals: u32,
    /// Raw on-chain balance as a base-10 string
    pub raw_value: String,
}

impl TokenBalance {
    /// Decimal-adjusted amount (`raw / 10^decimals`).
    pub fn amount(&self) -> f64 {
        str_to_f64_with_decimals(&self.raw_value, self.decimals).unwrap_or(0.0)
    }
}

/// One NFT held by a wallet.
#[derive(Debug, Clone, PartialEq)]
pub struct NftInstance {
    pub token_id: String,
    /// Lower-case address of the NFT collection contract
    pub collection: String,
    /// Free-form metadata description text, if any
    pub description: Option<String>,
}

/// Block explorer for the configured network.
#[async_trait]
pub trait Explorer: Send + Sync {
    /// Native coin balance, decimal-adjusted.
    async fn native_balance(&self, wallet: &str) -> Result<f64>;

    async fn token_balances(&self, wallet: &str) -> Result<Vec<TokenBalance>>;

    async fn nft_instances(&self, wallet: &str) -> Result<Vec<NftInstance>>;
}

// ── Response Types ──────────────────────────────────────────────────

#[derive(Deserialize, Debug)]
struct AddressResponse {
    coin_balance: Option<String>,
}

#[derive(Deserialize, Debug)]
struct TokenRef {
    #[serde(alias = "address_hash")]
    address: String,
    name: Option<String>,
    symbol: Option<String>,
    decimals: Option<String>,
}

#[derive(Deserialize, Debug)]
struct TokenBalanceItem {
    token: TokenRef,
    value: Option<String>,
}

#[derive(Deserialize, Debug)]
struct NftMetadata {
    description: Option<String>,
}

#[derive(Deserialize, Debug)]
struct NftItem {
    id: String,
    token: TokenRef,
    metadata: Option<NftMetadata>,
}

#[derive(Deserialize, Debug)]
struct NftPage {
    #[serde(default)]
    items: Vec<NftItem>,
    next_page_params: Option<serde_json::Map<String, serde_json::Value>>,
}

impl From<TokenBalanceItem> for TokenBalance {
    fn from(item: TokenBalanceItem) -> Self {
        let decimals = item
            .token
            .decimals
            .as_deref()
            .and_then(|d| d.parse().ok())
            .unwrap_or(DEFAULT_DECIMALS);

        TokenBalance {
            address: normalize_address(&item.token.address),
            name: item.token.name,
            symbol: item.token.symbol,
            decimals,
            raw_value: item.value.unwrap_or_else(|| "0".to_string()),
        }
    }
}

/// Render paging params as query pairs (`{"id": 5, "type": "x"}` -> `id=5&type=x`).
fn page_query(params: &serde_json::Map<String, serde_json::Value>) -> Vec<(String, String)> {
    params
        .iter()
        .filter(|(_, v)| !v.is_null())
        .map(|(k, v)| {
            let value = match v {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (k.clone(), value)
        })
        .collect()
}

/// Blockscout API v2 client.
#[derive(Clone)]
pub struct BlockscoutClient {
    http: Client,
    base_url: String,
}

impl BlockscoutClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl Explorer for BlockscoutClient {
    async fn native_balance(&self, wallet: &str) -> Result<f64> {
        let url = format!("{}/addresses/{}", self.base_url, wallet);

        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .with_context(|| format!("GET {url}"))?;

        // Addresses the explorer has never seen are reported as 404
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(0.0);
        }

        let body: AddressResponse = resp
            .error_for_status()?
            .json()
            .await
            .context("Malformed address response")?;

        let raw = body.coin_balance.unwrap_or_else(|| "0".to_string());
        str_to_f64_with_decimals(&raw, DEFAULT_DECIMALS)
            .with_context(|| format!("Invalid coin balance {raw:?}"))
    }

    async fn token_balances(&self, wallet: &str) -> Result<Vec<TokenBalance>> {
        let url = format!("{}/addresses/{}/token-balances", self.base_url, wallet);

        let items: Vec<TokenBalanceItem> = self
            .http
            .get(&url)
            .send()
            .await
            .with_context(|| format!("GET {url}"))?
            .error_for_status()?
            .json()
            .await
            .context("Malformed token balances response")?;

        Ok(items.into_iter().map(TokenBalance::from).collect())
    }

    async fn nft_instances(&self, wallet: &str) -> Result<Vec<NftInstance>> {
        let url = format!("{}/addresses/{}/nft", self.base_url, wallet);

        let mut instances = Vec::new();
        let mut page_params: Vec<(String, String)> = vec![("type".into(), "ERC-721".into())];

        for _ in 0..MAX_NFT_PAGES {
            let page: NftPage = self
                .http
                .get(&url)
                .query(&page_params)
                .send()
                .await
                .with_context(|| format!("GET {url}"))?
                .error_for_status()?
                .json()
                .await
                .context("Malformed NFT response")?;

            instances.extend(page.items.into_iter().map(|item| NftInstance {
                token_id: item.id,
                collection: normalize_address(&item.token.address),
                description: item.metadata.and_then(|m| m.description),
            }));

            match page.next_page_params {
                Some(next) if !next.is_empty() => {
                    page_params = vec![("type".into(), "ERC-721".into())];
                    page_params.extend(page_query(&next));
                },
                _ => break,
            }
        }

        Ok(instances)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const WALLET: &str = "0x1111111111111111111111111111111111111111";

    #[tokio::test]
    async fn test_native_balance_scaled() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/addresses/{WALLET}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "coin_balance": "10000000000000000000"
            })))
            .mount(&server)
            .await;

        let client = BlockscoutClient::new(&server.uri(), Duration::from_secs(5)).unwrap();
        assert_eq!(client.native_balance(WALLET).await.unwrap(), 10.0);
    }

    #[tokio::test]
    async fn test_unknown_address_has_zero_balance() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = BlockscoutClient::new(&server.uri(), Duration::from_secs(5)).unwrap();
        assert_eq!(client.native_balance(WALLET).await.unwrap(), 0.0);
    }

    #[tokio::test]
    async fn test_server_error_is_propagated() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let client = BlockscoutClient::new(&server.uri(), Duration::from_secs(5)).unwrap();
        assert!(client.native_balance(WALLET).await.is_err());
        assert!(client.token_balances(WALLET).await.is_err());
    }

    #[tokio::test]
    async fn test_token_balances_default_decimals() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/addresses/{WALLET}/token-balances")))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {
                    "token": {
                        "address": "0x00000000000000000000000000000000000000AA",
                        "name": "Token A",
                        "symbol": "TKA",
                        "decimals": "6"
                    },
                    "value": "2500000"
                },
                {
                    "token": {
                        "address_hash": "0x00000000000000000000000000000000000000bb",
                        "name": null,
                        "symbol": null,
                        "decimals": null
                    },
                    "value": "1000000000000000000"
                }
            ])))
            .mount(&server)
            .await;

        let client = BlockscoutClient::new(&server.uri(), Duration::from_secs(5)).unwrap();
        let balances = client.token_balances(WALLET).await.unwrap();

        assert_eq!(balances.len(), 2);
        assert_eq!(balances[0].address, "0x00000000000000000000000000000000000000aa");
        assert_eq!(balances[0].amount(), 2.5);
        assert_eq!(balances[1].decimals, 18);
        assert_eq!(balances[1].amount(), 1.0);
    }

    #[tokio::test]
    async fn test_nft_instances_follow_pages() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/addresses/{WALLET}/nft")))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "items": [{
                    "id": "8",
                    "token": { "address": "0x00000000000000000000000000000000000000CC" },
                    "metadata": null
                }],
                "next_page_params": null
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("/addresses/{WALLET}/nft")))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "items": [{
                    "id": "7",
                    "token": { "address": "0x00000000000000000000000000000000000000cc" },
                    "metadata": { "description": "Pool Address: 0x00000000000000000000000000000000000000dd" }
                }],
                "next_page_params": { "page": 2 }
            })))
            .mount(&server)
            .await;

        let client = BlockscoutClient::new(&server.uri(), Duration::from_secs(5)).unwrap();
        let nfts = client.nft_instances(WALLET).await.unwrap();

        assert_eq!(nfts.len(), 2);
        assert_eq!(nfts[0].token_id, "7");
        assert!(nfts[0].description.as_deref().unwrap().contains("Pool Address"));
        assert_eq!(nfts[1].token_id, "8");
        assert_eq!(nfts[1].collection, "0x00000000000000000000000000000000000000cc");
    }
}
