use std::collections::HashMap;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use rustc_hash::FxHashMap;
use serde::Deserialize;

use crate::cache::{PriceUpdate, TokenMetadata};
use crate::utils::{normalize_address, parse_decimal_str};

/// Placeholder the index returns for tokens without an image.
const MISSING_IMAGE: &str = "missing.png";

/// Full single-token lookup: descriptive fields plus current market data.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TokenInfo {
    pub metadata: TokenMetadata,
    pub price: PriceUpdate,
}

/// Price index for the configured network.
#[async_trait]
pub trait PriceIndex: Send + Sync {
    /// Batch lookup of up to 30 tokens. Tokens the index has no data for are
    /// simply missing from the returned map (keys are lower-case).
    async fn token_prices(&self, tokens: &[String]) -> Result<FxHashMap<String, PriceUpdate>>;

    /// Single-token lookup (icon, name, symbol, price, reserve).
    async fn token_info(&self, token: &str) -> Result<TokenInfo>;

    /// Quote for the native coin.
    async fn native_info(&self) -> Result<TokenInfo>;
}

// ── Response Types ──────────────────────────────────────────────────

#[derive(Deserialize, Debug)]
struct Envelope<T> {
    data: Data<T>,
}

#[derive(Deserialize, Debug)]
struct Data<T> {
    attributes: T,
}

#[derive(Deserialize, Debug, Default)]
struct TokenAttributes {
    name: Option<String>,
    symbol: Option<String>,
    image_url: Option<String>,
    price_usd: Option<String>,
    total_reserve_in_usd: Option<String>,
    volume_usd: Option<VolumeUsd>,
}

#[derive(Deserialize, Debug, Default)]
struct VolumeUsd {
    h24: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
struct SimplePriceAttributes {
    #[serde(default)]
    token_prices: HashMap<String, Option<String>>,
    #[serde(default)]
    total_reserve_in_usd: HashMap<String, Option<String>>,
    #[serde(default)]
    h24_volume_usd: HashMap<String, Option<String>>,
    #[serde(default)]
    h24_price_change_percentage: HashMap<String, Option<String>>,
}

impl From<TokenAttributes> for TokenInfo {
    fn from(attrs: TokenAttributes) -> Self {
        let icon_url = attrs
            .image_url
            .filter(|url| !url.is_empty() && !url.ends_with(MISSING_IMAGE));

        TokenInfo {
            metadata: TokenMetadata {
                name: attrs.name,
                symbol: attrs.symbol,
                icon_url,
            },
            price: PriceUpdate {
                price_usd: parse_decimal_str(attrs.price_usd.as_deref()),
                liquidity_usd: parse_decimal_str(attrs.total_reserve_in_usd.as_deref()),
                volume_24h_usd: attrs
                    .volume_usd
                    .and_then(|v| v.h24)
                    .and_then(|v| v.parse().ok()),
                price_change_24h_pct: None,
            },
        }
    }
}

fn lookup<'a>(map: &'a HashMap<String, Option<String>>, token: &str) -> Option<&'a str> {
    map.get(token).and_then(|v| v.as_deref())
}

/// GeckoTerminal API v2 client.
#[derive(Clone)]
pub struct GeckoTerminalClient {
    http: Client,
    base_url: String,
    network: String,
    native_network: String,
    native_token: String,
}

impl GeckoTerminalClient {
    pub fn new(
        base_url: &str,
        network: &str,
        native_network: &str,
        native_token: &str,
        timeout: Duration,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            network: network.to_string(),
            native_network: native_network.to_string(),
            native_token: native_token.to_string(),
        })
    }

    async fn get_token(&self, network: &str, token: &str) -> Result<TokenInfo> {
        let url = format!("{}/networks/{}/tokens/{}", self.base_url, network, token);

        let envelope: Envelope<TokenAttributes> = self
            .http
            .get(&url)
            .header("accept", "application/json")
            .send()
            .await
            .with_context(|| format!("GET {url}"))?
            .error_for_status()?
            .json()
            .await
            .with_context(|| format!("Malformed token response for {token}"))?;

        Ok(envelope.data.attributes.into())
    }
}

#[async_trait]
impl PriceIndex for GeckoTerminalClient {
    async fn token_prices(&self, tokens: &[String]) -> Result<FxHashMap<String, PriceUpdate>> {
        if tokens.is_empty() {
            return Ok(FxHashMap::default());
        }

        let url = format!(
            "{}/simple/networks/{}/token_price/{}",
            self.base_url,
            self.network,
            tokens.join(",")
        );

        let envelope: Envelope<SimplePriceAttributes> = self
            .http
            .get(&url)
            .header("accept", "application/json")
            .query(&[
                ("include_total_reserve_in_usd", "true"),
                ("include_24hr_vol", "true"),
                ("include_24hr_price_change", "true"),
            ])
            .send()
            .await
            .with_context(|| format!("GET {url}"))?
            .error_for_status()?
            .json()
            .await
            .context("Malformed batch price response")?;

        let attrs = envelope.data.attributes;

        // Normalize keys once so lookups below are case-insensitive
        let normalize = |map: HashMap<String, Option<String>>| -> HashMap<String, Option<String>> {
            map.into_iter()
                .map(|(k, v)| (normalize_address(&k), v))
                .collect()
        };
        let prices = normalize(attrs.token_prices);
        let reserves = normalize(attrs.total_reserve_in_usd);
        let volumes = normalize(attrs.h24_volume_usd);
        let changes = normalize(attrs.h24_price_change_percentage);

        let mut result = FxHashMap::default();
        for (token, price) in &prices {
            let Some(price) = price.as_deref() else {
                continue;
            };
            result.insert(
                token.clone(),
                PriceUpdate {
                    price_usd: parse_decimal_str(Some(price)),
                    liquidity_usd: parse_decimal_str(lookup(&reserves, token)),
                    volume_24h_usd: lookup(&volumes, token).and_then(|v| v.parse().ok()),
                    price_change_24h_pct: lookup(&changes, token).and_then(|v| v.parse().ok()),
                },
            );
        }

        Ok(result)
    }

    async fn token_info(&self, token: &str) -> Result<TokenInfo> {
        self.get_token(&self.network, token).await
    }

    async fn native_info(&self) -> Result<TokenInfo> {
        self.get_token(&self.native_network, &self.native_token).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const A: &str = "0x00000000000000000000000000000000000000aa";
    const B: &str = "0x00000000000000000000000000000000000000bb";

    fn client(server: &MockServer) -> GeckoTerminalClient {
        GeckoTerminalClient::new(
            &server.uri(),
            "pepe-unchained",
            "eth",
            "0x00000000000000000000000000000000000000ee",
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_batch_prices_parse_and_normalize() {
        let server = MockServer::start().await;
        let upper_a = A.to_uppercase().replace("0X", "0x");
        Mock::given(method("GET"))
            .and(path(format!(
                "/simple/networks/pepe-unchained/token_price/{A},{B}"
            )))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": {
                    "id": "x",
                    "type": "simple_token_price",
                    "attributes": {
                        "token_prices": { upper_a: "1.5", B: null },
                        "total_reserve_in_usd": { A: "2500.25" },
                        "h24_volume_usd": { A: "100" },
                        "h24_price_change_percentage": { A: "-3.5" }
                    }
                }
            })))
            .mount(&server)
            .await;

        let prices = client(&server)
            .token_prices(&[A.to_string(), B.to_string()])
            .await
            .unwrap();

        assert_eq!(prices.len(), 1);
        let a = &prices[A];
        assert_eq!(a.price_usd, 1.5);
        assert_eq!(a.liquidity_usd, 2500.25);
        assert_eq!(a.volume_24h_usd, Some(100.0));
        assert_eq!(a.price_change_24h_pct, Some(-3.5));
        assert!(!prices.contains_key(B));
    }

    #[tokio::test]
    async fn test_batch_prices_non_2xx_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let result = client(&server).token_prices(&[A.to_string()]).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_token_info_drops_placeholder_icon() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/networks/pepe-unchained/tokens/{A}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": {
                    "id": "x",
                    "type": "token",
                    "attributes": {
                        "name": "Token A",
                        "symbol": "TKA",
                        "image_url": "missing.png",
                        "price_usd": "0.25",
                        "total_reserve_in_usd": "12000",
                        "volume_usd": { "h24": "50.5" }
                    }
                }
            })))
            .mount(&server)
            .await;

        let info = client(&server).token_info(A).await.unwrap();
        assert_eq!(info.metadata.symbol.as_deref(), Some("TKA"));
        assert_eq!(info.metadata.icon_url, None);
        assert_eq!(info.price.price_usd, 0.25);
        assert_eq!(info.price.liquidity_usd, 12000.0);
        assert_eq!(info.price.volume_24h_usd, Some(50.5));
    }

    #[tokio::test]
    async fn test_native_info_uses_native_network() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(
                "/networks/eth/tokens/0x00000000000000000000000000000000000000ee",
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": {
                    "attributes": {
                        "price_usd": "0.001",
                        "image_url": "https://img/pepu.png"
                    }
                }
            })))
            .mount(&server)
            .await;

        let info = client(&server).native_info().await.unwrap();
        assert_eq!(info.price.price_usd, 0.001);
        assert_eq!(info.metadata.icon_url.as_deref(), Some("https://img/pepu.png"));
    }
}
