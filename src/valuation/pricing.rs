use crate::cache::TokenQuote;
use crate::utils::has_sufficient_liquidity;

pub const WARN_LOW_LIQUIDITY: &str = "Low liquidity pool";
pub const WARN_PRICE_ERROR: &str = "Error fetching price data";
pub const WARN_LP_DATA: &str = "Failed to get LP data";
pub const WARN_MISSING_PRICE: &str = "Missing price data";

/// A cached quote after the liquidity-floor policy.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct TrustedPrice {
    pub price_usd: f64,
    pub liquidity_usd: f64,
    pub icon_url: Option<String>,
    pub warning: Option<&'static str>,
}

impl TrustedPrice {
    pub fn value_of(&self, amount: f64) -> f64 {
        if self.price_usd > 0.0 && amount.is_finite() && amount > 0.0 {
            amount * self.price_usd
        } else {
            0.0
        }
    }
}

/// A quote that was never priced is unknown, not a thin market. Fetched
/// quotes under the liquidity floor have their price forced to 0. A zero
/// price above the floor is a fetch problem.
pub(crate) fn trusted_price(quote: Option<&TokenQuote>) -> TrustedPrice {
    let price_usd = quote.map(|q| q.price_usd).unwrap_or(0.0);
    let liquidity_usd = quote.map(|q| q.liquidity_usd).unwrap_or(0.0);
    let icon_url = quote.and_then(|q| q.icon_url.clone());
    let fetched = quote.is_some_and(|q| q.fetched_at.is_some());

    if !fetched {
        return TrustedPrice {
            price_usd: 0.0,
            liquidity_usd,
            icon_url,
            warning: Some(WARN_PRICE_ERROR),
        };
    }

    if !has_sufficient_liquidity(liquidity_usd) {
        return TrustedPrice {
            price_usd: 0.0,
            liquidity_usd,
            icon_url,
            warning: Some(WARN_LOW_LIQUIDITY),
        };
    }

    if !(price_usd > 0.0 && price_usd.is_finite()) {
        return TrustedPrice {
            price_usd: 0.0,
            liquidity_usd,
            icon_url,
            warning: Some(WARN_PRICE_ERROR),
        };
    }

    TrustedPrice {
        price_usd,
        liquidity_usd,
        icon_url,
        warning: None,
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn quote(price_usd: f64, liquidity_usd: f64) -> TokenQuote {
        TokenQuote {
            price_usd,
            liquidity_usd,
            fetched_at: Some(Utc::now()),
            ..Default::default()
        }
    }

    #[test]
    fn test_thin_market_price_is_suppressed() {
        let price = trusted_price(Some(&quote(3.0, 999.99)));
        assert_eq!(price.price_usd, 0.0);
        assert_eq!(price.warning, Some(WARN_LOW_LIQUIDITY));
        assert_eq!(price.value_of(100.0), 0.0);
    }

    #[test]
    fn test_unknown_quote_is_a_price_error() {
        assert_eq!(trusted_price(None).warning, Some(WARN_PRICE_ERROR));

        // Metadata-only entry: icon known, never priced
        let unpriced = TokenQuote {
            icon_url: Some("https://icons/a.png".to_string()),
            ..Default::default()
        };
        let price = trusted_price(Some(&unpriced));
        assert_eq!(price.warning, Some(WARN_PRICE_ERROR));
        assert_eq!(price.price_usd, 0.0);
        assert_eq!(price.icon_url.as_deref(), Some("https://icons/a.png"));
    }

    #[test]
    fn test_fetched_without_reserves_is_low_liquidity() {
        let price = trusted_price(Some(&quote(0.0, 0.0)));
        assert_eq!(price.warning, Some(WARN_LOW_LIQUIDITY));
    }

    #[test]
    fn test_zero_price_above_floor() {
        let price = trusted_price(Some(&quote(0.0, 50_000.0)));
        assert_eq!(price.warning, Some(WARN_PRICE_ERROR));
    }

    #[test]
    fn test_trusted_price_at_floor() {
        let price = trusted_price(Some(&quote(2.0, 1_000.0)));
        assert_eq!(price.warning, None);
        assert_eq!(price.value_of(5.0), 10.0);
    }
}
