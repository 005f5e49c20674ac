//! REST Quote Fetcher
//!
//! Implements the `QuoteFetcher` port against the Exchange REST API. Each
//! fetch issues the product ticker and product stats requests concurrently.
//! The ticker request decides the outcome; the stats request only enriches
//! the quote and its failures are tolerated.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;

use crate::application::ports::{FetchError, QuoteFetcher};
use crate::domain::quote::{Instrument, Quote, decimal_or_zero, parse_price};
use crate::infrastructure::coinbase::codec::parse_time;
use crate::infrastructure::coinbase::messages::{ProductStatsResponse, ProductTickerResponse};

/// REST adapter configuration.
#[derive(Debug, Clone)]
pub struct RestFetcherConfig {
    /// Base URL, e.g. `https://api.exchange.coinbase.com`.
    pub base_url: String,
    /// `User-Agent` sent with every request. The API rejects requests
    /// without one.
    pub user_agent: String,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl Default for RestFetcherConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.exchange.coinbase.com".to_string(),
            user_agent: concat!("price-ticker/", env!("CARGO_PKG_VERSION")).to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

/// REST implementation of [`QuoteFetcher`].
#[derive(Debug, Clone)]
pub struct RestQuoteFetcher {
    client: reqwest::Client,
    base_url: String,
}

impl RestQuoteFetcher {
    /// Create a new fetcher.
    ///
    /// # Errors
    ///
    /// Returns `FetchError::Network` if the HTTP client cannot be built.
    pub fn new(config: &RestFetcherConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| FetchError::Network(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(FetchError::RateLimited);
        }
        if !status.is_success() {
            return Err(FetchError::Upstream {
                status: status.as_u16(),
            });
        }

        response
            .json()
            .await
            .map_err(|e| FetchError::InvalidPayload(e.to_string()))
    }

    fn product_url(&self, instrument: &Instrument, resource: &str) -> String {
        format!("{}/products/{}/{resource}", self.base_url, instrument.as_str())
    }
}

#[async_trait]
impl QuoteFetcher for RestQuoteFetcher {
    async fn fetch(&self, instrument: &Instrument) -> Result<Quote, FetchError> {
        let ticker_url = self.product_url(instrument, "ticker");
        let stats_url = self.product_url(instrument, "stats");

        let (ticker, stats) = tokio::join!(
            self.get_json::<ProductTickerResponse>(&ticker_url),
            self.get_json::<ProductStatsResponse>(&stats_url),
        );

        let ticker = ticker?;
        let stats = stats.unwrap_or_else(|e| {
            tracing::debug!(instrument = %instrument, error = %e, "Stats request failed, using zeroed statistics");
            ProductStatsResponse::default()
        });

        let price = parse_price(ticker.price.as_deref()).ok_or_else(|| {
            FetchError::InvalidPayload(format!("unusable price: {:?}", ticker.price))
        })?;

        let mut quote = Quote::new(instrument.clone(), price);
        quote.time = parse_time(ticker.time.as_deref());
        quote.trade_id = ticker.trade_id.unwrap_or_default();
        quote.last_size = decimal_or_zero(ticker.size.as_deref());
        quote.best_bid = decimal_or_zero(ticker.bid.as_deref());
        quote.best_ask = decimal_or_zero(ticker.ask.as_deref());
        quote.volume_24h = decimal_or_zero(stats.volume.as_deref().or(ticker.volume.as_deref()));
        quote.low_24h = decimal_or_zero(stats.low.as_deref());
        quote.high_24h = decimal_or_zero(stats.high.as_deref());
        quote.open_24h = decimal_or_zero(stats.open.as_deref());
        quote.volume_30d = decimal_or_zero(stats.volume_30day.as_deref());

        Ok(quote)
    }
}
