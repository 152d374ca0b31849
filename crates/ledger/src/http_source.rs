//! HTTP adapter for the upstream price service.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::traits::PriceSource;
use crate::{LedgerError, LedgerResult};

/// Upstream price-service response body.
#[derive(Debug, Deserialize)]
struct PricesResponse {
    /// Symbol -> USD price
    prices: HashMap<String, f64>,
}

/// Price source backed by the upstream price service over HTTP.
///
/// Expects a `GET {base_url}/prices?symbols=ETH,USDC` endpoint returning
/// `{"prices": {"ETH": 3200.5, ...}}`. Requests carry the inter-service API key.
#[derive(Debug, Clone)]
pub struct HttpPriceSource {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpPriceSource {
    /// Create a new client for the given service URL.
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl PriceSource for HttpPriceSource {
    #[instrument(skip(self), fields(count = symbols.len()))]
    async fn fetch_prices(&self, symbols: &[String]) -> LedgerResult<HashMap<String, f64>> {
        let url = format!("{}/prices", self.base_url);

        let response = self
            .client
            .get(&url)
            .header("X-API-Key", &self.api_key)
            .query(&[("symbols", symbols.join(","))])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(LedgerError::Protocol(format!(
                "price service returned {}",
                response.status()
            )));
        }

        let body: PricesResponse = response.json().await?;

        // Reject partial batches outright so a half-answer can never corrupt the
        // caller's cache.
        for symbol in symbols {
            match body.prices.get(symbol) {
                Some(price) if *price > 0.0 => {}
                Some(price) => {
                    return Err(LedgerError::Protocol(format!(
                        "non-positive price {} for {}",
                        price, symbol
                    )))
                }
                None => {
                    return Err(LedgerError::Protocol(format!(
                        "price service omitted {}",
                        symbol
                    )))
                }
            }
        }

        debug!(returned = body.prices.len(), "Fetched upstream prices");
        Ok(body.prices)
    }
}
