// =====================================================================================
// File: core-oracle/src/adapters/coinbase.rs
// Description: Coinbase Exchange source adapter
// Author: arkSong (arksong2018@gmail.com)
// =====================================================================================

use async_trait::async_trait;
use serde::Deserialize;
use tracing::warn;

use crate::adapter::{SharedHttpClient, SourceAdapter};
use crate::error::OracleResult;
use crate::pair::TradingPair;

const BASE_URL: &str = "https://api.exchange.coinbase.com";

#[derive(Debug, Deserialize)]
struct TickerResponse {
    price: Option<String>,
}

/// No API key required for Coinbase Exchange's public ticker endpoint.
pub struct CoinbaseAdapter {
    client: SharedHttpClient,
    api_key: Option<String>,
}

impl CoinbaseAdapter {
    pub fn new(api_key: Option<String>, client: SharedHttpClient) -> Self {
        Self { client, api_key }
    }
}

#[async_trait]
impl SourceAdapter for CoinbaseAdapter {
    fn name(&self) -> &str {
        "coinbase"
    }

    fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    async fn supports_pair(&self, _pair: &TradingPair) -> OracleResult<bool> {
        Ok(true)
    }

    async fn fetch(&self, pair: &TradingPair) -> Option<f64> {
        let symbol = format!("{}-{}", pair.base.to_uppercase(), pair.quote.to_uppercase());
        let url = format!("{BASE_URL}/products/{symbol}/ticker");

        let response = match self.client.inner().get(&url).send().await {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, symbol, "[coinbase] request failed");
                return None;
            }
        };

        match response.json::<TickerResponse>().await {
            Ok(body) => match body.price.and_then(|p| p.parse::<f64>().ok()) {
                Some(price) => Some(price),
                None => {
                    warn!(symbol, "[coinbase] no price in response");
                    None
                }
            },
            Err(e) => {
                warn!(error = %e, symbol, "[coinbase] failed to parse response");
                None
            }
        }
    }
}
