// =====================================================================================
// File: core-oracle/src/adapters/bitstamp.rs
// Description: Bitstamp source adapter
// Author: arkSong (arksong2018@gmail.com)
// =====================================================================================

use async_trait::async_trait;
use serde::Deserialize;
use tracing::warn;

use crate::adapter::{SharedHttpClient, SourceAdapter};
use crate::error::OracleResult;
use crate::pair::TradingPair;

const BASE_URL: &str = "https://www.bitstamp.net/api/v2";

#[derive(Debug, Deserialize)]
struct TickerResponse {
    last: Option<String>,
}

/// No API key required. Bitstamp does not list ROSE.
pub struct BitstampAdapter {
    client: SharedHttpClient,
    api_key: Option<String>,
}

impl BitstampAdapter {
    pub fn new(api_key: Option<String>, client: SharedHttpClient) -> Self {
        Self { client, api_key }
    }
}

#[async_trait]
impl SourceAdapter for BitstampAdapter {
    fn name(&self) -> &str {
        "bitstamp"
    }

    fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    async fn supports_pair(&self, pair: &TradingPair) -> OracleResult<bool> {
        Ok(pair.base != "rose")
    }

    async fn fetch(&self, pair: &TradingPair) -> Option<f64> {
        let symbol = format!("{}{}", pair.base, pair.quote);
        let url = format!("{BASE_URL}/ticker/{symbol}/");

        let response = match self.client.inner().get(&url).send().await {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, symbol, "[bitstamp] request failed");
                return None;
            }
        };

        match response.json::<TickerResponse>().await {
            Ok(body) => match body.last.and_then(|p| p.parse::<f64>().ok()) {
                Some(price) => Some(price),
                None => {
                    warn!(symbol, "[bitstamp] no 'last' price in response");
                    None
                }
            },
            Err(e) => {
                warn!(error = %e, symbol, "[bitstamp] failed to parse response");
                None
            }
        }
    }
}
