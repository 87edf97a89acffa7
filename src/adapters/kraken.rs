// =====================================================================================
// File: core-oracle/src/adapters/kraken.rs
// Description: Kraken source adapter
// Author: arkSong (arksong2018@gmail.com)
// =====================================================================================

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::warn;

use crate::adapter::{SharedHttpClient, SourceAdapter};
use crate::error::OracleResult;
use crate::pair::TradingPair;

const BASE_URL: &str = "https://api.kraken.com/0/public";

#[derive(Debug, Deserialize)]
struct KrakenResponse {
    #[serde(default)]
    error: Vec<String>,
    #[serde(default)]
    result: HashMap<String, KrakenPairData>,
}

#[derive(Debug, Deserialize)]
struct KrakenPairData {
    /// Last trade closed array: `[price, lot volume]`.
    c: Vec<String>,
}

/// Maps common base symbols to Kraken's nonstandard ticker names
/// (Kraken uses `XBT` rather than `BTC`).
fn kraken_symbol(base: &str) -> String {
    match base {
        "btc" => "XBT".to_string(),
        other => other.to_uppercase(),
    }
}

/// No API key required. Kraken does not list every asset this oracle
/// may be configured for (notably ROSE); `supports_pair` rejects those
/// up front rather than letting every fetch fail.
pub struct KrakenAdapter {
    client: SharedHttpClient,
    api_key: Option<String>,
}

impl KrakenAdapter {
    pub fn new(api_key: Option<String>, client: SharedHttpClient) -> Self {
        Self { client, api_key }
    }
}

#[async_trait]
impl SourceAdapter for KrakenAdapter {
    fn name(&self) -> &str {
        "kraken"
    }

    fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    async fn supports_pair(&self, pair: &TradingPair) -> OracleResult<bool> {
        Ok(pair.base != "rose")
    }

    async fn fetch(&self, pair: &TradingPair) -> Option<f64> {
        let kraken_pair = format!("{}{}", kraken_symbol(&pair.base), pair.quote.to_uppercase());

        let response = match self
            .client
            .inner()
            .get(format!("{BASE_URL}/Ticker"))
            .query(&[("pair", &kraken_pair)])
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, pair = %kraken_pair, "[kraken] request failed");
                return None;
            }
        };

        let body: KrakenResponse = match response.json().await {
            Ok(b) => b,
            Err(e) => {
                warn!(error = %e, pair = %kraken_pair, "[kraken] failed to parse response");
                return None;
            }
        };

        if !body.error.is_empty() {
            warn!(pair = %kraken_pair, errors = ?body.error, "[kraken] api error");
            return None;
        }

        let Some(pair_data) = body.result.values().next() else {
            warn!(pair = %kraken_pair, "[kraken] no result in response");
            return None;
        };

        pair_data.c.first().and_then(|p| p.parse::<f64>().ok())
    }
}
