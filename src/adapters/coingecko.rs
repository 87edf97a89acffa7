// =====================================================================================
// File: core-oracle/src/adapters/coingecko.rs
// Description: CoinGecko source adapter
// Author: arkSong (arksong2018@gmail.com)
// =====================================================================================

use std::collections::HashMap;

use async_trait::async_trait;
use tracing::warn;

use crate::adapter::{SharedHttpClient, SourceAdapter};
use crate::error::OracleResult;
use crate::pair::TradingPair;

const BASE_URL: &str = "https://api.coingecko.com/api/v3";

/// Maps common base symbols to CoinGecko coin ids.
fn coin_ids() -> HashMap<&'static str, &'static str> {
    [
        ("btc", "bitcoin"),
        ("eth", "ethereum"),
        ("rose", "oasis-network"),
        ("usdt", "tether"),
        ("usdc", "usd-coin"),
        ("sol", "solana"),
        ("avax", "avalanche-2"),
        ("matic", "matic-network"),
        ("dot", "polkadot"),
        ("atom", "cosmos"),
        ("link", "chainlink"),
        ("uni", "uniswap"),
        ("aave", "aave"),
    ]
    .into_iter()
    .collect()
}

/// Optional API key raises CoinGecko's free-tier rate limit (30 calls/min).
pub struct CoinGeckoAdapter {
    client: SharedHttpClient,
    api_key: Option<String>,
}

impl CoinGeckoAdapter {
    pub fn new(api_key: Option<String>, client: SharedHttpClient) -> Self {
        Self { client, api_key }
    }
}

#[async_trait]
impl SourceAdapter for CoinGeckoAdapter {
    fn name(&self) -> &str {
        "coingecko"
    }

    fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    async fn supports_pair(&self, pair: &TradingPair) -> OracleResult<bool> {
        Ok(coin_ids().contains_key(pair.base.as_str()))
    }

    async fn fetch(&self, pair: &TradingPair) -> Option<f64> {
        let ids = coin_ids();
        let Some(coin_id) = ids.get(pair.base.as_str()) else {
            warn!(base = %pair.base, "[coingecko] unknown coin");
            return None;
        };

        let mut request = self
            .client
            .inner()
            .get(format!("{BASE_URL}/simple/price"))
            .query(&[("ids", *coin_id), ("vs_currencies", pair.quote.as_str())]);

        if let Some(key) = &self.api_key {
            request = request.header("x-cg-pro-api-key", key);
        }

        let response = match request.send().await {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, pair = %pair, "[coingecko] request failed");
                return None;
            }
        };

        let body: HashMap<String, HashMap<String, f64>> = match response.json().await {
            Ok(b) => b,
            Err(e) => {
                warn!(error = %e, pair = %pair, "[coingecko] failed to parse response");
                return None;
            }
        };

        body.get(*coin_id).and_then(|quotes| quotes.get(&pair.quote)).copied()
    }
}
