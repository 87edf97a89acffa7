// =====================================================================================
// File: core-oracle/src/adapters/binance.rs
// Description: Binance source adapter with self-contained USDT/USD conversion
// Author: arkSong (arksong2018@gmail.com)
// =====================================================================================

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::adapter::{SharedHttpClient, SourceAdapter};
use crate::error::OracleResult;
use crate::pair::TradingPair;
use crate::stablecoin::StablecoinRateCache;

const BASE_URL: &str = "https://api.binance.com/api/v3";
const USDT_DEPEG_THRESHOLD: f64 = 0.02;

#[derive(Debug, Deserialize)]
struct TickerPrice {
    symbol: String,
    price: String,
}

/// Whether a pair is served directly or needs a USDT-routed conversion.
#[derive(Debug, Clone)]
#[allow(dead_code)]
struct PairInfo {
    symbol: String,
    needs_usdt_conversion: bool,
}

/// Fetches prices from Binance. For non-USD-direct pairs, routes
/// through `BASE/USDT` and `USDT/USD`, rejecting the conversion if
/// USDT has depegged beyond 2%. Does not read [`StablecoinRateCache`]
/// for this conversion — the rate is fetched directly from Binance in
/// the same request, matching the reference fetcher's self-contained
/// design; the shared cache field exists so the registry's uniform
/// constructor signature can still wire this adapter's `usdt/usd`
/// prices into the process-wide cache when `usdt/usd` itself routes
/// through Binance.
pub struct BinanceAdapter {
    client: SharedHttpClient,
    api_key: Option<String>,
    pair_info: RwLock<HashMap<(String, String), PairInfo>>,
    #[allow(dead_code)]
    usdt_cache: Arc<StablecoinRateCache>,
}

impl BinanceAdapter {
    pub fn new(api_key: Option<String>, client: SharedHttpClient, usdt_cache: Arc<StablecoinRateCache>) -> Self {
        Self {
            client,
            api_key,
            pair_info: RwLock::new(HashMap::new()),
            usdt_cache,
        }
    }

    fn is_depeg(rate: f64) -> bool {
        (rate - 1.0).abs() > USDT_DEPEG_THRESHOLD
    }

    async fn fetch_symbols(&self, symbols: &[String]) -> HashMap<String, Option<f64>> {
        let mut result: HashMap<String, Option<f64>> =
            symbols.iter().map(|s| (s.clone(), None)).collect();

        let joined = match serde_json::to_string(symbols) {
            Ok(s) => s,
            Err(_) => return result,
        };

        let response = self
            .client
            .inner()
            .get(format!("{BASE_URL}/ticker/price"))
            .query(&[("symbols", joined)])
            .send()
            .await;

        let response = match response {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "[binance] failed to fetch symbols");
                return result;
            }
        };

        match response.json::<Vec<TickerPrice>>().await {
            Ok(items) => {
                for item in items {
                    if let Ok(price) = item.price.parse::<f64>() {
                        result.insert(item.symbol, Some(price));
                    }
                }
            }
            Err(e) => warn!(error = %e, "[binance] failed to parse batch response"),
        }
        result
    }

    async fn fetch_symbol(&self, symbol: &str) -> Option<f64> {
        self.fetch_symbols(&[symbol.to_string()])
            .await
            .remove(symbol)
            .flatten()
    }
}

#[async_trait]
impl SourceAdapter for BinanceAdapter {
    fn name(&self) -> &str {
        "binance"
    }

    fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    async fn supports_pair(&self, pair: &TradingPair) -> OracleResult<bool> {
        let key = (pair.base.clone(), pair.quote.clone());
        if self.pair_info.read().expect("lock poisoned").contains_key(&key) {
            return Ok(true);
        }

        let base_u = pair.base.to_uppercase();
        let quote_u = pair.quote.to_uppercase();

        if quote_u == "USD" {
            let direct = format!("{base_u}USD");
            let usdt = format!("{base_u}USDT");
            let prices = self
                .fetch_symbols(&[direct.clone(), usdt.clone(), "USDTUSD".to_string()])
                .await;

            if prices.get(&direct).copied().flatten().is_some() {
                self.pair_info.write().expect("lock poisoned").insert(
                    key,
                    PairInfo {
                        symbol: direct,
                        needs_usdt_conversion: false,
                    },
                );
                return Ok(true);
            }
            if prices.get(&usdt).copied().flatten().is_some()
                && prices.get("USDTUSD").copied().flatten().is_some()
            {
                self.pair_info.write().expect("lock poisoned").insert(
                    key,
                    PairInfo {
                        symbol: usdt,
                        needs_usdt_conversion: true,
                    },
                );
                return Ok(true);
            }
            return Ok(false);
        }

        let symbol = format!("{base_u}{quote_u}");
        let prices = self.fetch_symbols(&[symbol.clone()]).await;
        if prices.get(&symbol).copied().flatten().is_some() {
            self.pair_info.write().expect("lock poisoned").insert(
                key,
                PairInfo {
                    symbol,
                    needs_usdt_conversion: false,
                },
            );
            return Ok(true);
        }
        Ok(false)
    }

    fn supports_batch(&self) -> bool {
        true
    }

    async fn fetch(&self, pair: &TradingPair) -> Option<f64> {
        let key = (pair.base.clone(), pair.quote.clone());
        let info = self.pair_info.read().expect("lock poisoned").get(&key).cloned();
        let Some(info) = info else {
            debug!(pair = %pair, "[binance] pair not in pair_info, call supports_pair first");
            return None;
        };

        if !info.needs_usdt_conversion {
            return self.fetch_symbol(&info.symbol).await;
        }

        let prices = self
            .fetch_symbols(&[info.symbol.clone(), "USDTUSD".to_string()])
            .await;
        let usdt_price = prices.get(&info.symbol).copied().flatten()?;
        let usdt_rate = prices.get("USDTUSD").copied().flatten()?;

        if Self::is_depeg(usdt_rate) {
            warn!(rate = usdt_rate, "[binance] USDT depeg detected, excluding from aggregation");
            return None;
        }

        Some(usdt_price * usdt_rate)
    }

    async fn fetch_batch(&self, pairs: &[TradingPair]) -> HashMap<TradingPair, Option<f64>> {
        let mut results = HashMap::new();
        if pairs.is_empty() {
            return results;
        }

        let mut symbols = std::collections::HashSet::new();
        let mut needs_conversion = std::collections::HashSet::new();
        let mut by_pair_info = HashMap::new();

        {
            let pair_info = self.pair_info.read().expect("lock poisoned");
            for pair in pairs {
                let key = (pair.base.clone(), pair.quote.clone());
                match pair_info.get(&key) {
                    Some(info) => {
                        symbols.insert(info.symbol.clone());
                        if info.needs_usdt_conversion {
                            symbols.insert("USDTUSD".to_string());
                            needs_conversion.insert(pair.clone());
                        }
                        by_pair_info.insert(pair.clone(), info.clone());
                    }
                    None => {
                        results.insert(pair.clone(), None);
                    }
                }
            }
        }

        if symbols.is_empty() {
            return results;
        }

        let symbols: Vec<String> = symbols.into_iter().collect();
        let price_map = self.fetch_symbols(&symbols).await;

        let mut usdt_rate = price_map.get("USDTUSD").copied().flatten();
        if let Some(rate) = usdt_rate {
            if Self::is_depeg(rate) {
                warn!(rate, "[binance] USDT depeg detected, excluding all USD pairs from batch");
                usdt_rate = None;
            }
        }

        for pair in pairs {
            if results.contains_key(pair) {
                continue;
            }
            let Some(info) = by_pair_info.get(pair) else {
                results.insert(pair.clone(), None);
                continue;
            };
            let price = price_map.get(&info.symbol).copied().flatten();
            let value = match price {
                None => None,
                Some(p) if needs_conversion.contains(pair) => usdt_rate.map(|rate| p * rate),
                Some(p) => Some(p),
            };
            results.insert(pair.clone(), value);
        }

        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn depeg_detection_matches_two_percent_threshold() {
        assert!(!BinanceAdapter::is_depeg(1.0));
        assert!(!BinanceAdapter::is_depeg(1.02));
        assert!(BinanceAdapter::is_depeg(1.021));
        assert!(BinanceAdapter::is_depeg(0.97));
    }
}
