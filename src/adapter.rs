// =====================================================================================
// File: core-oracle/src/adapter.rs
// Description: Source adapter contract, shared HTTP client, and adapter registry
// Author: arkSong (arksong2018@gmail.com)
// =====================================================================================

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{OracleError, OracleResult};
use crate::pair::TradingPair;
use crate::stablecoin::StablecoinRateCache;

/// `reqwest::Client` is internally `Arc`-backed; this wrapper exists so
/// adapter constructors have one obvious thing to clone, matching the
/// shared-client-singleton shape of a Python `BaseFetcher`.
#[derive(Clone)]
pub struct SharedHttpClient(reqwest::Client);

impl SharedHttpClient {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .pool_max_idle_per_host(20)
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .expect("failed to build shared HTTP client");
        Self(client)
    }

    pub fn inner(&self) -> &reqwest::Client {
        &self.0
    }
}

impl Default for SharedHttpClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Contract every price source implements.
///
/// Failures that are expected in normal operation (timeouts, bad
/// responses, an unsupported pair) must never surface as `Err` from
/// `fetch`/`fetch_batch` — they collapse to `None` so a single flaky
/// source cannot abort a fetch cycle for every other source. Only
/// `supports_pair` returns a `Result`, and callers that see an `Err`
/// there treat it as `false` and log a warning.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Stable identifier used as the key in health tracking and logs.
    fn name(&self) -> &str;

    /// Whether this adapter was constructed with an API key configured.
    fn has_api_key(&self) -> bool;

    /// Whether this adapter can serve `pair`. May perform I/O (e.g. to
    /// discover a venue's symbol mapping); an error is treated as `false`.
    async fn supports_pair(&self, pair: &TradingPair) -> OracleResult<bool>;

    /// Whether `fetch_batch` is meaningfully more efficient than calling
    /// `fetch` once per pair. Adapters that return `false` here get the
    /// default sequential fallback below.
    fn supports_batch(&self) -> bool {
        false
    }

    /// Fetch a single price. Returns `None` on any recoverable failure.
    async fn fetch(&self, pair: &TradingPair) -> Option<f64>;

    /// Fetch many pairs at once. The default implementation falls back
    /// to sequential `fetch` calls for adapters that don't override it.
    async fn fetch_batch(&self, pairs: &[TradingPair]) -> HashMap<TradingPair, Option<f64>> {
        let mut out = HashMap::with_capacity(pairs.len());
        for pair in pairs {
            let price = self.fetch(pair).await;
            out.insert(pair.clone(), price);
        }
        out
    }
}

/// Constructor signature registered per adapter name.
pub type AdapterConstructor = fn(Option<String>, SharedHttpClient, Arc<StablecoinRateCache>) -> Box<dyn SourceAdapter>;

/// Explicit table of adapter constructors, built once at program start.
///
/// Rust has no import-time side effects to hang a self-registering
/// decorator off of, so the registry is a plain table populated by
/// `AdapterRegistry::with_builtin_adapters` instead of a lazily
/// populated global.
pub struct AdapterRegistry {
    constructors: HashMap<&'static str, AdapterConstructor>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self {
            constructors: HashMap::new(),
        }
    }

    pub fn register(&mut self, name: &'static str, constructor: AdapterConstructor) {
        self.constructors.insert(name, constructor);
    }

    pub fn with_builtin_adapters() -> Self {
        let mut registry = Self::new();
        crate::adapters::register_all(&mut registry);
        registry
    }

    pub fn build(
        &self,
        name: &str,
        api_key: Option<String>,
        client: SharedHttpClient,
        usdt_cache: Arc<StablecoinRateCache>,
    ) -> OracleResult<Box<dyn SourceAdapter>> {
        let constructor = self
            .constructors
            .get(name)
            .ok_or_else(|| OracleError::config_error("source", format!("unknown source '{name}'")))?;
        Ok(constructor(api_key, client, usdt_cache))
    }

    pub fn available_sources(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.constructors.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StubAdapter {
        name: String,
    }

    #[async_trait]
    impl SourceAdapter for StubAdapter {
        fn name(&self) -> &str {
            &self.name
        }

        fn has_api_key(&self) -> bool {
            false
        }

        async fn supports_pair(&self, _pair: &TradingPair) -> OracleResult<bool> {
            Ok(true)
        }

        async fn fetch(&self, pair: &TradingPair) -> Option<f64> {
            if pair.base == "btc" {
                Some(100.0)
            } else {
                None
            }
        }
    }

    #[tokio::test]
    async fn default_fetch_batch_falls_back_to_sequential_fetch() {
        let adapter = StubAdapter {
            name: "stub".into(),
        };
        let pairs = vec![TradingPair::new("btc", "usd"), TradingPair::new("eth", "usd")];
        let result = adapter.fetch_batch(&pairs).await;
        assert_eq!(result.get(&TradingPair::new("btc", "usd")), Some(&Some(100.0)));
        assert_eq!(result.get(&TradingPair::new("eth", "usd")), Some(&None));
    }

    #[test]
    fn registry_rejects_unknown_source() {
        let registry = AdapterRegistry::new();
        let err = registry
            .build("nonexistent", None, SharedHttpClient::new(), Arc::new(StablecoinRateCache::new()))
            .unwrap_err();
        assert_eq!(err.error_code(), "CONFIG_ERROR");
    }

    #[test]
    fn builtin_registry_lists_all_five_adapters() {
        let registry = AdapterRegistry::with_builtin_adapters();
        assert_eq!(
            registry.available_sources(),
            vec!["binance", "bitstamp", "coinbase", "coingecko", "kraken"]
        );
    }
}
