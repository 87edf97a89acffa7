// =====================================================================================
// File: core-oracle/src/orchestrator.rs
// Description: Top-level run loop wiring sources, health, aggregation and submission
// Author: arkSong (arksong2018@gmail.com)
// =====================================================================================

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use ethers::types::Address;
use tracing::{info, warn};

use crate::adapter::{AdapterRegistry, SharedHttpClient, SourceAdapter};
use crate::config::OracleConfig;
use crate::contract::{current_gas_price, AggregatorContract, DirectoryContract, EthersAggregatorContract};
use crate::coordinator::BatchFetchCoordinator;
use crate::daemon::{bech32_to_bytes, strip_0x, SigningDaemon};
use crate::observer::PairObserver;
use crate::pair::TradingPair;
use crate::stablecoin::StablecoinRateCache;
use crate::error::{OracleError, OracleResult};

const SUBMIT_DECIMALS: u8 = 10;

/// Wires every component together and runs the single cooperative
/// fetch/aggregate/submit loop.
///
/// Concurrency exists only inside a fetch cycle (the coordinator's
/// per-source tasks); health updates, aggregation, and submission
/// gating all happen synchronously on this loop between `await`
/// points, so no locking is needed beyond what `Arc` already provides
/// for cross-task sharing (the stablecoin cache, and adapters/contract
/// clients handed to concurrent coordinator tasks).
pub struct OracleOrchestrator {
    config: OracleConfig,
    coordinator: BatchFetchCoordinator,
    sources: HashMap<String, Arc<dyn SourceAdapter>>,
    observers: HashMap<TradingPair, PairObserver>,
    usdt_cache: Arc<StablecoinRateCache>,
}

impl OracleOrchestrator {
    /// Performs the startup sequence: build adapters, resolve or
    /// deploy each pair's aggregator contract (staggered by a second
    /// between pairs, matching the reference implementation's task
    /// spacing), and seed a [`PairObserver`] for each.
    pub async fn start(
        config: OracleConfig,
        daemon: Arc<dyn SigningDaemon>,
        directory: Arc<dyn DirectoryContract>,
        provider: Arc<ethers::providers::Provider<ethers::providers::Http>>,
    ) -> OracleResult<Self> {
        config.validate()?;

        let usdt_cache = Arc::new(StablecoinRateCache::new());
        let http_client = SharedHttpClient::new();
        let registry = AdapterRegistry::with_builtin_adapters();

        let mut sources: HashMap<String, Arc<dyn SourceAdapter>> = HashMap::new();
        for name in &config.sources {
            let api_key = config.api_keys.get(name).cloned();
            let adapter = registry.build(name, api_key, http_client.clone(), usdt_cache.clone())?;
            sources.insert(name.clone(), Arc::from(adapter));
        }

        let app_id = daemon.fetch_app_id().await?;
        let app_id_bytes = bech32_to_bytes(&app_id)?;

        let mut observers = HashMap::new();
        for (i, pair) in config.pairs.iter().enumerate() {
            let mut supporting_sources = Vec::new();
            for name in &config.sources {
                let Some(adapter) = sources.get(name) else {
                    continue;
                };
                match adapter.supports_pair(pair).await {
                    Ok(true) => supporting_sources.push(name.clone()),
                    Ok(false) => {}
                    Err(e) => warn!(source = %name, pair = %pair, error = %e, "supports_pair check failed"),
                }
            }
            if supporting_sources.is_empty() {
                return Err(OracleError::config_error(
                    pair.to_string(),
                    "no configured source supports this pair",
                ));
            }

            let contract = resolve_or_deploy_contract(
                pair,
                &app_id_bytes,
                i == 0,
                &config,
                directory.as_ref(),
                daemon.as_ref(),
                &provider,
            )
            .await?;

            if let Some(price) = current_gas_price(&provider).await.ok() {
                info!(pair = %pair, gas_price = %price, "current network gas price");
            }

            let observer = PairObserver::new(
                pair.clone(),
                contract,
                daemon.clone(),
                crate::aggregator::PriceAggregator::new(
                    config.min_sources,
                    config.max_deviation_pct,
                    config.drift_limit(),
                ),
                if pair.base == "usdt" && pair.quote == "usd" {
                    Some(usdt_cache.clone())
                } else {
                    None
                },
                config.submit_period,
                supporting_sources,
            )
            .await?;
            observers.insert(pair.clone(), observer);

            if i + 1 < config.pairs.len() {
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }

        Ok(Self {
            coordinator: BatchFetchCoordinator::new(config.fetch_timeout),
            sources,
            observers,
            usdt_cache,
            config,
        })
    }

    /// Runs the fetch/aggregate/submit loop until cancelled.
    pub async fn run(&mut self) -> ! {
        loop {
            self.tick().await;
            tokio::time::sleep(self.config.fetch_period).await;
        }
    }

    /// Runs exactly one fetch/aggregate/submit cycle. Exposed
    /// separately from [`Self::run`] so tests can drive the loop
    /// deterministically.
    pub async fn tick(&mut self) {
        let active_sources: HashMap<TradingPair, Vec<String>> = self
            .observers
            .iter()
            .map(|(pair, observer)| (pair.clone(), observer.active_sources()))
            .collect();

        if active_sources.values().all(|names| names.is_empty()) {
            return;
        }

        let results = self
            .coordinator
            .fetch_all(&self.config.pairs, &self.sources, &active_sources)
            .await;

        for (pair, prices) in &results {
            if let Some(observer) = self.observers.get_mut(pair) {
                observer.receive(prices);
            }
        }

        for observer in self.observers.values_mut() {
            if observer.should_submit() {
                if let Err(e) = observer.submit().await {
                    warn!(pair = %observer.pair, error = %e, "submission failed, observations retained");
                }
            }
        }
    }

    pub fn usdt_cache(&self) -> Arc<StablecoinRateCache> {
        self.usdt_cache.clone()
    }
}

/// Resolves `pair`'s aggregator contract via the directory, or deploys
/// one implicitly by calling `addFeed`, matching
/// `detect_or_deploy_contract` in the reference implementation.
async fn resolve_or_deploy_contract(
    pair: &TradingPair,
    app_id_bytes: &[u8],
    is_first_pair: bool,
    config: &OracleConfig,
    directory: &dyn DirectoryContract,
    daemon: &dyn SigningDaemon,
    provider: &Arc<ethers::providers::Provider<ethers::providers::Http>>,
) -> OracleResult<Arc<dyn AggregatorContract>> {
    if is_first_pair {
        if let Some(address) = &config.address {
            let parsed: Address = address
                .parse()
                .map_err(|_| OracleError::config_error("address", "invalid address"))?;
            let contract = EthersAggregatorContract::new(provider.clone(), parsed);
            return Ok(Arc::new(contract));
        }
    }

    let feed_key = pair.feed_key(app_id_bytes);
    if let Some(address) = directory.feed_address(feed_key).await? {
        let contract = EthersAggregatorContract::new(provider.clone(), address);
        ensure_contract_initialized(&contract, pair, daemon).await?;
        return Ok(Arc::new(contract));
    }

    let calldata = directory.encode_add_feed(&pair.to_string(), Address::zero(), false);
    let tx = crate::daemon::EthTxRequest {
        gas_limit: 500_000,
        to: Some(strip_0x(&directory.address())),
        value: 0,
        data: calldata,
    };
    daemon.submit_tx(tx).await?;

    match directory.feed_address(feed_key).await? {
        Some(address) => {
            info!(pair = %pair, address = ?address, "deployed new aggregator contract");
            let contract = EthersAggregatorContract::new(provider.clone(), address);
            ensure_contract_initialized(&contract, pair, daemon).await?;
            Ok(Arc::new(contract))
        }
        None => Err(OracleError::contract_unavailable(
            pair.to_string(),
            "contract not available after deploy",
        )),
    }
}

async fn ensure_contract_initialized(
    contract: &EthersAggregatorContract,
    pair: &TradingPair,
    daemon: &dyn SigningDaemon,
) -> OracleResult<()> {
    if contract.decimals().await.unwrap_or(0) == 0 {
        let calldata = contract.encode_set_decimals(SUBMIT_DECIMALS);
        let tx = crate::daemon::EthTxRequest {
            gas_limit: 100_000,
            to: Some(strip_0x(&contract.address())),
            value: 0,
            data: calldata,
        };
        daemon.submit_tx(tx).await?;
    }

    if contract.description().await.unwrap_or_default().is_empty() {
        let calldata = contract.encode_set_description(&pair.to_string());
        let tx = crate::daemon::EthTxRequest {
            gas_limit: 100_000,
            to: Some(strip_0x(&contract.address())),
            value: 0,
            data: calldata,
        };
        daemon.submit_tx(tx).await?;
    }

    Ok(())
}
