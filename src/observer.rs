// =====================================================================================
// File: core-oracle/src/observer.rs
// Description: Per-pair observation accumulation and submission gate
// Author: arkSong (arksong2018@gmail.com)
// =====================================================================================

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tracing::{info, warn};

use crate::aggregator::{AggregationOutcome, PriceAggregator};
use crate::contract::AggregatorContract;
use crate::daemon::{strip_0x, EthTxRequest, SigningDaemon};
use crate::error::OracleResult;
use crate::health::SourceHealthTracker;
use crate::pair::TradingPair;
use crate::stablecoin::StablecoinRateCache;

/// A single accepted price observation awaiting submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Observation {
    pub scaled_price: i128,
    pub timestamp_s: u64,
}

fn now_s() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Owns the submission state for one aggregated pair: a health
/// tracker seeded with the pair's own supporting sources, the
/// aggregator, and the observation buffer awaiting submission.
pub struct PairObserver {
    pub pair: TradingPair,
    contract: Arc<dyn AggregatorContract>,
    daemon: Arc<dyn SigningDaemon>,
    aggregator: PriceAggregator,
    usdt_cache: Option<Arc<StablecoinRateCache>>,
    submit_period: Duration,
    health: SourceHealthTracker,

    decimals: u8,
    round_id: u64,
    last_good_median: Option<f64>,
    observations: Vec<Observation>,
    last_submit: std::time::Instant,
}

impl PairObserver {
    /// Seeds `round_id` and `last_good_median` from the contract's
    /// current on-chain state, matching the constructor behavior of
    /// the reference pair observer. `supporting_sources` seeds this
    /// observer's own health tracker; health is never shared across
    /// pairs, so a source failing one pair never backs off another.
    pub async fn new(
        pair: TradingPair,
        contract: Arc<dyn AggregatorContract>,
        daemon: Arc<dyn SigningDaemon>,
        aggregator: PriceAggregator,
        usdt_cache: Option<Arc<StablecoinRateCache>>,
        submit_period: Duration,
        supporting_sources: Vec<String>,
    ) -> OracleResult<Self> {
        let decimals = contract.decimals().await?;
        let round_data = contract.latest_round_data().await?;
        let last_good_median = if round_data.answer > 0 {
            Some(round_data.answer as f64 / 10f64.powi(decimals as i32))
        } else {
            None
        };

        let mut health = SourceHealthTracker::with_defaults();
        for name in supporting_sources {
            health.add_source(name);
        }

        Ok(Self {
            pair,
            contract,
            daemon,
            aggregator,
            usdt_cache,
            submit_period,
            health,
            decimals,
            round_id: round_data.round_id,
            last_good_median,
            observations: Vec::new(),
            last_submit: std::time::Instant::now(),
        })
    }

    /// Sources currently out of backoff for this pair.
    pub fn active_sources(&self) -> Vec<String> {
        self.health.active_sources()
    }

    /// Processes one fetch cycle's raw per-source prices for this pair:
    /// records each source's success/failure against this observer's
    /// own health tracker, then hands the raw prices to the aggregator.
    pub fn receive(&mut self, prices: &HashMap<String, Option<f64>>) {
        for (source, price) in prices {
            match price {
                Some(p) if *p > 0.0 => self.health.record_success(source),
                _ => self.health.record_failure(source),
            }
        }

        let label = self.pair.to_string();
        match self.aggregator.aggregate(&label, prices, self.last_good_median) {
            AggregationOutcome::Ok { price, metadata } => {
                info!(
                    pair = %label,
                    price,
                    sources = ?metadata.sources,
                    dropped = ?metadata.dropped,
                    "[{}] accepted price ${:.10}",
                    label,
                    price
                );
                self.last_good_median = Some(price);
                let scaled = (price * 10f64.powi(self.decimals as i32)).round() as i128;
                self.observations.push(Observation {
                    scaled_price: scaled,
                    timestamp_s: now_s(),
                });

                if self.pair.base == "usdt" && self.pair.quote == "usd" {
                    if let Some(cache) = &self.usdt_cache {
                        cache.set(price);
                    }
                }
            }
            AggregationOutcome::Err(e) => {
                warn!(pair = %label, error = %e, "[{}] price rejected: {}", label, e);
            }
        }
    }

    pub fn should_submit(&self) -> bool {
        !self.observations.is_empty() && self.last_submit.elapsed() >= self.submit_period
    }

    /// Builds and submits the round's observation, then resets the
    /// accumulator. Observations are not cleared on failure so they
    /// survive to the next attempt.
    pub async fn submit(&mut self) -> OracleResult<()> {
        self.round_id += 1;

        let mut sorted = self.observations.clone();
        sorted.sort_by_key(|o| o.scaled_price);
        let median_price = sorted[sorted.len() / 2].scaled_price;
        let first_ts = self.observations.first().expect("non-empty on submit").timestamp_s;
        let last_ts = self.observations.last().expect("non-empty on submit").timestamp_s;

        let calldata = self
            .contract
            .encode_submit_observation(self.round_id, median_price, first_ts, last_ts);

        let tx = EthTxRequest {
            gas_limit: 300_000,
            to: Some(strip_0x(&self.contract.address())),
            value: 0,
            data: calldata,
        };

        self.daemon.submit_tx(tx).await?;

        info!(
            pair = %self.pair,
            round_id = self.round_id,
            median_price,
            observation_count = self.observations.len(),
            "submitted observation round"
        );

        self.observations.clear();
        self.last_submit = std::time::Instant::now();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::RoundData;
    use crate::daemon::EthTxRequest;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct StubContract {
        decimals: u8,
        round_data: RoundData,
    }

    #[async_trait]
    impl AggregatorContract for StubContract {
        fn address(&self) -> String {
            "0x0000000000000000000000000000000000dEaD".into()
        }
        async fn decimals(&self) -> OracleResult<u8> {
            Ok(self.decimals)
        }
        async fn description(&self) -> OracleResult<String> {
            Ok("btc/usd".into())
        }
        async fn latest_round_data(&self) -> OracleResult<RoundData> {
            Ok(self.round_data)
        }
        fn encode_submit_observation(
            &self,
            _round_id: u64,
            _price: i128,
            _first_ts: u64,
            _last_ts: u64,
        ) -> Vec<u8> {
            vec![0xde, 0xad, 0xbe, 0xef]
        }
    }

    struct StubDaemon {
        submitted: Mutex<Vec<EthTxRequest>>,
    }

    #[async_trait]
    impl SigningDaemon for StubDaemon {
        async fn fetch_app_id(&self) -> OracleResult<String> {
            Ok("rofl1test".into())
        }
        async fn submit_tx(&self, tx: EthTxRequest) -> OracleResult<Vec<u8>> {
            self.submitted.lock().unwrap().push(tx);
            Ok(vec![1, 2, 3])
        }
    }

    async fn make_observer() -> (PairObserver, Arc<StubDaemon>) {
        let contract = Arc::new(StubContract {
            decimals: 8,
            round_data: RoundData {
                round_id: 5,
                answer: 100_00000000,
                started_at: 0,
                updated_at: 0,
                answered_in_round: 5,
            },
        });
        let daemon = Arc::new(StubDaemon {
            submitted: Mutex::new(Vec::new()),
        });
        let observer = PairObserver::new(
            TradingPair::new("btc", "usd"),
            contract,
            daemon.clone(),
            PriceAggregator::new(1, 5.0, None),
            None,
            Duration::from_secs(0),
            vec!["a".to_string()],
        )
        .await
        .unwrap();
        (observer, daemon)
    }

    #[tokio::test]
    async fn seeds_last_good_median_from_contract() {
        let (observer, _daemon) = make_observer().await;
        assert_eq!(observer.last_good_median, Some(100.0));
        assert_eq!(observer.round_id, 5);
    }

    #[tokio::test]
    async fn receive_accumulates_accepted_observation() {
        let (mut observer, _daemon) = make_observer().await;
        let mut prices = HashMap::new();
        prices.insert("a".to_string(), Some(101.0));
        observer.receive(&prices);
        assert_eq!(observer.observations.len(), 1);
        assert_eq!(observer.last_good_median, Some(101.0));
    }

    #[tokio::test]
    async fn submit_increments_round_and_clears_observations() {
        let (mut observer, daemon) = make_observer().await;
        let mut prices = HashMap::new();
        prices.insert("a".to_string(), Some(101.0));
        observer.receive(&prices);
        assert!(observer.should_submit());

        observer.submit().await.unwrap();
        assert_eq!(observer.round_id, 6);
        assert!(observer.observations.is_empty());
        assert_eq!(daemon.submitted.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn failing_source_backs_off_without_affecting_other_pairs() {
        let (mut observer, _daemon) = make_observer().await;
        let mut prices = HashMap::new();
        prices.insert("a".to_string(), None);
        observer.receive(&prices);
        assert!(observer.active_sources().is_empty());
    }

    #[tokio::test]
    async fn usdt_usd_pair_publishes_to_shared_cache() {
        let contract = Arc::new(StubContract {
            decimals: 8,
            round_data: RoundData {
                round_id: 0,
                answer: 0,
                started_at: 0,
                updated_at: 0,
                answered_in_round: 0,
            },
        });
        let daemon = Arc::new(StubDaemon {
            submitted: Mutex::new(Vec::new()),
        });
        let cache = Arc::new(StablecoinRateCache::new());
        let mut observer = PairObserver::new(
            TradingPair::new("usdt", "usd"),
            contract,
            daemon,
            PriceAggregator::new(1, 5.0, None),
            Some(cache.clone()),
            Duration::from_secs(60),
            vec!["a".to_string()],
        )
        .await
        .unwrap();

        let mut prices = HashMap::new();
        prices.insert("a".to_string(), Some(0.998));
        observer.receive(&prices);
        assert_eq!(cache.get(), Some(0.998));
    }
}
