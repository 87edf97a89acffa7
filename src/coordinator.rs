// =====================================================================================
// File: core-oracle/src/coordinator.rs
// Description: Concurrent per-source batch price fetching
// Author: arkSong (arksong2018@gmail.com)
// =====================================================================================

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tracing::warn;

use crate::adapter::SourceAdapter;
use crate::pair::TradingPair;

/// Fans a batch of pairs out to the sources that support them.
///
/// One task per source runs concurrently; within a source's task,
/// `fetch_batch` is used if the adapter supports it, otherwise each
/// pair is fetched with an individual per-request timeout. A source
/// whose task times out or panics contributes `None` for every pair in
/// its workload rather than failing the whole cycle.
pub struct BatchFetchCoordinator {
    fetch_timeout: Duration,
}

impl BatchFetchCoordinator {
    pub fn new(fetch_timeout: Duration) -> Self {
        Self { fetch_timeout }
    }

    /// `active_sources` maps each pair to the ordered list of source
    /// names currently eligible to serve it (already filtered by health).
    pub async fn fetch_all(
        &self,
        pairs: &[TradingPair],
        sources: &HashMap<String, Arc<dyn SourceAdapter>>,
        active_sources: &HashMap<TradingPair, Vec<String>>,
    ) -> HashMap<TradingPair, HashMap<String, Option<f64>>> {
        // Group by source: which pairs does each active source need to serve?
        let mut workloads: HashMap<String, Vec<TradingPair>> = HashMap::new();
        for pair in pairs {
            let Some(names) = active_sources.get(pair) else {
                continue;
            };
            for name in names {
                workloads.entry(name.clone()).or_default().push(pair.clone());
            }
        }

        let timeout = self.fetch_timeout;
        let tasks = workloads.into_iter().filter_map(|(name, workload)| {
            let adapter = sources.get(&name)?.clone();
            Some(Self::fetch_source_batch(name, adapter, workload, timeout))
        });

        let per_source_results = join_all(tasks).await;

        let mut by_pair: HashMap<TradingPair, HashMap<String, Option<f64>>> = HashMap::new();
        for (source, results) in per_source_results {
            for (pair, price) in results {
                by_pair.entry(pair).or_default().insert(source.clone(), price);
            }
        }
        by_pair
    }

    async fn fetch_source_batch(
        name: String,
        adapter: Arc<dyn SourceAdapter>,
        workload: Vec<TradingPair>,
        timeout: Duration,
    ) -> (String, HashMap<TradingPair, Option<f64>>) {
        if adapter.supports_batch() {
            let fetch_future = adapter.fetch_batch(&workload);
            return match tokio::time::timeout(timeout, fetch_future).await {
                Ok(results) => (name, results),
                Err(_) => {
                    warn!(source = %name, "batch fetch timed out for all pairs");
                    let out = workload.into_iter().map(|pair| (pair, None)).collect();
                    (name, out)
                }
            };
        }

        // Non-batch adapters fan out one concurrent `fetch` call per pair,
        // each bounded by its own timeout, so one slow pair never holds up
        // the rest of this source's workload.
        let inner = workload.into_iter().map(|pair| {
            let adapter = adapter.clone();
            async move {
                let price = tokio::time::timeout(timeout, adapter.fetch(&pair))
                    .await
                    .unwrap_or(None);
                (pair, price)
            }
        });
        let out = join_all(inner).await.into_iter().collect();
        (name, out)
    }
}
