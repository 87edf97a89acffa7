// =====================================================================================
// File: core-oracle/src/aggregator.rs
// Description: Median-with-outlier-rejection price aggregation
// Author: arkSong (arksong2018@gmail.com)
// =====================================================================================

use std::collections::HashMap;

use crate::error::OracleError;

/// Successful aggregation metadata: which sources survived and contributed.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregationMetadata {
    pub sources: Vec<String>,
    pub dropped: HashMap<String, f64>,
    pub initial_median: f64,
    pub count: usize,
}

/// Outcome of [`PriceAggregator::aggregate`].
#[derive(Debug, Clone, PartialEq)]
pub enum AggregationOutcome {
    Ok {
        price: f64,
        metadata: AggregationMetadata,
    },
    Err(OracleError),
}

/// Pure median-with-outlier-rejection aggregator.
///
/// Parameters mirror a per-pair configuration: `min_sources` is the
/// floor on valid inputs (checked both before and after outlier
/// rejection), `max_deviation_pct` bounds how far a price may sit from
/// the initial median before being dropped (the boundary itself is
/// kept), and `drift_limit_pct` optionally bounds how far the final
/// median may move from the previous accepted round (the boundary
/// itself is accepted).
#[derive(Debug, Clone)]
pub struct PriceAggregator {
    pub min_sources: usize,
    pub max_deviation_pct: f64,
    pub drift_limit_pct: Option<f64>,
}

impl PriceAggregator {
    pub fn new(min_sources: usize, max_deviation_pct: f64, drift_limit_pct: Option<f64>) -> Self {
        Self {
            min_sources,
            max_deviation_pct,
            drift_limit_pct,
        }
    }

    /// Aggregates raw per-source prices into a single median, applying
    /// outlier rejection and an optional drift guard against `previous`.
    pub fn aggregate(
        &self,
        pair_label: &str,
        prices: &HashMap<String, Option<f64>>,
        previous: Option<f64>,
    ) -> AggregationOutcome {
        // Step 1: filter invalid (None or <= 0) prices.
        let mut valid: Vec<(String, f64)> = prices
            .iter()
            .filter_map(|(name, price)| match price {
                Some(p) if *p > 0.0 => Some((name.clone(), *p)),
                _ => None,
            })
            .collect();
        valid.sort_by(|a, b| a.0.cmp(&b.0));

        if valid.len() < self.min_sources {
            return AggregationOutcome::Err(OracleError::insufficient_sources(
                pair_label,
                self.min_sources,
                valid.len(),
            ));
        }

        // Step 2: initial median over all valid prices.
        let initial_median = median(&valid.iter().map(|(_, p)| *p).collect::<Vec<_>>());

        // Step 3: drop outliers beyond max_deviation_pct (boundary kept).
        let mut kept = Vec::with_capacity(valid.len());
        let mut dropped: HashMap<String, f64> = HashMap::new();
        for (name, price) in valid {
            let deviation_pct = ((price - initial_median).abs() / initial_median) * 100.0;
            if deviation_pct <= self.max_deviation_pct {
                kept.push((name, price));
            } else {
                dropped.insert(name, price);
            }
        }

        if kept.len() < self.min_sources {
            return AggregationOutcome::Err(OracleError::too_many_outliers(
                pair_label,
                self.min_sources,
                kept.len(),
                dropped,
            ));
        }

        // Step 4: final median over surviving prices.
        let final_median = median(&kept.iter().map(|(_, p)| *p).collect::<Vec<_>>());

        // Step 5: optional drift guard against the previous accepted price.
        if let (Some(prev), Some(limit)) = (previous, self.drift_limit_pct) {
            if prev > 0.0 {
                let drift_pct = ((final_median - prev).abs() / prev) * 100.0;
                if drift_pct > limit {
                    return AggregationOutcome::Err(OracleError::drift_too_large(
                        pair_label, drift_pct, limit, prev, final_median,
                    ));
                }
            }
        }

        let count = kept.len();
        let mut sources: Vec<String> = kept.into_iter().map(|(name, _)| name).collect();
        sources.sort();

        AggregationOutcome::Ok {
            price: final_median,
            metadata: AggregationMetadata {
                sources,
                dropped,
                initial_median,
                count,
            },
        }
    }
}

/// Median of a price slice. For an even count, averages the two middle
/// elements (distinct from the lower-middle-element rule used when
/// picking the submitted observation's price in `observer.rs`).
fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).expect("prices must not be NaN"));
    let len = sorted.len();
    if len % 2 == 1 {
        sorted[len / 2]
    } else {
        (sorted[len / 2 - 1] + sorted[len / 2]) / 2.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prices(pairs: &[(&str, f64)]) -> HashMap<String, Option<f64>> {
        pairs
            .iter()
            .map(|(name, price)| (name.to_string(), Some(*price)))
            .collect()
    }

    #[test]
    fn clean_median_across_three_sources() {
        let agg = PriceAggregator::new(3, 5.0, None);
        let result = agg.aggregate(
            "btc/usd",
            &prices(&[("a", 100.0), ("b", 101.0), ("c", 102.0)]),
            None,
        );
        match result {
            AggregationOutcome::Ok { price, metadata } => {
                assert_eq!(price, 101.0);
                assert_eq!(metadata.sources, vec!["a", "b", "c"]);
                assert_eq!(metadata.count, 3);
                assert_eq!(metadata.initial_median, 101.0);
                assert!(metadata.dropped.is_empty());
            }
            AggregationOutcome::Err(e) => panic!("expected Ok, got {e:?}"),
        }
    }

    #[test]
    fn outlier_is_dropped_and_median_recomputed() {
        let agg = PriceAggregator::new(3, 5.0, None);
        let mut input = prices(&[("a", 100.0), ("b", 101.0), ("c", 102.0)]);
        input.insert("d".to_string(), Some(200.0));
        let result = agg.aggregate("btc/usd", &input, None);
        match result {
            AggregationOutcome::Ok { price, metadata } => {
                assert_eq!(price, 101.0);
                assert_eq!(metadata.dropped.get("d"), Some(&200.0));
                assert_eq!(metadata.count, 3);
            }
            AggregationOutcome::Err(e) => panic!("expected Ok, got {e:?}"),
        }
    }

    #[test]
    fn too_many_outliers_when_min_sources_not_met_after_rejection() {
        let agg = PriceAggregator::new(3, 5.0, None);
        let result = agg.aggregate(
            "btc/usd",
            &prices(&[("a", 100.0), ("b", 101.0), ("c", 200.0), ("d", 202.0)]),
            None,
        );
        assert!(matches!(
            result,
            AggregationOutcome::Err(OracleError::TooManyOutliers { .. })
        ));
    }

    #[test]
    fn insufficient_sources_short_circuits_before_outlier_rejection() {
        let agg = PriceAggregator::new(3, 5.0, None);
        let result = agg.aggregate("btc/usd", &prices(&[("a", 100.0), ("b", 101.0)]), None);
        assert!(matches!(
            result,
            AggregationOutcome::Err(OracleError::InsufficientSources { .. })
        ));
    }

    #[test]
    fn invalid_prices_are_filtered_before_the_min_sources_check() {
        let agg = PriceAggregator::new(3, 5.0, None);
        let mut input = prices(&[("a", 100.0), ("b", 101.0), ("c", 102.0)]);
        input.insert("d".to_string(), None);
        input.insert("e".to_string(), Some(-5.0));
        input.insert("f".to_string(), Some(0.0));
        let result = agg.aggregate("btc/usd", &input, None);
        assert!(matches!(result, AggregationOutcome::Ok { .. }));
    }

    #[test]
    fn deviation_boundary_is_inclusive() {
        // initial median of [100, 105] is 102.5; 105 deviates by exactly
        // (105-102.5)/102.5*100 = 2.439...%, set max_deviation right at it.
        let agg = PriceAggregator::new(2, 2.4390243902439024, None);
        let result = agg.aggregate("btc/usd", &prices(&[("a", 100.0), ("b", 105.0)]), None);
        match result {
            AggregationOutcome::Ok { metadata, .. } => {
                assert!(metadata.dropped.is_empty());
            }
            AggregationOutcome::Err(e) => panic!("boundary deviation should be kept, got {e:?}"),
        }
    }

    #[test]
    fn drift_rejected_when_strictly_greater_than_limit() {
        let agg = PriceAggregator::new(3, 5.0, Some(1.0));
        let result = agg.aggregate(
            "btc/usd",
            &prices(&[("a", 103.0), ("b", 103.0), ("c", 103.0)]),
            Some(100.0),
        );
        assert!(matches!(
            result,
            AggregationOutcome::Err(OracleError::DriftTooLarge { .. })
        ));
    }

    #[test]
    fn drift_accepted_when_exactly_at_limit() {
        let agg = PriceAggregator::new(3, 5.0, Some(1.0));
        let result = agg.aggregate(
            "btc/usd",
            &prices(&[("a", 101.0), ("b", 101.0), ("c", 101.0)]),
            Some(100.0),
        );
        assert!(matches!(result, AggregationOutcome::Ok { .. }));
    }

    #[test]
    fn aggregate_is_deterministic_given_identical_input() {
        let agg = PriceAggregator::new(3, 5.0, None);
        let input = prices(&[("a", 100.0), ("b", 101.0), ("c", 102.0)]);
        let r1 = agg.aggregate("btc/usd", &input, None);
        let r2 = agg.aggregate("btc/usd", &input, None);
        assert_eq!(r1, r2);
    }

    #[test]
    fn even_source_count_averages_middle_two() {
        let agg = PriceAggregator::new(2, 50.0, None);
        let result = agg.aggregate("btc/usd", &prices(&[("a", 100.0), ("b", 110.0)]), None);
        match result {
            AggregationOutcome::Ok { price, .. } => assert_eq!(price, 105.0),
            AggregationOutcome::Err(e) => panic!("expected Ok, got {e:?}"),
        }
    }
}
