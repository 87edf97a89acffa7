// =====================================================================================
// File: core-oracle/tests/property_tests.rs
// Description: Property-based checks for the aggregation engine's core invariants
// Author: arkSong (arksong2018@gmail.com)
// =====================================================================================

use std::collections::HashMap;

use proptest::prelude::*;
use rofl_price_oracle::{AggregationOutcome, PriceAggregator};

fn to_prices(values: &[f64]) -> HashMap<String, Option<f64>> {
    values
        .iter()
        .enumerate()
        .map(|(i, p)| (format!("s{i}"), Some(*p)))
        .collect()
}

proptest! {
    /// An accepted aggregation's price always sits within the bounds of
    /// the sources that survived outlier rejection.
    #[test]
    fn accepted_price_lies_within_surviving_bounds(
        values in prop::collection::vec(1.0f64..1_000_000.0, 3..8),
    ) {
        let aggregator = PriceAggregator::new(2, 50.0, None);
        let prices = to_prices(&values);
        if let AggregationOutcome::Ok { price, metadata } = aggregator.aggregate("btc/usd", &prices, None) {
            let surviving: Vec<f64> = metadata
                .sources
                .iter()
                .filter_map(|name| prices.get(name).copied().flatten())
                .collect();
            let min = surviving.iter().cloned().fold(f64::INFINITY, f64::min);
            let max = surviving.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            prop_assert!(price >= min - 1e-9);
            prop_assert!(price <= max + 1e-9);
        }
    }

    /// Aggregating the same input twice yields byte-for-byte identical
    /// outcomes; there is no hidden mutable state across calls.
    #[test]
    fn aggregate_is_idempotent_for_identical_input(
        values in prop::collection::vec(1.0f64..1_000_000.0, 3..8),
        previous in prop::option::of(1.0f64..1_000_000.0),
    ) {
        let aggregator = PriceAggregator::new(2, 5.0, Some(10.0));
        let prices = to_prices(&values);
        let first = aggregator.aggregate("btc/usd", &prices, previous);
        let second = aggregator.aggregate("btc/usd", &prices, previous);
        prop_assert_eq!(first, second);
    }

    /// Scaling a price to fixed-point decimals and back never drifts by
    /// more than half of one scaled unit, matching the rounding rule
    /// observations use before being submitted on-chain.
    #[test]
    fn scaled_price_round_trip_is_bounded_by_half_a_unit(
        price in 0.01f64..1_000_000.0,
        decimals in 0u32..12,
    ) {
        let scale = 10f64.powi(decimals as i32);
        let scaled = (price * scale).round();
        let restored = scaled / scale;
        prop_assert!((price - restored).abs() <= 0.5 / scale + 1e-9);
    }
}
