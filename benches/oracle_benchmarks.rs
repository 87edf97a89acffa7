// =====================================================================================
// File: core-oracle/benches/oracle_benchmarks.rs
// Description: Benchmark tests for the price aggregation hot path
// Author: arkSong (arksong2018@gmail.com)
// =====================================================================================

use std::collections::HashMap;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rofl_price_oracle::PriceAggregator;

fn prices_for(count: usize) -> HashMap<String, Option<f64>> {
    (0..count)
        .map(|i| (format!("source-{i}"), Some(100.0 + (i as f64 % 3.0))))
        .collect()
}

fn bench_aggregate(c: &mut Criterion) {
    let mut group = c.benchmark_group("aggregate");
    let aggregator = PriceAggregator::new(3, 5.0, Some(10.0));

    for count in [3usize, 10, 50, 200] {
        let input = prices_for(count);
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &input, |b, input| {
            b.iter(|| {
                black_box(aggregator.aggregate("aggregated/btc/usd", black_box(input), Some(101.0)))
            });
        });
    }

    group.finish();
}

fn bench_aggregate_with_outliers(c: &mut Criterion) {
    let aggregator = PriceAggregator::new(5, 5.0, None);
    let mut input = prices_for(20);
    input.insert("outlier-1".to_string(), Some(10_000.0));
    input.insert("outlier-2".to_string(), Some(0.01));

    c.bench_function("aggregate_with_outliers", |b| {
        b.iter(|| black_box(aggregator.aggregate("aggregated/btc/usd", black_box(&input), None)));
    });
}

criterion_group!(benches, bench_aggregate, bench_aggregate_with_outliers);
criterion_main!(benches);
