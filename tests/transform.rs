use dagshear::codec::{EncoderFactory, IntegerCodec, IntegerKeyExtractor};
use dagshear::transform::{AggregateMetricAccumulator, MetricCollectAccumulator, MetricCollectConfig};
use std::sync::Arc;

fn config(hash_range: u32) -> MetricCollectConfig {
    MetricCollectConfig {
        key_extractor: Arc::new(IntegerKeyExtractor),
        encoder: Arc::new(IntegerCodec) as Arc<dyn EncoderFactory>,
        hash_range,
        mc_id: 1,
    }
}

#[test]
fn metric_collect_buckets_by_hash_and_emits_byte_sizes() {
    let mut acc = MetricCollectAccumulator::new(config(4));
    for n in 0..8i32 {
        acc.accept(Box::new(n));
    }
    let buckets = acc.close().unwrap();

    // Every bucket key must be < hash_range (4), and each bucket must have a
    // positive byte size (4 bytes per i32, so 2 elements per bucket here).
    assert!(buckets.iter().all(|(pk, _)| *pk < 4));
    let total_bytes: i64 = buckets.iter().map(|(_, size)| size).sum();
    assert_eq!(total_bytes, 8 * 4);
}

#[test]
fn metric_collect_mc_id_is_preserved() {
    let acc = MetricCollectAccumulator::new(config(10));
    assert_eq!(acc.mc_id(), 1);
}

#[test]
fn aggregate_metric_sums_repeated_keys() {
    let mut acc = AggregateMetricAccumulator::new();
    acc.accept(0, 3);
    acc.accept(1, 5);
    acc.accept(0, 2);

    let totals = acc.close();
    assert_eq!(totals.get(&0), Some(&5));
    assert_eq!(totals.get(&1), Some(&5));
    assert_eq!(totals.len(), 2);
}

#[test]
fn aggregate_metric_empty_close_is_empty() {
    let acc = AggregateMetricAccumulator::new();
    assert!(acc.close().is_empty());
}
