//! Transform variants and their runtime accumulator/closer logic.
//!
//! `spec.md` §9 design notes: "the source embeds accumulator and closer
//! functions inside vertex transforms... replace with named transform
//! variants (`MetricCollect`, `AggregateMetric`) carrying their config as
//! plain data; the runtime dispatches on the variant tag." [`Transform`] is
//! that tagged variant; [`MetricCollectAccumulator`] and
//! [`AggregateMetricAccumulator`] are the actual accumulate/close logic
//! `spec.md` §4.4 describes, kept separate from [`Transform`] itself so a
//! vertex stays cheap to clone (the config is plain data; the accumulator is
//! only ever constructed by the out-of-scope runtime when it executes a
//! vertex).

use crate::codec::{EncoderFactory, KeyExtractor};
use std::any::Any;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Multiplies destination parallelism to form the statistics hash range
/// (`spec.md` §4.4). The source's constant is small, typically 10.
pub const HASH_RANGE_MULTIPLIER_DEFAULT: u32 = 10;

/// Plain-data configuration for a `MetricCollect` vertex.
#[derive(Clone)]
pub struct MetricCollectConfig {
    /// Key extractor inherited from the shuffle edge being sampled.
    pub key_extractor: Arc<dyn KeyExtractor>,
    /// Encoder inherited from the shuffle edge, used to measure serialised
    /// byte size per bucket.
    pub encoder: Arc<dyn EncoderFactory>,
    /// `H = destination_parallelism * hash_range_multiplier`.
    pub hash_range: u32,
    /// Ties this vertex's emitted statistics to its destination's
    /// `AggregateMetric` vertex.
    pub mc_id: u64,
}

/// Tagged transform configuration embedded in an [`OperatorVertex`](crate::vertex::OperatorVertex).
///
/// This is intentionally plain data (no closures): `MetricCollect` and
/// `AggregateMetric` carry everything the out-of-scope runtime needs to
/// reconstruct the accumulator described below; `Identity` is used for the
/// aggregation fixture's `dummy` control vertex; `UserDefined` is the open
/// slot for transforms the reshaper passes through unexamined.
#[derive(Clone)]
pub enum Transform {
    /// Bucketed-size collector, one per sampled task (`spec.md` §4.4).
    MetricCollect(MetricCollectConfig),
    /// Cross-bucket combiner, one per destination (`spec.md` §4.4).
    AggregateMetric,
    /// Passes its input through unchanged; used for control-only vertices.
    Identity,
    /// An opaque transform the reshaper does not need to interpret, tagged
    /// only by name for diagnostics.
    UserDefined(String),
}

/// Per-sampled-task accumulator for a `MetricCollect` vertex.
///
/// `spec.md` §4.4: "For each incoming element `x`: derive `k =
/// extractor(x)`; compute `pk = |hash(k)| mod H`; append `x` to the list at
/// bucket `pk`... On transform close: for each bucket `(pk, list)`, encode
/// every element of `list`... and emit the pair `(pk, byte_size_of_buffer)`."
pub struct MetricCollectAccumulator {
    config: MetricCollectConfig,
    buckets: BTreeMap<u64, Vec<Box<dyn Any + Send + Sync>>>,
}

impl MetricCollectAccumulator {
    #[must_use]
    pub fn new(config: MetricCollectConfig) -> Self {
        Self {
            config,
            buckets: BTreeMap::new(),
        }
    }

    /// Accept one element, routing it to its hashed bucket.
    pub fn accept(&mut self, element: Box<dyn Any + Send + Sync>) {
        let hash = self.config.key_extractor.extract_hash(element.as_ref());
        let pk = hash % u64::from(self.config.hash_range);
        self.buckets.entry(pk).or_default().push(element);
    }

    /// Close the accumulator, producing the `(partition_key,
    /// serialised_byte_size)` pairs this vertex's `MetricCollection` id ties
    /// to its destination's `AggregateMetric` vertex.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error if encoding any bucket's elements
    /// fails.
    pub fn close(self) -> std::io::Result<Vec<(i32, i64)>> {
        let mut out = Vec::with_capacity(self.buckets.len());
        for (pk, list) in self.buckets {
            let mut scratch = Vec::new();
            {
                let mut encoder = self.config.encoder.create(&mut scratch);
                for element in &list {
                    encoder.encode(element.as_ref())?;
                }
            }
            out.push((pk as i32, scratch.len() as i64));
        }
        Ok(out)
    }

    /// The `MetricCollection` id this accumulator's output should be tagged
    /// with.
    #[must_use]
    pub fn mc_id(&self) -> u64 {
        self.config.mc_id
    }
}

/// Single-parallelism accumulator for an `AggregateMetric` vertex.
///
/// `spec.md` §4.4: "maintains an accumulator mapping from integer partition
/// key to aggregated count. On each input element `(k, c)`: if `k` is
/// present, replace its value with `old + c`; else insert `c`."
///
/// The (out-of-scope) runtime is responsible for exactly-once delivery on
/// the `Push`/`Discard` edge feeding this accumulator; `spec.md` §9 flags
/// this as unconfirmed, so this type does not attempt to detect or
/// compensate for duplicate delivery — see `DESIGN.md`.
#[derive(Default)]
pub struct AggregateMetricAccumulator {
    totals: BTreeMap<i32, i64>,
}

impl AggregateMetricAccumulator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one `(partition_key, count)` pair into the running totals.
    pub fn accept(&mut self, partition_key: i32, count: i64) {
        self.totals
            .entry(partition_key)
            .and_modify(|old| *old += count)
            .or_insert(count);
    }

    /// Close the accumulator, emitting the final partition-key histogram.
    #[must_use]
    pub fn close(self) -> BTreeMap<i32, i64> {
        self.totals
    }
}
