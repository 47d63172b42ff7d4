//! Factory functions that materialise the two vertex kinds the sampling
//! rewrite introduces, per `spec.md` §4.4/§4.5 step 8.

use crate::edge::Edge;
use crate::error::ReshapeError;
use crate::ids::IdGen;
use crate::property::{PropertyKind, PropertyValue};
use crate::transform::{MetricCollectConfig, Transform};
use crate::vertex::OperatorVertex;

/// Build a `MetricCollect` vertex for one sampled-source-path edge.
///
/// `spec.md` §4.4: `H = destination_parallelism * hash_range_multiplier`. The
/// key extractor and encoder are inherited from `edge`'s own properties,
/// since a `MetricCollect` vertex measures the same shuffle key and payload
/// the real destination would have seen.
///
/// # Errors
///
/// [`ReshapeError::MissingRequiredProperty`] if `edge` lacks a `KeyExtractor`
/// or `Encoder` property.
pub fn metric_collect_vertex(
    edge: &Edge,
    dest_parallelism: u32,
    hash_range_multiplier: u32,
    mc_vertex_parallelism: u32,
    mc_id: u64,
    id_gen: &mut IdGen,
) -> Result<OperatorVertex, ReshapeError> {
    let label = format!("edge {}", edge.id());
    let key_extractor = match edge.properties().require(PropertyKind::KeyExtractor, label.clone())? {
        PropertyValue::KeyExtractor(k) => k.clone(),
        _ => unreachable!("PropertyKind::KeyExtractor always carries PropertyValue::KeyExtractor"),
    };
    let encoder = match edge.properties().require(PropertyKind::Encoder, label)? {
        PropertyValue::Encoder(e) => e.clone(),
        _ => unreachable!("PropertyKind::Encoder always carries PropertyValue::Encoder"),
    };

    let config = MetricCollectConfig {
        key_extractor,
        encoder,
        hash_range: dest_parallelism * hash_range_multiplier,
        mc_id,
    };

    let id = id_gen.fresh_vertex_id("mc");
    let mut vertex = OperatorVertex::new(id, Transform::MetricCollect(config));
    vertex
        .properties_mut()
        .set_permanent(PropertyValue::Parallelism(mc_vertex_parallelism), "mc vertex")
        .expect("fresh vertex cannot already carry a conflicting Parallelism");
    vertex
        .properties_mut()
        .set_permanent(PropertyValue::MetricCollection(mc_id), "mc vertex")
        .expect("fresh vertex cannot already carry a conflicting MetricCollection id");
    Ok(vertex)
}

/// Build an `AggregateMetric` vertex: single-parallelism, no dedicated
/// resource slot (`spec.md` §4.4/§4.5 step 8).
#[must_use]
pub fn aggregate_metric_vertex(id_gen: &mut IdGen) -> OperatorVertex {
    let id = id_gen.fresh_vertex_id("ab");
    let mut vertex = OperatorVertex::new(id, Transform::AggregateMetric);
    vertex
        .properties_mut()
        .set_permanent(PropertyValue::Parallelism(1), "ab vertex")
        .expect("fresh vertex cannot already carry a conflicting Parallelism");
    vertex
        .properties_mut()
        .set_permanent(PropertyValue::ResourceSlot(false), "ab vertex")
        .expect("fresh vertex cannot already carry a conflicting ResourceSlot");
    vertex
}
