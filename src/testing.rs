//! Test fixtures and structural assertions for building and comparing DAGs.
//!
//! Grounded in the teacher crate's `testing` module: fixture builders in the
//! style of `testing::builders::TestDataBuilder`, assertions with the same
//! detailed-panic-message style as `testing::assertions::assert_collections_equal`.
//! Available behind the `testing` feature, same as the teacher gates its own
//! testing submodules behind I/O feature flags.

use crate::codec::{EncoderFactory, IntegerCodec, IntegerKeyExtractor};
use crate::dag::{Dag, DagBuilder};
use crate::edge::Edge;
use crate::property::{CommunicationPattern, DataStore, PropertyKind, PropertyValue};
use crate::transform::Transform;
use crate::vertex::{OperatorVertex, SourceVertex, Vertex};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Build a source vertex with `parallelism` set permanently.
#[must_use]
pub fn test_source(id: &str, parallelism: u32) -> Vertex {
    let mut v = SourceVertex::new(id.into());
    v.properties_mut()
        .set_permanent(PropertyValue::Parallelism(parallelism), id)
        .expect("fresh test vertex cannot conflict");
    Vertex::Source(v)
}

/// Build an operator vertex with `parallelism` set permanently and an
/// opaque user-defined transform tagged with its own id.
#[must_use]
pub fn test_operator(id: &str, parallelism: u32) -> Vertex {
    let mut v = OperatorVertex::new(id.into(), Transform::UserDefined(id.to_string()));
    v.properties_mut()
        .set_permanent(PropertyValue::Parallelism(parallelism), id)
        .expect("fresh test vertex cannot conflict");
    Vertex::Operator(v)
}

/// Build a Shuffle edge with the integer key extractor and integer codec
/// attached, satisfying everything `MetricCollect` requires of its source
/// edge.
#[must_use]
pub fn test_shuffle_edge(id: &str, src: &str, dst: &str) -> Edge {
    let mut e = Edge::new(id.into(), src.into(), dst.into(), CommunicationPattern::Shuffle);
    let props = e.properties_mut();
    props
        .set_permanent(PropertyValue::KeyExtractor(Arc::new(IntegerKeyExtractor)), id)
        .expect("fresh test edge cannot conflict");
    let encoder: Arc<dyn EncoderFactory> = Arc::new(IntegerCodec);
    props
        .set_permanent(PropertyValue::Encoder(encoder), id)
        .expect("fresh test edge cannot conflict");
    let decoder: Arc<dyn crate::codec::DecoderFactory> = Arc::new(IntegerCodec);
    props
        .set_permanent(PropertyValue::Decoder(decoder), id)
        .expect("fresh test edge cannot conflict");
    e
}

/// Build a OneToOne edge backed by `store`.
#[must_use]
pub fn test_one_to_one_edge(id: &str, src: &str, dst: &str, store: DataStore) -> Edge {
    let mut e = Edge::new(id.into(), src.into(), dst.into(), CommunicationPattern::OneToOne);
    e.properties_mut()
        .set_permanent(PropertyValue::DataStore(store), id)
        .expect("fresh test edge cannot conflict");
    e
}

/// `A(P=p_src) --Shuffle--> B(P=p_dst)`: the "Linear Shuffle" scenario from
/// `spec.md` §8's concrete-scenario list.
#[must_use]
pub fn linear_shuffle_dag(p_src: u32, p_dst: u32) -> Dag {
    let mut builder = DagBuilder::new();
    builder.add_vertex(test_source("A", p_src));
    builder.add_vertex(test_operator("B", p_dst));
    builder.connect_vertices(test_shuffle_edge("e-A-B", "A", "B"));
    builder.build().expect("linear_shuffle_dag fixture is always valid")
}

/// `A(P=4) --OneToOne(store)--> B(P=4) --Shuffle--> C(P=p_dst)`: the
/// "In-memory/Disk OneToOne upstream" scenarios from `spec.md` §8.
#[must_use]
pub fn one_to_one_upstream_dag(store: DataStore, p_dst: u32) -> Dag {
    let mut builder = DagBuilder::new();
    builder.add_vertex(test_source("A", 4));
    builder.add_vertex(test_operator("B", 4));
    builder.add_vertex(test_operator("C", p_dst));
    builder.connect_vertices(test_one_to_one_edge("e-A-B", "A", "B", store));
    builder.connect_vertices(test_shuffle_edge("e-B-C", "B", "C"));
    builder.build().expect("one_to_one_upstream_dag fixture is always valid")
}

/// Coarse per-kind, per-pattern signature of a DAG's shape, ignoring ids.
/// Used to compare two DAGs "up to fresh-id renaming" (`spec.md` §8)
/// without implementing full graph isomorphism: counts vertices by
/// `(is_operator, parallelism)` and edges by communication pattern.
#[derive(Debug, PartialEq, Eq)]
pub struct StructuralSignature {
    vertex_kinds: BTreeMap<(bool, u32), usize>,
    edge_patterns: BTreeMap<u8, usize>,
}

fn pattern_rank(p: CommunicationPattern) -> u8 {
    match p {
        CommunicationPattern::OneToOne => 0,
        CommunicationPattern::BroadCast => 1,
        CommunicationPattern::Shuffle => 2,
    }
}

impl StructuralSignature {
    #[must_use]
    pub fn of(dag: &Dag) -> Self {
        let mut vertex_kinds: BTreeMap<(bool, u32), usize> = BTreeMap::new();
        for v in dag.vertices() {
            let parallelism = match v.properties().get(PropertyKind::Parallelism) {
                Some(PropertyValue::Parallelism(p)) => *p,
                _ => 0,
            };
            *vertex_kinds.entry((v.is_operator(), parallelism)).or_default() += 1;
        }

        let mut edge_patterns: BTreeMap<u8, usize> = BTreeMap::new();
        for e in dag.edges() {
            *edge_patterns.entry(pattern_rank(e.pattern())).or_default() += 1;
        }

        Self {
            vertex_kinds,
            edge_patterns,
        }
    }
}

/// Assert that two DAGs have the same structural signature.
///
/// # Panics
///
/// Panics with a detailed message if the signatures differ.
pub fn assert_structurally_equal(actual: &Dag, expected: &Dag) {
    let actual_sig = StructuralSignature::of(actual);
    let expected_sig = StructuralSignature::of(expected);
    assert_eq!(
        actual_sig, expected_sig,
        "DAG structural signature mismatch (vertex kind / edge pattern multisets, ids ignored):\n  Expected: {expected_sig:?}\n  Actual: {actual_sig:?}"
    );
}

/// Assert that `dag` contains exactly `expected` vertices and `expected_edges` edges.
///
/// # Panics
///
/// Panics with a detailed message if either count differs.
pub fn assert_vertex_and_edge_counts(dag: &Dag, expected_vertices: usize, expected_edges: usize) {
    let actual_vertices = dag.vertices().count();
    let actual_edges = dag.edges().count();
    assert_eq!(
        actual_vertices, expected_vertices,
        "vertex count mismatch:\n  Expected: {expected_vertices}\n  Actual: {actual_vertices}"
    );
    assert_eq!(
        actual_edges, expected_edges,
        "edge count mismatch:\n  Expected: {expected_edges}\n  Actual: {actual_edges}"
    );
}
