use dagshear::dag::DagBuilder;
use dagshear::ids::VertexId;
use dagshear::property::{CommunicationPattern, DataStore, PropertyKind, PropertyValue};
use dagshear::reshape::{SamplingPolicy, SamplingReshaper};
use dagshear::testing::{linear_shuffle_dag, one_to_one_upstream_dag, test_operator, test_one_to_one_edge, test_shuffle_edge, test_source};
use dagshear::ReshapeError;

fn parallelism_of(dag: &dagshear::dag::Dag, id: &str) -> u32 {
    match dag
        .vertex(&VertexId::new(id))
        .unwrap_or_else(|| panic!("vertex {id} must exist in the rewritten dag"))
        .properties()
        .get(PropertyKind::Parallelism)
    {
        Some(PropertyValue::Parallelism(p)) => *p,
        other => panic!("expected Parallelism on {id}, got {other:?}"),
    }
}

#[test]
fn linear_shuffle_inserts_sampling_subdag_and_mc_vertex() {
    let dag = linear_shuffle_dag(4, 2);
    let policy = SamplingPolicy::new(0.5, 10, Some(0)).unwrap();
    let reshaper = SamplingReshaper::new(policy);

    let (rewritten, report) = reshaper.apply(&dag).unwrap();

    assert_eq!(report.shuffle_edges_rewritten, 1);
    assert_eq!(report.metric_collect_vertices, 1);
    assert_eq!(report.aggregation_fixtures.len(), 1);

    // Original vertices survive; plus sampled clone of A, mcv, abv, dummy.
    assert_eq!(rewritten.vertices().count(), 6);

    let shuffle_edges = rewritten
        .edges()
        .filter(|e| e.pattern() == CommunicationPattern::Shuffle)
        .count();
    // A->B (rewritten original edge), mcv->abv: two Shuffle edges. A has no
    // incoming edges of its own, so no Shuffle mirror is built for it; A'->mcv
    // is OneToOne (step 7).
    assert_eq!(shuffle_edges, 2);

    let broadcast_edges: Vec<_> = rewritten
        .edges()
        .filter(|e| e.pattern() == CommunicationPattern::BroadCast)
        .collect();
    assert_eq!(broadcast_edges.len(), 1);
    // dummy -> start must target the sampled clone of A, not A itself: the
    // happens-before gates the sampled sub-DAG's re-execution (spec.md §5),
    // not the real pipeline's own source.
    assert!(
        broadcast_edges[0].dst().as_str().starts_with("sampled-A"),
        "control edge must target the sampled clone of A, got {}",
        broadcast_edges[0].dst()
    );
}

#[test]
fn two_shuffles_into_one_destination_share_one_aggregator() {
    let mut builder = DagBuilder::new();
    builder.add_vertex(test_source("A", 4));
    builder.add_vertex(test_source("B", 4));
    builder.add_vertex(test_operator("C", 2));
    builder.connect_vertices(test_shuffle_edge("e-A-C", "A", "C"));
    builder.connect_vertices(test_shuffle_edge("e-B-C", "B", "C"));
    let dag = builder.build().unwrap();

    let policy = SamplingPolicy::new(0.5, 10, Some(0)).unwrap();
    let reshaper = SamplingReshaper::new(policy);
    let (rewritten, report) = reshaper.apply(&dag).unwrap();

    assert_eq!(report.shuffle_edges_rewritten, 2);
    assert_eq!(report.metric_collect_vertices, 2);
    assert_eq!(report.aggregation_fixtures.len(), 1, "both shuffles should share one aggregator");

    let mc_ids: std::collections::HashSet<u64> = rewritten
        .edges()
        .filter_map(|e| match e.properties().get(PropertyKind::MetricCollection) {
            Some(PropertyValue::MetricCollection(id)) => Some(*id),
            _ => None,
        })
        .collect();
    assert_eq!(mc_ids.len(), 1, "both rewritten edges should carry the same MetricCollection id");
}

#[test]
fn in_memory_one_to_one_upstream_extends_sampling_subdag() {
    let dag = one_to_one_upstream_dag(DataStore::Memory, 2);
    let policy = SamplingPolicy::new(0.5, 10, Some(0)).unwrap();
    let reshaper = SamplingReshaper::new(policy);

    let (rewritten, _report) = reshaper.apply(&dag).unwrap();

    // Original A, B, C plus sampled A', sampled B', mcv, abv, dummy = 8.
    assert_eq!(rewritten.vertices().count(), 8);

    // No OneToOneDistribution should appear: recursion replaces it with a
    // mirrored OneToOne edge copying properties, not a distribution tag.
    let has_o2o_distribution = rewritten
        .edges()
        .any(|e| e.properties().get(PropertyKind::OneToOneDistribution).is_some());
    assert!(!has_o2o_distribution);

    // The control edge must target the sampled clone of A (the recursion's
    // upstream entry point), not B or the original A (spec.md §8 scenario 3:
    // "the BroadCast control edge targets the sampled A, not B").
    let control_edge = rewritten
        .edges()
        .find(|e| e.pattern() == CommunicationPattern::BroadCast)
        .expect("a control edge must be created");
    assert!(
        control_edge.dst().as_str().starts_with("sampled-A"),
        "control edge must target the sampled clone of A, got {}",
        control_edge.dst()
    );
}

#[test]
fn disk_one_to_one_upstream_only_mirrors_immediate_predecessor() {
    let dag = one_to_one_upstream_dag(DataStore::Disk, 2);
    let policy = SamplingPolicy::new(0.5, 10, Some(0)).unwrap();
    let reshaper = SamplingReshaper::new(policy);

    let (rewritten, _report) = reshaper.apply(&dag).unwrap();

    // Original A, B, C plus sampled B', mcv, abv, dummy = 7 (A is not mirrored).
    assert_eq!(rewritten.vertices().count(), 7);

    let has_o2o_distribution = rewritten
        .edges()
        .any(|e| e.properties().get(PropertyKind::OneToOneDistribution).is_some());
    assert!(has_o2o_distribution);

    // A is not mirrored, so the control edge targets the sampled clone of B,
    // the actual upstream entry point of this (non-recursing) sub-DAG build.
    let control_edge = rewritten
        .edges()
        .find(|e| e.pattern() == CommunicationPattern::BroadCast)
        .expect("a control edge must be created");
    assert!(
        control_edge.dst().as_str().starts_with("sampled-B"),
        "control edge must target the sampled clone of B, got {}",
        control_edge.dst()
    );
}

#[test]
fn side_output_shuffle_is_not_a_candidate() {
    let mut builder = DagBuilder::new();
    builder.add_vertex(test_source("A", 4));
    builder.add_vertex(test_operator("B", 2));
    let mut edge = test_shuffle_edge("e-A-B", "A", "B");
    edge.properties_mut()
        .set_permanent(PropertyValue::AdditionalOutputTag("side".to_string()), "e-A-B")
        .unwrap();
    builder.connect_vertices(edge);
    let dag = builder.build().unwrap();

    let policy = SamplingPolicy::new(0.5, 10, Some(0)).unwrap();
    let reshaper = SamplingReshaper::new(policy);
    let (rewritten, report) = reshaper.apply(&dag).unwrap();

    assert_eq!(report.shuffle_edges_rewritten, 0);
    assert_eq!(rewritten.vertices().count(), 2);
    assert_eq!(rewritten.edges().count(), 1);
}

#[test]
fn missing_parallelism_fails_the_pass() {
    let mut builder = DagBuilder::new();
    builder.add_vertex(dagshear::vertex::Vertex::Source(dagshear::vertex::SourceVertex::new("A".into())));
    builder.add_vertex(test_operator("B", 2));
    builder.connect_vertices(test_shuffle_edge("e-A-B", "A", "B"));
    let dag = builder.build().unwrap();

    let policy = SamplingPolicy::new(0.5, 10, Some(0)).unwrap();
    let reshaper = SamplingReshaper::new(policy);
    let err = reshaper.apply(&dag).unwrap_err();
    assert!(matches!(err, ReshapeError::MissingRequiredProperty { .. }));
}

#[test]
fn apply_is_deterministic_with_fixed_seed() {
    let dag = linear_shuffle_dag(6, 2);
    let policy = SamplingPolicy::new(0.5, 10, Some(42)).unwrap();
    let reshaper = SamplingReshaper::new(policy);

    let (first, _) = reshaper.apply(&dag).unwrap();
    let (second, _) = reshaper.apply(&dag).unwrap();

    dagshear::testing::assert_structurally_equal(&first, &second);
    assert_eq!(parallelism_of(&first, "A"), parallelism_of(&second, "A"));
}

#[test]
fn sampled_parallelism_is_at_least_one() {
    let dag = linear_shuffle_dag(1, 1);
    let policy = SamplingPolicy::new(0.1, 10, Some(0)).unwrap();
    let reshaper = SamplingReshaper::new(policy);

    let (rewritten, _report) = reshaper.apply(&dag).unwrap();
    let sampled_clone_parallelism = rewritten
        .vertices()
        .filter(|v| v.id().as_str().starts_with("sampled-A"))
        .map(|v| match v.properties().get(PropertyKind::Parallelism) {
            Some(PropertyValue::Parallelism(p)) => *p,
            _ => 0,
        })
        .next()
        .unwrap();
    assert_eq!(sampled_clone_parallelism, 1);
}

#[test]
fn non_shuffle_graph_is_passed_through_unchanged_up_to_ids() {
    let dag = one_to_one_upstream_dag_without_shuffle();
    let policy = SamplingPolicy::new(0.5, 10, Some(0)).unwrap();
    let reshaper = SamplingReshaper::new(policy);

    let (rewritten, report) = reshaper.apply(&dag).unwrap();
    assert_eq!(report.shuffle_edges_rewritten, 0);
    dagshear::testing::assert_structurally_equal(&dag, &rewritten);
}

fn one_to_one_upstream_dag_without_shuffle() -> dagshear::dag::Dag {
    let mut builder = DagBuilder::new();
    builder.add_vertex(test_source("A", 4));
    builder.add_vertex(test_operator("B", 4));
    builder.connect_vertices(test_one_to_one_edge("e-A-B", "A", "B", DataStore::Disk));
    builder.build().unwrap()
}
