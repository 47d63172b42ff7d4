use dagshear::dag::DagBuilder;
use dagshear::ids::VertexId;
use dagshear::testing::{test_operator, test_shuffle_edge, test_source};
use dagshear::ReshapeError;

#[test]
fn build_fails_on_unknown_endpoint() {
    let mut builder = DagBuilder::new();
    builder.add_vertex(test_source("A", 4));
    builder.connect_vertices(test_shuffle_edge("e-A-B", "A", "B"));

    let err = builder.build().unwrap_err();
    match err {
        ReshapeError::UnknownEndpoint { edge, endpoint } => {
            assert_eq!(edge, "e-A-B");
            assert_eq!(endpoint, "B");
        }
        other => panic!("expected UnknownEndpoint, got {other:?}"),
    }
}

#[test]
fn build_fails_on_cycle() {
    let mut builder = DagBuilder::new();
    builder.add_vertex(test_operator("A", 2));
    builder.add_vertex(test_operator("B", 2));
    builder.connect_vertices(test_shuffle_edge("e-A-B", "A", "B"));
    builder.connect_vertices(test_shuffle_edge("e-B-A", "B", "A"));

    let err = builder.build().unwrap_err();
    assert!(matches!(err, ReshapeError::CycleDetected));
}

#[test]
fn topo_order_is_deterministic_and_lexicographic_on_ties() {
    let mut builder = DagBuilder::new();
    builder.add_vertex(test_source("C", 1));
    builder.add_vertex(test_source("A", 1));
    builder.add_vertex(test_source("B", 1));
    let dag = builder.build().unwrap();

    let order: Vec<&str> = dag.topo_order().iter().map(|id| id.as_str()).collect();
    assert_eq!(order, vec!["A", "B", "C"]);
}

#[test]
fn topo_order_respects_edges_before_lexicographic_tie_break() {
    let mut builder = DagBuilder::new();
    builder.add_vertex(test_source("Z", 1));
    builder.add_vertex(test_operator("A", 1));
    builder.connect_vertices(test_shuffle_edge("e-Z-A", "Z", "A"));
    let dag = builder.build().unwrap();

    let order: Vec<&str> = dag.topo_order().iter().map(|id| id.as_str()).collect();
    assert_eq!(order, vec!["Z", "A"]);
}

#[test]
fn incoming_and_outgoing_edges_are_sorted_by_edge_id() {
    let mut builder = DagBuilder::new();
    builder.add_vertex(test_source("A", 4));
    builder.add_vertex(test_source("B", 4));
    builder.add_vertex(test_operator("C", 2));
    builder.connect_vertices(test_shuffle_edge("e2", "B", "C"));
    builder.connect_vertices(test_shuffle_edge("e1", "A", "C"));
    let dag = builder.build().unwrap();

    let incoming: Vec<&str> = dag
        .incoming_edges(&VertexId::new("C"))
        .into_iter()
        .map(|e| e.id().as_str())
        .collect();
    assert_eq!(incoming, vec!["e1", "e2"]);
}

#[test]
fn add_vertex_is_idempotent_by_id() {
    let mut builder = DagBuilder::new();
    builder.add_vertex(test_source("A", 4));
    builder.add_vertex(test_source("A", 8));
    let dag = builder.build().unwrap();

    assert_eq!(dag.vertices().count(), 1);
}
