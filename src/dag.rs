//! The DAG itself: vertices, edges, adjacency, and topological order.
//!
//! `spec.md` §4.2 describes a builder (`addVertex`/`connectVertices`/`build()`)
//! that defers endpoint validation to `build()` and produces a deterministic
//! topological order with lexicographic tie-breaking on vertex id. This
//! mirrors the teacher crate's `planner.rs`, which separates an accumulation
//! phase (`PlanBuilder`) from a validating finalisation phase
//! (`PlanBuilder::build`).

use crate::edge::Edge;
use crate::error::ReshapeError;
use crate::ids::{EdgeId, VertexId};
use crate::vertex::Vertex;
use std::collections::{BTreeMap, BTreeSet};

/// An immutable, validated DAG: every edge's endpoints exist, and the graph
/// is acyclic. Construct one via [`DagBuilder`].
pub struct Dag {
    vertices: BTreeMap<VertexId, Vertex>,
    edges: BTreeMap<EdgeId, Edge>,
    outgoing: BTreeMap<VertexId, Vec<EdgeId>>,
    incoming: BTreeMap<VertexId, Vec<EdgeId>>,
    topo_order: Vec<VertexId>,
}

impl Dag {
    #[must_use]
    pub fn vertex(&self, id: &VertexId) -> Option<&Vertex> {
        self.vertices.get(id)
    }

    #[must_use]
    pub fn vertices(&self) -> impl Iterator<Item = &Vertex> {
        self.vertices.values()
    }

    #[must_use]
    pub fn edge(&self, id: &EdgeId) -> Option<&Edge> {
        self.edges.get(id)
    }

    #[must_use]
    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.values()
    }

    /// Edges whose source is `vertex_id`, in edge-id order.
    #[must_use]
    pub fn outgoing_edges(&self, vertex_id: &VertexId) -> Vec<&Edge> {
        self.outgoing
            .get(vertex_id)
            .into_iter()
            .flatten()
            .filter_map(|id| self.edges.get(id))
            .collect()
    }

    /// Edges whose destination is `vertex_id`, in edge-id order.
    #[must_use]
    pub fn incoming_edges(&self, vertex_id: &VertexId) -> Vec<&Edge> {
        self.incoming
            .get(vertex_id)
            .into_iter()
            .flatten()
            .filter_map(|id| self.edges.get(id))
            .collect()
    }

    /// A deterministic topological order over all vertices, ties broken
    /// lexicographically by vertex id (`spec.md` §4.2).
    #[must_use]
    pub fn topo_order(&self) -> &[VertexId] {
        &self.topo_order
    }

    /// Start a builder pre-populated with this DAG's vertices and edges, for
    /// passes that rewrite a DAG into a new one.
    #[must_use]
    pub fn into_builder(self) -> DagBuilder {
        let mut builder = DagBuilder::new();
        for (_, vertex) in self.vertices {
            builder.add_vertex(vertex);
        }
        for (_, edge) in self.edges {
            builder.connect_vertices(edge);
        }
        builder
    }
}

/// Accumulates vertices and edges without validating them until
/// [`build`](Self::build) is called (`spec.md` §4.2).
#[derive(Default)]
pub struct DagBuilder {
    vertices: BTreeMap<VertexId, Vertex>,
    edges: Vec<Edge>,
}

impl DagBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a vertex. Re-adding a vertex with the same id replaces it
    /// (idempotent by id, per `spec.md` §4.2).
    pub fn add_vertex(&mut self, vertex: Vertex) -> &mut Self {
        self.vertices.insert(vertex.id().clone(), vertex);
        self
    }

    /// Queue an edge. Endpoints are not checked until [`build`](Self::build).
    pub fn connect_vertices(&mut self, edge: Edge) -> &mut Self {
        self.edges.push(edge);
        self
    }

    /// Validate every edge's endpoints, then compute a deterministic
    /// topological order.
    ///
    /// # Errors
    ///
    /// [`ReshapeError::UnknownEndpoint`] if an edge references a vertex id
    /// never passed to [`add_vertex`](Self::add_vertex);
    /// [`ReshapeError::CycleDetected`] if the accumulated graph is not
    /// acyclic.
    pub fn build(self) -> Result<Dag, ReshapeError> {
        let Self { vertices, edges } = self;

        let mut outgoing: BTreeMap<VertexId, Vec<EdgeId>> = BTreeMap::new();
        let mut incoming: BTreeMap<VertexId, Vec<EdgeId>> = BTreeMap::new();
        let mut edge_map: BTreeMap<EdgeId, Edge> = BTreeMap::new();

        for edge in edges {
            if !vertices.contains_key(edge.src()) {
                return Err(ReshapeError::UnknownEndpoint {
                    edge: edge.id().to_string(),
                    endpoint: edge.src().to_string(),
                });
            }
            if !vertices.contains_key(edge.dst()) {
                return Err(ReshapeError::UnknownEndpoint {
                    edge: edge.id().to_string(),
                    endpoint: edge.dst().to_string(),
                });
            }
            outgoing.entry(edge.src().clone()).or_default().push(edge.id().clone());
            incoming.entry(edge.dst().clone()).or_default().push(edge.id().clone());
            edge_map.insert(edge.id().clone(), edge);
        }
        for list in outgoing.values_mut() {
            list.sort();
        }
        for list in incoming.values_mut() {
            list.sort();
        }

        let topo_order = topological_sort(&vertices, &outgoing, &incoming, &edge_map)?;

        Ok(Dag {
            vertices,
            edges: edge_map,
            outgoing,
            incoming,
            topo_order,
        })
    }
}

/// Kahn's algorithm over a ready-set ordered by vertex id, so the resulting
/// order is deterministic and reproducible across runs (`spec.md` §4.2).
fn topological_sort(
    vertices: &BTreeMap<VertexId, Vertex>,
    outgoing: &BTreeMap<VertexId, Vec<EdgeId>>,
    incoming: &BTreeMap<VertexId, Vec<EdgeId>>,
    edge_map: &BTreeMap<EdgeId, Edge>,
) -> Result<Vec<VertexId>, ReshapeError> {
    let mut remaining_in_degree: BTreeMap<VertexId, usize> = vertices
        .keys()
        .map(|id| (id.clone(), incoming.get(id).map_or(0, Vec::len)))
        .collect();

    let mut ready: BTreeSet<VertexId> = remaining_in_degree
        .iter()
        .filter(|(_, degree)| **degree == 0)
        .map(|(id, _)| id.clone())
        .collect();

    let mut order = Vec::with_capacity(vertices.len());

    while let Some(next) = ready.iter().next().cloned() {
        ready.remove(&next);
        order.push(next.clone());

        for edge_id in outgoing.get(&next).into_iter().flatten() {
            let Some(edge) = edge_map.get(edge_id) else { continue };
            let dst = edge.dst();
            if let Some(degree) = remaining_in_degree.get_mut(dst) {
                *degree -= 1;
                if *degree == 0 {
                    ready.insert(dst.clone());
                }
            }
        }
    }

    if order.len() != vertices.len() {
        return Err(ReshapeError::CycleDetected);
    }
    Ok(order)
}
