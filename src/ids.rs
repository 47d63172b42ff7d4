//! Lightweight identifiers for vertices and edges inside a [`Dag`](crate::dag::Dag).
//!
//! Both id kinds wrap a `String` rather than a numeric handle: `spec.md` §3
//! requires vertex identifiers to be meaningful strings (they show up verbatim
//! in error diagnostics and in the `DynOptData` wiring), so a human debugging a
//! failed pass invocation can see `"join-3--sampled-7"` rather than an opaque
//! integer.

use std::fmt;

/// Unique identifier of a [`Vertex`](crate::vertex::Vertex) within a DAG.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VertexId(String);

impl VertexId {
    /// Wrap an arbitrary string as a vertex id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the underlying string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VertexId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for VertexId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for VertexId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Unique identifier of an [`Edge`](crate::edge::Edge) within a DAG.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeId(String);

impl EdgeId {
    /// Wrap an arbitrary string as an edge id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the underlying string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EdgeId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for EdgeId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Monotone generator for fresh vertex/edge ids and duplicate-edge-group tags.
///
/// Scoped to a single [`apply`](crate::reshape::SamplingReshaper::apply) call;
/// `spec.md` §3's lifecycle rule ("transient state... lives only during a
/// single pass invocation") means a fresh `IdGen` is created per call rather
/// than reused across them.
#[derive(Default)]
pub(crate) struct IdGen {
    counter: u64,
}

impl IdGen {
    pub(crate) fn new() -> Self {
        Self { counter: 0 }
    }

    fn next(&mut self) -> u64 {
        self.counter += 1;
        self.counter
    }

    pub(crate) fn fresh_vertex_id(&mut self, prefix: &str) -> VertexId {
        VertexId::new(format!("{prefix}--{}", self.next()))
    }

    pub(crate) fn fresh_edge_id(&mut self, prefix: &str) -> EdgeId {
        EdgeId::new(format!("{prefix}--{}", self.next()))
    }

    pub(crate) fn fresh_group_id(&mut self, prefix: &str) -> String {
        format!("{prefix}-{}", self.next())
    }
}
