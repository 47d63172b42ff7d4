//! Edges connecting vertices in a [`Dag`](crate::dag::Dag).

use crate::error::ReshapeError;
use crate::ids::{EdgeId, VertexId};
use crate::property::{CommunicationPattern, PropertyBag, PropertyValue};

/// A directed edge between two vertices (`spec.md` §3).
///
/// Invariant (enforced by [`DagBuilder::build`](crate::dag::DagBuilder::build),
/// not by the constructor): both endpoints must exist in the DAG by the time
/// it is built.
pub struct Edge {
    id: EdgeId,
    src: VertexId,
    dst: VertexId,
    pattern: CommunicationPattern,
    properties: PropertyBag,
}

impl Edge {
    /// Construct a new edge. The communication pattern is mirrored into the
    /// property bag under [`PropertyKind::CommunicationPattern`](crate::property::PropertyKind::CommunicationPattern)
    /// so generic property lookups see it alongside the dedicated
    /// [`pattern`](Self::pattern) accessor.
    pub fn new(id: EdgeId, src: VertexId, dst: VertexId, pattern: CommunicationPattern) -> Self {
        let mut properties = PropertyBag::new();
        // An edge's own pattern can never conflict with itself at construction time.
        properties.force_set(PropertyValue::CommunicationPattern(pattern), true);
        Self {
            id,
            src,
            dst,
            pattern,
            properties,
        }
    }

    #[must_use]
    pub fn id(&self) -> &EdgeId {
        &self.id
    }

    #[must_use]
    pub fn src(&self) -> &VertexId {
        &self.src
    }

    #[must_use]
    pub fn dst(&self) -> &VertexId {
        &self.dst
    }

    #[must_use]
    pub fn pattern(&self) -> CommunicationPattern {
        self.pattern
    }

    #[must_use]
    pub fn properties(&self) -> &PropertyBag {
        &self.properties
    }

    pub fn properties_mut(&mut self) -> &mut PropertyBag {
        &mut self.properties
    }

    /// Clone this edge's id, endpoints, pattern, and full property bag.
    #[must_use]
    pub fn duplicate(&self) -> Self {
        let mut out = Self::new(self.id.clone(), self.src.clone(), self.dst.clone(), self.pattern);
        self.properties.copy_to(&mut out.properties);
        out
    }
}

/// Read the label used in error diagnostics for an edge.
pub(crate) fn edge_label(id: &EdgeId) -> String {
    format!("edge {id}")
}

pub(crate) fn unsupported_pattern(edge: &EdgeId, pattern: &str) -> ReshapeError {
    ReshapeError::UnsupportedCommunicationPattern {
        edge: edge.to_string(),
        pattern: pattern.to_string(),
    }
}
