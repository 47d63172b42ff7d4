//! Polymorphic vertex variants (`spec.md` §4.3).

use crate::ids::VertexId;
use crate::property::PropertyBag;
use crate::transform::Transform;

/// A source vertex. The pass never interprets what a source actually reads;
/// it only needs to be able to restrict one to a subset of task indices
/// (`sampledClone`) and to know whether a given vertex *is* a sampled clone,
/// recorded in `restriction` for diagnostics and for
/// [`Dag`](crate::dag::Dag)-level introspection.
pub struct SourceVertex {
    id: VertexId,
    properties: PropertyBag,
    /// Set when this vertex is itself the product of `sampled_clone`:
    /// `(sampled task indices, original parallelism)`.
    restriction: Option<(Vec<u32>, u32)>,
}

impl SourceVertex {
    #[must_use]
    pub fn new(id: VertexId) -> Self {
        Self {
            id,
            properties: PropertyBag::new(),
            restriction: None,
        }
    }

    #[must_use]
    pub fn id(&self) -> &VertexId {
        &self.id
    }

    #[must_use]
    pub fn properties(&self) -> &PropertyBag {
        &self.properties
    }

    pub fn properties_mut(&mut self) -> &mut PropertyBag {
        &mut self.properties
    }

    /// The `(indices, original_parallelism)` this vertex was restricted to,
    /// if it is itself a sampled clone.
    #[must_use]
    pub fn restriction(&self) -> Option<&(Vec<u32>, u32)> {
        self.restriction.as_ref()
    }

    /// Full copy preserving id, properties, and restriction, used when
    /// copying an untouched vertex through to the rewritten DAG.
    #[must_use]
    pub fn duplicate(&self) -> Self {
        let mut properties = PropertyBag::new();
        self.properties.copy_to(&mut properties);
        Self {
            id: self.id.clone(),
            properties,
            restriction: self.restriction.clone(),
        }
    }

    /// Produce a new source restricted to read only `indices` out of
    /// `original_parallelism` task indices (`spec.md` §4.3). The returned
    /// vertex gets a fresh id and starts with an empty property bag; the
    /// caller is responsible for copying over execution properties (see
    /// `SamplingReshaper`'s sub-DAG builder, which does this then overrides
    /// `Parallelism`).
    #[must_use]
    pub fn sampled_clone(&self, fresh_id: VertexId, indices: Vec<u32>, original_parallelism: u32) -> Self {
        Self {
            id: fresh_id,
            properties: PropertyBag::new(),
            restriction: Some((indices, original_parallelism)),
        }
    }
}

/// An operator vertex: identity plus a tagged [`Transform`].
pub struct OperatorVertex {
    id: VertexId,
    properties: PropertyBag,
    transform: Transform,
}

impl OperatorVertex {
    #[must_use]
    pub fn new(id: VertexId, transform: Transform) -> Self {
        Self {
            id,
            properties: PropertyBag::new(),
            transform,
        }
    }

    #[must_use]
    pub fn id(&self) -> &VertexId {
        &self.id
    }

    #[must_use]
    pub fn properties(&self) -> &PropertyBag {
        &self.properties
    }

    pub fn properties_mut(&mut self) -> &mut PropertyBag {
        &mut self.properties
    }

    #[must_use]
    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    /// Full copy preserving id, properties, and transform, used when copying
    /// an untouched vertex through to the rewritten DAG.
    #[must_use]
    pub fn duplicate(&self) -> Self {
        let mut properties = PropertyBag::new();
        self.properties.copy_to(&mut properties);
        Self {
            id: self.id.clone(),
            properties,
            transform: self.transform.clone(),
        }
    }

    /// Structural copy with a fresh id but identical transform
    /// (`spec.md` §4.3). Properties start empty, same rationale as
    /// [`SourceVertex::sampled_clone`].
    #[must_use]
    pub fn clone_structural(&self, fresh_id: VertexId) -> Self {
        Self {
            id: fresh_id,
            properties: PropertyBag::new(),
            transform: self.transform.clone(),
        }
    }
}

/// A vertex in the DAG: either a data source or an operator.
pub enum Vertex {
    Source(SourceVertex),
    Operator(OperatorVertex),
}

impl Vertex {
    #[must_use]
    pub fn id(&self) -> &VertexId {
        match self {
            Self::Source(s) => s.id(),
            Self::Operator(o) => o.id(),
        }
    }

    #[must_use]
    pub fn properties(&self) -> &PropertyBag {
        match self {
            Self::Source(s) => s.properties(),
            Self::Operator(o) => o.properties(),
        }
    }

    pub fn properties_mut(&mut self) -> &mut PropertyBag {
        match self {
            Self::Source(s) => s.properties_mut(),
            Self::Operator(o) => o.properties_mut(),
        }
    }

    #[must_use]
    pub fn is_operator(&self) -> bool {
        matches!(self, Self::Operator(_))
    }

    /// Full copy preserving id, properties, restriction/transform.
    #[must_use]
    pub fn duplicate(&self) -> Self {
        match self {
            Self::Source(s) => Vertex::Source(s.duplicate()),
            Self::Operator(o) => Vertex::Operator(o.duplicate()),
        }
    }

    /// Copy this vertex's full property bag onto `other`, preserving
    /// permanent markers (`spec.md` §4.3 `copyExecutionPropertiesTo`).
    pub fn copy_execution_properties_to(&self, other: &mut Vertex) {
        self.properties().copy_to(other.properties_mut());
    }

    /// A fresh, empty-property structural copy of this vertex:
    /// [`SourceVertex::sampled_clone`] for sources, [`OperatorVertex::clone_structural`]
    /// for operators. `indices`/`original_parallelism` are only meaningful
    /// (and only consulted) for sources.
    #[must_use]
    pub fn structural_clone(
        &self,
        fresh_id: VertexId,
        indices: &[u32],
        original_parallelism: u32,
    ) -> Vertex {
        match self {
            Self::Source(s) => Vertex::Source(s.sampled_clone(fresh_id, indices.to_vec(), original_parallelism)),
            Self::Operator(o) => Vertex::Operator(o.clone_structural(fresh_id)),
        }
    }
}
