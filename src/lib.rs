//! # dagshear
//!
//! The **sampling skew-reshaping pass** of a distributed dataflow compiler's
//! intermediate-representation (IR) DAG: a compile-time graph rewrite that
//! inserts a sampled sub-pipeline feeding `MetricCollect`/`AggregateMetric`
//! statistics vertices ahead of every shuffle edge eligible for skew-aware
//! repartitioning, without altering any pre-existing semantics of the graph.
//!
//! ## What this crate does
//!
//! Given an input [`Dag`](dag::Dag) built through [`DagBuilder`](dag::DagBuilder),
//! [`SamplingReshaper::apply`](reshape::SamplingReshaper::apply) walks it in
//! deterministic topological order, finds every *candidate* operator vertex
//! (one fed by a main-input Shuffle edge), and for each one:
//!
//! 1. mirrors the upstream region into a reduced-parallelism "sampling
//!    sub-DAG" (recursing further upstream through in-memory OneToOne
//!    producers, per [`reshape`]'s §4.5.1 sub-DAG builder),
//! 2. wires a `MetricCollect` vertex per sampled task that buckets elements
//!    by hashed key and measures serialised byte size per bucket,
//! 3. wires a single `AggregateMetric` vertex per destination that combines
//!    every bucket's statistics into one histogram,
//! 4. annotates the original edge with the `MetricCollection` id tying it to
//!    its sibling statistics edge.
//!
//! The pass never mutates its input: it consumes a borrowed [`Dag`] and
//! returns a freshly built one plus a [`ReshapeReport`](reshape::ReshapeReport).
//!
//! ## Module map
//!
//! - [`property`] — the closed-domain execution-property model.
//! - [`ids`] — vertex/edge identifiers and the per-call id generator.
//! - [`edge`] / [`vertex`] — the DAG's two entity kinds.
//! - [`dag`] — the DAG value and its validating builder.
//! - [`codec`] — key-extraction and codec factory contracts (plus the one
//!   concrete pair codec the rewrite itself needs).
//! - [`transform`] — the `MetricCollect`/`AggregateMetric` transform
//!   configuration and runtime accumulator logic.
//! - [`factories`] — constructors for the two statistics vertex kinds.
//! - [`reshape`] — the pass itself: [`SamplingPolicy`](reshape::SamplingPolicy)
//!   and [`SamplingReshaper`](reshape::SamplingReshaper).
//! - [`error`] — the closed [`ReshapeError`](error::ReshapeError) taxonomy.
//! - [`metrics`] (feature `metrics`, default on) — pass-level counters.
//! - [`testing`] (feature `testing`, default on) — DAG fixture builders and
//!   structural-equality assertions for tests.
//!
//! ## Example
//!
//! ```
//! use dagshear::dag::DagBuilder;
//! use dagshear::reshape::{SamplingPolicy, SamplingReshaper};
//! use dagshear::testing::{test_operator, test_shuffle_edge, test_source};
//!
//! let mut builder = DagBuilder::new();
//! builder.add_vertex(test_source("A", 4));
//! builder.add_vertex(test_operator("B", 2));
//! builder.connect_vertices(test_shuffle_edge("e-A-B", "A", "B"));
//! let dag = builder.build()?;
//!
//! let policy = SamplingPolicy::new(0.5, 10, Some(0))?;
//! let reshaper = SamplingReshaper::new(policy);
//! let (rewritten, report) = reshaper.apply(&dag)?;
//!
//! assert_eq!(report.shuffle_edges_rewritten, 1);
//! assert!(rewritten.vertices().count() > dag.vertices().count());
//! # Ok::<(), dagshear::error::ReshapeError>(())
//! ```

pub mod codec;
pub mod dag;
pub mod edge;
pub mod error;
pub mod factories;
pub mod ids;
pub mod property;
pub mod reshape;
pub mod transform;
pub mod vertex;

#[cfg(feature = "metrics")]
pub mod metrics;

#[cfg(feature = "testing")]
pub mod testing;

pub use dag::{Dag, DagBuilder};
pub use edge::Edge;
pub use error::ReshapeError;
pub use property::{PropertyBag, PropertyKind, PropertyValue};
pub use reshape::{ReshapeReport, SamplingPolicy, SamplingReshaper};
pub use vertex::Vertex;
