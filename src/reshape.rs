//! The sampling reshaper: the pass itself (`spec.md` §4.5).

use crate::codec::pair_codec;
use crate::dag::{Dag, DagBuilder};
use crate::edge::{edge_label, unsupported_pattern, Edge};
use crate::error::ReshapeError;
use crate::factories::{aggregate_metric_vertex, metric_collect_vertex};
use crate::ids::{EdgeId, IdGen, VertexId};
#[cfg(feature = "metrics")]
use crate::metrics::MetricsCollector;
use crate::property::{
    CommunicationPattern, DataFlow, DataPersistence, DataStore, KeyRange, OneToOneDistribution,
    PropertyKind, PropertyValue, ShuffleDistribution,
};
use crate::transform::{Transform, HASH_RANGE_MULTIPLIER_DEFAULT};
use crate::vertex::{OperatorVertex, Vertex};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::{BTreeMap, HashMap, HashSet};

/// Sampling configuration (`spec.md` §4.5 "Sampling policy" table).
#[derive(Debug, Clone, Copy)]
pub struct SamplingPolicy {
    sample_rate: f64,
    hash_range_multiplier: u32,
    rng_seed: Option<u64>,
}

impl SamplingPolicy {
    /// Construct a policy.
    ///
    /// # Errors
    ///
    /// [`ReshapeError::InvalidPropertyValue`] if `sample_rate` is not in
    /// `(0, 1]`, or `hash_range_multiplier` is zero.
    pub fn new(sample_rate: f64, hash_range_multiplier: u32, rng_seed: Option<u64>) -> Result<Self, ReshapeError> {
        if !(sample_rate > 0.0 && sample_rate <= 1.0) {
            return Err(ReshapeError::InvalidPropertyValue {
                kind: PropertyKind::Parallelism,
                reason: format!("sampleRate must be in (0, 1], got {sample_rate}"),
            });
        }
        if hash_range_multiplier == 0 {
            return Err(ReshapeError::InvalidPropertyValue {
                kind: PropertyKind::Parallelism,
                reason: "hashRangeMultiplier must be a positive integer".to_string(),
            });
        }
        Ok(Self {
            sample_rate,
            hash_range_multiplier,
            rng_seed,
        })
    }

    /// A policy using the default hash range multiplier and a random seed,
    /// for tests and demos only (`spec.md` §9: "random seeding is a
    /// test/demo default only").
    ///
    /// # Errors
    ///
    /// See [`SamplingPolicy::new`].
    pub fn with_sample_rate(sample_rate: f64) -> Result<Self, ReshapeError> {
        Self::new(sample_rate, HASH_RANGE_MULTIPLIER_DEFAULT, None)
    }

    #[must_use]
    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    #[must_use]
    pub fn hash_range_multiplier(&self) -> u32 {
        self.hash_range_multiplier
    }

    #[must_use]
    pub fn rng_seed(&self) -> Option<u64> {
        self.rng_seed
    }
}

/// Per-destination aggregator summary: the `MetricCollection` id shared by
/// every `MetricCollect` vertex feeding that destination's aggregator.
pub struct ReshapeReport {
    /// Number of distinct candidate (destination, incoming-Shuffle-edge)
    /// pairs rewritten.
    pub shuffle_edges_rewritten: u32,
    /// Total `MetricCollect` vertices created.
    pub metric_collect_vertices: u32,
    /// `destination vertex id -> MetricCollection id` for every candidate
    /// destination touched by this `apply` call.
    pub aggregation_fixtures: BTreeMap<VertexId, u64>,
}

/// The sampling skew-reshaping pass (`spec.md` §4.5).
///
/// `apply` takes `&self`, not `&mut self`: every piece of mutable state used
/// during a single rewrite — the RNG, id generator, `mcId` counter, and
/// aggregation-fixture memoisation table — is constructed fresh inside the
/// call and discarded at its end (`spec.md` §3 "Lifecycle", §5 "the pass is
/// not thread-safe for concurrent `apply` calls sharing an instance unless
/// the RNG is per-invocation"). This makes concurrent calls on a shared
/// `&SamplingReshaper` safe.
pub struct SamplingReshaper {
    policy: SamplingPolicy,
    #[cfg(feature = "metrics")]
    metrics: Option<MetricsCollector>,
}

impl SamplingReshaper {
    #[must_use]
    pub fn new(policy: SamplingPolicy) -> Self {
        Self {
            policy,
            #[cfg(feature = "metrics")]
            metrics: None,
        }
    }

    /// Attach a metrics collector; pass-level counters are recorded on it
    /// during `apply` (mirrors the teacher crate's `Pipeline::set_metrics`).
    #[cfg(feature = "metrics")]
    #[must_use]
    pub fn with_metrics(mut self, metrics: MetricsCollector) -> Self {
        self.metrics = Some(metrics);
        self
    }

    #[must_use]
    pub fn policy(&self) -> &SamplingPolicy {
        &self.policy
    }

    /// Rewrite `dag`, producing a new DAG plus a report of what was
    /// rewritten.
    ///
    /// # Errors
    ///
    /// See `spec.md` §7: any of the six [`ReshapeError`] variants, depending
    /// on what is malformed about `dag` relative to the policy in force.
    pub fn apply(&self, dag: &Dag) -> Result<(Dag, ReshapeReport), ReshapeError> {
        tracing::info!(
            sample_rate = self.policy.sample_rate,
            hash_range_multiplier = self.policy.hash_range_multiplier,
            "starting sampling reshape pass"
        );

        let mut rng = match self.policy.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let mut state = RewriteState::new(dag, self.policy);

        for vertex_id in dag.topo_order() {
            let vertex = dag
                .vertex(vertex_id)
                .expect("topo_order only lists vertices present in the dag");
            if !vertex.is_operator() {
                continue;
            }

            let incoming = dag.incoming_edges(vertex_id);
            let has_side_output_tag = incoming
                .iter()
                .any(|e| e.properties().get(PropertyKind::AdditionalOutputTag).is_some());
            if has_side_output_tag {
                continue;
            }

            let shuffle_incoming: Vec<&Edge> = incoming
                .into_iter()
                .filter(|e| e.pattern() == CommunicationPattern::Shuffle)
                .collect();
            if shuffle_incoming.is_empty() {
                continue;
            }

            for e in shuffle_incoming {
                state.rewrite_candidate_edge(vertex_id, e, &mut rng)?;
            }
        }

        let shuffle_edges_rewritten = state.shuffle_edges_rewritten;
        let metric_collect_vertices = state.metric_collect_vertices;
        let (new_dag, aggregation_fixtures) = state.finish()?;

        #[cfg(feature = "metrics")]
        if let Some(metrics) = &self.metrics {
            metrics.set_counter("dagshear.shuffle_edges_rewritten", u64::from(shuffle_edges_rewritten));
            metrics.set_counter("dagshear.metric_collect_vertices", u64::from(metric_collect_vertices));
            metrics.set_counter("dagshear.aggregation_fixtures", aggregation_fixtures.len() as u64);
        }

        tracing::info!(
            shuffle_edges_rewritten,
            metric_collect_vertices,
            aggregation_fixtures = aggregation_fixtures.len(),
            "finished sampling reshape pass"
        );

        Ok((
            new_dag,
            ReshapeReport {
                shuffle_edges_rewritten,
                metric_collect_vertices,
                aggregation_fixtures,
            },
        ))
    }
}

fn sampled_parallelism(p_orig: u32, sample_rate: f64) -> u32 {
    ((f64::from(p_orig) * sample_rate).round() as u32).max(1)
}

fn sample_indices(rng: &mut StdRng, p_orig: u32, ps: u32) -> Vec<u32> {
    let mut chosen: Vec<u32> = rand::seq::index::sample(rng, p_orig as usize, ps as usize)
        .into_iter()
        .map(|i| i as u32)
        .collect();
    chosen.sort_unstable();
    chosen
}

fn required_parallelism(vertex: &Vertex, label: &str) -> Result<u32, ReshapeError> {
    match vertex.properties().require(PropertyKind::Parallelism, label)? {
        PropertyValue::Parallelism(p) => Ok(*p),
        _ => unreachable!("PropertyKind::Parallelism always carries PropertyValue::Parallelism"),
    }
}

/// `(abv id, dummy id, mcId)` shared by every shuffle edge feeding the same
/// destination (`spec.md` §4.5.2).
type AggregationFixture = (VertexId, VertexId, u64);

/// Accumulates the output of one `apply` call: the newly synthesised
/// vertices and edges, plus bookkeeping for edges that must be copied
/// through untouched but annotated (`spec.md` §4.5.1's `DuplicateEdgeGroup`
/// tagging of the *original* edge).
struct RewriteState<'a> {
    input: &'a Dag,
    policy: SamplingPolicy,
    id_gen: IdGen,
    next_mc_id: u64,
    aggregation_fixtures: HashMap<VertexId, AggregationFixture>,
    new_vertices: Vec<Vertex>,
    new_edges: Vec<Edge>,
    /// Extra properties to stamp onto an *original* edge (one the pass never
    /// constructs a replacement for) when it is copied through in
    /// [`finish`](Self::finish).
    extra_edge_properties: HashMap<EdgeId, Vec<(PropertyValue, bool)>>,
    /// Original edges the pass replaces outright (the candidate's own
    /// Shuffle edge, step 9); these are skipped during copy-through.
    handled_edge_ids: HashSet<EdgeId>,
    shuffle_edges_rewritten: u32,
    metric_collect_vertices: u32,
}

impl<'a> RewriteState<'a> {
    fn new(input: &'a Dag, policy: SamplingPolicy) -> Self {
        Self {
            input,
            policy,
            id_gen: IdGen::new(),
            next_mc_id: 1,
            aggregation_fixtures: HashMap::new(),
            new_vertices: Vec::new(),
            new_edges: Vec::new(),
            extra_edge_properties: HashMap::new(),
            handled_edge_ids: HashSet::new(),
            shuffle_edges_rewritten: 0,
            metric_collect_vertices: 0,
        }
    }

    /// `spec.md` §4.5 "Per-candidate rewrite", steps 1-10, for one incoming
    /// Shuffle edge `e` of candidate `dest_id`.
    fn rewrite_candidate_edge(&mut self, dest_id: &VertexId, e: &Edge, rng: &mut StdRng) -> Result<(), ReshapeError> {
        let label = edge_label(e.id());
        let src_id = e.src().clone();
        let src_vertex = self
            .input
            .vertex(&src_id)
            .ok_or_else(|| ReshapeError::UnknownEndpoint {
                edge: e.id().to_string(),
                endpoint: src_id.to_string(),
            })?;
        let dest_vertex = self
            .input
            .vertex(dest_id)
            .expect("dest_id came from the input dag's own topo_order");

        // Step 1.
        let p_orig = required_parallelism(src_vertex, &label)?;
        let p_dst = required_parallelism(dest_vertex, &label)?;

        // Step 2.
        let ps = sampled_parallelism(p_orig, self.policy.sample_rate());
        let indices = sample_indices(rng, p_orig, ps);

        // Step 3.
        let (sampled_src_id, start_id) = self.build_sampling_subdag(&src_id, &indices, p_orig)?;

        // Step 4.
        let (abv_id, dummy_id, mc_id) = self.get_or_create_fixture(dest_id)?;

        // Step 5.
        let control_edge_id = self.id_gen.fresh_edge_id("ctrl");
        self.new_edges
            .push(Edge::new(control_edge_id, dummy_id, start_id, CommunicationPattern::BroadCast));

        // Step 6.
        let mcv = metric_collect_vertex(e, p_dst, self.policy.hash_range_multiplier(), ps, mc_id, &mut self.id_gen)?;
        let mcv_id = mcv.id().clone();
        self.new_vertices.push(Vertex::Operator(mcv));
        self.metric_collect_vertices += 1;

        // Step 7.
        let sampled_to_mc_id = self.id_gen.fresh_edge_id("sampled-to-mc");
        let mut sampled_to_mc = Edge::new(sampled_to_mc_id, sampled_src_id, mcv_id.clone(), CommunicationPattern::OneToOne);
        if let Some(encoder) = e.properties().get(PropertyKind::Encoder) {
            sampled_to_mc.properties_mut().set(encoder.clone(), false, "sampled-to-mc edge")?;
        }
        if let Some(decoder) = e.properties().get(PropertyKind::Decoder) {
            sampled_to_mc.properties_mut().set(decoder.clone(), false, "sampled-to-mc edge")?;
        }
        self.new_edges.push(sampled_to_mc);

        // Step 8 + 10.
        let key_extractor = e.properties().require(PropertyKind::KeyExtractor, label.clone())?.clone();
        let (pair_encoder, pair_decoder) = pair_codec();
        let mc_to_ab_id = self.id_gen.fresh_edge_id("mc-to-ab");
        let mut mc_to_ab = Edge::new(mc_to_ab_id, mcv_id, abv_id, CommunicationPattern::Shuffle);
        {
            let props = mc_to_ab.properties_mut();
            props.set_permanent(PropertyValue::DataStore(DataStore::SerializedMemory), "mc-to-ab edge")?;
            props.set_permanent(PropertyValue::DataPersistence(DataPersistence::Discard), "mc-to-ab edge")?;
            props.set_permanent(PropertyValue::DataFlow(DataFlow::Push), "mc-to-ab edge")?;
            props.set_permanent(key_extractor, "mc-to-ab edge")?;
            props.set_permanent(PropertyValue::AdditionalOutputTag("DynOptData".to_string()), "mc-to-ab edge")?;
            props.set_permanent(PropertyValue::Encoder(pair_encoder), "mc-to-ab edge")?;
            props.set_permanent(PropertyValue::Decoder(pair_decoder), "mc-to-ab edge")?;
            props.set_permanent(PropertyValue::MetricCollection(mc_id), "mc-to-ab edge")?;
        }
        self.new_edges.push(mc_to_ab);

        // Step 9.
        let mut replacement = e.duplicate();
        replacement
            .properties_mut()
            .set_permanent(PropertyValue::MetricCollection(mc_id), "rewritten shuffle edge")?;
        self.handled_edge_ids.insert(e.id().clone());
        self.new_edges.push(replacement);

        self.shuffle_edges_rewritten += 1;
        Ok(())
    }

    /// `spec.md` §4.5.2. Returns the existing fixture for `dest_id` if one
    /// was already created during this `apply` call, else builds a fresh
    /// one.
    fn get_or_create_fixture(&mut self, dest_id: &VertexId) -> Result<AggregationFixture, ReshapeError> {
        if let Some(fixture) = self.aggregation_fixtures.get(dest_id) {
            return Ok(fixture.clone());
        }

        let abv = aggregate_metric_vertex(&mut self.id_gen);
        let abv_id = abv.id().clone();

        let mc_id = self.next_mc_id;
        self.next_mc_id += 1;

        let dummy_id = self.id_gen.fresh_vertex_id("dummy");
        let mut dummy = OperatorVertex::new(dummy_id.clone(), Transform::Identity);
        abv.properties().copy_to(dummy.properties_mut());

        let abv_to_dummy_id = self.id_gen.fresh_edge_id("ab-to-dummy");
        let abv_to_dummy = Edge::new(abv_to_dummy_id, abv_id.clone(), dummy_id.clone(), CommunicationPattern::OneToOne);

        self.new_vertices.push(Vertex::Operator(abv));
        self.new_vertices.push(Vertex::Operator(dummy));
        self.new_edges.push(abv_to_dummy);

        let fixture = (abv_id, dummy_id, mc_id);
        self.aggregation_fixtures.insert(dest_id.clone(), fixture.clone());
        Ok(fixture)
    }

    /// `spec.md` §4.5.1: recursively build the sampling sub-DAG rooted at
    /// `t_id`. Returns `(sampled clone id, upstream entry point id)`.
    fn build_sampling_subdag(
        &mut self,
        t_id: &VertexId,
        indices: &[u32],
        p_orig: u32,
    ) -> Result<(VertexId, VertexId), ReshapeError> {
        let t = self
            .input
            .vertex(t_id)
            .expect("every edge endpoint walked here was validated by the input dag's own builder");
        let ps = indices.len() as u32;

        let fresh_id = self.id_gen.fresh_vertex_id(&format!("sampled-{t_id}"));
        let mut clone = t.structural_clone(fresh_id.clone(), indices, p_orig);
        t.copy_execution_properties_to(&mut clone);
        clone.properties_mut().force_set(PropertyValue::Parallelism(ps), true);

        let mut start_id = fresh_id.clone();

        let incoming = self.input.incoming_edges(t_id);
        let t_incoming_count = incoming.len();

        for ein in incoming {
            match ein.pattern() {
                CommunicationPattern::Shuffle => {
                    let mirror_id = self.id_gen.fresh_edge_id("sampled-shuffle");
                    let mut mirror = Edge::new(mirror_id, ein.src().clone(), fresh_id.clone(), CommunicationPattern::Shuffle);
                    ein.properties().copy_to(mirror.properties_mut());
                    self.ensure_duplicate_edge_group(ein, &mut mirror, "group");
                    let dist = ShuffleDistribution {
                        original_parallelism: p_orig,
                        ranges: build_shuffle_ranges(indices),
                    };
                    mirror
                        .properties_mut()
                        .set_permanent(PropertyValue::ShuffleDistribution(dist), "mirrored shuffle edge")?;
                    self.new_edges.push(mirror);
                }
                CommunicationPattern::BroadCast => {
                    let mirror_id = self.id_gen.fresh_edge_id("sampled-broadcast");
                    let mut mirror = Edge::new(mirror_id, ein.src().clone(), fresh_id.clone(), CommunicationPattern::BroadCast);
                    ein.properties().copy_to(mirror.properties_mut());
                    self.ensure_duplicate_edge_group(ein, &mut mirror, "group");
                    self.new_edges.push(mirror);
                }
                CommunicationPattern::OneToOne => {
                    let data_store = ein.properties().require(PropertyKind::DataStore, edge_label(ein.id()))?;
                    let is_memory = matches!(data_store, PropertyValue::DataStore(DataStore::Memory));

                    if is_memory && t_incoming_count == 1 {
                        let (sampled_upstream_id, returned_start) =
                            self.build_sampling_subdag(ein.src(), indices, p_orig)?;
                        start_id = returned_start;

                        let mirror_id = self.id_gen.fresh_edge_id("sampled-o2o");
                        let mut mirror = Edge::new(mirror_id, sampled_upstream_id, fresh_id.clone(), CommunicationPattern::OneToOne);
                        ein.properties().copy_to(mirror.properties_mut());
                        self.new_edges.push(mirror);
                    } else {
                        let mirror_id = self.id_gen.fresh_edge_id("sampled-o2o");
                        let mut mirror = Edge::new(mirror_id, ein.src().clone(), fresh_id.clone(), CommunicationPattern::OneToOne);
                        ein.properties().copy_to(mirror.properties_mut());
                        self.ensure_duplicate_edge_group(ein, &mut mirror, "Sampling-");
                        let dist: OneToOneDistribution =
                            indices.iter().enumerate().map(|(i, &orig)| (i as u32, orig)).collect();
                        mirror
                            .properties_mut()
                            .set_permanent(PropertyValue::OneToOneDistribution(dist), "mirrored one-to-one edge")?;
                        self.new_edges.push(mirror);
                    }
                }
                other => return Err(unsupported_pattern(ein.id(), &other.to_string())),
            }
        }

        self.new_vertices.push(clone);
        Ok((fresh_id, start_id))
    }

    /// Tag `ein` (deferred, via `extra_edge_properties`) and `mirror` with a
    /// shared `DuplicateEdgeGroup`, but only if `ein` does not already carry
    /// one — in which case `mirror` already inherited it via `copy_to`.
    fn ensure_duplicate_edge_group(&mut self, ein: &Edge, mirror: &mut Edge, prefix: &str) {
        if ein.properties().get(PropertyKind::DuplicateEdgeGroup).is_some() {
            return;
        }
        let group = self.id_gen.fresh_group_id(prefix);
        let value = PropertyValue::DuplicateEdgeGroup(group);
        mirror.properties_mut().force_set(value.clone(), true);
        self.extra_edge_properties
            .entry(ein.id().clone())
            .or_default()
            .push((value, true));
    }

    /// Materialise the rewritten DAG: untouched vertices and edges copied
    /// through (annotated per `extra_edge_properties` where applicable),
    /// plus every newly synthesised vertex and edge.
    fn finish(self) -> Result<(Dag, BTreeMap<VertexId, u64>), ReshapeError> {
        let mut builder = DagBuilder::new();

        for vertex in self.input.vertices() {
            builder.add_vertex(vertex.duplicate());
        }
        for edge in self.input.edges() {
            if self.handled_edge_ids.contains(edge.id()) {
                continue;
            }
            let mut copy = edge.duplicate();
            if let Some(extra) = self.extra_edge_properties.get(edge.id()) {
                for (value, permanent) in extra {
                    copy.properties_mut().force_set(value.clone(), *permanent);
                }
            }
            builder.connect_vertices(copy);
        }

        for vertex in self.new_vertices {
            builder.add_vertex(vertex);
        }
        for edge in self.new_edges {
            builder.connect_vertices(edge);
        }

        let dag = builder.build()?;
        let summary = self
            .aggregation_fixtures
            .into_iter()
            .map(|(dest, (_, _, mc_id))| (dest, mc_id))
            .collect();
        Ok((dag, summary))
    }
}

fn build_shuffle_ranges(indices: &[u32]) -> BTreeMap<u32, KeyRange> {
    indices
        .iter()
        .enumerate()
        .map(|(i, &idx)| (i as u32, KeyRange::new(idx, idx + 1)))
        .collect()
}
