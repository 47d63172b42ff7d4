//! Strongly-typed execution properties attached to vertices and edges.
//!
//! `spec.md` §3/§4.1 describes a "reflective keyed property bag" in the
//! source system, but §9's design notes say this is better expressed in a
//! systems language as a tagged-variant record with a small open registry for
//! cross-cutting annotations. [`PropertyKind`] is the closed tag set from the
//! §3 table; [`PropertyValue`] is the corresponding closed-per-kind value; the
//! dynamic lookup-by-kind behaviour is kept (in [`PropertyBag`]) only because
//! the reshaper genuinely needs to copy whole bags between elements without
//! knowing which kinds are present ahead of time.

use crate::codec::{DecoderFactory, EncoderFactory, KeyExtractor};
use crate::error::ReshapeError;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Closed set of execution-property kinds (`spec.md` §3 table).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PropertyKind {
    Parallelism,
    CommunicationPattern,
    DataStore,
    DataPersistence,
    DataFlow,
    KeyExtractor,
    Encoder,
    Decoder,
    KeyEncoder,
    KeyDecoder,
    AdditionalOutputTag,
    MetricCollection,
    ShuffleDistribution,
    OneToOneDistribution,
    DuplicateEdgeGroup,
    ResourceSlot,
}

impl fmt::Display for PropertyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Parallelism => "Parallelism",
            Self::CommunicationPattern => "CommunicationPattern",
            Self::DataStore => "DataStore",
            Self::DataPersistence => "DataPersistence",
            Self::DataFlow => "DataFlow",
            Self::KeyExtractor => "KeyExtractor",
            Self::Encoder => "Encoder",
            Self::Decoder => "Decoder",
            Self::KeyEncoder => "KeyEncoder",
            Self::KeyDecoder => "KeyDecoder",
            Self::AdditionalOutputTag => "AdditionalOutputTag",
            Self::MetricCollection => "MetricCollection",
            Self::ShuffleDistribution => "ShuffleDistribution",
            Self::OneToOneDistribution => "OneToOneDistribution",
            Self::DuplicateEdgeGroup => "DuplicateEdgeGroup",
            Self::ResourceSlot => "ResourceSlot",
        };
        f.write_str(s)
    }
}

/// The three communication patterns an edge can carry (`spec.md` §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommunicationPattern {
    OneToOne,
    BroadCast,
    Shuffle,
}

impl fmt::Display for CommunicationPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::OneToOne => "OneToOne",
            Self::BroadCast => "BroadCast",
            Self::Shuffle => "Shuffle",
        };
        f.write_str(s)
    }
}

/// Where an edge's data is materialised. `spec.md` leaves this domain open
/// ("{Memory, SerializedMemory, Disk, …}"); `Custom` is the "small open
/// registry" the design notes call for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataStore {
    Memory,
    SerializedMemory,
    Disk,
    Custom(String),
}

impl fmt::Display for DataStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Memory => f.write_str("Memory"),
            Self::SerializedMemory => f.write_str("SerializedMemory"),
            Self::Disk => f.write_str("Disk"),
            Self::Custom(s) => f.write_str(s),
        }
    }
}

/// Retention policy for an edge's materialised data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataPersistence {
    Keep,
    Discard,
}

/// Transport direction for an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataFlow {
    Push,
    Pull,
}

/// A half-open key range `[start, end)`, used by [`ShuffleDistribution`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyRange {
    pub start: u32,
    pub end: u32,
}

impl KeyRange {
    #[must_use]
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }
}

/// Sampled shuffle read window: the original parallelism the ranges are
/// drawn against, plus a map from sampled task index to the key range it
/// reads. `spec.md` §4.5.1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShuffleDistribution {
    pub original_parallelism: u32,
    pub ranges: BTreeMap<u32, KeyRange>,
}

/// Sampled one-to-one read mapping: sampled task index to the original task
/// index it reads from. `spec.md` §4.5.1.
pub type OneToOneDistribution = BTreeMap<u32, u32>;

/// A value drawn from one kind's closed domain (`spec.md` §3 table).
#[derive(Debug, Clone)]
pub enum PropertyValue {
    Parallelism(u32),
    CommunicationPattern(CommunicationPattern),
    DataStore(DataStore),
    DataPersistence(DataPersistence),
    DataFlow(DataFlow),
    KeyExtractor(Arc<dyn KeyExtractor>),
    Encoder(Arc<dyn EncoderFactory>),
    Decoder(Arc<dyn DecoderFactory>),
    KeyEncoder(Arc<dyn EncoderFactory>),
    KeyDecoder(Arc<dyn DecoderFactory>),
    AdditionalOutputTag(String),
    MetricCollection(u64),
    ShuffleDistribution(ShuffleDistribution),
    OneToOneDistribution(OneToOneDistribution),
    DuplicateEdgeGroup(String),
    ResourceSlot(bool),
}

impl PropertyValue {
    fn kind(&self) -> PropertyKind {
        match self {
            Self::Parallelism(_) => PropertyKind::Parallelism,
            Self::CommunicationPattern(_) => PropertyKind::CommunicationPattern,
            Self::DataStore(_) => PropertyKind::DataStore,
            Self::DataPersistence(_) => PropertyKind::DataPersistence,
            Self::DataFlow(_) => PropertyKind::DataFlow,
            Self::KeyExtractor(_) => PropertyKind::KeyExtractor,
            Self::Encoder(_) => PropertyKind::Encoder,
            Self::Decoder(_) => PropertyKind::Decoder,
            Self::KeyEncoder(_) => PropertyKind::KeyEncoder,
            Self::KeyDecoder(_) => PropertyKind::KeyDecoder,
            Self::AdditionalOutputTag(_) => PropertyKind::AdditionalOutputTag,
            Self::MetricCollection(_) => PropertyKind::MetricCollection,
            Self::ShuffleDistribution(_) => PropertyKind::ShuffleDistribution,
            Self::OneToOneDistribution(_) => PropertyKind::OneToOneDistribution,
            Self::DuplicateEdgeGroup(_) => PropertyKind::DuplicateEdgeGroup,
            Self::ResourceSlot(_) => PropertyKind::ResourceSlot,
        }
    }

    /// Structural equality used to detect conflicting permanent overrides.
    /// Codec/extractor trait objects compare by pointer identity, which is
    /// the best we can do for opaque factories and is sufficient for the
    /// pass's own bookkeeping (it never constructs two distinct factory
    /// instances meant to compare equal).
    fn conflicts_with(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Parallelism(a), Self::Parallelism(b)) => a != b,
            (Self::CommunicationPattern(a), Self::CommunicationPattern(b)) => a != b,
            (Self::DataStore(a), Self::DataStore(b)) => a != b,
            (Self::DataPersistence(a), Self::DataPersistence(b)) => a != b,
            (Self::DataFlow(a), Self::DataFlow(b)) => a != b,
            (Self::AdditionalOutputTag(a), Self::AdditionalOutputTag(b)) => a != b,
            (Self::MetricCollection(a), Self::MetricCollection(b)) => a != b,
            (Self::ShuffleDistribution(a), Self::ShuffleDistribution(b)) => a != b,
            (Self::OneToOneDistribution(a), Self::OneToOneDistribution(b)) => a != b,
            (Self::DuplicateEdgeGroup(a), Self::DuplicateEdgeGroup(b)) => a != b,
            (Self::ResourceSlot(a), Self::ResourceSlot(b)) => a != b,
            (Self::KeyExtractor(a), Self::KeyExtractor(b)) => !Arc::ptr_eq(a, b),
            (Self::Encoder(a), Self::Encoder(b)) => !Arc::ptr_eq(a, b),
            (Self::Decoder(a), Self::Decoder(b)) => !Arc::ptr_eq(a, b),
            (Self::KeyEncoder(a), Self::KeyEncoder(b)) => !Arc::ptr_eq(a, b),
            (Self::KeyDecoder(a), Self::KeyDecoder(b)) => !Arc::ptr_eq(a, b),
            _ => true,
        }
    }
}

struct PropertyEntry {
    value: PropertyValue,
    permanent: bool,
}

/// Mapping from property kind to a value drawn from that kind's domain.
///
/// `spec.md` §4.1: look up a property (present-with-value or absent), set a
/// property permanently (cannot later be overridden by a non-permanent set
/// with a different value), and copy all properties from one element to
/// another (permanent markers preserved).
#[derive(Default)]
pub struct PropertyBag {
    entries: BTreeMap<PropertyKind, PropertyEntry>,
}

impl PropertyBag {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a property by kind.
    #[must_use]
    pub fn get(&self, kind: PropertyKind) -> Option<&PropertyValue> {
        self.entries.get(&kind).map(|e| &e.value)
    }

    /// True if `kind` was set with [`set_permanent`](Self::set).
    #[must_use]
    pub fn is_permanent(&self, kind: PropertyKind) -> bool {
        self.entries.get(&kind).is_some_and(|e| e.permanent)
    }

    /// Look up a required property, producing
    /// [`ReshapeError::MissingRequiredProperty`] if absent.
    pub fn require(
        &self,
        kind: PropertyKind,
        element: impl Into<String>,
    ) -> Result<&PropertyValue, ReshapeError> {
        self.get(kind)
            .ok_or_else(|| ReshapeError::MissingRequiredProperty {
                element: element.into(),
                kind,
            })
    }

    /// Set a property. If a permanent entry for this kind already exists
    /// with a different value, fails with
    /// [`ReshapeError::PermanentConflict`]. Setting the same value again
    /// (permanent or not) is a no-op that preserves the existing
    /// permanence.
    pub fn set(
        &mut self,
        value: PropertyValue,
        permanent: bool,
        element: impl Into<String>,
    ) -> Result<(), ReshapeError> {
        let kind = value.kind();
        if let Some(existing) = self.entries.get(&kind) {
            if existing.value.conflicts_with(&value) {
                if existing.permanent {
                    return Err(ReshapeError::PermanentConflict {
                        element: element.into(),
                        kind,
                    });
                }
                // Non-permanent existing value: falls through to overwrite.
            } else {
                // Identical value re-set: permanence only ever strengthens.
                let upgraded = existing.permanent || permanent;
                self.entries
                    .insert(kind, PropertyEntry { value, permanent: upgraded });
                return Ok(());
            }
        }
        self.entries.insert(kind, PropertyEntry { value, permanent });
        Ok(())
    }

    /// Convenience for `set(value, true, element)`.
    pub fn set_permanent(
        &mut self,
        value: PropertyValue,
        element: impl Into<String>,
    ) -> Result<(), ReshapeError> {
        self.set(value, true, element)
    }

    /// Bypasses the permanent-conflict check. Reserved for the reshaper's
    /// own bookkeeping on vertices it just constructed (e.g. overriding a
    /// sampled clone's `Parallelism` to `Ps`) where there is, by
    /// construction, no prior caller-visible permanent value to protect.
    pub(crate) fn force_set(&mut self, value: PropertyValue, permanent: bool) {
        self.entries.insert(value.kind(), PropertyEntry { value, permanent });
    }

    /// Copy every property from `self` into `other`, preserving permanence.
    /// `spec.md` §4.1 / §4.3 (`copyExecutionPropertiesTo`).
    pub fn copy_to(&self, other: &mut PropertyBag) {
        for (kind, entry) in &self.entries {
            other.entries.insert(
                *kind,
                PropertyEntry {
                    value: entry.value.clone(),
                    permanent: entry.permanent,
                },
            );
        }
    }
}

impl Clone for PropertyBag {
    fn clone(&self) -> Self {
        let mut out = PropertyBag::new();
        self.copy_to(&mut out);
        out
    }
}
