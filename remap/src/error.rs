//! Error types for map resolution and execution
//!
//! `MapError::MapNotFound` is ordinary control flow: it tells the caller to try
//! another alternative. Everything raised by user code or by nested calls is
//! wrapped once per layer so the chain mirrors the call structure, except
//! `Cancelled`, which every wrapping point passes through unchanged.

use crate::declaration::MapKind;
use crate::value::Value;
use miette::Diagnostic;
use remap_types::{CatalogError, SignatureError, StructuredType, TypePair};
use std::fmt;
use thiserror::Error;

/// Result type for mapping operations
pub type MapResult<T = Value> = Result<T, MapError>;

/// Position of a failing element inside a collection or tuple
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementLocation {
    /// Index into the source sequence
    Index(usize),
    /// Slot of a tuple
    Branch(usize),
    /// A source element compared against a destination element
    Match { source: usize, destination: usize },
}

impl fmt::Display for ElementLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElementLocation::Index(index) => write!(f, "index {index}"),
            ElementLocation::Branch(branch) => write!(f, "branch {branch}"),
            ElementLocation::Match {
                source,
                destination,
            } => write!(f, "source index {source} against destination index {destination}"),
        }
    }
}

/// Runtime mapping errors
#[derive(Error, Diagnostic, Debug, Clone)]
pub enum MapError {
    #[error("No map found for {pair}")]
    #[diagnostic(
        code(remap::map_not_found),
        help("Register a map for {pair}, or a generic map whose constraints accept it")
    )]
    MapNotFound { pair: TypePair },

    #[error("Mapping {pair} failed")]
    #[diagnostic(code(remap::mapping_failed))]
    Mapping {
        pair: TypePair,
        #[source]
        inner: Box<MapError>,
    },

    #[error("Matcher for {pair} failed")]
    #[diagnostic(
        code(remap::matcher_failed),
        help("Matchers are expected to be pure predicates")
    )]
    Matcher {
        pair: TypePair,
        #[source]
        inner: Box<MapError>,
    },

    #[error("Mapping {pair} failed at {location}")]
    #[diagnostic(code(remap::collection_failed))]
    Collection {
        pair: TypePair,
        location: ElementLocation,
        #[source]
        inner: Box<MapError>,
    },

    #[error("Cannot merge into read-only destination {pair}")]
    #[diagnostic(
        code(remap::read_only_destination),
        help("Set MergeCollectionOptions::recreate_readonly to replace the destination instead")
    )]
    ReadOnlyDestination { pair: TypePair },

    #[error("Ambiguous maps for {pair} in provider {provider}: {first} and {second}")]
    #[diagnostic(
        code(remap::ambiguous_map),
        help("Declare a more specific map or remove one of the overlapping generic maps")
    )]
    AmbiguousMap {
        pair: TypePair,
        provider: String,
        first: TypePair,
        second: TypePair,
    },

    #[error("Factory for {pair} has been disposed")]
    #[diagnostic(code(remap::disposed))]
    Disposed { pair: TypePair },

    #[error("Cannot default-construct {ty}")]
    #[diagnostic(
        code(remap::not_constructible),
        help("Declare a new map for the pair, or make the destination default-constructible")
    )]
    NotConstructible { ty: StructuredType },

    #[error("Value type {ty} contains itself by value")]
    #[diagnostic(
        code(remap::cyclic_value_type),
        help("Break the cycle with a reference-typed field")
    )]
    CyclicValueType { ty: StructuredType },

    #[error("Expected {expected} value, found {found}")]
    #[diagnostic(code(remap::unexpected_value))]
    UnexpectedValue { expected: String, found: String },

    #[error("{message}")]
    #[diagnostic(code(remap::failed))]
    Failed { message: String },

    #[error("Mapping was cancelled")]
    #[diagnostic(code(remap::cancelled))]
    Cancelled,
}

impl MapError {
    pub fn not_found(pair: TypePair) -> Self {
        MapError::MapNotFound { pair }
    }

    /// Error raised by user code
    pub fn failed(message: impl Into<String>) -> Self {
        MapError::Failed {
            message: message.into(),
        }
    }

    pub fn unexpected(expected: impl fmt::Display, found: &Value) -> Self {
        MapError::UnexpectedValue {
            expected: expected.to_string(),
            found: found.kind_name().to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, MapError::MapNotFound { .. })
    }

    /// Not-found signal for exactly this pair
    pub fn is_not_found_for(&self, pair: &TypePair) -> bool {
        matches!(self, MapError::MapNotFound { pair: p } if p == pair)
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, MapError::Cancelled)
    }

    /// Directly wrapped error, if any
    pub fn inner(&self) -> Option<&MapError> {
        match self {
            MapError::Mapping { inner, .. }
            | MapError::Matcher { inner, .. }
            | MapError::Collection { inner, .. } => Some(inner),
            _ => None,
        }
    }

    /// Innermost error of the chain
    pub fn root_cause(&self) -> &MapError {
        let mut current = self;
        while let Some(inner) = current.inner() {
            current = inner;
        }
        current
    }

    /// Number of wrapping layers above the root cause
    pub fn depth(&self) -> usize {
        std::iter::successors(self.inner(), |e| e.inner()).count()
    }

    /// Wrap an error raised while running the map for `pair`.
    ///
    /// A not-found signal for `pair` itself is a runtime rejection and stays
    /// unwrapped so callers can fall through.
    pub fn wrap_mapping(self, pair: &TypePair) -> Self {
        if self.is_cancelled() || self.is_not_found_for(pair) {
            return self;
        }
        MapError::Mapping {
            pair: pair.clone(),
            inner: Box::new(self),
        }
    }

    pub fn wrap_matcher(self, pair: &TypePair) -> Self {
        if self.is_cancelled() || self.is_not_found_for(pair) {
            return self;
        }
        MapError::Matcher {
            pair: pair.clone(),
            inner: Box::new(self),
        }
    }

    /// Wrap an element failure into the collection-scoped error for `pair`
    pub fn wrap_element(self, pair: &TypePair, location: ElementLocation) -> Self {
        if self.is_cancelled() {
            return self;
        }
        MapError::Collection {
            pair: pair.clone(),
            location,
            inner: Box::new(self),
        }
    }
}

/// Configuration errors raised while building a registry
#[derive(Error, Diagnostic, Debug, Clone, PartialEq)]
pub enum RegistryError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Catalog(#[from] CatalogError),

    #[error("Provider {provider} declares more than one {kind} map for {pair}")]
    #[diagnostic(
        code(remap::registry::duplicate_map),
        help("Each provider may declare at most one map of a kind for a given pair")
    )]
    DuplicateMap {
        provider: String,
        kind: MapKind,
        pair: TypePair,
    },

    #[error("Provider {provider} declares an invalid generic map")]
    #[diagnostic(code(remap::registry::invalid_signature))]
    InvalidSignature {
        provider: String,
        #[source]
        source: SignatureError,
    },
}
