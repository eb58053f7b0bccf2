//! remap
//!
//! Runtime object-to-object mapping: resolves a map for a requested
//! (source, destination) type pair from concrete and generic declarations,
//! and reconciles whole collections element by element.
//!
//! ## Architecture
//!
//! - **Registry**: provider declarations, indexed once at start-up
//! - **Resolver**: exact lookup, generic constraint solving, merge fallback
//! - **Factories**: reusable, disposable handles to a resolved map
//! - **Dispatchers**: registry, collection and composite mappers plus matchers
//! - **Collections**: sequence and tuple mapping, merge reconciliation with
//!   bounded parallelism in async mode
//!
//! ## Example
//!
//! ```rust,ignore
//! let registry = Registry::init(TypeCatalog::with_builtins(), &[&provider])?;
//! let engine = MapperBuilder::new(registry).build();
//! let pair = TypePair::new(ty::array(ty::int()), ty::array(ty::string()));
//! let result = engine.map(&source, &pair, &MappingOptions::new())?;
//! ```

pub mod builder;
pub mod cancellation;
pub mod collections;
pub mod composite;
pub mod config;
pub mod context;
pub mod declaration;
pub mod error;
pub mod factory;
pub mod mapper;
pub mod matcher;
pub mod options;
pub mod registry;
pub mod resolver;
pub mod value;

// Re-export public API
pub use builder::{Engine, MapperBuilder};
pub use cancellation::CancellationToken;
pub use collections::CollectionMapper;
pub use composite::{AsyncCompositeMapper, CompositeMapper};
pub use config::MapperConfig;
pub use context::{ContextId, MappingContext};
pub use declaration::{
    provider_fn, DeclarationId, Declarations, FnProvider, MapBody, MapDeclaration, MapKind,
    MapProvider, MapSignature, ProviderId,
};
pub use error::{ElementLocation, MapError, MapResult, RegistryError};
pub use factory::{BoundFactory, FactoryParts};
pub use mapper::{AsyncMapper, EmptyMapper, Mapper, RegistryMapper};
pub use matcher::{CompositeMatcher, EmptyMatcher, Matcher, PredicateMatcher, RegistryMatcher};
pub use options::{
    AsyncMapperOverride, Cancellation, ElementMapperOverride, MapperOverride, MappingOption,
    MappingOptions, MatcherOverride, MatchingDisabled, MergeCollectionOptions,
    NestedMappingContext, ParallelOptions, SerializedSection,
};
pub use registry::Registry;
pub use resolver::{ExecutionMode, Resolution, Resolver};
pub use value::{instantiate, CollectionRef, ObjectRef, Value};

pub use remap_types as types;

#[cfg(test)]
mod tests;
