//! Engine wiring
//!
//! `MapperBuilder` assembles the standard dispatcher stack over a registry:
//! registry maps first, then collection reconciliation, then any extra
//! mappers. The resulting `Engine` is the entry point for callers.

use crate::collections::CollectionMapper;
use crate::config::MapperConfig;
use crate::composite::{AsyncCompositeMapper, CompositeMapper};
use crate::declaration::MapKind;
use crate::error::MapResult;
use crate::factory::BoundFactory;
use crate::mapper::{AsyncMapper, Mapper, RegistryMapper};
use crate::matcher::{CompositeMatcher, Matcher, RegistryMatcher};
use crate::options::{AsyncMapperOverride, MapperOverride, MappingOptions, MatcherOverride};
use crate::registry::Registry;
use crate::resolver::Resolver;
use crate::value::Value;
use remap_types::{CacheStats, ConstraintPredicates, TypePair};
use std::sync::Arc;
use tracing::debug;

pub struct MapperBuilder {
    registry: Arc<Registry>,
    config: MapperConfig,
    predicates: ConstraintPredicates,
    mappers: Vec<Arc<dyn Mapper>>,
    async_mappers: Vec<Arc<dyn AsyncMapper>>,
    matchers: Vec<Arc<dyn Matcher>>,
}

impl MapperBuilder {
    pub fn new(registry: impl Into<Arc<Registry>>) -> Self {
        Self {
            registry: registry.into(),
            config: MapperConfig::default(),
            predicates: ConstraintPredicates::standard(),
            mappers: Vec::new(),
            async_mappers: Vec::new(),
            matchers: Vec::new(),
        }
    }

    pub fn config(mut self, config: MapperConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the constraint predicates used by the solver
    pub fn predicates(mut self, predicates: ConstraintPredicates) -> Self {
        self.predicates = predicates;
        self
    }

    /// Mapper consulted after the registry and collection mappers
    pub fn with_mapper(mut self, mapper: Arc<dyn Mapper>) -> Self {
        self.mappers.push(mapper);
        self
    }

    pub fn with_async_mapper(mut self, mapper: Arc<dyn AsyncMapper>) -> Self {
        self.async_mappers.push(mapper);
        self
    }

    /// Matcher consulted after the registry's match declarations
    pub fn with_matcher(mut self, matcher: Arc<dyn Matcher>) -> Self {
        self.matchers.push(matcher);
        self
    }

    pub fn build(self) -> Engine {
        let config = self.config.normalized();
        let resolver = Arc::new(Resolver::with_predicates(
            self.registry.clone(),
            self.predicates,
            config.solver_cache_capacity,
        )
        .with_resolution_capacity(config.resolution_cache_capacity));
        let registry_mapper = RegistryMapper::new(resolver.clone());
        let collections = CollectionMapper::new(self.registry.catalog().clone());

        let mut mappers = vec![
            registry_mapper.clone() as Arc<dyn Mapper>,
            collections.clone() as Arc<dyn Mapper>,
        ];
        mappers.extend(self.mappers);
        let mut async_mappers = vec![
            registry_mapper as Arc<dyn AsyncMapper>,
            collections as Arc<dyn AsyncMapper>,
        ];
        async_mappers.extend(self.async_mappers);
        let mut matchers =
            vec![Arc::new(RegistryMatcher::new(resolver.clone())) as Arc<dyn Matcher>];
        matchers.extend(self.matchers);

        debug!(
            declarations = self.registry.len(),
            mappers = mappers.len(),
            async_mappers = async_mappers.len(),
            matchers = matchers.len(),
            max_parallelism = config.max_parallelism,
            "mapping engine built"
        );

        Engine {
            resolver,
            mapper: CompositeMapper::new(mappers),
            async_mapper: AsyncCompositeMapper::new(async_mappers),
            matcher: Arc::new(CompositeMatcher::new(matchers)),
            defaults: config.default_options(),
        }
    }
}

/// Wired dispatcher stack with synchronous and asynchronous entry points
#[derive(Debug)]
pub struct Engine {
    resolver: Arc<Resolver>,
    mapper: Arc<CompositeMapper>,
    async_mapper: Arc<AsyncCompositeMapper>,
    matcher: Arc<CompositeMatcher>,
    defaults: MappingOptions,
}

impl Engine {
    /// Effective options of one call
    fn options(&self, options: &MappingOptions) -> MappingOptions {
        self.defaults
            .merge(options)
            .with_default(MapperOverride(self.mapper.clone()))
            .with_default(AsyncMapperOverride(self.async_mapper.clone()))
            .with_default(MatcherOverride(self.matcher.clone()))
    }

    pub fn registry(&self) -> &Arc<Registry> {
        self.resolver.registry()
    }

    /// Solver cache statistics
    pub fn stats(&self) -> CacheStats {
        self.resolver.stats()
    }

    pub fn resolution_stats(&self) -> CacheStats {
        self.resolver.resolution_stats()
    }

    /// The synchronous dispatcher, usable wherever a `Mapper` is expected
    pub fn mapper(&self) -> Arc<dyn Mapper> {
        self.mapper.clone()
    }

    pub fn async_mapper(&self) -> Arc<dyn AsyncMapper> {
        self.async_mapper.clone()
    }

    pub fn matcher(&self) -> Arc<dyn Matcher> {
        self.matcher.clone()
    }

    pub fn can_map(&self, pair: &TypePair, kind: MapKind, options: &MappingOptions) -> bool {
        self.mapper.can_map(pair, kind, &self.options(options))
    }

    pub fn can_map_async(&self, pair: &TypePair, kind: MapKind, options: &MappingOptions) -> bool {
        self.async_mapper
            .can_map_async(pair, kind, &self.options(options))
    }

    pub fn factory(
        &self,
        pair: &TypePair,
        kind: MapKind,
        options: &MappingOptions,
    ) -> MapResult<BoundFactory> {
        self.mapper.factory(pair, kind, &self.options(options))
    }

    pub fn async_factory(
        &self,
        pair: &TypePair,
        kind: MapKind,
        options: &MappingOptions,
    ) -> MapResult<BoundFactory> {
        self.async_mapper
            .async_factory(pair, kind, &self.options(options))
    }

    pub fn map(&self, source: &Value, pair: &TypePair, options: &MappingOptions) -> MapResult {
        self.mapper.map(source, pair, &self.options(options))
    }

    pub fn merge(
        &self,
        source: &Value,
        destination: &Value,
        pair: &TypePair,
        options: &MappingOptions,
    ) -> MapResult {
        self.mapper
            .merge(source, destination, pair, &self.options(options))
    }

    pub fn matches(
        &self,
        source: &Value,
        destination: &Value,
        pair: &TypePair,
        options: &MappingOptions,
    ) -> MapResult<bool> {
        self.matcher
            .matches(source, destination, pair, &self.options(options))
    }

    pub async fn map_async(
        &self,
        source: Value,
        pair: TypePair,
        options: &MappingOptions,
    ) -> MapResult {
        self.async_mapper
            .map_async(source, pair, self.options(options))
            .await
    }

    pub async fn merge_async(
        &self,
        source: Value,
        destination: Value,
        pair: TypePair,
        options: &MappingOptions,
    ) -> MapResult {
        self.async_mapper
            .merge_async(source, destination, pair, self.options(options))
            .await
    }
}
