//! Mapper contracts and the registry-backed mapper
//!
//! `Mapper` is the synchronous dispatch contract, `AsyncMapper` the
//! asynchronous one. Both resolve a `BoundFactory` for a pair; `map` and
//! `merge` are conveniences that resolve, invoke once and dispose.

use crate::context::MappingContext;
use crate::declaration::{MapBody, MapKind};
use crate::error::{MapError, MapResult};
use crate::factory::{BoundFactory, FactoryParts};
use crate::options::{AsyncMapperOverride, MapperOverride, MappingOptions};
use crate::resolver::{ExecutionMode, Resolution, Resolver};
use crate::value::{instantiate, Value};
use async_trait::async_trait;
use futures::future::FutureExt;
use remap_types::{TypeCatalog, TypePair};
use std::fmt;
use std::sync::{Arc, Weak};

/// Synchronous map dispatcher
pub trait Mapper: Send + Sync + fmt::Debug {
    /// Whether a factory of `kind` exists for `pair`
    fn can_map(&self, pair: &TypePair, kind: MapKind, options: &MappingOptions) -> bool;

    /// Resolve a reusable factory; fails with `MapNotFound` when none exists
    fn factory(
        &self,
        pair: &TypePair,
        kind: MapKind,
        options: &MappingOptions,
    ) -> MapResult<BoundFactory>;

    fn map(&self, source: &Value, pair: &TypePair, options: &MappingOptions) -> MapResult {
        let factory = self.factory(pair, MapKind::New, options)?;
        let result = factory.invoke_new(source);
        factory.dispose();
        result
    }

    fn merge(
        &self,
        source: &Value,
        destination: &Value,
        pair: &TypePair,
        options: &MappingOptions,
    ) -> MapResult {
        let factory = self.factory(pair, MapKind::Merge, options)?;
        let result = factory.invoke_merge(source, destination);
        factory.dispose();
        result
    }
}

/// Asynchronous map dispatcher
#[async_trait]
pub trait AsyncMapper: Send + Sync + fmt::Debug {
    fn can_map_async(&self, pair: &TypePair, kind: MapKind, options: &MappingOptions) -> bool;

    /// Resolve a factory whose body may be asynchronous
    fn async_factory(
        &self,
        pair: &TypePair,
        kind: MapKind,
        options: &MappingOptions,
    ) -> MapResult<BoundFactory>;

    async fn map_async(
        &self,
        source: Value,
        pair: TypePair,
        options: MappingOptions,
    ) -> MapResult {
        let factory = self.async_factory(&pair, MapKind::New, &options)?;
        let result = factory.invoke_new_async(source).await;
        factory.dispose();
        result
    }

    async fn merge_async(
        &self,
        source: Value,
        destination: Value,
        pair: TypePair,
        options: MappingOptions,
    ) -> MapResult {
        let factory = self.async_factory(&pair, MapKind::Merge, &options)?;
        let result = factory.invoke_merge_async(source, destination).await;
        factory.dispose();
        result
    }
}

/// Mapper that knows no maps
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyMapper;

impl Mapper for EmptyMapper {
    fn can_map(&self, _pair: &TypePair, _kind: MapKind, _options: &MappingOptions) -> bool {
        false
    }

    fn factory(
        &self,
        pair: &TypePair,
        _kind: MapKind,
        _options: &MappingOptions,
    ) -> MapResult<BoundFactory> {
        Err(MapError::not_found(pair.clone()))
    }
}

/// Mapper over the declarations of a registry
#[derive(Debug)]
pub struct RegistryMapper {
    resolver: Arc<Resolver>,
    this: Weak<RegistryMapper>,
}

impl RegistryMapper {
    pub fn new(resolver: Arc<Resolver>) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            resolver,
            this: this.clone(),
        })
    }

    pub fn resolver(&self) -> &Arc<Resolver> {
        &self.resolver
    }

    /// Nested calls come back here unless the caller routes them elsewhere
    fn dispatch_options(&self, options: &MappingOptions) -> MappingOptions {
        match self.this.upgrade() {
            Some(this) => options
                .with_default(MapperOverride(this.clone()))
                .with_default(AsyncMapperOverride(this)),
            None => options.clone(),
        }
    }

    fn build(
        &self,
        pair: &TypePair,
        kind: MapKind,
        mode: ExecutionMode,
        options: &MappingOptions,
    ) -> MapResult<BoundFactory> {
        let registry = self.resolver.registry();
        let (body, arguments) = match self.resolver.resolve(pair, kind, mode) {
            Resolution::Direct {
                declaration,
                arguments,
            } => {
                let declaration = registry
                    .declaration(declaration)
                    .ok_or_else(|| MapError::not_found(pair.clone()))?;
                (declaration.body.clone().scoped(pair), arguments)
            }
            Resolution::MergeFallback {
                declaration,
                arguments,
            } => {
                let declaration = registry
                    .declaration(declaration)
                    .ok_or_else(|| MapError::not_found(pair.clone()))?;
                let merge = declaration.body.clone().scoped(pair);
                (merge_fallback(registry.catalog(), pair, merge)?, arguments)
            }
            Resolution::Ambiguous {
                provider,
                first,
                second,
            } => {
                return Err(MapError::AmbiguousMap {
                    pair: pair.clone(),
                    provider,
                    first,
                    second,
                })
            }
            Resolution::NotFound => return Err(MapError::not_found(pair.clone())),
        };

        let context =
            MappingContext::with_type_arguments(self.dispatch_options(options), arguments);
        Ok(BoundFactory::new(FactoryParts {
            pair: pair.clone(),
            body,
            context,
            origin: self.this.upgrade().map(|this| this as Arc<dyn Mapper>),
        }))
    }
}

/// New body that default-constructs the destination and merges into it
fn merge_fallback(
    catalog: &Arc<TypeCatalog>,
    pair: &TypePair,
    merge: MapBody,
) -> MapResult<MapBody> {
    let catalog = catalog.clone();
    let requested = pair.clone();
    let construct = move || {
        instantiate(&catalog, &requested.destination).map_err(|e| e.wrap_mapping(&requested))
    };

    match merge {
        MapBody::Merge(f) => Ok(MapBody::New(Arc::new(
            move |source: &Value, ctx: &MappingContext| f(source, &construct()?, ctx),
        ))),
        MapBody::AsyncMerge(f) => Ok(MapBody::AsyncNew(Arc::new(
            move |source: Value, ctx: MappingContext| match construct() {
                Ok(target) => f(source, target, ctx),
                Err(e) => futures::future::ready(Err(e)).boxed(),
            },
        ))),
        _ => Err(MapError::not_found(pair.clone())),
    }
}

impl Mapper for RegistryMapper {
    fn can_map(&self, pair: &TypePair, kind: MapKind, _options: &MappingOptions) -> bool {
        // Ambiguity surfaces as an error when the factory is requested
        self.resolver.resolve(pair, kind, ExecutionMode::Sync) != Resolution::NotFound
    }

    fn factory(
        &self,
        pair: &TypePair,
        kind: MapKind,
        options: &MappingOptions,
    ) -> MapResult<BoundFactory> {
        self.build(pair, kind, ExecutionMode::Sync, options)
    }
}

impl AsyncMapper for RegistryMapper {
    fn can_map_async(&self, pair: &TypePair, kind: MapKind, _options: &MappingOptions) -> bool {
        self.resolver.resolve(pair, kind, ExecutionMode::Async) != Resolution::NotFound
    }

    fn async_factory(
        &self,
        pair: &TypePair,
        kind: MapKind,
        options: &MappingOptions,
    ) -> MapResult<BoundFactory> {
        self.build(pair, kind, ExecutionMode::Async, options)
    }
}
