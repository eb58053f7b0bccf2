//! Composite dispatchers
//!
//! A composite tries its mappers in order. A `MapNotFound` from one mapper,
//! whether raised while resolving or by the resolved body rejecting the
//! runtime value, moves on to the next mapper. Every other error propagates.

use crate::context::MappingContext;
use crate::declaration::{MapBody, MapKind};
use crate::error::{MapError, MapResult};
use crate::factory::{BoundFactory, FactoryParts};
use crate::mapper::{AsyncMapper, Mapper};
use crate::options::{AsyncMapperOverride, MapperOverride, MappingOptions};
use crate::value::Value;
use futures::future::FutureExt;
use remap_types::TypePair;
use std::sync::{Arc, Weak};
use tracing::trace;

/// Ordered list of synchronous mappers
#[derive(Debug)]
pub struct CompositeMapper {
    mappers: Vec<Arc<dyn Mapper>>,
    this: Weak<CompositeMapper>,
}

impl CompositeMapper {
    pub fn new(mappers: Vec<Arc<dyn Mapper>>) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            mappers,
            this: this.clone(),
        })
    }

    pub fn mappers(&self) -> &[Arc<dyn Mapper>] {
        &self.mappers
    }

    fn dispatch_options(&self, options: &MappingOptions) -> MappingOptions {
        match self.this.upgrade() {
            Some(this) => options.with_default(MapperOverride(this)),
            None => options.clone(),
        }
    }
}

/// Resolve and run a new or merge map through `mappers`, skipping rejections
fn fall_through(
    mappers: &[Arc<dyn Mapper>],
    pair: &TypePair,
    kind: MapKind,
    options: &MappingOptions,
    source: &Value,
    destination: Option<&Value>,
) -> MapResult {
    for mapper in mappers {
        let factory = match mapper.factory(pair, kind, options) {
            Ok(factory) => factory,
            Err(e) if e.is_not_found() => continue,
            Err(e) => return Err(e),
        };
        let result = match destination {
            Some(destination) => factory.invoke_merge(source, destination),
            None => factory.invoke_new(source),
        };
        factory.dispose();
        match result {
            Err(e) if e.is_not_found_for(pair) => {
                trace!(%pair, "runtime rejection, trying next mapper");
            }
            other => return other,
        }
    }
    Err(MapError::not_found(pair.clone()))
}

impl Mapper for CompositeMapper {
    fn can_map(&self, pair: &TypePair, kind: MapKind, options: &MappingOptions) -> bool {
        let options = self.dispatch_options(options);
        self.mappers.iter().any(|m| m.can_map(pair, kind, &options))
    }

    fn factory(
        &self,
        pair: &TypePair,
        kind: MapKind,
        options: &MappingOptions,
    ) -> MapResult<BoundFactory> {
        let options = self.dispatch_options(options);

        for (index, mapper) in self.mappers.iter().enumerate() {
            let factory = match mapper.factory(pair, kind, &options) {
                Ok(factory) => factory,
                Err(e) if e.is_not_found() => {
                    trace!(%pair, %kind, mapper = index, "mapper has no map, trying next");
                    continue;
                }
                Err(e) => return Err(e),
            };

            let rest: Vec<Arc<dyn Mapper>> = self.mappers[index + 1..].to_vec();
            if rest.is_empty() || kind == MapKind::Match {
                return Ok(factory);
            }

            let first = factory.clone();
            let target = pair.clone();
            let body = match kind {
                MapKind::New => MapBody::New(Arc::new(move |source: &Value, _: &MappingContext| {
                    match first.invoke_new(source) {
                        Err(e) if e.is_not_found_for(&target) => {
                            fall_through(&rest, &target, MapKind::New, &options, source, None)
                        }
                        other => other,
                    }
                })),
                _ => MapBody::Merge(Arc::new(
                    move |source: &Value, destination: &Value, _: &MappingContext| {
                        match first.invoke_merge(source, destination) {
                            Err(e) if e.is_not_found_for(&target) => fall_through(
                                &rest,
                                &target,
                                MapKind::Merge,
                                &options,
                                source,
                                Some(destination),
                            ),
                            other => other,
                        }
                    },
                )),
            };

            let wrapper = BoundFactory::new(FactoryParts {
                pair: pair.clone(),
                body,
                context: factory.context().clone(),
                origin: factory.origin().cloned(),
            });
            wrapper.adopt(factory);
            return Ok(wrapper);
        }

        Err(MapError::not_found(pair.clone()))
    }
}

/// Ordered list of asynchronous mappers
#[derive(Debug)]
pub struct AsyncCompositeMapper {
    mappers: Vec<Arc<dyn AsyncMapper>>,
    this: Weak<AsyncCompositeMapper>,
}

impl AsyncCompositeMapper {
    pub fn new(mappers: Vec<Arc<dyn AsyncMapper>>) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            mappers,
            this: this.clone(),
        })
    }

    pub fn mappers(&self) -> &[Arc<dyn AsyncMapper>] {
        &self.mappers
    }

    fn dispatch_options(&self, options: &MappingOptions) -> MappingOptions {
        match self.this.upgrade() {
            Some(this) => options.with_default(AsyncMapperOverride(this)),
            None => options.clone(),
        }
    }
}

async fn fall_through_async(
    mappers: Vec<Arc<dyn AsyncMapper>>,
    pair: TypePair,
    kind: MapKind,
    options: MappingOptions,
    source: Value,
    destination: Option<Value>,
) -> MapResult {
    for mapper in mappers {
        let factory = match mapper.async_factory(&pair, kind, &options) {
            Ok(factory) => factory,
            Err(e) if e.is_not_found() => continue,
            Err(e) => return Err(e),
        };
        let result = match destination.clone() {
            Some(destination) => factory.invoke_merge_async(source.clone(), destination).await,
            None => factory.invoke_new_async(source.clone()).await,
        };
        factory.dispose();
        match result {
            Err(e) if e.is_not_found_for(&pair) => {
                trace!(%pair, "runtime rejection, trying next mapper");
            }
            other => return other,
        }
    }
    Err(MapError::not_found(pair))
}

impl AsyncMapper for AsyncCompositeMapper {
    fn can_map_async(&self, pair: &TypePair, kind: MapKind, options: &MappingOptions) -> bool {
        let options = self.dispatch_options(options);
        self.mappers
            .iter()
            .any(|m| m.can_map_async(pair, kind, &options))
    }

    fn async_factory(
        &self,
        pair: &TypePair,
        kind: MapKind,
        options: &MappingOptions,
    ) -> MapResult<BoundFactory> {
        let options = self.dispatch_options(options);

        for (index, mapper) in self.mappers.iter().enumerate() {
            let factory = match mapper.async_factory(pair, kind, &options) {
                Ok(factory) => factory,
                Err(e) if e.is_not_found() => {
                    trace!(%pair, %kind, mapper = index, "mapper has no map, trying next");
                    continue;
                }
                Err(e) => return Err(e),
            };

            let rest: Vec<Arc<dyn AsyncMapper>> = self.mappers[index + 1..].to_vec();
            if rest.is_empty() || kind == MapKind::Match {
                return Ok(factory);
            }

            let first = factory.clone();
            let target = pair.clone();
            let options = options.clone();
            let body = match kind {
                MapKind::New => MapBody::AsyncNew(Arc::new(
                    move |source: Value, _: MappingContext| {
                        let first = first.clone();
                        let rest = rest.clone();
                        let target = target.clone();
                        let options = options.clone();
                        async move {
                            match first.invoke_new_async(source.clone()).await {
                                Err(e) if e.is_not_found_for(&target) => {
                                    fall_through_async(
                                        rest,
                                        target,
                                        MapKind::New,
                                        options,
                                        source,
                                        None,
                                    )
                                    .await
                                }
                                other => other,
                            }
                        }
                        .boxed()
                    },
                )),
                _ => MapBody::AsyncMerge(Arc::new(
                    move |source: Value, destination: Value, _: MappingContext| {
                        let first = first.clone();
                        let rest = rest.clone();
                        let target = target.clone();
                        let options = options.clone();
                        async move {
                            match first
                                .invoke_merge_async(source.clone(), destination.clone())
                                .await
                            {
                                Err(e) if e.is_not_found_for(&target) => {
                                    fall_through_async(
                                        rest,
                                        target,
                                        MapKind::Merge,
                                        options,
                                        source,
                                        Some(destination),
                                    )
                                    .await
                                }
                                other => other,
                            }
                        }
                        .boxed()
                    },
                )),
            };

            let wrapper = BoundFactory::new(FactoryParts {
                pair: pair.clone(),
                body,
                context: factory.context().clone(),
                origin: factory.origin().cloned(),
            });
            wrapper.adopt(factory);
            return Ok(wrapper);
        }

        Err(MapError::not_found(pair.clone()))
    }
}
