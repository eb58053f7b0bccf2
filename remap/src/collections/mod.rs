//! Collection reconciliation
//!
//! `CollectionMapper` serves every pair whose two sides are sequences (or
//! tuples of equal length) as long as the element pairs can be mapped. It
//! never needs declarations of its own: elements go back through the
//! ambient dispatcher, so registry maps, composites and nested collections
//! all take part.

mod parallel;
mod reconcile;
mod tuple;

pub(crate) use parallel::Bounded;

use crate::composite::{AsyncCompositeMapper, CompositeMapper};
use crate::context::MappingContext;
use crate::declaration::{MapBody, MapKind};
use crate::error::{MapError, MapResult};
use crate::factory::{BoundFactory, FactoryParts};
use crate::mapper::{AsyncMapper, EmptyMapper, Mapper};
use crate::options::{AsyncMapperOverride, ElementMapperOverride, MapperOverride, MappingOptions};
use crate::resolver::ExecutionMode;
use crate::value::{CollectionRef, Value};
use futures::future::FutureExt;
use reconcile::Sequence;
use remap_types::{
    ty, CollectionKind, CollectionShape, StructuredType, TypeCatalog, TypeCategory, TypePair,
};
use std::sync::{Arc, Weak};
use tuple::TupleMap;

/// Destination container of a sequence map
#[derive(Debug, Clone)]
pub(crate) struct Container {
    ty: StructuredType,
    shape: CollectionShape,
    /// Whether a fresh container can be produced for `New`
    constructible: bool,
}

impl Container {
    fn build(&self, items: Vec<Value>) -> Value {
        Value::Collection(CollectionRef::from_items(
            self.ty.clone(),
            self.shape,
            items,
        ))
    }
}

enum Plan {
    Sequence(Sequence),
    Tuple(TupleMap),
}

/// Synchronous element dispatcher for a collection context
pub(crate) fn element_mapper(options: &MappingOptions) -> Arc<dyn Mapper> {
    let ambient: Arc<dyn Mapper> = options
        .get::<MapperOverride>()
        .map(|o| o.0.clone())
        .unwrap_or_else(|| Arc::new(EmptyMapper));
    match options.get::<ElementMapperOverride>() {
        Some(overrides) if !overrides.mappers.is_empty() => {
            let mut mappers = overrides.mappers.clone();
            mappers.push(ambient);
            CompositeMapper::new(mappers)
        }
        _ => ambient,
    }
}

/// Asynchronous element dispatcher, if the context carries one
pub(crate) fn async_element_mapper(options: &MappingOptions) -> Option<Arc<dyn AsyncMapper>> {
    let ambient = options.get::<AsyncMapperOverride>().map(|o| o.0.clone());
    match options.get::<ElementMapperOverride>() {
        Some(overrides) if !overrides.async_mappers.is_empty() => {
            let mut mappers = overrides.async_mappers.clone();
            mappers.extend(ambient);
            Some(AsyncCompositeMapper::new(mappers))
        }
        _ => ambient,
    }
}

/// Maps sequences and tuples element by element
#[derive(Debug)]
pub struct CollectionMapper {
    catalog: Arc<TypeCatalog>,
    this: Weak<CollectionMapper>,
}

impl CollectionMapper {
    pub fn new(catalog: Arc<TypeCatalog>) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            catalog,
            this: this.clone(),
        })
    }

    fn dispatch_options(&self, options: &MappingOptions) -> MappingOptions {
        match self.this.upgrade() {
            Some(this) => options
                .with_default(MapperOverride(this.clone()))
                .with_default(AsyncMapperOverride(this)),
            None => options.clone(),
        }
    }

    fn plan(&self, pair: &TypePair) -> Option<Plan> {
        if let (StructuredType::Tuple(sources), StructuredType::Tuple(destinations)) =
            (&pair.source, &pair.destination)
        {
            if sources.len() != destinations.len() {
                return None;
            }
            let branches = sources
                .iter()
                .zip(destinations)
                .map(|(source, destination)| TypePair::new(source.clone(), destination.clone()))
                .collect();
            return Some(Plan::Tuple(TupleMap::new(
                pair.clone(),
                branches,
                self.catalog.clone(),
            )));
        }

        let source = self.catalog.element_type(&pair.source)?;
        let destination = self.catalog.element_type(&pair.destination)?;
        let container = self.container(&pair.destination, &destination)?;
        Some(Plan::Sequence(Sequence::new(
            pair.clone(),
            TypePair::new(source, destination),
            container,
        )))
    }

    /// Concrete container produced for a destination type
    fn container(&self, target: &StructuredType, element: &StructuredType) -> Option<Container> {
        if let StructuredType::Array { rank, .. } = target {
            // Multi-dimensional arrays are not supported
            return (*rank == 1).then(|| Container {
                ty: target.clone(),
                shape: CollectionShape::read_only(CollectionKind::Array),
                constructible: true,
            });
        }

        let descriptor = self.catalog.descriptor_of(target)?;
        let shape = self.catalog.collection_shape(target);
        if descriptor.category == TypeCategory::Interface {
            let read_only = shape.is_some_and(|shape| shape.read_only);
            let (ty, shape) = if read_only {
                (
                    ty::read_only_list(element.clone()),
                    CollectionShape::read_only(CollectionKind::List),
                )
            } else {
                (
                    ty::list(element.clone()),
                    CollectionShape::new(CollectionKind::List),
                )
            };
            return Some(Container {
                ty,
                shape,
                constructible: true,
            });
        }

        let shape = shape?;
        Some(Container {
            ty: target.clone(),
            shape,
            constructible: !shape.read_only && self.catalog.has_default_constructor(target),
        })
    }

    /// Plan for `pair` if every element or branch map exists
    fn checked_plan(
        &self,
        pair: &TypePair,
        kind: MapKind,
        mode: ExecutionMode,
        options: &MappingOptions,
    ) -> Option<Plan> {
        if kind == MapKind::Match || pair.is_open() {
            return None;
        }
        let plan = self.plan(pair)?;
        let can_map = |element: &TypePair| match mode {
            ExecutionMode::Sync => element_mapper(options).can_map(element, MapKind::New, options),
            ExecutionMode::Async => match async_element_mapper(options) {
                Some(mapper) => mapper.can_map_async(element, MapKind::New, options),
                None => element_mapper(options).can_map(element, MapKind::New, options),
            },
        };

        let supported = match &plan {
            Plan::Sequence(sequence) => {
                (kind == MapKind::Merge || sequence.container().constructible)
                    && can_map(sequence.element())
            }
            Plan::Tuple(tuple) => tuple.branches().iter().all(can_map),
        };
        supported.then_some(plan)
    }

    fn build(
        &self,
        pair: &TypePair,
        kind: MapKind,
        mode: ExecutionMode,
        options: &MappingOptions,
    ) -> MapResult<BoundFactory> {
        let options = self.dispatch_options(options);
        let plan = self
            .checked_plan(pair, kind, mode, &options)
            .ok_or_else(|| MapError::not_found(pair.clone()))?;

        let body = match (plan, mode) {
            (Plan::Sequence(sequence), ExecutionMode::Sync) => {
                let sequence = Arc::new(sequence);
                match kind {
                    MapKind::New => MapBody::New(Arc::new(
                        move |source: &Value, ctx: &MappingContext| sequence.map_new(source, ctx),
                    )),
                    _ => MapBody::Merge(Arc::new(
                        move |source: &Value, destination: &Value, ctx: &MappingContext| {
                            sequence.map_merge(source, destination, ctx)
                        },
                    )),
                }
            }
            (Plan::Sequence(sequence), ExecutionMode::Async) => {
                let sequence = Arc::new(sequence);
                match kind {
                    MapKind::New => MapBody::AsyncNew(Arc::new(
                        move |source: Value, ctx: MappingContext| {
                            sequence.clone().map_new_async(source, ctx).boxed()
                        },
                    )),
                    _ => MapBody::AsyncMerge(Arc::new(
                        move |source: Value, destination: Value, ctx: MappingContext| {
                            sequence
                                .clone()
                                .map_merge_async(source, destination, ctx)
                                .boxed()
                        },
                    )),
                }
            }
            (Plan::Tuple(tuple), ExecutionMode::Sync) => {
                let tuple = Arc::new(tuple);
                match kind {
                    MapKind::New => MapBody::New(Arc::new(
                        move |source: &Value, ctx: &MappingContext| tuple.map_new(source, ctx),
                    )),
                    _ => MapBody::Merge(Arc::new(
                        move |source: &Value, destination: &Value, ctx: &MappingContext| {
                            tuple.map_merge(source, destination, ctx)
                        },
                    )),
                }
            }
            (Plan::Tuple(tuple), ExecutionMode::Async) => {
                let tuple = Arc::new(tuple);
                match kind {
                    MapKind::New => MapBody::AsyncNew(Arc::new(
                        move |source: Value, ctx: MappingContext| {
                            tuple.clone().map_new_async(source, ctx).boxed()
                        },
                    )),
                    _ => MapBody::AsyncMerge(Arc::new(
                        move |source: Value, destination: Value, ctx: MappingContext| {
                            tuple.clone().map_merge_async(source, destination, ctx).boxed()
                        },
                    )),
                }
            }
        };

        Ok(BoundFactory::new(FactoryParts {
            pair: pair.clone(),
            body,
            context: MappingContext::new(options),
            origin: self.this.upgrade().map(|this| this as Arc<dyn Mapper>),
        }))
    }
}

impl Mapper for CollectionMapper {
    fn can_map(&self, pair: &TypePair, kind: MapKind, options: &MappingOptions) -> bool {
        let options = self.dispatch_options(options);
        self.checked_plan(pair, kind, ExecutionMode::Sync, &options)
            .is_some()
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

impl AsyncMapper for CollectionMapper {
    fn can_map_async(&self, pair: &TypePair, kind: MapKind, options: &MappingOptions) -> bool {
        let options = self.dispatch_options(options);
        self.checked_plan(pair, kind, ExecutionMode::Async, &options)
            .is_some()
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
