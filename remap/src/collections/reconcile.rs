//! Sequence mapping and merge reconciliation
//!
//! Merging with a matcher walks the destination in order and pairs each
//! element with the first unclaimed source element the matcher accepts.
//! Matched elements are merged (or re-mapped when no merge map exists) and
//! replace their slot, unmatched destination elements are dropped unless
//! configured otherwise, and unmatched source elements are appended.

use super::{async_element_mapper, element_mapper, Bounded, Container};
use crate::context::MappingContext;
use crate::declaration::MapKind;
use crate::error::{ElementLocation, MapError, MapResult};
use crate::factory::BoundFactory;
use crate::mapper::{AsyncMapper, Mapper};
use crate::options::{MappingOptions, MatchingDisabled, MergeCollectionOptions};
use crate::value::{CollectionRef, Value};
use futures::future::{BoxFuture, FutureExt};
use remap_types::TypePair;
use std::sync::Arc;
use tracing::debug;

/// Element-wise map between two sequence types
#[derive(Debug)]
pub(crate) struct Sequence {
    pair: TypePair,
    element: TypePair,
    container: Container,
}

enum Slot {
    Keep(Value),
    Update { source: usize, destination: Value },
}

/// Outcome of matching destination elements against source elements
struct Reconciliation {
    slots: Vec<Slot>,
    additions: Vec<usize>,
    removed: usize,
}

impl Reconciliation {
    fn updated(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| matches!(slot, Slot::Update { .. }))
            .count()
    }
}

fn element_error(
    pair: &TypePair,
    element: &TypePair,
    error: MapError,
    location: ElementLocation,
) -> MapError {
    // A rejected element means the whole collection cannot be mapped this way
    if error.is_not_found_for(element) {
        MapError::not_found(pair.clone())
    } else {
        error.wrap_element(pair, location)
    }
}

/// Per-call merge settings
fn settings(ctx: &MappingContext) -> MergeCollectionOptions {
    ctx.options()
        .get::<MergeCollectionOptions>()
        .cloned()
        .unwrap_or_default()
}

/// Either dispatcher, behind one async-friendly surface.
///
/// Synchronous work only starts when the returned future is first polled.
#[derive(Clone)]
enum Elements {
    Sync(Arc<dyn Mapper>),
    Async(Arc<dyn AsyncMapper>),
}

impl Elements {
    fn for_context(ctx: &MappingContext) -> Self {
        match async_element_mapper(ctx.options()) {
            Some(mapper) => Elements::Async(mapper),
            None => Elements::Sync(element_mapper(ctx.options())),
        }
    }

    fn can_merge(&self, element: &TypePair, options: &MappingOptions) -> bool {
        match self {
            Elements::Sync(mapper) => mapper.can_map(element, MapKind::Merge, options),
            Elements::Async(mapper) => mapper.can_map_async(element, MapKind::Merge, options),
        }
    }

    fn map(
        &self,
        source: Value,
        element: TypePair,
        options: MappingOptions,
    ) -> BoxFuture<'static, MapResult> {
        match self.clone() {
            Elements::Sync(mapper) => {
                async move { mapper.map(&source, &element, &options) }.boxed()
            }
            Elements::Async(mapper) => {
                async move { mapper.map_async(source, element, options).await }.boxed()
            }
        }
    }

    fn merge(
        &self,
        source: Value,
        destination: Value,
        element: TypePair,
        options: MappingOptions,
    ) -> BoxFuture<'static, MapResult> {
        match self.clone() {
            Elements::Sync(mapper) => {
                async move { mapper.merge(&source, &destination, &element, &options) }.boxed()
            }
            Elements::Async(mapper) => async move {
                mapper
                    .merge_async(source, destination, element, options)
                    .await
            }
            .boxed(),
        }
    }
}

impl Sequence {
    pub(crate) fn new(pair: TypePair, element: TypePair, container: Container) -> Self {
        Self {
            pair,
            element,
            container,
        }
    }

    pub(crate) fn element(&self) -> &TypePair {
        &self.element
    }

    pub(crate) fn container(&self) -> &Container {
        &self.container
    }

    fn element_error(&self, error: MapError, index: usize) -> MapError {
        element_error(&self.pair, &self.element, error, ElementLocation::Index(index))
    }

    /// Matcher factory for the element pair, unless matching is off for this call
    fn select_matcher(&self, ctx: &MappingContext) -> MapResult<Option<BoundFactory>> {
        if ctx.options().contains::<MatchingDisabled>() {
            return Ok(None);
        }
        let options = ctx.nested_options();
        let matcher = settings(ctx)
            .matcher
            .unwrap_or_else(|| ctx.matcher().clone());
        if !matcher.can_match(&self.element, &options) {
            return Ok(None);
        }
        matcher.match_factory(&self.element, &options).map(Some)
    }

    fn match_elements(
        &self,
        sources: &[Value],
        destinations: Vec<Value>,
        matcher: &BoundFactory,
        ctx: &MappingContext,
    ) -> MapResult<Reconciliation> {
        let keep_unmatched = !settings(ctx).remove_unmatched;
        let mut claimed = vec![false; sources.len()];
        let mut slots = Vec::with_capacity(destinations.len());
        let mut removed = 0;

        for (position, destination) in destinations.into_iter().enumerate() {
            let mut found = None;
            for (index, source) in sources.iter().enumerate() {
                if claimed[index] {
                    continue;
                }
                let location = ElementLocation::Match {
                    source: index,
                    destination: position,
                };
                let matched = matcher
                    .invoke_match(source, &destination)
                    .map_err(|e| element_error(&self.pair, &self.element, e, location))?;
                if matched {
                    found = Some(index);
                    break;
                }
            }

            match found {
                Some(index) => {
                    claimed[index] = true;
                    slots.push(Slot::Update {
                        source: index,
                        destination,
                    });
                }
                None if keep_unmatched => slots.push(Slot::Keep(destination)),
                None => removed += 1,
            }
        }

        let additions = claimed
            .iter()
            .enumerate()
            .filter(|(_, claimed)| !**claimed)
            .map(|(index, _)| index)
            .collect();

        Ok(Reconciliation {
            slots,
            additions,
            removed,
        })
    }

    fn log_reconciled(&self, reconciliation: &Reconciliation) {
        debug!(
            pair = %self.pair,
            updated = reconciliation.updated(),
            added = reconciliation.additions.len(),
            removed = reconciliation.removed,
            "collection reconciled"
        );
    }

    fn map_items(&self, source: &Value, ctx: &MappingContext) -> MapResult<Vec<Value>> {
        let items = source.require_collection()?.items();
        let mapper = element_mapper(ctx.options());
        let options = ctx.nested_options();
        items
            .iter()
            .enumerate()
            .map(|(index, item)| {
                ctx.check_cancelled()?;
                mapper
                    .map(item, &self.element, &options)
                    .map_err(|e| self.element_error(e, index))
            })
            .collect()
    }

    pub(crate) fn map_new(&self, source: &Value, ctx: &MappingContext) -> MapResult {
        if source.is_null() {
            return Ok(Value::Null);
        }
        Ok(self.container.build(self.map_items(source, ctx)?))
    }

    /// What to do before touching a destination; `Err(value)` short-circuits
    fn prepare<'a>(
        &self,
        source: &Value,
        destination: &'a Value,
        ctx: &MappingContext,
    ) -> MapResult<Result<&'a CollectionRef, Prepared>> {
        if source.is_null() {
            return Ok(Err(Prepared::Done(Value::Null)));
        }
        let target = match destination {
            Value::Null if self.container.constructible => return Ok(Err(Prepared::New)),
            Value::Null => return Err(MapError::not_found(self.pair.clone())),
            Value::Collection(target) => target,
            other => return Err(MapError::unexpected("collection", other)),
        };
        if target.is_read_only() {
            if !settings(ctx).recreate_readonly {
                return Err(MapError::ReadOnlyDestination {
                    pair: self.pair.clone(),
                });
            }
            debug!(pair = %self.pair, "recreating read-only destination");
            return Ok(Err(Prepared::Recreate(target.clone())));
        }
        Ok(Ok(target))
    }

    pub(crate) fn map_merge(
        &self,
        source: &Value,
        destination: &Value,
        ctx: &MappingContext,
    ) -> MapResult {
        let target = match self.prepare(source, destination, ctx)? {
            Ok(target) => target,
            Err(Prepared::Done(value)) => return Ok(value),
            Err(Prepared::New) => return self.map_new(source, ctx),
            Err(Prepared::Recreate(target)) => {
                let items = self.map_items(source, ctx)?;
                return Ok(recreated(&target, items));
            }
        };

        let Some(matcher) = self.select_matcher(ctx)? else {
            target.replace_items(self.map_items(source, ctx)?);
            return Ok(destination.clone());
        };

        let sources = source.require_collection()?.items();
        let reconciliation = self.match_elements(&sources, target.items(), &matcher, ctx);
        matcher.dispose();
        let reconciliation = reconciliation?;

        let mapper = element_mapper(ctx.options());
        let options = ctx.nested_options();
        let merge = mapper.can_map(&self.element, MapKind::Merge, &options);

        let mut items =
            Vec::with_capacity(reconciliation.slots.len() + reconciliation.additions.len());
        for slot in &reconciliation.slots {
            match slot {
                Slot::Keep(value) => items.push(value.clone()),
                Slot::Update {
                    source: index,
                    destination,
                } => {
                    ctx.check_cancelled()?;
                    let item = &sources[*index];
                    let result = if merge {
                        mapper.merge(item, destination, &self.element, &options)
                    } else {
                        mapper.map(item, &self.element, &options)
                    };
                    items.push(result.map_err(|e| self.element_error(e, *index))?);
                }
            }
        }
        for index in &reconciliation.additions {
            ctx.check_cancelled()?;
            let value = mapper
                .map(&sources[*index], &self.element, &options)
                .map_err(|e| self.element_error(e, *index))?;
            items.push(value);
        }

        self.log_reconciled(&reconciliation);
        target.replace_items(items);
        Ok(destination.clone())
    }

    async fn map_items_async(
        &self,
        source: &Value,
        ctx: &MappingContext,
    ) -> MapResult<Vec<Value>> {
        let items = source.require_collection()?.items();
        let elements = Elements::for_context(ctx);
        let bounded = Bounded::new(ctx);
        let options = bounded.options(ctx.nested_options());

        let jobs = items
            .into_iter()
            .enumerate()
            .map(|(index, item)| {
                let (pair, element) = (self.pair.clone(), self.element.clone());
                elements
                    .map(item, element.clone(), options.clone())
                    .map(move |result| {
                        result.map_err(|e| {
                            element_error(&pair, &element, e, ElementLocation::Index(index))
                        })
                    })
                    .boxed()
            })
            .collect();
        bounded.run(jobs).await
    }

    pub(crate) async fn map_new_async(
        self: Arc<Self>,
        source: Value,
        ctx: MappingContext,
    ) -> MapResult {
        if source.is_null() {
            return Ok(Value::Null);
        }
        let items = self.map_items_async(&source, &ctx).await?;
        Ok(self.container.build(items))
    }

    pub(crate) async fn map_merge_async(
        self: Arc<Self>,
        source: Value,
        destination: Value,
        ctx: MappingContext,
    ) -> MapResult {
        let target = match self.prepare(&source, &destination, &ctx)? {
            Ok(target) => target.clone(),
            Err(Prepared::Done(value)) => return Ok(value),
            Err(Prepared::New) => return self.clone().map_new_async(source, ctx).await,
            Err(Prepared::Recreate(target)) => {
                let items = self.map_items_async(&source, &ctx).await?;
                return Ok(recreated(&target, items));
            }
        };

        let Some(matcher) = self.select_matcher(&ctx)? else {
            let items = self.map_items_async(&source, &ctx).await?;
            target.replace_items(items);
            return Ok(destination);
        };

        let sources = source.require_collection()?.items();
        let reconciliation = self.match_elements(&sources, target.items(), &matcher, &ctx);
        matcher.dispose();
        let reconciliation = reconciliation?;

        let elements = Elements::for_context(&ctx);
        let bounded = Bounded::new(&ctx);
        let options = bounded.options(ctx.nested_options());
        let merge = elements.can_merge(&self.element, &options);

        let updates = reconciliation.slots.iter().filter_map(|slot| match slot {
            Slot::Update {
                source: index,
                destination,
            } => Some((*index, Some(destination.clone()))),
            Slot::Keep(_) => None,
        });
        let additions = reconciliation.additions.iter().map(|index| (*index, None));

        let jobs = updates
            .chain(additions)
            .map(|(index, destination)| {
                let (pair, element) = (self.pair.clone(), self.element.clone());
                let item = sources[index].clone();
                let job = match destination {
                    Some(destination) if merge => {
                        elements.merge(item, destination, element.clone(), options.clone())
                    }
                    _ => elements.map(item, element.clone(), options.clone()),
                };
                job.map(move |result| {
                    result.map_err(|e| {
                        element_error(&pair, &element, e, ElementLocation::Index(index))
                    })
                })
                .boxed()
            })
            .collect();
        let mut results = bounded.run(jobs).await?.into_iter();

        let mut items =
            Vec::with_capacity(reconciliation.slots.len() + reconciliation.additions.len());
        for slot in &reconciliation.slots {
            match slot {
                Slot::Keep(value) => items.push(value.clone()),
                Slot::Update { .. } => items.extend(results.next()),
            }
        }
        items.extend(results);

        self.log_reconciled(&reconciliation);
        target.replace_items(items);
        Ok(destination)
    }
}

/// Early outcomes of a merge
enum Prepared {
    Done(Value),
    /// Destination is missing; behave like new
    New,
    /// Destination is read-only and may be replaced
    Recreate(CollectionRef),
}

/// Replacement for a read-only destination, keeping its runtime type
fn recreated(target: &CollectionRef, items: Vec<Value>) -> Value {
    Value::Collection(CollectionRef::from_items(target.ty(), target.shape(), items))
}
