//! Mapping context
//!
//! A context is created for every top-level call and for every bound factory,
//! and is immutable afterwards. It carries the effective options, the
//! dispatchers used for nested calls, and the type arguments of the generic
//! map being executed.
//!
//! Nested calls made through a context never reuse it: each one gets a fresh
//! context marked with `NestedMappingContext`, so sibling element maps can be
//! told apart. Invocations of the same `BoundFactory` share the factory's
//! context.

use crate::cancellation::CancellationToken;
use crate::declaration::MapKind;
use crate::error::MapResult;
use crate::factory::BoundFactory;
use crate::mapper::{AsyncMapper, EmptyMapper, Mapper};
use crate::matcher::{EmptyMatcher, Matcher};
use crate::options::{
    AsyncMapperOverride, Cancellation, MapperOverride, MappingOptions, MatcherOverride,
    MatchingDisabled, NestedMappingContext, SerializedSection,
};
use crate::value::Value;
use futures::future::{BoxFuture, FutureExt};
use remap_types::{StructuredType, TypeArguments, TypePair};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique context identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(u64);

impl ContextId {
    fn next() -> Self {
        ContextId(NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ctx#{}", self.0)
    }
}

struct ContextInner {
    id: ContextId,
    options: MappingOptions,
    mapper: Arc<dyn Mapper>,
    async_mapper: Option<Arc<dyn AsyncMapper>>,
    matcher: Arc<dyn Matcher>,
    type_arguments: TypeArguments,
}

/// Immutable per-call context, cheap to clone
#[derive(Clone)]
pub struct MappingContext {
    inner: Arc<ContextInner>,
}

impl fmt::Debug for MappingContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MappingContext")
            .field("id", &self.inner.id)
            .field("depth", &self.depth())
            .field("options", &self.inner.options)
            .field("type_arguments", &self.inner.type_arguments)
            .finish()
    }
}

impl MappingContext {
    pub fn new(options: MappingOptions) -> Self {
        Self::with_type_arguments(options, TypeArguments::empty())
    }

    /// Context for a generic map bound to `type_arguments`
    pub fn with_type_arguments(options: MappingOptions, type_arguments: TypeArguments) -> Self {
        let mapper = options
            .get::<MapperOverride>()
            .map(|o| o.0.clone())
            .unwrap_or_else(|| Arc::new(EmptyMapper));
        let async_mapper = options.get::<AsyncMapperOverride>().map(|o| o.0.clone());
        let matcher: Arc<dyn Matcher> = match options.get::<MatcherOverride>() {
            Some(o) if !options.contains::<MatchingDisabled>() => o.0.clone(),
            _ => Arc::new(EmptyMatcher),
        };

        Self {
            inner: Arc::new(ContextInner {
                id: ContextId::next(),
                options,
                mapper,
                async_mapper,
                matcher,
                type_arguments,
            }),
        }
    }

    pub fn id(&self) -> ContextId {
        self.inner.id
    }

    pub fn options(&self) -> &MappingOptions {
        &self.inner.options
    }

    /// 0 for top-level contexts
    pub fn depth(&self) -> usize {
        self.inner
            .options
            .get::<NestedMappingContext>()
            .map_or(0, |nested| nested.depth)
    }

    pub fn is_nested(&self) -> bool {
        self.depth() > 0
    }

    /// Context of the map that made this nested call
    pub fn parent(&self) -> Option<ContextId> {
        self.inner
            .options
            .get::<NestedMappingContext>()
            .map(|nested| nested.parent)
    }

    pub fn in_serialized_section(&self) -> bool {
        self.inner.options.contains::<SerializedSection>()
    }

    pub fn type_arguments(&self) -> &TypeArguments {
        &self.inner.type_arguments
    }

    /// Concrete type bound to parameter `index` of the executing generic map
    pub fn type_argument(&self, index: usize) -> Option<&StructuredType> {
        self.inner.type_arguments.get(index)
    }

    pub fn mapper(&self) -> &Arc<dyn Mapper> {
        &self.inner.mapper
    }

    pub fn async_mapper(&self) -> Option<&Arc<dyn AsyncMapper>> {
        self.inner.async_mapper.as_ref()
    }

    pub fn matcher(&self) -> &Arc<dyn Matcher> {
        &self.inner.matcher
    }

    pub fn cancellation(&self) -> Option<&CancellationToken> {
        self.inner.options.get::<Cancellation>().map(|c| &c.0)
    }

    /// `Err(Cancelled)` once the caller's token has been cancelled
    pub fn check_cancelled(&self) -> MapResult<()> {
        self.cancellation().map_or(Ok(()), CancellationToken::check)
    }

    /// Options for a call made from inside this context
    pub fn nested_options(&self) -> MappingOptions {
        self.inner.options.without::<MatchingDisabled>().with(NestedMappingContext {
            parent: self.inner.id,
            depth: self.depth() + 1,
        })
    }

    /// Map `source` through the ambient dispatcher
    pub fn map(&self, source: &Value, pair: &TypePair) -> MapResult {
        self.inner.mapper.map(source, pair, &self.nested_options())
    }

    /// Merge `source` into `destination` through the ambient dispatcher
    pub fn merge(&self, source: &Value, destination: &Value, pair: &TypePair) -> MapResult {
        self.inner
            .mapper
            .merge(source, destination, pair, &self.nested_options())
    }

    pub fn matches(&self, source: &Value, destination: &Value, pair: &TypePair) -> MapResult<bool> {
        self.inner
            .matcher
            .matches(source, destination, pair, &self.nested_options())
    }

    pub fn factory(&self, pair: &TypePair, kind: MapKind) -> MapResult<BoundFactory> {
        self.inner.mapper.factory(pair, kind, &self.nested_options())
    }

    /// Asynchronous nested map; runs synchronously when no async dispatcher is set
    pub fn map_async(&self, source: Value, pair: TypePair) -> BoxFuture<'static, MapResult> {
        let options = self.nested_options();
        match self.inner.async_mapper.clone() {
            Some(mapper) => async move { mapper.map_async(source, pair, options).await }.boxed(),
            None => {
                let result = self.inner.mapper.map(&source, &pair, &options);
                futures::future::ready(result).boxed()
            }
        }
    }

    pub fn merge_async(
        &self,
        source: Value,
        destination: Value,
        pair: TypePair,
    ) -> BoxFuture<'static, MapResult> {
        let options = self.nested_options();
        match self.inner.async_mapper.clone() {
            Some(mapper) => {
                async move { mapper.merge_async(source, destination, pair, options).await }.boxed()
            }
            None => {
                let result = self.inner.mapper.merge(&source, &destination, &pair, &options);
                futures::future::ready(result).boxed()
            }
        }
    }
}
