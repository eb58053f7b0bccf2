//! Map declarations and providers
//!
//! Providers describe their maps by calling into `Declarations`; the registry
//! turns those calls into `MapDeclaration` values once, at initialisation.

use crate::context::MappingContext;
use crate::error::MapResult;
use crate::value::Value;
use futures::future::{BoxFuture, FutureExt};
use remap_types::{GenericSignature, TypePair};
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// What a map does with its inputs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MapKind {
    /// Produces a destination from a source
    New,
    /// Updates or replaces an existing destination
    Merge,
    /// Decides whether a destination element represents a source element
    Match,
}

impl fmt::Display for MapKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MapKind::New => f.write_str("new"),
            MapKind::Merge => f.write_str("merge"),
            MapKind::Match => f.write_str("match"),
        }
    }
}

pub type NewFn = Arc<dyn Fn(&Value, &MappingContext) -> MapResult + Send + Sync>;
pub type MergeFn = Arc<dyn Fn(&Value, &Value, &MappingContext) -> MapResult + Send + Sync>;
pub type MatchFn = Arc<dyn Fn(&Value, &Value, &MappingContext) -> MapResult<bool> + Send + Sync>;
pub type AsyncNewFn =
    Arc<dyn Fn(Value, MappingContext) -> BoxFuture<'static, MapResult> + Send + Sync>;
pub type AsyncMergeFn =
    Arc<dyn Fn(Value, Value, MappingContext) -> BoxFuture<'static, MapResult> + Send + Sync>;

/// Executable body of a map
#[derive(Clone)]
pub enum MapBody {
    New(NewFn),
    Merge(MergeFn),
    Match(MatchFn),
    AsyncNew(AsyncNewFn),
    AsyncMerge(AsyncMergeFn),
}

impl fmt::Debug for MapBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MapBody::New(_) => "New",
            MapBody::Merge(_) => "Merge",
            MapBody::Match(_) => "Match",
            MapBody::AsyncNew(_) => "AsyncNew",
            MapBody::AsyncMerge(_) => "AsyncMerge",
        };
        write!(f, "MapBody::{name}")
    }
}

impl MapBody {
    pub fn kind(&self) -> MapKind {
        match self {
            MapBody::New(_) | MapBody::AsyncNew(_) => MapKind::New,
            MapBody::Merge(_) | MapBody::AsyncMerge(_) => MapKind::Merge,
            MapBody::Match(_) => MapKind::Match,
        }
    }

    pub fn is_async(&self) -> bool {
        matches!(self, MapBody::AsyncNew(_) | MapBody::AsyncMerge(_))
    }

    /// Wrap failures of this body as failures of the map for `pair`
    pub fn scoped(self, pair: &TypePair) -> MapBody {
        let pair = pair.clone();
        match self {
            MapBody::New(f) => MapBody::New(Arc::new(move |source: &Value, ctx: &MappingContext| {
                f(source, ctx).map_err(|e| e.wrap_mapping(&pair))
            })),
            MapBody::Merge(f) => MapBody::Merge(Arc::new(
                move |source: &Value, destination: &Value, ctx: &MappingContext| {
                    f(source, destination, ctx).map_err(|e| e.wrap_mapping(&pair))
                },
            )),
            MapBody::Match(f) => MapBody::Match(Arc::new(
                move |source: &Value, destination: &Value, ctx: &MappingContext| {
                    f(source, destination, ctx).map_err(|e| e.wrap_matcher(&pair))
                },
            )),
            MapBody::AsyncNew(f) => {
                MapBody::AsyncNew(Arc::new(move |source: Value, ctx: MappingContext| {
                    let pair = pair.clone();
                    f(source, ctx)
                        .map(move |result| result.map_err(|e| e.wrap_mapping(&pair)))
                        .boxed()
                }))
            }
            MapBody::AsyncMerge(f) => MapBody::AsyncMerge(Arc::new(
                move |source: Value, destination: Value, ctx: MappingContext| {
                    let pair = pair.clone();
                    f(source, destination, ctx)
                        .map(move |result| result.map_err(|e| e.wrap_mapping(&pair)))
                        .boxed()
                },
            )),
        }
    }
}

/// Position of a declaration in the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeclarationId(pub usize);

/// Provider that declared a map, in registration order
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProviderId {
    pub index: usize,
    pub name: Arc<str>,
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Concrete or open type pair a map is declared for
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MapSignature {
    Concrete(TypePair),
    Generic(GenericSignature),
}

impl MapSignature {
    pub fn pair(&self) -> &TypePair {
        match self {
            MapSignature::Concrete(pair) => pair,
            MapSignature::Generic(signature) => &signature.pair,
        }
    }
}

impl From<TypePair> for MapSignature {
    fn from(pair: TypePair) -> Self {
        MapSignature::Concrete(pair)
    }
}

impl From<GenericSignature> for MapSignature {
    fn from(signature: GenericSignature) -> Self {
        MapSignature::Generic(signature)
    }
}

/// One registered map
#[derive(Debug, Clone)]
pub struct MapDeclaration {
    pub id: DeclarationId,
    pub provider: ProviderId,
    pub signature: MapSignature,
    pub body: MapBody,
}

impl MapDeclaration {
    pub fn kind(&self) -> MapKind {
        self.body.kind()
    }

    pub fn is_async(&self) -> bool {
        self.body.is_async()
    }

    pub fn pair(&self) -> &TypePair {
        self.signature.pair()
    }
}

/// Source of map declarations
pub trait MapProvider: Send + Sync {
    /// Name used in diagnostics
    fn name(&self) -> String {
        std::any::type_name::<Self>().to_string()
    }

    fn declare(&self, declarations: &mut Declarations);
}

/// Collects the maps a provider declares
#[derive(Default)]
pub struct Declarations {
    entries: Vec<(MapSignature, MapBody)>,
}

impl Declarations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_map<F>(&mut self, signature: impl Into<MapSignature>, body: F) -> &mut Self
    where
        F: Fn(&Value, &MappingContext) -> MapResult + Send + Sync + 'static,
    {
        self.push(signature, MapBody::New(Arc::new(body)))
    }

    pub fn merge_map<F>(&mut self, signature: impl Into<MapSignature>, body: F) -> &mut Self
    where
        F: Fn(&Value, &Value, &MappingContext) -> MapResult + Send + Sync + 'static,
    {
        self.push(signature, MapBody::Merge(Arc::new(body)))
    }

    pub fn match_map<F>(&mut self, signature: impl Into<MapSignature>, body: F) -> &mut Self
    where
        F: Fn(&Value, &Value, &MappingContext) -> MapResult<bool> + Send + Sync + 'static,
    {
        self.push(signature, MapBody::Match(Arc::new(body)))
    }

    pub fn async_new_map<F, Fut>(
        &mut self,
        signature: impl Into<MapSignature>,
        body: F,
    ) -> &mut Self
    where
        F: Fn(Value, MappingContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = MapResult> + Send + 'static,
    {
        let body: AsyncNewFn =
            Arc::new(move |source: Value, ctx: MappingContext| body(source, ctx).boxed());
        self.push(signature, MapBody::AsyncNew(body))
    }

    pub fn async_merge_map<F, Fut>(
        &mut self,
        signature: impl Into<MapSignature>,
        body: F,
    ) -> &mut Self
    where
        F: Fn(Value, Value, MappingContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = MapResult> + Send + 'static,
    {
        let body: AsyncMergeFn =
            Arc::new(move |source: Value, destination: Value, ctx: MappingContext| {
                body(source, destination, ctx).boxed()
            });
        self.push(signature, MapBody::AsyncMerge(body))
    }

    fn push(&mut self, signature: impl Into<MapSignature>, body: MapBody) -> &mut Self {
        self.entries.push((signature.into(), body));
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn into_entries(self) -> Vec<(MapSignature, MapBody)> {
        self.entries
    }
}

/// Provider backed by a closure
pub struct FnProvider {
    name: String,
    declare: Box<dyn Fn(&mut Declarations) + Send + Sync>,
}

impl MapProvider for FnProvider {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn declare(&self, declarations: &mut Declarations) {
        (self.declare)(declarations)
    }
}

/// Adapt a closure into a named provider
pub fn provider_fn<F>(name: &str, declare: F) -> FnProvider
where
    F: Fn(&mut Declarations) + Send + Sync + 'static,
{
    FnProvider {
        name: name.to_string(),
        declare: Box::new(declare),
    }
}
