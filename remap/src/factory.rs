//! Bound factories
//!
//! A `BoundFactory` is a resolved map body plus the context it runs in. It can
//! be invoked any number of times without resolving again; every invocation
//! shares the factory's context. Disposing a factory also disposes the nested
//! factories it adopted, and later invocations fail with `MapError::Disposed`.

use crate::context::MappingContext;
use crate::declaration::{MapBody, MapKind};
use crate::error::{MapError, MapResult};
use crate::mapper::Mapper;
use crate::value::Value;
use futures::future::{self, BoxFuture, FutureExt};
use parking_lot::Mutex;
use remap_types::TypePair;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::trace;

/// Everything a factory is built from
pub struct FactoryParts {
    pub pair: TypePair,
    pub body: MapBody,
    pub context: MappingContext,
    /// Mapper that resolved the body, asked again by `merge_factory`
    pub origin: Option<Arc<dyn Mapper>>,
}

struct FactoryInner {
    pair: TypePair,
    body: MapBody,
    context: MappingContext,
    origin: Option<Arc<dyn Mapper>>,
    nested: Mutex<Vec<BoundFactory>>,
    disposed: AtomicBool,
}

/// Reusable handle to one resolved map
#[derive(Clone)]
pub struct BoundFactory {
    inner: Arc<FactoryInner>,
}

impl fmt::Debug for BoundFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundFactory")
            .field("pair", &self.inner.pair)
            .field("body", &self.inner.body)
            .field("context", &self.inner.context.id())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

impl BoundFactory {
    pub fn new(parts: FactoryParts) -> Self {
        Self {
            inner: Arc::new(FactoryInner {
                pair: parts.pair,
                body: parts.body,
                context: parts.context,
                origin: parts.origin,
                nested: Mutex::new(Vec::new()),
                disposed: AtomicBool::new(false),
            }),
        }
    }

    pub fn kind(&self) -> MapKind {
        self.inner.body.kind()
    }

    pub fn pair(&self) -> &TypePair {
        &self.inner.pair
    }

    /// Context shared by every invocation of this factory
    pub fn context(&self) -> &MappingContext {
        &self.inner.context
    }

    pub fn body(&self) -> &MapBody {
        &self.inner.body
    }

    pub fn origin(&self) -> Option<&Arc<dyn Mapper>> {
        self.inner.origin.as_ref()
    }

    pub fn is_async(&self) -> bool {
        self.inner.body.is_async()
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::Acquire)
    }

    fn ensure_live(&self) -> MapResult<()> {
        if self.is_disposed() {
            Err(MapError::Disposed {
                pair: self.inner.pair.clone(),
            })
        } else {
            Ok(())
        }
    }

    fn unsupported(&self) -> MapError {
        MapError::not_found(self.inner.pair.clone())
    }

    pub fn invoke_new(&self, source: &Value) -> MapResult {
        self.ensure_live()?;
        match &self.inner.body {
            MapBody::New(f) => f(source, &self.inner.context),
            _ => Err(self.unsupported()),
        }
    }

    pub fn invoke_merge(&self, source: &Value, destination: &Value) -> MapResult {
        self.ensure_live()?;
        match &self.inner.body {
            MapBody::Merge(f) => f(source, destination, &self.inner.context),
            _ => Err(self.unsupported()),
        }
    }

    pub fn invoke_match(&self, source: &Value, destination: &Value) -> MapResult<bool> {
        self.ensure_live()?;
        match &self.inner.body {
            MapBody::Match(f) => f(source, destination, &self.inner.context),
            _ => Err(self.unsupported()),
        }
    }

    /// Run a new body; synchronous bodies complete immediately
    pub fn invoke_new_async(&self, source: Value) -> BoxFuture<'static, MapResult> {
        if let Err(e) = self.ensure_live() {
            return future::ready(Err(e)).boxed();
        }
        let context = self.inner.context.clone();
        match &self.inner.body {
            MapBody::AsyncNew(f) => f(source, context),
            MapBody::New(f) => future::ready(f(&source, &context)).boxed(),
            _ => future::ready(Err(self.unsupported())).boxed(),
        }
    }

    pub fn invoke_merge_async(
        &self,
        source: Value,
        destination: Value,
    ) -> BoxFuture<'static, MapResult> {
        if let Err(e) = self.ensure_live() {
            return future::ready(Err(e)).boxed();
        }
        let context = self.inner.context.clone();
        match &self.inner.body {
            MapBody::AsyncMerge(f) => f(source, destination, context),
            MapBody::Merge(f) => future::ready(f(&source, &destination, &context)).boxed(),
            _ => future::ready(Err(self.unsupported())).boxed(),
        }
    }

    /// Tie the lifetime of `nested` to this factory
    pub fn adopt(&self, nested: BoundFactory) {
        let mut adopted = self.inner.nested.lock();
        if self.is_disposed() {
            drop(adopted);
            nested.dispose();
            return;
        }
        adopted.push(nested);
    }

    /// Merge factory for the same pair, from the mapper that resolved this one
    pub fn merge_factory(&self) -> MapResult<BoundFactory> {
        self.ensure_live()?;
        let origin = self.inner.origin.as_ref().ok_or_else(|| self.unsupported())?;
        let factory = origin.factory(
            &self.inner.pair,
            MapKind::Merge,
            self.inner.context.options(),
        )?;
        self.adopt(factory.clone());
        Ok(factory)
    }

    /// Release this factory and everything it adopted. Idempotent.
    pub fn dispose(&self) {
        let nested = {
            let mut adopted = self.inner.nested.lock();
            if self.inner.disposed.swap(true, Ordering::AcqRel) {
                return;
            }
            std::mem::take(&mut *adopted)
        };
        trace!(pair = %self.inner.pair, nested = nested.len(), "factory disposed");
        for factory in nested {
            factory.dispose();
        }
    }
}
