//! Resolution engine
//!
//! Turns a requested `(pair, kind)` into the declaration that serves it:
//!
//! 1. an exact declaration of the requested kind
//! 2. the first provider with a generic declaration the solver accepts; inside
//!    that provider the most specific candidate wins, ties are ambiguous
//! 3. for `New` requests, a `Merge` declaration when the destination can be
//!    default-constructed
//!
//! Outcomes are cached per pair, kind and execution mode in a bounded LRU.
//! The registry is read-only, so a cached outcome never goes stale.

use crate::declaration::{DeclarationId, MapDeclaration, MapKind, MapSignature};
use crate::registry::Registry;
use parking_lot::Mutex;
use remap_types::{
    BoundedCache, CacheStats, ConstraintPredicates, ConstraintSolver, SignatureKey, TypeArguments,
    TypePair,
};
use std::cmp::Reverse;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Which bodies a caller is able to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecutionMode {
    /// Only synchronous bodies
    Sync,
    /// Asynchronous bodies preferred, synchronous ones accepted
    Async,
}

impl ExecutionMode {
    fn accepts(self, declaration: &MapDeclaration) -> bool {
        self == ExecutionMode::Async || !declaration.is_async()
    }

    /// 0 for the preferred body flavour
    fn preference(self, declaration: &MapDeclaration) -> u8 {
        match self {
            ExecutionMode::Async if !declaration.is_async() => 1,
            _ => 0,
        }
    }
}

/// Outcome of resolving one request
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// A declaration of the requested kind
    Direct {
        declaration: DeclarationId,
        arguments: TypeArguments,
    },
    /// A merge declaration standing in for a missing new declaration
    MergeFallback {
        declaration: DeclarationId,
        arguments: TypeArguments,
    },
    /// Two equally specific generic declarations of one provider
    Ambiguous {
        provider: String,
        first: TypePair,
        second: TypePair,
    },
    NotFound,
}

impl Resolution {
    pub fn is_found(&self) -> bool {
        matches!(
            self,
            Resolution::Direct { .. } | Resolution::MergeFallback { .. }
        )
    }
}

type ResolutionKey = (TypePair, MapKind, ExecutionMode);

pub struct Resolver {
    registry: Arc<Registry>,
    solver: ConstraintSolver,
    resolutions: Mutex<BoundedCache<ResolutionKey, Resolution>>,
}

impl fmt::Debug for Resolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver")
            .field("registry", &self.registry)
            .field("resolutions", &self.resolutions.lock().stats())
            .finish()
    }
}

impl Resolver {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self::with_predicates(registry, ConstraintPredicates::standard(), 1024)
    }

    pub fn with_predicates(
        registry: Arc<Registry>,
        predicates: ConstraintPredicates,
        cache_capacity: usize,
    ) -> Self {
        let solver = ConstraintSolver::with_predicates(registry.catalog().clone(), predicates)
            .with_cache_capacity(cache_capacity);
        Self {
            registry,
            solver,
            resolutions: Mutex::new(BoundedCache::with_capacity(cache_capacity)),
        }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Bound the number of cached resolutions
    pub fn with_resolution_capacity(mut self, capacity: usize) -> Self {
        self.resolutions = Mutex::new(BoundedCache::with_capacity(capacity));
        self
    }

    /// Statistics of the solver result cache
    pub fn stats(&self) -> CacheStats {
        self.solver.stats()
    }

    /// Statistics of the resolution cache
    pub fn resolution_stats(&self) -> CacheStats {
        self.resolutions.lock().stats()
    }

    pub fn resolve(&self, pair: &TypePair, kind: MapKind, mode: ExecutionMode) -> Resolution {
        let key = (pair.clone(), kind, mode);
        if let Some(cached) = self.resolutions.lock().get(&key) {
            return cached;
        }

        // Resolving may be slow; the lock is not held meanwhile
        let resolution = self.resolve_uncached(pair, kind, mode);
        self.resolutions.lock().insert(key, resolution.clone());
        resolution
    }

    fn resolve_uncached(&self, pair: &TypePair, kind: MapKind, mode: ExecutionMode) -> Resolution {
        if pair.is_open() {
            return Resolution::NotFound;
        }

        let resolution = self.find(pair, kind, mode);
        if resolution != Resolution::NotFound || kind != MapKind::New {
            return resolution;
        }

        match self.find(pair, MapKind::Merge, mode) {
            Resolution::Direct {
                declaration,
                arguments,
            } if self
                .registry
                .catalog()
                .has_default_constructor(&pair.destination) =>
            {
                debug!(%pair, declaration = declaration.0, "new map falls back to merge map");
                Resolution::MergeFallback {
                    declaration,
                    arguments,
                }
            }
            ambiguous @ Resolution::Ambiguous { .. } => ambiguous,
            _ => {
                debug!(%pair, %kind, "no map found");
                Resolution::NotFound
            }
        }
    }

    fn find(&self, pair: &TypePair, kind: MapKind, mode: ExecutionMode) -> Resolution {
        let exact = self
            .registry
            .find_exact(pair, kind)
            .into_iter()
            .filter(|declaration| mode.accepts(declaration))
            .min_by_key(|declaration| (mode.preference(declaration), declaration.id));
        if let Some(declaration) = exact {
            debug!(%pair, %kind, declaration = declaration.id.0, "exact map");
            return Resolution::Direct {
                declaration: declaration.id,
                arguments: TypeArguments::empty(),
            };
        }

        let solved: Vec<(&MapDeclaration, TypeArguments)> = self
            .registry
            .find_generic(pair, kind)
            .into_iter()
            .filter(|declaration| mode.accepts(declaration))
            .filter_map(|declaration| {
                let MapSignature::Generic(signature) = &declaration.signature else {
                    return None;
                };
                self.solver
                    .solve(SignatureKey(declaration.id.0 as u64), signature, pair)
                    .map(|arguments| (declaration, arguments))
            })
            .collect();

        // Registration order decides between providers
        let Some(provider) = solved.first().map(|(declaration, _)| declaration.provider.index)
        else {
            return Resolution::NotFound;
        };

        let mut ranked: Vec<_> = solved
            .into_iter()
            .filter(|(declaration, _)| declaration.provider.index == provider)
            .map(|(declaration, arguments)| (Self::rank(declaration, mode), declaration, arguments))
            .collect();
        ranked.sort_by_key(|(rank, declaration, _)| (*rank, declaration.id));

        match ranked.as_slice() {
            [(best, first, _), (next, second, _), ..] if best == next => {
                debug!(%pair, %kind, provider = %first.provider, "ambiguous generic maps");
                Resolution::Ambiguous {
                    provider: first.provider.name.to_string(),
                    first: first.pair().clone(),
                    second: second.pair().clone(),
                }
            }
            [(_, declaration, arguments), ..] => {
                debug!(
                    %pair,
                    %kind,
                    declaration = declaration.id.0,
                    signature = %declaration.pair(),
                    %arguments,
                    "generic map"
                );
                Resolution::Direct {
                    declaration: declaration.id,
                    arguments: arguments.clone(),
                }
            }
            [] => Resolution::NotFound,
        }
    }

    /// Lower is more specific
    fn rank(declaration: &MapDeclaration, mode: ExecutionMode) -> (usize, Reverse<usize>, u8) {
        match &declaration.signature {
            MapSignature::Generic(signature) => (
                signature.free_parameters(),
                Reverse(signature.concrete_weight()),
                mode.preference(declaration),
            ),
            MapSignature::Concrete(_) => (0, Reverse(usize::MAX), mode.preference(declaration)),
        }
    }
}
