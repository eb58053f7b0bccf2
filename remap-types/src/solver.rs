//! Generic constraint solver
//!
//! `ConstraintSolver::solve` decides whether an open signature can serve a
//! concrete type pair. Both the declared source and destination are unified
//! against the requested ones into one shared set of bindings, so a parameter
//! that appears on both sides must bind to the same type. Once every parameter
//! is bound, all constraints of all parameters are evaluated; a single failure
//! rejects the candidate.

use crate::cache::{CacheStats, SolverCache};
use crate::catalog::TypeCatalog;
use crate::constraints::{ConstraintCheck, ConstraintPredicates, GenericSignature};
use crate::types::{TypeArguments, TypePair};
use crate::unification::{unify, Bindings};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use tracing::trace;

/// Stable identity of a declaration, used as part of the cache key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SignatureKey(pub u64);

pub struct ConstraintSolver {
    catalog: Arc<TypeCatalog>,
    predicates: ConstraintPredicates,
    cache: Mutex<SolverCache>,
}

impl fmt::Debug for ConstraintSolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConstraintSolver")
            .field("predicates", &self.predicates)
            .field("cache", &self.cache.lock().stats())
            .finish()
    }
}

impl ConstraintSolver {
    pub fn new(catalog: Arc<TypeCatalog>) -> Self {
        Self::with_predicates(catalog, ConstraintPredicates::standard())
    }

    pub fn with_predicates(catalog: Arc<TypeCatalog>, predicates: ConstraintPredicates) -> Self {
        Self {
            catalog,
            predicates,
            cache: Mutex::new(SolverCache::new()),
        }
    }

    /// Bound the number of cached results
    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache = Mutex::new(SolverCache::with_capacity(capacity));
        self
    }

    pub fn catalog(&self) -> &Arc<TypeCatalog> {
        &self.catalog
    }

    /// Bind every parameter of `signature` so that it serves `requested`.
    ///
    /// Returns `None` when the shapes do not unify, a parameter stays unbound,
    /// or any constraint is violated. Open requests never match.
    pub fn solve(
        &self,
        key: SignatureKey,
        signature: &GenericSignature,
        requested: &TypePair,
    ) -> Option<TypeArguments> {
        if requested.is_open() {
            return None;
        }

        if let Some(cached) = self.cache.lock().get(key, requested) {
            trace!(
                signature = %signature.pair,
                %requested,
                solved = cached.is_some(),
                "solver cache hit"
            );
            return cached;
        }

        // The lock is not held while solving; concurrent misses may solve twice
        let result = self.solve_uncached(signature, requested);
        trace!(
            signature = %signature.pair,
            %requested,
            solved = result.is_some(),
            "solved generic signature"
        );
        self.cache.lock().insert(key, requested.clone(), result.clone());
        result
    }

    fn solve_uncached(
        &self,
        signature: &GenericSignature,
        requested: &TypePair,
    ) -> Option<TypeArguments> {
        let mut bindings = Bindings::new(signature.parameters.len());

        if !unify(&signature.pair.source, &requested.source, &mut bindings, &self.catalog) {
            return None;
        }
        if !unify(
            &signature.pair.destination,
            &requested.destination,
            &mut bindings,
            &self.catalog,
        ) {
            return None;
        }

        let arguments = bindings.into_arguments()?;
        let satisfied = signature.parameters.iter().enumerate().all(|(index, parameter)| {
            let Some(bound) = arguments.get(index) else {
                return false;
            };
            parameter.constraints.iter().all(|constraint| {
                let check = ConstraintCheck {
                    bound,
                    constraint,
                    arguments: arguments.as_slice(),
                    catalog: &self.catalog,
                };
                let passed = self.predicates.check(&check);
                if !passed {
                    trace!(parameter = index, %bound, %constraint, "constraint rejected binding");
                }
                passed
            })
        });

        satisfied.then_some(arguments)
    }

    pub fn stats(&self) -> CacheStats {
        self.cache.lock().stats()
    }

    pub fn clear_cache(&self) {
        self.cache.lock().clear();
    }
}
