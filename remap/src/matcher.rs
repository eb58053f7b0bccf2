//! Element matchers
//!
//! A matcher decides whether a destination element represents the same
//! logical entity as a source element. Predicates are expected to be pure;
//! failures are reported as `MapError::Matcher`.

use crate::context::MappingContext;
use crate::declaration::{MapBody, MapKind, MatchFn};
use crate::error::{MapError, MapResult};
use crate::factory::{BoundFactory, FactoryParts};
use crate::options::MappingOptions;
use crate::resolver::{ExecutionMode, Resolution, Resolver};
use crate::value::Value;
use remap_types::TypePair;
use std::fmt;
use std::sync::Arc;

pub trait Matcher: Send + Sync + fmt::Debug {
    fn can_match(&self, pair: &TypePair, options: &MappingOptions) -> bool;

    /// Factory whose body is the match predicate for `pair`
    fn match_factory(&self, pair: &TypePair, options: &MappingOptions) -> MapResult<BoundFactory>;

    fn matches(
        &self,
        source: &Value,
        destination: &Value,
        pair: &TypePair,
        options: &MappingOptions,
    ) -> MapResult<bool> {
        let factory = self.match_factory(pair, options)?;
        let result = factory.invoke_match(source, destination);
        factory.dispose();
        result
    }
}

/// Matcher over the match declarations of a registry
#[derive(Debug)]
pub struct RegistryMatcher {
    resolver: Arc<Resolver>,
}

impl RegistryMatcher {
    pub fn new(resolver: Arc<Resolver>) -> Self {
        Self { resolver }
    }
}

impl Matcher for RegistryMatcher {
    fn can_match(&self, pair: &TypePair, _options: &MappingOptions) -> bool {
        self.resolver
            .resolve(pair, MapKind::Match, ExecutionMode::Sync)
            != Resolution::NotFound
    }

    fn match_factory(&self, pair: &TypePair, options: &MappingOptions) -> MapResult<BoundFactory> {
        match self.resolver.resolve(pair, MapKind::Match, ExecutionMode::Sync) {
            Resolution::Direct {
                declaration,
                arguments,
            } => {
                let declaration = self
                    .resolver
                    .registry()
                    .declaration(declaration)
                    .ok_or_else(|| MapError::not_found(pair.clone()))?;
                Ok(BoundFactory::new(FactoryParts {
                    pair: pair.clone(),
                    body: declaration.body.clone().scoped(pair),
                    context: MappingContext::with_type_arguments(options.clone(), arguments),
                    origin: None,
                }))
            }
            Resolution::Ambiguous {
                provider,
                first,
                second,
            } => Err(MapError::AmbiguousMap {
                pair: pair.clone(),
                provider,
                first,
                second,
            }),
            _ => Err(MapError::not_found(pair.clone())),
        }
    }
}

/// Ad-hoc matcher for one pair, typically passed as a per-call override
#[derive(Clone)]
pub struct PredicateMatcher {
    pair: TypePair,
    predicate: MatchFn,
}

impl fmt::Debug for PredicateMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PredicateMatcher")
            .field("pair", &self.pair)
            .finish()
    }
}

impl PredicateMatcher {
    pub fn new<F>(pair: TypePair, predicate: F) -> Self
    where
        F: Fn(&Value, &Value, &MappingContext) -> MapResult<bool> + Send + Sync + 'static,
    {
        Self {
            pair,
            predicate: Arc::new(predicate),
        }
    }
}

impl Matcher for PredicateMatcher {
    fn can_match(&self, pair: &TypePair, _options: &MappingOptions) -> bool {
        *pair == self.pair
    }

    fn match_factory(&self, pair: &TypePair, options: &MappingOptions) -> MapResult<BoundFactory> {
        if *pair != self.pair {
            return Err(MapError::not_found(pair.clone()));
        }
        Ok(BoundFactory::new(FactoryParts {
            pair: pair.clone(),
            body: MapBody::Match(self.predicate.clone()).scoped(pair),
            context: MappingContext::new(options.clone()),
            origin: None,
        }))
    }
}

/// Matcher that never matches
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyMatcher;

impl Matcher for EmptyMatcher {
    fn can_match(&self, _pair: &TypePair, _options: &MappingOptions) -> bool {
        false
    }

    fn match_factory(&self, pair: &TypePair, _options: &MappingOptions) -> MapResult<BoundFactory> {
        Err(MapError::not_found(pair.clone()))
    }

    fn matches(
        &self,
        _source: &Value,
        _destination: &Value,
        _pair: &TypePair,
        _options: &MappingOptions,
    ) -> MapResult<bool> {
        Ok(false)
    }
}

/// The first matcher that can match a pair decides
#[derive(Debug, Default)]
pub struct CompositeMatcher {
    matchers: Vec<Arc<dyn Matcher>>,
}

impl CompositeMatcher {
    pub fn new(matchers: Vec<Arc<dyn Matcher>>) -> Self {
        Self { matchers }
    }
}

impl Matcher for CompositeMatcher {
    fn can_match(&self, pair: &TypePair, options: &MappingOptions) -> bool {
        self.matchers.iter().any(|m| m.can_match(pair, options))
    }

    fn match_factory(&self, pair: &TypePair, options: &MappingOptions) -> MapResult<BoundFactory> {
        self.matchers
            .iter()
            .find(|m| m.can_match(pair, options))
            .ok_or_else(|| MapError::not_found(pair.clone()))?
            .match_factory(pair, options)
    }
}
