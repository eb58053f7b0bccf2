//! Generic parameter constraints and their predicates
//!
//! Each generic parameter of an open declaration carries a set of constraints
//! with AND semantics. Constraints are evaluated by predicates looked up by
//! `ConstraintKind`, so the checks themselves are replaceable: the standard set
//! answers them from the `TypeCatalog`, and callers can swap in their own.

use crate::catalog::TypeCatalog;
use crate::error::SignatureError;
use crate::types::{StructuredType, TypePair};
use indexmap::IndexMap;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// A single requirement on the type bound to a generic parameter
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Constraint {
    ReferenceType,
    ValueType,
    /// Value type whose fields are recursively unmanaged value types
    Unmanaged,
    DefaultConstructor,
    /// Assignable to a non-interface type (may mention other parameters)
    DerivesFrom(StructuredType),
    /// Assignable to an interface type (may mention other parameters)
    Implements(StructuredType),
    /// Assignable to the type bound to another parameter of the same declaration
    AssignableToParameter(usize),
}

/// Key used to look up the predicate evaluating a constraint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConstraintKind {
    ReferenceType,
    ValueType,
    Unmanaged,
    DefaultConstructor,
    DerivesFrom,
    Implements,
    AssignableToParameter,
}

impl Constraint {
    pub fn kind(&self) -> ConstraintKind {
        match self {
            Constraint::ReferenceType => ConstraintKind::ReferenceType,
            Constraint::ValueType => ConstraintKind::ValueType,
            Constraint::Unmanaged => ConstraintKind::Unmanaged,
            Constraint::DefaultConstructor => ConstraintKind::DefaultConstructor,
            Constraint::DerivesFrom(_) => ConstraintKind::DerivesFrom,
            Constraint::Implements(_) => ConstraintKind::Implements,
            Constraint::AssignableToParameter(_) => ConstraintKind::AssignableToParameter,
        }
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constraint::ReferenceType => f.write_str("class"),
            Constraint::ValueType => f.write_str("struct"),
            Constraint::Unmanaged => f.write_str("unmanaged"),
            Constraint::DefaultConstructor => f.write_str("new()"),
            Constraint::DerivesFrom(ty) | Constraint::Implements(ty) => write!(f, "{ty}"),
            Constraint::AssignableToParameter(index) => write!(f, "T{index}"),
        }
    }
}

/// Constraint set of one generic parameter
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct GenericParameter {
    /// Name used in diagnostics only
    pub name: Option<String>,
    pub constraints: Vec<Constraint>,
}

impl GenericParameter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn named(name: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            constraints: Vec::new(),
        }
    }

    pub fn with(mut self, constraint: Constraint) -> Self {
        self.constraints.push(constraint);
        self
    }
}

/// Open source/destination shape plus its ordered parameters
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GenericSignature {
    pub pair: TypePair,
    pub parameters: Vec<GenericParameter>,
}

impl GenericSignature {
    pub fn new(pair: TypePair, parameters: Vec<GenericParameter>) -> Self {
        Self { pair, parameters }
    }

    /// Signature whose parameters are inferred from the shape, without constraints
    pub fn unconstrained(pair: TypePair) -> Self {
        let count = Self::params_of(&pair).last().map_or(0, |max| max + 1);
        Self {
            pair,
            parameters: vec![GenericParameter::new(); count],
        }
    }

    /// Add a constraint to one parameter
    pub fn with_constraint(mut self, index: usize, constraint: Constraint) -> Self {
        if index >= self.parameters.len() {
            self.parameters.resize(index + 1, GenericParameter::new());
        }
        self.parameters[index].constraints.push(constraint);
        self
    }

    fn params_of(pair: &TypePair) -> BTreeSet<usize> {
        let mut params = BTreeSet::new();
        pair.source.collect_params(&mut params);
        pair.destination.collect_params(&mut params);
        params
    }

    /// Number of distinct free parameters
    pub fn free_parameters(&self) -> usize {
        self.parameters.len()
    }

    /// Amount of concrete structure in the shape; larger is more specific
    pub fn concrete_weight(&self) -> usize {
        self.pair.source.concrete_weight() + self.pair.destination.concrete_weight()
    }

    /// Check that every parameter is used, every reference is declared and
    /// constraint targets name known types
    pub fn validate(&self, catalog: &TypeCatalog) -> Result<(), SignatureError> {
        let declared = self.parameters.len();
        let used = Self::params_of(&self.pair);

        if let Some(index) = used.iter().find(|index| **index >= declared) {
            return Err(SignatureError::UnknownParameter {
                pair: self.pair.clone(),
                index: *index,
                declared,
            });
        }

        if let Some(index) = (0..declared).find(|index| !used.contains(index)) {
            return Err(SignatureError::UnusedParameter {
                pair: self.pair.clone(),
                index,
            });
        }

        for (index, parameter) in self.parameters.iter().enumerate() {
            for constraint in &parameter.constraints {
                match constraint {
                    Constraint::AssignableToParameter(other) if *other >= declared => {
                        return Err(SignatureError::UnknownParameter {
                            pair: self.pair.clone(),
                            index: *other,
                            declared,
                        });
                    }
                    Constraint::DerivesFrom(ty) | Constraint::Implements(ty) => {
                        let mut referenced = BTreeSet::new();
                        ty.collect_params(&mut referenced);
                        if let Some(other) = referenced.iter().find(|other| **other >= declared) {
                            return Err(SignatureError::UnknownParameter {
                                pair: self.pair.clone(),
                                index: *other,
                                declared,
                            });
                        }
                        if ty.base_name().is_some_and(|name| !catalog.contains(name)) {
                            return Err(SignatureError::UnknownConstraintType {
                                index,
                                ty: ty.clone(),
                            });
                        }
                    }
                    _ => {}
                }
            }
        }

        Ok(())
    }
}

/// Everything a predicate needs to evaluate one constraint
#[derive(Debug, Clone, Copy)]
pub struct ConstraintCheck<'a> {
    /// Concrete type bound to the constrained parameter
    pub bound: &'a StructuredType,
    pub constraint: &'a Constraint,
    /// Bindings of every parameter of the declaration
    pub arguments: &'a [StructuredType],
    pub catalog: &'a TypeCatalog,
}

impl ConstraintCheck<'_> {
    /// Type referenced by the constraint with the other parameters substituted
    pub fn target(&self) -> Option<StructuredType> {
        match self.constraint {
            Constraint::DerivesFrom(ty) | Constraint::Implements(ty) => {
                Some(ty.substitute(self.arguments))
            }
            Constraint::AssignableToParameter(index) => self.arguments.get(*index).cloned(),
            _ => None,
        }
    }
}

/// Evaluates one kind of constraint
pub trait ConstraintPredicate: Send + Sync {
    fn check(&self, check: &ConstraintCheck<'_>) -> bool;
}

impl<F> ConstraintPredicate for F
where
    F: Fn(&ConstraintCheck<'_>) -> bool + Send + Sync,
{
    fn check(&self, check: &ConstraintCheck<'_>) -> bool {
        self(check)
    }
}

/// Predicate registry keyed by constraint kind
#[derive(Clone)]
pub struct ConstraintPredicates {
    predicates: IndexMap<ConstraintKind, Arc<dyn ConstraintPredicate>>,
}

impl fmt::Debug for ConstraintPredicates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConstraintPredicates")
            .field("kinds", &self.predicates.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Default for ConstraintPredicates {
    fn default() -> Self {
        Self::standard()
    }
}

impl ConstraintPredicates {
    /// Registry with no predicates; every constraint fails
    pub fn empty() -> Self {
        Self {
            predicates: IndexMap::new(),
        }
    }

    /// Catalog-backed predicates for every constraint kind
    pub fn standard() -> Self {
        Self::empty()
            .with(ConstraintKind::ReferenceType, |c: &ConstraintCheck<'_>| {
                c.catalog.is_reference_type(c.bound)
            })
            .with(ConstraintKind::ValueType, |c: &ConstraintCheck<'_>| {
                c.catalog.is_value_type(c.bound)
            })
            .with(ConstraintKind::Unmanaged, |c: &ConstraintCheck<'_>| {
                c.catalog.is_unmanaged(c.bound)
            })
            .with(ConstraintKind::DefaultConstructor, |c: &ConstraintCheck<'_>| {
                c.catalog.has_default_constructor(c.bound)
            })
            .with(ConstraintKind::DerivesFrom, |c: &ConstraintCheck<'_>| {
                c.target().is_some_and(|target| {
                    !c.catalog.is_interface(&target) && c.catalog.is_assignable(c.bound, &target)
                })
            })
            .with(ConstraintKind::Implements, |c: &ConstraintCheck<'_>| {
                c.target().is_some_and(|target| {
                    c.catalog.is_interface(&target) && c.catalog.is_assignable(c.bound, &target)
                })
            })
            .with(ConstraintKind::AssignableToParameter, |c: &ConstraintCheck<'_>| {
                c.target()
                    .is_some_and(|target| c.catalog.is_assignable(c.bound, &target))
            })
    }

    /// Replace the predicate for one kind
    pub fn with(
        mut self,
        kind: ConstraintKind,
        predicate: impl ConstraintPredicate + 'static,
    ) -> Self {
        self.predicates.insert(kind, Arc::new(predicate));
        self
    }

    /// Evaluate one constraint; kinds without a predicate are unsatisfiable
    pub fn check(&self, check: &ConstraintCheck<'_>) -> bool {
        self.predicates
            .get(&check.constraint.kind())
            .is_some_and(|predicate| predicate.check(check))
    }
}
