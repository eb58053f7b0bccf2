//! remap type system
//!
//! Type descriptors and generic constraint solving for the remap mapping engine.
//!
//! ## Architecture
//!
//! - **Types**: `StructuredType` trees and `TypePair` request keys
//! - **Catalog**: the registered type universe with a supertype graph
//! - **Unification**: binds generic placeholders against concrete types
//! - **Constraints**: per-parameter constraint sets evaluated by pluggable predicates
//! - **Solver**: unification plus constraint checking, memoised per declaration and pair

pub mod cache;
pub mod catalog;
pub mod constraints;
pub mod error;
pub mod solver;
pub mod types;
pub mod unification;

// Re-export public API
pub use cache::{BoundedCache, CacheStats};
pub use catalog::{CollectionKind, CollectionShape, TypeCatalog, TypeCategory, TypeDescriptor};
pub use constraints::{
    Constraint, ConstraintCheck, ConstraintKind, ConstraintPredicate, ConstraintPredicates,
    GenericParameter, GenericSignature,
};
pub use error::{CatalogError, SignatureError};
pub use solver::{ConstraintSolver, SignatureKey};
pub use types::{ty, StructuredType, TypeArguments, TypeName, TypePair};
pub use unification::{could_unify, unify, Bindings};

#[cfg(test)]
mod tests;
