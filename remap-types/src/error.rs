//! Error types for the type catalog and generic signatures

use crate::types::{StructuredType, TypeName, TypePair};
use miette::Diagnostic;
use thiserror::Error;

/// Errors raised while building a type catalog
#[derive(Error, Diagnostic, Debug, Clone, PartialEq)]
pub enum CatalogError {
    #[error("Type {name} is already registered")]
    #[diagnostic(
        code(remap::catalog::duplicate_type),
        help("Each type name may only be registered once per catalog")
    )]
    DuplicateType { name: TypeName },

    #[error("Unknown type {name} referenced by {referenced_by}")]
    #[diagnostic(
        code(remap::catalog::unknown_type),
        help("Register {name} before types that refer to it")
    )]
    UnknownType {
        name: TypeName,
        referenced_by: TypeName,
    },

    #[error("Arity mismatch: {name} expects {expected} type arguments, found {found}")]
    #[diagnostic(
        code(remap::catalog::arity_mismatch),
        help("Ensure all generic type arguments are provided correctly")
    )]
    ArityMismatch {
        name: TypeName,
        expected: usize,
        found: usize,
    },

    #[error("Registering {name} would make the type hierarchy cyclic")]
    #[diagnostic(code(remap::catalog::cyclic_hierarchy))]
    CyclicHierarchy { name: TypeName },
}

/// Errors raised when validating an open map signature
#[derive(Error, Diagnostic, Debug, Clone, PartialEq)]
pub enum SignatureError {
    #[error("Generic parameter T{index} of {pair} does not occur in the source or destination type")]
    #[diagnostic(
        code(remap::signature::unused_parameter),
        help("Every generic parameter must be inferable from the requested type pair")
    )]
    UnusedParameter { pair: TypePair, index: usize },

    #[error("{pair} refers to T{index} but only {declared} generic parameters are declared")]
    #[diagnostic(code(remap::signature::unknown_parameter))]
    UnknownParameter {
        pair: TypePair,
        index: usize,
        declared: usize,
    },

    #[error("Constraint on T{index} refers to undeclared type {ty}")]
    #[diagnostic(code(remap::signature::unknown_constraint_type))]
    UnknownConstraintType { index: usize, ty: StructuredType },
}
