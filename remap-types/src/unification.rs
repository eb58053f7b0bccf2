//! Structural unification of open declarations against concrete types
//!
//! An open type (one containing `Param` placeholders) unifies with a concrete
//! type when the placeholders can be bound so that the two become equal. At the
//! top level the concrete type may also be replaced by any of its ancestors,
//! which is how `Enumerable<T>` unifies with `int[]`. Generic arguments are
//! invariant: below the top level only exact structural matches count.
//!
//! Every placeholder binds at most once. A second occurrence of the same
//! parameter must meet the same concrete type, otherwise unification fails.

use crate::catalog::TypeCatalog;
use crate::types::{StructuredType, TypeArguments};

/// Parameter bindings collected while unifying one declaration
#[derive(Debug, Clone, PartialEq)]
pub struct Bindings {
    slots: Vec<Option<StructuredType>>,
}

impl Bindings {
    /// Unbound slots for `count` parameters
    pub fn new(count: usize) -> Self {
        Self {
            slots: vec![None; count],
        }
    }

    /// Bind a parameter, failing on unknown indices and conflicting bindings
    pub fn bind(&mut self, index: usize, ty: &StructuredType) -> bool {
        match self.slots.get_mut(index) {
            None => false,
            Some(Some(existing)) => existing == ty,
            Some(slot) => {
                *slot = Some(ty.clone());
                true
            }
        }
    }

    pub fn get(&self, index: usize) -> Option<&StructuredType> {
        self.slots.get(index).and_then(Option::as_ref)
    }

    pub fn is_complete(&self) -> bool {
        self.slots.iter().all(Option::is_some)
    }

    /// Convert into type arguments when every parameter is bound
    pub fn into_arguments(self) -> Option<TypeArguments> {
        self.slots
            .into_iter()
            .collect::<Option<Vec<_>>>()
            .map(TypeArguments::new)
    }
}

/// Unify an open type against a concrete one, walking the concrete type's
/// ancestors when the types do not match directly.
///
/// Bindings are left untouched when unification fails.
pub fn unify(
    open: &StructuredType,
    concrete: &StructuredType,
    bindings: &mut Bindings,
    catalog: &TypeCatalog,
) -> bool {
    if attempt(open, concrete, bindings) {
        return true;
    }

    // A placeholder binds to the concrete type itself, never to an ancestor
    if matches!(open, StructuredType::Param(_)) {
        return false;
    }

    catalog
        .ancestors(concrete)
        .iter()
        .any(|ancestor| attempt(open, ancestor, bindings))
}

fn attempt(open: &StructuredType, concrete: &StructuredType, bindings: &mut Bindings) -> bool {
    let snapshot = bindings.clone();
    if unify_exact(open, concrete, bindings) {
        true
    } else {
        *bindings = snapshot;
        false
    }
}

/// Invariant structural unification
fn unify_exact(open: &StructuredType, concrete: &StructuredType, bindings: &mut Bindings) -> bool {
    match (open, concrete) {
        (StructuredType::Param(index), concrete) => bindings.bind(*index, concrete),
        (StructuredType::Simple(a), StructuredType::Simple(b)) => a == b,
        (
            StructuredType::Generic { base: a, args: xs },
            StructuredType::Generic { base: b, args: ys },
        ) => a == b && unify_all(xs, ys, bindings),
        (
            StructuredType::Array { element: a, rank: r1 },
            StructuredType::Array { element: b, rank: r2 },
        ) => r1 == r2 && unify_exact(a, b, bindings),
        (StructuredType::Tuple(xs), StructuredType::Tuple(ys)) => unify_all(xs, ys, bindings),
        _ => false,
    }
}

fn unify_all(
    open: &[StructuredType],
    concrete: &[StructuredType],
    bindings: &mut Bindings,
) -> bool {
    open.len() == concrete.len()
        && open
            .iter()
            .zip(concrete)
            .all(|(o, c)| unify_exact(o, c, bindings))
}

/// Cheap shape check used to prefilter candidates before solving.
///
/// Only the outermost constructor is compared; a `true` result may still fail
/// full unification.
pub fn could_unify(
    open: &StructuredType,
    concrete: &StructuredType,
    catalog: &TypeCatalog,
) -> bool {
    let shallow = |candidate: &StructuredType| match (open, candidate) {
        (StructuredType::Param(_), _) => true,
        (StructuredType::Array { rank: r1, .. }, StructuredType::Array { rank: r2, .. }) => {
            r1 == r2
        }
        (StructuredType::Tuple(xs), StructuredType::Tuple(ys)) => xs.len() == ys.len(),
        _ => match (open.base_name(), candidate.base_name()) {
            (Some(a), Some(b)) => a == b && open.args().len() == candidate.args().len(),
            _ => false,
        },
    };

    shallow(concrete) || catalog.ancestors(concrete).iter().any(shallow)
}
