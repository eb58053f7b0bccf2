//! Tests for structured type helpers

use crate::types::{ty, StructuredType, TypeArguments, TypePair};
use std::collections::BTreeSet;

#[test]
fn test_display_renders_readable_names() {
    assert_eq!(ty::list(ty::int()).to_string(), "List<int>");
    assert_eq!(ty::array(ty::string()).to_string(), "string[]");
    assert_eq!(
        StructuredType::array_of_rank(ty::int(), 2).to_string(),
        "int[,]"
    );
    assert_eq!(
        StructuredType::tuple(vec![ty::int(), ty::string()]).to_string(),
        "(int, string)"
    );
    assert_eq!(
        ty::dictionary(StructuredType::param(0), StructuredType::param(1)).to_string(),
        "Dictionary<T0, T1>"
    );
    assert_eq!(
        TypePair::new(ty::int(), ty::string()).to_string(),
        "int -> string"
    );
}

#[test]
fn test_open_types_are_detected() {
    assert!(!ty::list(ty::int()).is_open());
    assert!(ty::list(StructuredType::param(0)).is_open());
    assert!(StructuredType::array(StructuredType::param(0)).is_open());
    assert!(TypePair::new(ty::int(), StructuredType::tuple(vec![StructuredType::param(1)])).is_open());
}

#[test]
fn test_collect_params_finds_every_placeholder() {
    let open = ty::dictionary(
        StructuredType::param(1),
        ty::list(StructuredType::array(StructuredType::param(0))),
    );
    let mut params = BTreeSet::new();
    open.collect_params(&mut params);
    assert_eq!(params.into_iter().collect::<Vec<_>>(), vec![0, 1]);
}

#[test]
fn test_concrete_weight_counts_non_placeholder_nodes() {
    assert_eq!(StructuredType::param(0).concrete_weight(), 0);
    assert_eq!(ty::list(StructuredType::param(0)).concrete_weight(), 1);
    assert_eq!(ty::list(ty::int()).concrete_weight(), 2);
    assert_eq!(
        ty::dictionary(ty::string(), StructuredType::param(0)).concrete_weight(),
        2
    );
}

#[test]
fn test_substitute_replaces_bound_placeholders_only() {
    let open = ty::dictionary(StructuredType::param(0), StructuredType::param(1));
    let closed = open.substitute(&[ty::string()]);
    assert_eq!(closed, ty::dictionary(ty::string(), StructuredType::param(1)));

    let arguments = TypeArguments::new(vec![ty::int(), ty::long()]);
    let pair = TypePair::new(
        StructuredType::array(StructuredType::param(0)),
        ty::list(StructuredType::param(1)),
    );
    assert_eq!(
        pair.substitute(arguments.as_slice()),
        TypePair::new(ty::array(ty::int()), ty::list(ty::long()))
    );
    assert_eq!(arguments.to_string(), "<int, long>");
}
