//! Tests for registry initialisation and indexing

use super::fixtures::{self, int_to_string, pair, product, products, sample_provider};
use crate::declaration::{provider_fn, MapKind, MapSignature};
use crate::error::RegistryError;
use crate::registry::Registry;
use crate::value::Value;
use remap_types::{
    ty, CatalogError, Constraint, GenericSignature, SignatureError, StructuredType, TypeName,
};
use pretty_assertions::assert_eq;

fn t(index: usize) -> StructuredType {
    StructuredType::param(index)
}

#[test]
fn test_declarations_are_indexed_by_pair_and_kind() {
    let registry = fixtures::registry();

    assert_eq!(registry.len(), 4);
    assert_eq!(registry.providers().len(), 1);
    assert_eq!(registry.providers()[0].name.as_ref(), "sample");
    assert_eq!(registry.find_exact(&int_to_string(), MapKind::New).len(), 1);
    assert_eq!(registry.find_exact(&int_to_string(), MapKind::Merge).len(), 0);
    assert_eq!(registry.find_exact(&products(), MapKind::Match).len(), 1);
    assert!(registry.find_generic(&products(), MapKind::New).is_empty());
}

#[test]
fn test_declaration_ids_follow_registration_order() {
    let registry = fixtures::registry();
    let kinds: Vec<MapKind> = registry.declarations().map(|d| d.kind()).collect();

    assert_eq!(
        kinds,
        vec![MapKind::New, MapKind::New, MapKind::Merge, MapKind::Match]
    );
    for (index, declaration) in registry.declarations().enumerate() {
        assert_eq!(declaration.id.0, index);
        assert_eq!(registry.declaration(declaration.id).unwrap().id, declaration.id);
    }
}

#[test]
fn test_open_concrete_pair_becomes_generic() {
    let provider = provider_fn("open", |declarations| {
        declarations.new_map(pair(ty::list(t(0)), ty::list(t(0))), |source, _| {
            Ok(source.clone())
        });
    });
    let registry = Registry::init(fixtures::shared_catalog(), &[&provider]).unwrap();
    let declaration = registry.declarations().next().unwrap();

    assert!(matches!(declaration.signature, MapSignature::Generic(_)));
    let requested = pair(ty::list(ty::int()), ty::list(ty::int()));
    assert_eq!(registry.find_generic(&requested, MapKind::New).len(), 1);
    assert!(registry
        .find_generic(&pair(ty::int(), ty::int()), MapKind::New)
        .is_empty());
}

#[test]
fn test_closed_generic_becomes_concrete() {
    let provider = provider_fn("closed", |declarations| {
        declarations.new_map(GenericSignature::new(int_to_string(), Vec::new()), |_, _| {
            Ok(Value::from("x"))
        });
    });
    let registry = Registry::init(fixtures::shared_catalog(), &[&provider]).unwrap();

    assert_eq!(registry.find_exact(&int_to_string(), MapKind::New).len(), 1);
}

#[test]
fn test_duplicate_declaration_in_one_provider_fails() {
    let provider = provider_fn("twice", |declarations| {
        declarations
            .new_map(int_to_string(), |_, _| Ok(Value::from("a")))
            .new_map(int_to_string(), |_, _| Ok(Value::from("b")));
    });
    let err = Registry::init(fixtures::shared_catalog(), &[&provider]).unwrap_err();

    assert_eq!(
        err,
        RegistryError::DuplicateMap {
            provider: "twice".to_string(),
            kind: MapKind::New,
            pair: int_to_string(),
        }
    );
}

#[test]
fn test_same_pair_with_different_kinds_is_not_a_duplicate() {
    let provider = provider_fn("kinds", |declarations| {
        declarations
            .new_map(products(), |source, _| Ok(source.clone()))
            .merge_map(products(), |_, destination, _| Ok(destination.clone()))
            .async_new_map(products(), |source, _| async move { Ok(source) });
    });
    let registry = Registry::init(fixtures::shared_catalog(), &[&provider]).unwrap();

    assert_eq!(registry.len(), 3);
    assert_eq!(registry.find_exact(&products(), MapKind::New).len(), 2);
}

#[test]
fn test_same_pair_in_two_providers_is_allowed() {
    let other = provider_fn("other", |declarations| {
        declarations.new_map(int_to_string(), |_, _| Ok(Value::from("other")));
    });
    let registry =
        Registry::init(fixtures::shared_catalog(), &[&sample_provider(), &other]).unwrap();

    let found = registry.find_exact(&int_to_string(), MapKind::New);
    assert_eq!(found.len(), 2);
    assert_eq!(found[0].provider.index, 0);
    assert_eq!(found[1].provider.index, 1);
}

#[test]
fn test_unknown_type_fails() {
    let provider = provider_fn("unknown", |declarations| {
        declarations.new_map(pair(StructuredType::simple("Missing"), product()), |_, _| {
            Ok(Value::Null)
        });
    });
    let err = Registry::init(fixtures::shared_catalog(), &[&provider]).unwrap_err();

    assert_eq!(
        err,
        RegistryError::Catalog(CatalogError::UnknownType {
            name: TypeName::new("Missing"),
            referenced_by: TypeName::new("unknown"),
        })
    );
}

#[test]
fn test_wrong_arity_fails() {
    let provider = provider_fn("arity", |declarations| {
        declarations.new_map(
            pair(StructuredType::generic("List", vec![ty::int(), ty::int()]), product()),
            |_, _| Ok(Value::Null),
        );
    });
    let err = Registry::init(fixtures::shared_catalog(), &[&provider]).unwrap_err();

    assert!(matches!(
        err,
        RegistryError::Catalog(CatalogError::ArityMismatch { expected: 1, found: 2, .. })
    ));
}

#[test]
fn test_unused_generic_parameter_fails() {
    let provider = provider_fn("unused", |declarations| {
        let signature = GenericSignature::unconstrained(pair(t(0), ty::string()))
            .with_constraint(1, Constraint::ValueType);
        declarations.new_map(signature, |_, _| Ok(Value::Null));
    });
    let err = Registry::init(fixtures::shared_catalog(), &[&provider]).unwrap_err();

    match err {
        RegistryError::InvalidSignature { provider, source } => {
            assert_eq!(provider, "unused");
            assert!(matches!(source, SignatureError::UnusedParameter { index: 1, .. }));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}
