//! Tests for the type catalog and hierarchy queries

use super::fixtures::{self, base, derived, entity, named, point, product};
use crate::catalog::{CollectionKind, CollectionShape, TypeCatalog, TypeDescriptor};
use crate::error::CatalogError;
use crate::types::{ty, StructuredType, TypeName};
use pretty_assertions::assert_eq;

#[test]
fn test_builtins_are_registered() {
    let catalog = TypeCatalog::with_builtins();
    for name in ["object", "int", "string", "Enumerable", "List", "Dictionary", "ReadOnlyList"] {
        assert!(catalog.contains(&TypeName::new(name)), "missing builtin {name}");
    }
}

#[test]
fn test_list_ancestors_are_instantiated_nearest_first() {
    let catalog = TypeCatalog::with_builtins();
    assert_eq!(
        catalog.ancestors(&ty::list(ty::int())),
        vec![
            ty::collection(ty::int()),
            ty::read_only_collection(ty::int()),
            ty::enumerable(ty::int()),
        ]
    );
}

#[test]
fn test_arrays_behave_like_read_only_collections() {
    let catalog = TypeCatalog::with_builtins();
    let array = ty::array(ty::string());

    assert_eq!(
        catalog.ancestors(&array),
        vec![
            ty::read_only_collection(ty::string()),
            ty::enumerable(ty::string()),
        ]
    );
    assert_eq!(
        catalog.collection_shape(&array),
        Some(CollectionShape::read_only(CollectionKind::Array))
    );
    assert_eq!(
        catalog.collection_shape(&StructuredType::array_of_rank(ty::int(), 2)),
        None
    );
    assert!(catalog.is_reference_type(&array));
    assert!(!catalog.has_default_constructor(&array));
}

#[test]
fn test_assignability_follows_the_hierarchy() {
    let catalog = fixtures::catalog();

    assert!(catalog.is_assignable(&product(), &entity()));
    assert!(catalog.is_assignable(&derived(), &base()));
    assert!(catalog.is_assignable(&product(), &ty::object()));
    assert!(catalog.is_assignable(&ty::array(ty::int()), &ty::enumerable(ty::int())));
    assert!(!catalog.is_assignable(&base(), &derived()));
    assert!(!catalog.is_assignable(&ty::array(ty::int()), &ty::enumerable(ty::long())));
    assert!(!catalog.is_assignable(&ty::list(ty::int()), &ty::list(ty::long())));
}

#[test]
fn test_element_type_of_collections() {
    let catalog = TypeCatalog::with_builtins();

    assert_eq!(catalog.element_type(&ty::array(ty::int())), Some(ty::int()));
    assert_eq!(catalog.element_type(&ty::set(ty::string())), Some(ty::string()));
    assert_eq!(
        catalog.element_type(&ty::enumerable(ty::long())),
        Some(ty::long())
    );
    assert_eq!(
        catalog.element_type(&ty::dictionary(ty::string(), ty::int())),
        Some(StructuredType::tuple(vec![ty::string(), ty::int()]))
    );
    assert_eq!(catalog.element_type(&ty::int()), None);
}

#[test]
fn test_value_and_reference_classification() {
    let catalog = fixtures::catalog();

    assert!(catalog.is_value_type(&ty::int()));
    assert!(catalog.is_value_type(&point()));
    assert!(catalog.is_value_type(&StructuredType::tuple(vec![ty::int(), ty::string()])));
    assert!(!catalog.is_value_type(&product()));

    assert!(catalog.is_reference_type(&product()));
    assert!(catalog.is_reference_type(&entity()));
    assert!(catalog.is_reference_type(&ty::string()));
    assert!(!catalog.is_reference_type(&ty::int()));
}

#[test]
fn test_unmanaged_checks_fields_recursively() {
    let catalog = fixtures::catalog();

    assert!(catalog.is_unmanaged(&ty::int()));
    assert!(catalog.is_unmanaged(&point()));
    assert!(catalog.is_unmanaged(&ty::key_value_pair(ty::int(), point())));
    assert!(catalog.is_unmanaged(&StructuredType::tuple(vec![ty::int(), point()])));

    assert!(!catalog.is_unmanaged(&named()));
    assert!(!catalog.is_unmanaged(&ty::string()));
    assert!(!catalog.is_unmanaged(&ty::key_value_pair(ty::int(), ty::string())));
    assert!(!catalog.is_unmanaged(&product()));
}

#[test]
fn test_default_constructors() {
    let catalog = fixtures::catalog();

    assert!(catalog.has_default_constructor(&ty::int()));
    assert!(catalog.has_default_constructor(&ty::list(ty::int())));
    assert!(catalog.has_default_constructor(&product()));
    assert!(!catalog.has_default_constructor(&ty::string()));
    assert!(!catalog.has_default_constructor(&entity()));
    assert!(!catalog.has_default_constructor(&ty::read_only_list(ty::int())));
}

#[test]
fn test_fields_are_substituted_for_generic_types() {
    let catalog = TypeCatalog::with_builtins();
    assert_eq!(
        catalog.fields_of(&ty::key_value_pair(ty::string(), ty::long())),
        vec![
            ("key".to_string(), ty::string()),
            ("value".to_string(), ty::long()),
        ]
    );
}

#[test]
fn test_duplicate_registration_is_rejected() {
    let mut catalog = fixtures::catalog();
    let err = catalog
        .register(TypeDescriptor::class("Product"))
        .unwrap_err();
    assert_eq!(
        err,
        CatalogError::DuplicateType {
            name: TypeName::new("Product")
        }
    );
}

#[test]
fn test_unknown_supertype_is_rejected() {
    let mut catalog = TypeCatalog::with_builtins();
    let err = catalog
        .register(TypeDescriptor::class("Orphan").implements(StructuredType::simple("Missing")))
        .unwrap_err();
    assert!(matches!(err, CatalogError::UnknownType { ref name, .. } if name.as_str() == "Missing"));
    assert!(!catalog.contains(&TypeName::new("Orphan")));
}

#[test]
fn test_supertype_arity_is_checked() {
    let mut catalog = TypeCatalog::with_builtins();
    let err = catalog
        .register(TypeDescriptor::class("Bag").implements(StructuredType::simple("Enumerable")))
        .unwrap_err();
    assert_eq!(
        err,
        CatalogError::ArityMismatch {
            name: TypeName::new("Enumerable"),
            expected: 1,
            found: 0,
        }
    );
}

#[test]
fn test_cyclic_hierarchy_is_rejected() {
    let mut catalog = TypeCatalog::with_builtins();
    let err = catalog
        .register(TypeDescriptor::interface("Loop").implements(StructuredType::simple("Loop")))
        .unwrap_err();
    assert!(matches!(err, CatalogError::CyclicHierarchy { .. }));
    assert!(!catalog.contains(&TypeName::new("Loop")));
    assert!(catalog.ancestors(&StructuredType::simple("Loop")).is_empty());
}

#[test]
fn test_user_generic_collections() {
    let mut catalog = TypeCatalog::with_builtins();
    catalog
        .register(
            TypeDescriptor::class("Bag")
                .generic(1)
                .implements(ty::collection(StructuredType::param(0)))
                .collection(CollectionShape::new(CollectionKind::List)),
        )
        .unwrap();

    let bag = StructuredType::generic("Bag", vec![ty::int()]);
    assert_eq!(catalog.element_type(&bag), Some(ty::int()));
    assert!(catalog.is_assignable(&bag, &ty::enumerable(ty::int())));
}
