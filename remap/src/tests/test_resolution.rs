//! Tests for map resolution: exact lookup, generic solving and fallbacks

use super::fixtures::{self, category, int_to_string, pair, product, product_dto, products};
use crate::builder::MapperBuilder;
use crate::declaration::{provider_fn, FnProvider, MapKind, MapProvider};
use crate::error::MapError;
use crate::options::MappingOptions;
use crate::registry::Registry;
use crate::resolver::{ExecutionMode, Resolution, Resolver};
use crate::value::{ObjectRef, Value};
use remap_types::{
    ty, Constraint, GenericSignature, StructuredType, TypeArguments, TypeDescriptor,
};
use pretty_assertions::assert_eq;
use std::sync::Arc;

fn t(index: usize) -> StructuredType {
    StructuredType::param(index)
}

fn resolver(providers: &[&dyn MapProvider]) -> Resolver {
    Resolver::new(Arc::new(
        Registry::init(fixtures::shared_catalog(), providers).unwrap(),
    ))
}

/// Two generic maps for `List<T0> -> T1` and `T0 -> List<T1>`
fn overlapping() -> FnProvider {
    provider_fn("overlap", |declarations| {
        declarations
            .new_map(GenericSignature::unconstrained(pair(ty::list(t(0)), t(1))), |_, _| {
                Ok(Value::Null)
            })
            .new_map(GenericSignature::unconstrained(pair(t(0), ty::list(t(1)))), |_, _| {
                Ok(Value::Null)
            });
    })
}

/// `T0 -> int` for entities, reading their id
fn entity_ids() -> FnProvider {
    provider_fn("derives", |declarations| {
        let signature = GenericSignature::unconstrained(pair(t(0), ty::int()))
            .with_constraint(0, Constraint::Implements(fixtures::entity()));
        declarations.new_map(signature, |source, _| Ok(source.require_object()?.get("Id")));
    })
}

#[test]
fn test_exact_beats_generic() {
    let provider = provider_fn("mixed", |declarations| {
        declarations
            .new_map(GenericSignature::unconstrained(pair(t(0), ty::string())), |_, _| {
                Ok(Value::from("generic"))
            })
            .new_map(int_to_string(), |_, _| Ok(Value::from("exact")));
    });
    let engine = fixtures::engine_for(provider);
    let options = MappingOptions::new();

    assert_eq!(
        engine.map(&Value::Int(1), &int_to_string(), &options).unwrap(),
        Value::from("exact")
    );
    assert_eq!(
        engine
            .map(&Value::Bool(true), &pair(ty::boolean(), ty::string()), &options)
            .unwrap(),
        Value::from("generic")
    );
}

#[test]
fn test_constraint_decides_applicability() {
    let provider = |constraint: Constraint| {
        provider_fn("constrained", move |declarations| {
            let signature = GenericSignature::unconstrained(pair(t(0), ty::string()))
                .with_constraint(0, constraint.clone());
            declarations.new_map(signature, |_, _| Ok(Value::from("value")));
        })
    };
    let options = MappingOptions::new();

    let value_types = fixtures::engine_for(provider(Constraint::ValueType));
    assert!(value_types.can_map(&int_to_string(), MapKind::New, &options));
    assert!(!value_types.can_map(&pair(product(), ty::string()), MapKind::New, &options));

    let reference_types = fixtures::engine_for(provider(Constraint::ReferenceType));
    assert!(!reference_types.can_map(&int_to_string(), MapKind::New, &options));
    let err = reference_types
        .map(&Value::Int(1), &int_to_string(), &options)
        .unwrap_err();
    assert!(err.is_not_found_for(&int_to_string()));
}

#[test]
fn test_type_arguments_reach_the_body() {
    let provider = provider_fn("named", |declarations| {
        declarations.new_map(
            GenericSignature::unconstrained(pair(ty::list(t(0)), ty::string())),
            |_, ctx| Ok(Value::from(ctx.type_argument(0).unwrap().to_string())),
        );
    });
    let engine = fixtures::engine_for(provider);
    let source = Value::list(ty::int(), fixtures::ints(&[1]));

    let result = engine
        .map(&source, &pair(ty::list(ty::int()), ty::string()), &MappingOptions::new())
        .unwrap();

    assert_eq!(result, Value::from(ty::int().to_string()));
}

#[test]
fn test_more_specific_generic_wins() {
    let provider = provider_fn("specific", |declarations| {
        declarations
            .new_map(GenericSignature::unconstrained(pair(t(0), t(1))), |_, _| {
                Ok(Value::from("two parameters"))
            })
            .new_map(GenericSignature::unconstrained(pair(ty::list(t(0)), t(0))), |_, _| {
                Ok(Value::from("one parameter"))
            });
    });
    let engine = fixtures::engine_for(provider);

    let result = engine
        .map(
            &Value::list(ty::int(), Vec::new()),
            &pair(ty::list(ty::int()), ty::int()),
            &MappingOptions::new(),
        )
        .unwrap();

    assert_eq!(result, Value::from("one parameter"));
}

#[test]
fn test_equally_specific_generics_are_ambiguous() {
    let requested = pair(ty::list(ty::int()), ty::list(ty::string()));
    let resolver = resolver(&[&overlapping()]);

    assert!(matches!(
        resolver.resolve(&requested, MapKind::New, ExecutionMode::Sync),
        Resolution::Ambiguous { ref provider, .. } if provider == "overlap"
    ));

    let engine = fixtures::engine_for(overlapping());
    assert!(engine.can_map(&requested, MapKind::New, &MappingOptions::new()));
    let err = engine
        .map(&Value::Null, &requested, &MappingOptions::new())
        .unwrap_err();
    assert!(matches!(err, MapError::AmbiguousMap { .. }));
}

#[test]
fn test_earlier_provider_wins_between_generics() {
    let first = provider_fn("first", |declarations| {
        declarations.new_map(GenericSignature::unconstrained(pair(t(0), t(1))), |_, _| {
            Ok(Value::from("first"))
        });
    });
    let second = provider_fn("second", |declarations| {
        declarations.new_map(GenericSignature::unconstrained(pair(t(0), ty::string())), |_, _| {
            Ok(Value::from("second"))
        });
    });
    let registry = Registry::init(fixtures::shared_catalog(), &[&first, &second]).unwrap();
    let engine = MapperBuilder::new(registry).build();

    let result = engine
        .map(&Value::Int(1), &int_to_string(), &MappingOptions::new())
        .unwrap();

    assert_eq!(result, Value::from("first"));
}

#[test]
fn test_earlier_provider_wins_between_exact_maps() {
    let other = provider_fn("other", |declarations| {
        declarations.new_map(int_to_string(), |_, _| Ok(Value::from("other")));
    });
    let registry =
        Registry::init(fixtures::shared_catalog(), &[&other, &fixtures::sample_provider()])
            .unwrap();
    let engine = MapperBuilder::new(registry).build();

    let result = engine
        .map(&Value::Int(4), &int_to_string(), &MappingOptions::new())
        .unwrap();

    assert_eq!(result, Value::from("other"));
}

#[test]
fn test_new_falls_back_to_merge_into_fresh_destination() {
    let provider = provider_fn("merge only", |declarations| {
        declarations.merge_map(pair(product(), product_dto()), |source, destination, _| {
            let target = destination.require_object()?;
            target.set("Id", source.require_object()?.get("Id"));
            Ok(destination.clone())
        });
    });
    let engine = fixtures::engine_for(provider);
    let parent = fixtures::category_with(1);
    let source: Value = fixtures::product_with(7, &parent).into();

    let result = engine
        .map(&source, &pair(product(), product_dto()), &MappingOptions::new())
        .unwrap();

    let dto = result.as_object().unwrap();
    assert_eq!(dto.ty(), product_dto());
    assert_eq!(dto.get("Id"), Value::Int(7));
}

#[test]
fn test_no_merge_fallback_without_default_constructor() {
    let provider = provider_fn("merge only", |declarations| {
        declarations.merge_map(pair(product(), ty::string()), |_, destination, _| {
            Ok(destination.clone())
        });
    });
    let resolver = resolver(&[&provider]);

    assert_eq!(
        resolver.resolve(&pair(product(), ty::string()), MapKind::New, ExecutionMode::Sync),
        Resolution::NotFound
    );
}

#[test]
fn test_merge_fallback_construction_failure_names_the_pair() {
    let node = StructuredType::simple("Node");
    let mut catalog = fixtures::catalog();
    catalog
        .register(TypeDescriptor::structure("Node").field("Next", node.clone()))
        .unwrap();
    let requested = pair(ty::int(), node.clone());
    let provider = provider_fn("merge only", {
        let requested = requested.clone();
        move |declarations| {
            declarations.merge_map(requested.clone(), |_, destination, _| {
                Ok(destination.clone())
            });
        }
    });
    let registry = Registry::init(Arc::new(catalog), &[&provider]).unwrap();
    let engine = MapperBuilder::new(registry).build();

    let err = engine
        .map(&Value::Int(1), &requested, &MappingOptions::new())
        .unwrap_err();

    match &err {
        MapError::Mapping { pair: failed, .. } => assert_eq!(failed, &requested),
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(matches!(err.root_cause(), MapError::CyclicValueType { ty } if ty == &node));
}

#[test]
fn test_open_request_is_not_found() {
    let resolver = resolver(&[&fixtures::sample_provider()]);

    assert_eq!(
        resolver.resolve(&pair(t(0), ty::string()), MapKind::New, ExecutionMode::Sync),
        Resolution::NotFound
    );
}

#[test]
fn test_sync_mode_ignores_async_bodies() {
    let provider = provider_fn("async only", |declarations| {
        declarations.async_new_map(int_to_string(), |_, _| async { Ok(Value::from("async")) });
    });
    let resolver = resolver(&[&provider]);

    assert_eq!(
        resolver.resolve(&int_to_string(), MapKind::New, ExecutionMode::Sync),
        Resolution::NotFound
    );
    assert!(resolver
        .resolve(&int_to_string(), MapKind::New, ExecutionMode::Async)
        .is_found());
}

#[test]
fn test_async_mode_prefers_async_bodies() {
    let provider = provider_fn("both", |declarations| {
        declarations
            .new_map(int_to_string(), |_, _| Ok(Value::from("sync")))
            .async_new_map(int_to_string(), |_, _| async { Ok(Value::from("async")) });
    });
    let resolver = resolver(&[&provider]);
    let registry = resolver.registry().clone();

    let Resolution::Direct { declaration, .. } =
        resolver.resolve(&int_to_string(), MapKind::New, ExecutionMode::Async)
    else {
        panic!("expected a direct resolution");
    };
    assert!(registry.declaration(declaration).unwrap().is_async());

    let Resolution::Direct { declaration, .. } =
        resolver.resolve(&int_to_string(), MapKind::New, ExecutionMode::Sync)
    else {
        panic!("expected a direct resolution");
    };
    assert!(!registry.declaration(declaration).unwrap().is_async());
}

#[test]
fn test_resolutions_are_cached() {
    let resolver = resolver(&[&fixtures::sample_provider()]);
    let first = resolver.resolve(&products(), MapKind::Merge, ExecutionMode::Sync);
    let second = resolver.resolve(&products(), MapKind::Merge, ExecutionMode::Sync);

    assert_eq!(first, second);
    assert!(first.is_found());
    let stats = resolver.resolution_stats();
    assert_eq!((stats.cache_hits, stats.cache_misses), (1, 1));
}

#[test]
fn test_resolution_cache_is_bounded() {
    let resolver = resolver(&[&fixtures::sample_provider()]).with_resolution_capacity(2);

    for kind in [MapKind::New, MapKind::Merge, MapKind::Match] {
        assert!(resolver.resolve(&products(), kind, ExecutionMode::Sync).is_found());
    }
    assert_eq!(resolver.resolution_stats().evictions, 1);

    // The evicted outcome is resolved again, and still found
    assert!(resolver
        .resolve(&products(), MapKind::New, ExecutionMode::Sync)
        .is_found());
    let stats = resolver.resolution_stats();
    assert_eq!(stats.cache_hits, 0);
    assert_eq!(stats.evictions, 2);
}

#[test]
fn test_generic_resolution_binds_arguments() {
    let resolver = resolver(&[&entity_ids()]);

    match resolver.resolve(&pair(category(), ty::int()), MapKind::New, ExecutionMode::Sync) {
        Resolution::Direct { arguments, .. } => {
            assert_eq!(arguments, TypeArguments::new(vec![category()]));
        }
        other => panic!("unexpected resolution: {other:?}"),
    }
    assert_eq!(
        resolver.resolve(&pair(ty::string(), ty::int()), MapKind::New, ExecutionMode::Sync),
        Resolution::NotFound
    );

    let engine = fixtures::engine_for(entity_ids());
    let source: Value = ObjectRef::new(category()).with("Id", 3_i64).into();
    assert_eq!(
        engine
            .map(&source, &pair(category(), ty::int()), &MappingOptions::new())
            .unwrap(),
        Value::Int(3)
    );
}
