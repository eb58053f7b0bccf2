//! Tests for engine configuration

use super::fixtures::{self, pair};
use crate::builder::MapperBuilder;
use crate::config::MapperConfig;
use crate::declaration::provider_fn;
use crate::options::{MappingOptions, ParallelOptions};
use crate::registry::Registry;
use crate::value::Value;
use remap_types::{ty, GenericSignature, StructuredType};
use pretty_assertions::assert_eq;

#[test]
fn test_default_parallelism_is_positive() {
    let config = MapperConfig::default();

    assert!(config.max_parallelism >= 1);
    assert_eq!(config.solver_cache_capacity, 1024);
    assert_eq!(config.resolution_cache_capacity, 1024);
}

#[test]
fn test_builders_clamp_values() {
    let config = MapperConfig::default()
        .with_max_parallelism(0)
        .with_solver_cache_capacity(0)
        .with_resolution_cache_capacity(0);
    assert_eq!(config.max_parallelism, 1);
    assert_eq!(config.solver_cache_capacity, 1);
    assert_eq!(config.resolution_cache_capacity, 1);

    let config = MapperConfig::default().with_max_parallelism(1_000_000);
    assert_eq!(config.max_parallelism, 1024);
}

#[test]
fn test_normalized_clamps_direct_field_writes() {
    let config = MapperConfig {
        max_parallelism: 0,
        solver_cache_capacity: 0,
        resolution_cache_capacity: 0,
    };

    assert_eq!(
        config.normalized(),
        MapperConfig {
            max_parallelism: 1,
            solver_cache_capacity: 1,
            resolution_cache_capacity: 1,
        }
    );
}

#[test]
fn test_default_options_carry_parallelism() {
    let options = MapperConfig::sequential().with_max_parallelism(6).default_options();

    assert_eq!(
        options.get::<ParallelOptions>(),
        Some(&ParallelOptions { max_parallelism: 6 })
    );
}

#[test]
fn test_engine_reports_registry_and_solver_cache() {
    let provider = provider_fn("generic", |declarations| {
        declarations.new_map(
            GenericSignature::unconstrained(pair(ty::list(StructuredType::param(0)), ty::string())),
            |_, _| Ok(Value::from("list")),
        );
    });
    let registry = Registry::init(fixtures::shared_catalog(), &[&provider]).unwrap();
    let engine = MapperBuilder::new(registry)
        .config(MapperConfig::default().with_solver_cache_capacity(8))
        .build();
    let requested = pair(ty::list(ty::int()), ty::string());

    assert_eq!(engine.registry().len(), 1);
    assert_eq!(engine.stats().total_queries, 0);
    engine
        .map(&Value::list(ty::int(), Vec::new()), &requested, &MappingOptions::new())
        .unwrap();

    let stats = engine.stats();
    assert!(stats.total_queries >= 1);
    assert!(stats.cache_misses >= 1);
}

#[test]
fn test_engine_bounds_the_resolution_cache() {
    let engine = MapperBuilder::new(fixtures::registry())
        .config(MapperConfig::sequential().with_resolution_cache_capacity(1))
        .build();

    for source in [1_i64, 2] {
        engine
            .map(&Value::from(source), &fixtures::int_to_string(), &MappingOptions::new())
            .unwrap();
        engine
            .map(&Value::Bool(true), &pair(ty::boolean(), ty::boolean()), &MappingOptions::new())
            .unwrap_err();
    }

    let stats = engine.resolution_stats();
    assert!(stats.evictions >= 2);
    assert!(stats.total_queries >= 4);
}
