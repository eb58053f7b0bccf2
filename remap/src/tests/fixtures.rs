//! Catalog, providers and engines shared by the mapping tests

use crate::builder::{Engine, MapperBuilder};
use crate::config::MapperConfig;
use crate::declaration::{provider_fn, FnProvider};
use crate::error::MapError;
use crate::registry::Registry;
use crate::value::{ObjectRef, Value};
use remap_types::{ty, StructuredType, TypeCatalog, TypeDescriptor, TypePair};
use std::sync::Arc;

pub fn entity() -> StructuredType {
    StructuredType::simple("Entity")
}

pub fn category() -> StructuredType {
    StructuredType::simple("Category")
}

pub fn product() -> StructuredType {
    StructuredType::simple("Product")
}

pub fn product_dto() -> StructuredType {
    StructuredType::simple("ProductDto")
}

/// Builtins plus `Entity` (interface), `Category`, `Product` and `ProductDto`
pub fn catalog() -> TypeCatalog {
    let mut catalog = TypeCatalog::with_builtins();
    catalog
        .register(TypeDescriptor::interface("Entity").field("Id", ty::int()))
        .unwrap();
    catalog
        .register(
            TypeDescriptor::class("Category")
                .implements(entity())
                .field("Id", ty::int()),
        )
        .unwrap();
    catalog
        .register(
            TypeDescriptor::class("Product")
                .implements(entity())
                .field("Id", ty::int())
                .field("Name", ty::string())
                .field("Parent", category()),
        )
        .unwrap();
    catalog
        .register(
            TypeDescriptor::class("ProductDto")
                .field("Id", ty::int())
                .field("Name", ty::string()),
        )
        .unwrap();
    catalog
}

pub fn shared_catalog() -> Arc<TypeCatalog> {
    Arc::new(catalog())
}

pub fn pair(source: StructuredType, destination: StructuredType) -> TypePair {
    TypePair::new(source, destination)
}

pub fn int_to_string() -> TypePair {
    pair(ty::int(), ty::string())
}

pub fn products() -> TypePair {
    pair(product(), product())
}

pub fn category_with(id: i64) -> ObjectRef {
    ObjectRef::new(category()).with("Id", id)
}

pub fn product_with(id: i64, parent: &ObjectRef) -> ObjectRef {
    ObjectRef::new(product())
        .with("Id", id)
        .with("Name", format!("product {id}"))
        .with("Parent", parent.clone())
}

pub fn ints(values: &[i64]) -> Vec<Value> {
    values.iter().copied().map(Value::from).collect()
}

pub fn strings(values: &[&str]) -> Vec<Value> {
    values.iter().copied().map(Value::from).collect()
}

/// Ids of the products held by a collection value
pub fn ids(value: &Value) -> Vec<i64> {
    value
        .as_collection()
        .unwrap()
        .items()
        .iter()
        .map(|item| item.as_object().unwrap().get("Id").as_int().unwrap())
        .collect()
}

/// `int -> string` doubling its input, plus new, merge and match maps for
/// `Product` keyed by `Id`
pub fn sample_provider() -> FnProvider {
    provider_fn("sample", |declarations| {
        declarations
            .new_map(int_to_string(), |source, _| {
                Ok(Value::from((source.require_int()? * 2).to_string()))
            })
            .new_map(products(), |source, _| {
                let source = source.require_object()?;
                Ok(ObjectRef::new(product())
                    .with("Id", source.get("Id"))
                    .with("Name", source.get("Name"))
                    .with("Parent", source.get("Parent"))
                    .into())
            })
            .merge_map(products(), |source, destination, _| {
                let (source, target) = (source.require_object()?, destination.require_object()?);
                target.set("Name", source.get("Name"));
                target.set("Parent", source.get("Parent"));
                Ok(destination.clone())
            })
            .match_map(products(), |source, destination, _| {
                let (source, target) = (source.require_object()?, destination.require_object()?);
                Ok(source.get("Id").as_int() == target.get("Id").as_int())
            });
    })
}

pub fn registry() -> Registry {
    Registry::init(shared_catalog(), &[&sample_provider()]).unwrap()
}

pub fn engine() -> Engine {
    MapperBuilder::new(registry())
        .config(MapperConfig::sequential())
        .build()
}

pub fn engine_for(provider: FnProvider) -> Engine {
    let registry = Registry::init(shared_catalog(), &[&provider]).unwrap();
    MapperBuilder::new(registry)
        .config(MapperConfig::sequential())
        .build()
}

/// Error raised by a map body on purpose
pub fn boom(message: &str) -> MapError {
    MapError::failed(message)
}
