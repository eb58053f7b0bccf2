//! Tests for asynchronous collection mapping with bounded parallelism

use super::fixtures::{
    self, category_with, ids, int_to_string, ints, pair, product, product_with, products,
};
use crate::cancellation::CancellationToken;
use crate::declaration::{provider_fn, FnProvider, MapKind};
use crate::error::{ElementLocation, MapError};
use crate::options::{Cancellation, MappingOptions, ParallelOptions};
use crate::value::{ObjectRef, Value};
use remap_types::ty;
use pretty_assertions::assert_eq;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

fn parallel(max_parallelism: usize) -> MappingOptions {
    MappingOptions::new().with(ParallelOptions { max_parallelism })
}

/// Async `int -> string` that doubles its input after a short, uneven delay
fn slow_doubling(started: Arc<AtomicUsize>, fail_at: Option<i64>) -> FnProvider {
    provider_fn("slow", move |declarations| {
        let started = started.clone();
        declarations.async_new_map(int_to_string(), move |source, _| {
            let started = started.clone();
            async move {
                started.fetch_add(1, Ordering::SeqCst);
                let n = source.require_int()?;
                if Some(n) == fail_at {
                    return Err(fixtures::boom("element failed"));
                }
                tokio::time::sleep(Duration::from_millis((n % 5) as u64)).await;
                Ok(Value::from((n * 2).to_string()))
            }
        });
    })
}

/// Async `int -> string` where every element sleeps for two seconds before
/// completing, except `0`, which fails after 10ms when `fail_zero` is set
fn sleepers(completed: Arc<AtomicUsize>, fail_zero: bool) -> FnProvider {
    provider_fn("sleepers", move |declarations| {
        let completed = completed.clone();
        declarations.async_new_map(int_to_string(), move |source, _| {
            let completed = completed.clone();
            async move {
                let n = source.require_int()?;
                if fail_zero && n == 0 {
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    return Err(fixtures::boom("fast failure"));
                }
                tokio::time::sleep(Duration::from_secs(2)).await;
                completed.fetch_add(1, Ordering::SeqCst);
                Ok(Value::from(n.to_string()))
            }
        });
    })
}

fn sequence(count: i64) -> Value {
    Value::list(ty::int(), (0..count).map(Value::from).collect())
}

fn strings_of(value: &Value) -> Vec<String> {
    value
        .as_collection()
        .unwrap()
        .items()
        .iter()
        .map(|item| item.as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn test_output_order_does_not_depend_on_parallelism() {
    let engine = fixtures::engine_for(slow_doubling(Arc::new(AtomicUsize::new(0)), None));
    let requested = pair(ty::list(ty::int()), ty::list(ty::string()));

    let sequential = engine
        .map_async(sequence(100), requested.clone(), &parallel(1))
        .await
        .unwrap();
    let concurrent = engine
        .map_async(sequence(100), requested, &parallel(10))
        .await
        .unwrap();

    let expected: Vec<String> = (0..100).map(|n| (n * 2).to_string()).collect();
    assert_eq!(strings_of(&sequential), expected);
    assert_eq!(strings_of(&concurrent), expected);
}

#[tokio::test]
async fn test_failure_stops_remaining_elements() {
    let started = Arc::new(AtomicUsize::new(0));
    let engine = fixtures::engine_for(slow_doubling(started.clone(), Some(50)));
    let requested = pair(ty::list(ty::int()), ty::list(ty::string()));

    let err = engine
        .map_async(sequence(100), requested.clone(), &parallel(4))
        .await
        .unwrap_err();

    assert!(started.load(Ordering::SeqCst) < 100);
    match &err {
        MapError::Collection {
            pair: failed,
            location,
            ..
        } => {
            assert_eq!(failed, &requested);
            assert_eq!(*location, ElementLocation::Index(50));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(matches!(
        err.root_cause(),
        MapError::Failed { message } if message == "element failed"
    ));
}

#[tokio::test]
async fn test_failure_cancels_in_flight_elements() {
    let completed = Arc::new(AtomicUsize::new(0));
    let engine = fixtures::engine_for(sleepers(completed.clone(), true));
    let started = Instant::now();

    let err = engine
        .map_async(
            sequence(8),
            pair(ty::list(ty::int()), ty::list(ty::string())),
            &parallel(4),
        )
        .await
        .unwrap_err();

    assert!(started.elapsed() < Duration::from_millis(500));
    assert_eq!(completed.load(Ordering::SeqCst), 0);
    assert!(matches!(
        err.root_cause(),
        MapError::Failed { message } if message == "fast failure"
    ));
}

#[tokio::test]
async fn test_caller_cancellation_stops_in_flight_elements() {
    let completed = Arc::new(AtomicUsize::new(0));
    let engine = fixtures::engine_for(sleepers(completed.clone(), false));
    let token = CancellationToken::new();
    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        canceller.cancel();
    });
    let started = Instant::now();

    let err = engine
        .map_async(
            sequence(8),
            pair(ty::list(ty::int()), ty::list(ty::string())),
            &parallel(4).with(Cancellation(token)),
        )
        .await
        .unwrap_err();

    assert!(err.is_cancelled());
    assert!(started.elapsed() < Duration::from_millis(500));
    assert_eq!(completed.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_cancelled_caller_gets_cancelled() {
    let started = Arc::new(AtomicUsize::new(0));
    let engine = fixtures::engine_for(slow_doubling(started.clone(), None));
    let token = CancellationToken::new();
    token.cancel();

    let err = engine
        .map_async(
            sequence(20),
            pair(ty::list(ty::int()), ty::list(ty::string())),
            &parallel(4).with(Cancellation(token)),
        )
        .await
        .unwrap_err();

    assert!(err.is_cancelled());
    assert_eq!(started.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_sync_maps_run_in_async_mode() {
    let engine = fixtures::engine();

    let result = engine
        .map_async(
            Value::array(ty::int(), ints(&[2, -3, 0])),
            pair(ty::array(ty::int()), ty::array(ty::string())),
            &parallel(3),
        )
        .await
        .unwrap();

    assert_eq!(strings_of(&result), vec!["4", "-6", "0"]);
}

#[tokio::test]
async fn test_async_merge_reconciles_by_id() {
    let engine = fixtures::engine();
    let (p2, p7) = (category_with(2), category_with(7));
    let two = product_with(2, &p2);
    let three = product_with(3, &p2);
    let destination = Value::list(
        product(),
        vec![
            two.clone().into(),
            three.clone().into(),
            product_with(5, &p2).into(),
        ],
    );
    let source = Value::list(
        product(),
        vec![
            product_with(3, &p7).into(),
            product_with(2, &p2).into(),
            product_with(6, &p7).into(),
        ],
    );

    let result = engine
        .merge_async(
            source,
            destination.clone(),
            pair(ty::list(product()), ty::list(product())),
            &parallel(8),
        )
        .await
        .unwrap();

    assert!(result.same_ref(&destination));
    assert_eq!(ids(&result), vec![2, 3, 6]);
    let merged = result.as_collection().unwrap().items();
    assert!(merged[0].as_object().unwrap().ptr_eq(&two));
    assert!(merged[1].as_object().unwrap().ptr_eq(&three));
    assert!(three.get("Parent").same_ref(&p7.into()));
}

#[tokio::test]
async fn test_async_merge_bodies_are_preferred() {
    let merged = Arc::new(AtomicUsize::new(0));
    let counter = merged.clone();
    let provider = provider_fn("async products", move |declarations| {
        let counter = counter.clone();
        declarations
            .match_map(products(), |source, destination, _| {
                Ok(source.require_object()?.get("Id") == destination.require_object()?.get("Id"))
            })
            .new_map(products(), |source, _| Ok(source.clone()))
            .async_merge_map(products(), move |source, destination, _| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    let target = destination.require_object()?;
                    target.set("Name", source.require_object()?.get("Name"));
                    Ok(destination)
                }
            });
    });
    let engine = fixtures::engine_for(provider);
    let parent = category_with(1);
    let existing = product_with(1, &parent);
    let destination = Value::list(product(), vec![existing.clone().into()]);
    let source = Value::list(
        product(),
        vec![ObjectRef::new(product())
            .with("Id", 1_i64)
            .with("Name", "renamed")
            .into()],
    );

    assert!(engine.can_map_async(
        &pair(ty::list(product()), ty::list(product())),
        MapKind::Merge,
        &MappingOptions::new()
    ));
    engine
        .merge_async(
            source,
            destination,
            pair(ty::list(product()), ty::list(product())),
            &parallel(2),
        )
        .await
        .unwrap();

    assert_eq!(merged.load(Ordering::SeqCst), 1);
    assert_eq!(existing.get("Name"), Value::from("renamed"));
}
