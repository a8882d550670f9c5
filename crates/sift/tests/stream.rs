//! Streaming execution against asynchronous sources.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures::{stream, Stream, StreamExt};
use sift::{field, param, ExecutionError, Executor, Filter, Lambda, Record};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, PartialEq, Record)]
struct Reading {
    #[sift(String)]
    sensor: String,
    #[sift(Number)]
    celsius: f64,
}

fn counted<T>(
    items: impl Iterator<Item = T>,
    pulls: Arc<AtomicUsize>,
) -> impl Stream<Item = T> {
    stream::iter(items).inspect(move |_| {
        pulls.fetch_add(1, Ordering::SeqCst);
    })
}

#[tokio::test]
async fn top_bounds_pulls_from_a_large_source() {
    let pulls = Arc::new(AtomicUsize::new(0));
    let filter = Filter::builder().top(5).build().unwrap();

    let out: Vec<i64> = filter
        .stream(counted(0..1_000_000i64, pulls.clone()), CancellationToken::new())
        .map(Result::unwrap)
        .collect()
        .await;

    assert_eq!(out, vec![0, 1, 2, 3, 4]);
    assert!(pulls.load(Ordering::SeqCst) <= 5);
}

#[tokio::test]
async fn predicates_pull_only_until_enough_matches() {
    let pulls = Arc::new(AtomicUsize::new(0));
    let filter = Filter::builder()
        .filter(Lambda::of(param().ge(100)))
        .skip(2)
        .top(3)
        .build()
        .unwrap();

    let out: Vec<i64> = Executor::new()
        .stream(&filter, counted(0..1_000_000i64, pulls.clone()), CancellationToken::new())
        .map(Result::unwrap)
        .collect()
        .await;

    assert_eq!(out, vec![102, 103, 104]);
    assert_eq!(pulls.load(Ordering::SeqCst), 105);
}

#[tokio::test]
async fn ordered_stream_reads_everything_and_sorts() {
    let readings = vec![
        Reading { sensor: "a".into(), celsius: 21.5 },
        Reading { sensor: "b".into(), celsius: 19.0 },
        Reading { sensor: "c".into(), celsius: 23.25 },
        Reading { sensor: "d".into(), celsius: 19.0 },
    ];
    let pulls = Arc::new(AtomicUsize::new(0));
    let filter = Filter::builder()
        .order_by(Lambda::of(field("celsius")))
        .top(3)
        .build()
        .unwrap();

    let out: Vec<String> = filter
        .stream(counted(readings.into_iter(), pulls.clone()), CancellationToken::new())
        .map(|r| r.unwrap().sensor)
        .collect()
        .await;

    assert_eq!(out, ["b", "d", "a"]);
    assert_eq!(pulls.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn errors_end_the_stream() {
    let filter = Filter::builder()
        .filter(Lambda::of(field("missing").eq(1)))
        .build()
        .unwrap();
    let readings = vec![Reading { sensor: "a".into(), celsius: 1.0 }; 3];

    let out: Vec<_> = filter
        .stream(stream::iter(readings), CancellationToken::new())
        .collect()
        .await;

    assert_eq!(out.len(), 1);
    assert!(matches!(out[0], Err(ExecutionError::Binding { .. })));
}

#[tokio::test]
async fn cancellation_between_elements() {
    let token = CancellationToken::new();
    let canceller = token.clone();
    let source = stream::iter(0..i64::MAX);

    let filter = Filter::new();
    let mut results = Box::pin(filter.stream(source, token));

    let mut seen = 0;
    while let Some(item) = results.next().await {
        match item {
            Ok(_) => {
                seen += 1;
                if seen == 3 {
                    canceller.cancel();
                }
            }
            Err(e) => {
                assert!(matches!(e, ExecutionError::Cancelled));
                break;
            }
        }
    }
    assert_eq!(seen, 3);
    assert!(results.next().await.is_none());
}

#[tokio::test]
async fn cancellation_interrupts_a_stalled_source() {
    let token = CancellationToken::new();
    let filter = Filter::new();
    let mut results = Box::pin(filter.stream(stream::pending::<i64>(), token.clone()));

    // Runs once the stream is parked waiting on the source.
    tokio::spawn(async move { token.cancel() });

    assert!(matches!(
        results.next().await,
        Some(Err(ExecutionError::Cancelled))
    ));
    assert!(results.next().await.is_none());
}
