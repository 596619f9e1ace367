//! Integration tests for event dispatch, the per-path gate and cancellation.

mod common;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use common::{pipeline, Answer, FakeEncoder, FakeHost, Fixture};
use evermedia::config::DispatchConfig;
use evermedia::dispatch::{EventDispatcher, ItemEvent, PipelineEvent};
use evermedia::pipeline::{Outcome, Stage};
use tokio::sync::broadcast;

const TICKS: i64 = 36_000_000_000;

fn dispatch_config(queue_capacity: usize, max_concurrent_runs: usize) -> DispatchConfig {
    DispatchConfig {
        queue_capacity,
        max_concurrent_runs,
    }
}

/// Wait for the next finished run.
async fn next_finished(rx: &mut broadcast::Receiver<PipelineEvent>) -> (PathBuf, Outcome) {
    loop {
        let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for a pipeline event")
            .expect("event channel closed");
        if let PipelineEvent::Finished { link_path, outcome } = event {
            return (link_path, outcome);
        }
    }
}

/// Everything still buffered in `rx`.
fn drain(rx: &mut broadcast::Receiver<PipelineEvent>) -> Vec<PipelineEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn overlapping_triggers_coalesce_into_one_follow_up() {
    let fx = Fixture::new();
    let (link, _) = fx.linked_media("Show.strm", "Show.mkv");
    let encoder = FakeEncoder::with_delay(
        Answer::Result(common::video_result(TICKS)),
        Duration::from_millis(200),
    );
    let host = FakeHost::direct();
    let binding = host.add_video(&link);
    let dispatcher = EventDispatcher::new(
        Arc::new(pipeline(encoder.clone(), host.clone())),
        &dispatch_config(16, 4),
    );
    let mut rx = dispatcher.subscribe();

    assert!(dispatcher.dispatch(ItemEvent::Added(binding.clone())));
    // Let the first run claim the path.
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(dispatcher.dispatch(ItemEvent::Updated(binding.clone())));
    assert!(dispatcher.dispatch(ItemEvent::Updated(binding.clone())));

    dispatcher.close().await;
    let events = drain(&mut rx);

    let finished: Vec<&Outcome> = events
        .iter()
        .filter_map(|e| match e {
            PipelineEvent::Finished { outcome, .. } => Some(outcome),
            _ => None,
        })
        .collect();
    let coalesced = events
        .iter()
        .filter(|e| matches!(e, PipelineEvent::Coalesced { .. }))
        .count();

    assert_eq!(coalesced, 2);
    assert_eq!(finished.len(), 2);
    assert!(finished.iter().all(|o| o.is_done()));
    assert_eq!(encoder.calls(), 2);
    assert!(!encoder.overlapped(), "runs for one path must not overlap");
    assert_eq!(host.commits().len(), 2);
    assert!(fx.sidecar_for(&link).exists());
}

#[tokio::test]
async fn different_paths_run_independently() {
    let fx = Fixture::new();
    let (a, _) = fx.linked_media("A.strm", "A.mkv");
    let (b, _) = fx.linked_media("B.strm", "B.mkv");
    let encoder = FakeEncoder::with_delay(
        Answer::Result(common::video_result(TICKS)),
        Duration::from_millis(50),
    );
    let host = FakeHost::direct();
    let binding_a = host.add_video(&a);
    let binding_b = host.add_video(&b);
    let dispatcher = EventDispatcher::new(
        Arc::new(pipeline(encoder.clone(), host.clone())),
        &dispatch_config(16, 4),
    );
    let mut rx = dispatcher.subscribe();

    assert!(dispatcher.dispatch(ItemEvent::Added(binding_a)));
    assert!(dispatcher.dispatch(ItemEvent::Added(binding_b)));
    dispatcher.close().await;

    let mut finished: Vec<PathBuf> = drain(&mut rx)
        .into_iter()
        .filter_map(|e| match e {
            PipelineEvent::Finished { link_path, outcome } if outcome.is_done() => Some(link_path),
            _ => None,
        })
        .collect();
    finished.sort();
    assert_eq!(finished, vec![a, b]);
    assert_eq!(encoder.calls(), 2);
}

#[tokio::test]
async fn non_link_items_are_rejected_at_the_boundary() {
    let fx = Fixture::new();
    let media = fx.media("Movie.mkv");
    let encoder = FakeEncoder::video(TICKS);
    let host = FakeHost::direct();
    let binding = host.add_video(&media);
    let dispatcher = EventDispatcher::new(
        Arc::new(pipeline(encoder.clone(), host)),
        &dispatch_config(16, 4),
    );
    let mut rx = dispatcher.subscribe();

    assert!(!dispatcher.dispatch(ItemEvent::Added(binding.clone())));
    assert!(!dispatcher.submit(ItemEvent::Updated(binding)).await);

    dispatcher.close().await;
    assert!(drain(&mut rx).is_empty());
    assert_eq!(encoder.calls(), 0);
}

#[tokio::test]
async fn full_queue_drops_trigger() {
    let fx = Fixture::new();
    let (a, _) = fx.linked_media("A.strm", "A.mkv");
    let (b, _) = fx.linked_media("B.strm", "B.mkv");
    let host = FakeHost::direct();
    let binding_a = host.add_video(&a);
    let binding_b = host.add_video(&b);
    let dispatcher = EventDispatcher::new(
        Arc::new(pipeline(FakeEncoder::video(TICKS), host)),
        &dispatch_config(1, 1),
    );
    let mut rx = dispatcher.subscribe();

    // No await in between: the worker cannot drain the queue.
    assert!(dispatcher.dispatch(ItemEvent::Added(binding_a)));
    assert!(!dispatcher.dispatch(ItemEvent::Added(binding_b)));

    dispatcher.close().await;
    let events = drain(&mut rx);
    assert!(events
        .iter()
        .any(|e| matches!(e, PipelineEvent::Dropped { link_path } if *link_path == b)));
    assert!(events
        .iter()
        .any(|e| matches!(e, PipelineEvent::Finished { link_path, .. } if *link_path == a)));
}

#[tokio::test]
async fn failed_run_does_not_stop_dispatch() {
    let fx = Fixture::new();
    let (link, _) = fx.linked_media("Movie.strm", "Movie.mkv");
    let encoder = FakeEncoder::failing("decoder exploded");
    let host = FakeHost::direct();
    let binding = host.add_video(&link);
    let dispatcher = EventDispatcher::new(
        Arc::new(pipeline(encoder.clone(), host.clone())),
        &dispatch_config(16, 4),
    );
    let mut rx = dispatcher.subscribe();

    assert!(dispatcher.dispatch(ItemEvent::Added(binding.clone())));
    let (_, outcome) = next_finished(&mut rx).await;
    assert_matches!(outcome, Outcome::Failed { stage: Stage::Probe, .. });
    assert!(!fx.sidecar_for(&link).exists());
    assert_eq!(host.persistence_calls(), 0);

    encoder.set_answer(Answer::Result(common::video_result(TICKS)));
    assert!(dispatcher.dispatch(ItemEvent::Updated(binding)));
    let (path, outcome) = next_finished(&mut rx).await;
    assert_eq!(path, link);
    assert!(outcome.is_done());
    assert!(fx.sidecar_for(&link).exists());

    dispatcher.close().await;
}

#[tokio::test]
async fn shutdown_cancels_running_probe() {
    let fx = Fixture::new();
    let (link, _) = fx.linked_media("Movie.strm", "Movie.mkv");
    let encoder = FakeEncoder::with_delay(
        Answer::Result(common::video_result(TICKS)),
        Duration::from_secs(30),
    );
    let host = FakeHost::direct();
    let binding = host.add_video(&link);
    let dispatcher = EventDispatcher::new(
        Arc::new(pipeline(encoder.clone(), host.clone())),
        &dispatch_config(16, 4),
    );
    let mut rx = dispatcher.subscribe();

    assert!(dispatcher.dispatch(ItemEvent::Added(binding)));
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(dispatcher.active_runs(), 1);

    tokio::time::timeout(Duration::from_secs(5), dispatcher.shutdown())
        .await
        .expect("shutdown should not wait for the probe");

    let (_, outcome) = next_finished(&mut rx).await;
    assert_eq!(outcome, Outcome::Cancelled { stage: Stage::Probe });
    assert_eq!(dispatcher.active_runs(), 0);
    assert!(!fx.sidecar_for(&link).exists());
    assert_eq!(host.persistence_calls(), 0);
}
