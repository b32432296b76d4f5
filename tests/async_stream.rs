//! Async adapter tests (requires the `async` feature).

#![cfg(feature = "async")]

mod common;

use std::collections::HashMap;
use std::time::Duration;

use framestrip::{OutcomeStream, RenderError, RenderTask, TargetFrame, TaskState, spawn_render};
use tokio_stream::StreamExt;

use common::SyntheticSource;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn spawn_render_resolves_handle() {
    let source = SyntheticSource::new(30);
    let task = RenderTask::with_indexes(source.asset(), [1_u64, 2], TargetFrame::from_size(8.0, 8.0));

    let handle = spawn_render(task).unwrap();
    let output = handle.await.unwrap();
    assert_eq!(output.len(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn spawn_render_rejects_started_task() {
    use framestrip::UnitOfWork;

    let source = SyntheticSource::new(30);
    let mut task = RenderTask::new(source.asset(), TargetFrame::from_size(8.0, 8.0));
    task.start();
    assert_eq!(task.state(), TaskState::Completed);

    assert!(matches!(spawn_render(task), Err(RenderError::AlreadySubmitted(_))));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn outcome_stream_yields_every_task() {
    let source = SyntheticSource::new(30);
    let slow = SyntheticSource::new(30).with_delay(Duration::from_millis(20));

    let first = RenderTask::with_indexes(slow.asset(), 0_u64..5, TargetFrame::from_size(8.0, 8.0));
    let second = RenderTask::with_indexes(source.asset(), [7_u64], TargetFrame::from_size(8.0, 8.0));
    let cancelled = RenderTask::new(source.asset(), TargetFrame::from_size(8.0, 8.0));
    cancelled.cancellation_token().cancel();

    let expected: HashMap<_, _> = [
        (first.id(), Some(5)),
        (second.id(), Some(1)),
        (cancelled.id(), None),
    ]
    .into_iter()
    .collect();

    let handles = vec![
        spawn_render(first).unwrap(),
        spawn_render(second).unwrap(),
        spawn_render(cancelled).unwrap(),
    ];

    let mut seen = HashMap::new();
    let mut outcomes = OutcomeStream::new(handles);
    while let Some((id, outcome)) = outcomes.next().await {
        seen.insert(id, outcome.ok().map(|output| output.len()));
    }

    assert_eq!(seen, expected);
}
