use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tokio::time::sleep;

use super::{PollOptions, PollState, PollingController};
use crate::client::JobBackend;
use crate::error::JobError;
use crate::job::{JobHandle, JobResult, JobState, JobStatus, SubmitRequest};
use crate::poll::JobObserver;

enum Step {
    Status(JobStatus),
    TransientError,
    BackendRejection,
    Slow(Duration, JobStatus),
}

/// Backend that replays a fixed script of status answers and records which
/// job id each check was for. An exhausted script keeps reporting
/// `Processing`.
struct ScriptedBackend {
    script: Mutex<VecDeque<Step>>,
    fetched: std::sync::Mutex<Vec<String>>,
}

impl ScriptedBackend {
    fn new(script: Vec<Step>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            fetched: std::sync::Mutex::new(Vec::new()),
        })
    }

    fn fetch_count(&self) -> usize {
        self.fetched.lock().unwrap().len()
    }

    fn fetched_ids(&self) -> Vec<String> {
        self.fetched.lock().unwrap().clone()
    }
}

#[async_trait]
impl JobBackend for ScriptedBackend {
    async fn submit(&self, _request: SubmitRequest) -> Result<JobHandle, JobError> {
        Ok(JobHandle::new("job-test"))
    }

    async fn fetch_status(&self, handle: &JobHandle) -> Result<JobStatus, JobError> {
        self.fetched.lock().unwrap().push(handle.job_id.clone());
        let step = self.script.lock().await.pop_front();
        match step {
            Some(Step::Status(status)) => Ok(status),
            Some(Step::TransientError) => {
                Err(JobError::MalformedResponse("scripted outage".to_string()))
            }
            Some(Step::BackendRejection) => {
                Err(JobError::Backend("job not found".to_string()))
            }
            Some(Step::Slow(delay, status)) => {
                sleep(delay).await;
                Ok(status)
            }
            None => Ok(JobStatus::new(JobState::Processing)),
        }
    }
}

#[derive(Default)]
struct RecordingObserver {
    updates: std::sync::Mutex<Vec<JobResult>>,
}

impl RecordingObserver {
    fn updates(&self) -> Vec<JobResult> {
        self.updates.lock().unwrap().clone()
    }
}

#[async_trait]
impl JobObserver for RecordingObserver {
    async fn on_update(&self, _handle: &JobHandle, result: &JobResult) {
        self.updates.lock().unwrap().push(result.clone());
    }
}

fn fast_options() -> PollOptions {
    PollOptions::default().with_interval(Duration::from_millis(20))
}

fn processing() -> Step {
    Step::Status(JobStatus::new(JobState::Processing))
}

fn completed(payload: Value) -> Step {
    Step::Status(JobStatus::new(JobState::Completed).with_payload(payload))
}

#[tokio::test]
async fn test_example_scenario_two_pendings_then_success() {
    let backend = ScriptedBackend::new(vec![
        processing(),
        processing(),
        completed(json!("https://example/video.mp4")),
    ]);
    let observer = Arc::new(RecordingObserver::default());
    let controller = PollingController::new(backend.clone());

    controller
        .start(JobHandle::new("J1"), fast_options(), observer.clone())
        .await;
    sleep(Duration::from_millis(300)).await;

    assert_eq!(controller.state(), PollState::Completed);
    // no further status checks after the terminal tick
    assert_eq!(backend.fetch_count(), 3);
    assert_eq!(
        observer.updates(),
        vec![
            JobResult::Pending { attempts_made: 1 },
            JobResult::Pending { attempts_made: 2 },
            JobResult::Succeeded {
                payload: json!("https://example/video.mp4")
            },
        ]
    );
}

#[tokio::test]
async fn test_restart_cancels_prior_session() {
    let backend = ScriptedBackend::new(Vec::new());
    let observer = Arc::new(RecordingObserver::default());
    let controller = PollingController::new(backend.clone());

    controller
        .start(JobHandle::new("job-a"), fast_options(), observer.clone())
        .await;
    sleep(Duration::from_millis(50)).await;
    controller
        .start(JobHandle::new("job-b"), fast_options(), observer.clone())
        .await;
    sleep(Duration::from_millis(100)).await;
    controller.cancel().await;

    // exactly one call sequence survives: nothing for job-a once job-b began
    let ids = backend.fetched_ids();
    let first_b = ids.iter().position(|id| id == "job-b").unwrap();
    assert!(ids[first_b..].iter().all(|id| id == "job-b"));
    assert!(ids[..first_b].iter().all(|id| id == "job-a"));
}

#[tokio::test]
async fn test_failed_status_stops_polling_with_backend_reason() {
    let backend = ScriptedBackend::new(vec![Step::Status(
        JobStatus::new(JobState::Failed).with_error("render crashed"),
    )]);
    let observer = Arc::new(RecordingObserver::default());
    let controller = PollingController::new(backend.clone());

    controller
        .start(JobHandle::new("J1"), fast_options(), observer.clone())
        .await;
    sleep(Duration::from_millis(200)).await;

    assert_eq!(controller.state(), PollState::Failed);
    assert_eq!(backend.fetch_count(), 1);
    assert_eq!(
        observer.updates(),
        vec![JobResult::Failed {
            reason: "render crashed".to_string()
        }]
    );
}

#[tokio::test]
async fn test_transient_errors_do_not_terminate_polling() {
    let backend = ScriptedBackend::new(vec![
        Step::TransientError,
        Step::TransientError,
        Step::BackendRejection,
        completed(json!("https://example/video.mp4")),
    ]);
    let observer = Arc::new(RecordingObserver::default());
    let controller = PollingController::new(backend.clone());

    controller
        .start(JobHandle::new("J1"), fast_options(), observer.clone())
        .await;
    sleep(Duration::from_millis(50)).await;
    assert_eq!(controller.state(), PollState::Polling);

    sleep(Duration::from_millis(300)).await;
    assert_eq!(controller.state(), PollState::Completed);
    assert_eq!(backend.fetch_count(), 4);
    // failed ticks emit nothing, only the terminal result comes through
    assert_eq!(
        observer.updates(),
        vec![JobResult::Succeeded {
            payload: json!("https://example/video.mp4")
        }]
    );
}

#[tokio::test]
async fn test_late_response_after_cancel_is_discarded() {
    let backend = ScriptedBackend::new(vec![Step::Slow(
        Duration::from_millis(150),
        JobStatus::new(JobState::Completed).with_payload(json!("https://example/video.mp4")),
    )]);
    let observer = Arc::new(RecordingObserver::default());
    let controller = PollingController::new(backend.clone());

    let options = fast_options().with_immediate_first_poll(true);
    controller
        .start(JobHandle::new("J1"), options, observer.clone())
        .await;
    // the status check is now in flight
    sleep(Duration::from_millis(30)).await;
    controller.cancel().await;
    assert_eq!(controller.state(), PollState::Canceled);

    sleep(Duration::from_millis(300)).await;
    assert!(observer.updates().is_empty());
    assert_eq!(controller.state(), PollState::Canceled);
}

#[tokio::test]
async fn test_cancel_is_idempotent_and_stops_ticks() {
    let backend = ScriptedBackend::new(Vec::new());
    let observer = Arc::new(RecordingObserver::default());
    let controller = PollingController::new(backend.clone());

    controller
        .start(JobHandle::new("J1"), fast_options(), observer.clone())
        .await;
    sleep(Duration::from_millis(50)).await;
    controller.cancel().await;
    let frozen = backend.fetch_count();

    controller.cancel().await;
    sleep(Duration::from_millis(100)).await;

    assert_eq!(controller.state(), PollState::Canceled);
    assert_eq!(backend.fetch_count(), frozen);
    // cancel emits no terminal result
    assert!(observer
        .updates()
        .iter()
        .all(|u| matches!(u, JobResult::Pending { .. })));
}

#[tokio::test]
async fn test_cancel_after_completion_keeps_terminal_state() {
    let backend = ScriptedBackend::new(vec![completed(json!("https://example/video.mp4"))]);
    let observer = Arc::new(RecordingObserver::default());
    let controller = PollingController::new(backend.clone());

    controller
        .start(JobHandle::new("J1"), fast_options(), observer.clone())
        .await;
    sleep(Duration::from_millis(200)).await;
    assert_eq!(controller.state(), PollState::Completed);

    // cancelling a finished session must not relabel it
    controller.cancel().await;
    assert_eq!(controller.state(), PollState::Completed);
    assert_eq!(observer.updates().len(), 1);
}

#[tokio::test]
async fn test_max_attempts_times_out() {
    let backend = ScriptedBackend::new(Vec::new());
    let observer = Arc::new(RecordingObserver::default());
    let controller = PollingController::new(backend.clone());

    let options = fast_options().with_max_attempts(3);
    controller
        .start(JobHandle::new("J1"), options, observer.clone())
        .await;
    sleep(Duration::from_millis(300)).await;

    assert_eq!(controller.state(), PollState::TimedOut);
    assert_eq!(backend.fetch_count(), 3);
    assert_eq!(observer.updates().last(), Some(&JobResult::TimedOut));
}

#[tokio::test]
async fn test_first_poll_waits_one_interval_by_default() {
    let backend = ScriptedBackend::new(Vec::new());
    let observer = Arc::new(RecordingObserver::default());
    let controller = PollingController::new(backend.clone());

    controller
        .start(
            JobHandle::new("J1"),
            PollOptions::default().with_interval(Duration::from_millis(100)),
            observer,
        )
        .await;
    sleep(Duration::from_millis(40)).await;
    assert_eq!(backend.fetch_count(), 0);
    controller.cancel().await;
}
