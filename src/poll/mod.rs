mod observer;

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::client::JobBackend;
use crate::job::{JobHandle, JobResult, JobState};

pub use observer::{ChannelObserver, FnObserver, JobObserver, JobUpdate};

/// Lifecycle of one polling session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    Idle,
    Polling,
    Completed,
    Failed,
    Canceled,
    TimedOut,
}

impl PollState {
    fn as_u8(self) -> u8 {
        match self {
            PollState::Idle => 0,
            PollState::Polling => 1,
            PollState::Completed => 2,
            PollState::Failed => 3,
            PollState::Canceled => 4,
            PollState::TimedOut => 5,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => PollState::Polling,
            2 => PollState::Completed,
            3 => PollState::Failed,
            4 => PollState::Canceled,
            5 => PollState::TimedOut,
            _ => PollState::Idle,
        }
    }
}

/// Per-session knobs. The interval is fixed for the life of a session.
#[derive(Debug, Clone)]
pub struct PollOptions {
    pub interval: Duration,
    /// Opt-in timeout bound; `None` polls until a terminal status arrives.
    pub max_attempts: Option<u32>,
    /// Check immediately on start instead of waiting one full interval.
    pub immediate_first_poll: bool,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(*crate::POLL_INTERVAL_MS),
            max_attempts: None,
            immediate_first_poll: false,
        }
    }
}

impl PollOptions {
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    pub fn with_immediate_first_poll(mut self, immediate: bool) -> Self {
        self.immediate_first_poll = immediate;
        self
    }
}

struct Session {
    cancelled: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

/// Owns the single live polling task for one logical action and drives it to
/// a terminal state.
///
/// Starting a new session cancels any prior one, so two rapid submissions
/// can never leave two pollers running. Concurrent independent jobs each get
/// their own controller instance.
pub struct PollingController {
    backend: Arc<dyn JobBackend>,
    state: Arc<AtomicU8>,
    session: Mutex<Option<Session>>,
}

impl PollingController {
    pub fn new(backend: Arc<dyn JobBackend>) -> Self {
        Self {
            backend,
            state: Arc::new(AtomicU8::new(PollState::Idle.as_u8())),
            session: Mutex::new(None),
        }
    }

    pub fn state(&self) -> PollState {
        PollState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// Begins polling `handle`. Any session already running on this
    /// controller is cancelled first.
    pub async fn start(
        &self,
        handle: JobHandle,
        options: PollOptions,
        observer: Arc<dyn JobObserver>,
    ) {
        let mut slot = self.session.lock().await;
        if let Some(previous) = slot.take() {
            previous.cancelled.store(true, Ordering::SeqCst);
            previous.task.abort();
            info!("Replaced a live polling session for job {}", handle.job_id);
        }

        self.state
            .store(PollState::Polling.as_u8(), Ordering::SeqCst);
        let cancelled = Arc::new(AtomicBool::new(false));
        let task = tokio::spawn(poll_loop(
            self.backend.clone(),
            handle,
            options,
            observer,
            cancelled.clone(),
            self.state.clone(),
        ));
        *slot = Some(Session { cancelled, task });
    }

    /// Stops the session, emitting nothing. A no-op when the session is
    /// already terminal; safe to call repeatedly.
    pub async fn cancel(&self) {
        let mut slot = self.session.lock().await;
        if let Some(previous) = slot.take() {
            previous.cancelled.store(true, Ordering::SeqCst);
            previous.task.abort();
        }
        // only a live session becomes Canceled; a tick that just reached a
        // terminal state keeps it
        let _ = self.state.compare_exchange(
            PollState::Polling.as_u8(),
            PollState::Canceled.as_u8(),
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
    }
}

/// One serialized tick loop: sleep, fetch, classify, repeat. The next tick
/// is only scheduled after the current fetch settles, so status checks for a
/// session never overlap. The cancel flag is re-checked after every await so
/// a late response cannot revive a cancelled session.
async fn poll_loop(
    backend: Arc<dyn JobBackend>,
    handle: JobHandle,
    options: PollOptions,
    observer: Arc<dyn JobObserver>,
    cancelled: Arc<AtomicBool>,
    state: Arc<AtomicU8>,
) {
    let mut attempts: u32 = 0;

    if !options.immediate_first_poll {
        sleep(options.interval).await;
    }

    loop {
        if cancelled.load(Ordering::SeqCst) {
            return;
        }

        let outcome = backend.fetch_status(&handle).await;

        if cancelled.load(Ordering::SeqCst) {
            return;
        }
        attempts += 1;

        match outcome {
            Ok(status) => match status.state {
                JobState::Completed => {
                    state.store(PollState::Completed.as_u8(), Ordering::SeqCst);
                    let payload = status.payload.unwrap_or(Value::Null);
                    info!("Job {} completed after {} checks", handle.job_id, attempts);
                    observer
                        .on_update(&handle, &JobResult::Succeeded { payload })
                        .await;
                    return;
                }
                JobState::Failed => {
                    state.store(PollState::Failed.as_u8(), Ordering::SeqCst);
                    let reason = status
                        .error
                        .unwrap_or_else(|| "job failed".to_string());
                    info!("Job {} failed: {}", handle.job_id, reason);
                    observer
                        .on_update(&handle, &JobResult::Failed { reason })
                        .await;
                    return;
                }
                JobState::Queued | JobState::Processing => {
                    observer
                        .on_update(
                            &handle,
                            &JobResult::Pending {
                                attempts_made: attempts,
                            },
                        )
                        .await;
                }
            },
            Err(e) => {
                // transient: count the tick and keep polling
                warn!(
                    "Status check {} for job {} failed, will retry: {}",
                    attempts, handle.job_id, e
                );
            }
        }

        if let Some(max_attempts) = options.max_attempts {
            if attempts >= max_attempts {
                state.store(PollState::TimedOut.as_u8(), Ordering::SeqCst);
                warn!(
                    "Gave up on job {} after {} checks",
                    handle.job_id, attempts
                );
                observer.on_update(&handle, &JobResult::TimedOut).await;
                return;
            }
        }

        sleep(options.interval).await;
    }
}

#[cfg(test)]
mod tests;
