use async_trait::async_trait;

use crate::job::{JobHandle, JobResult};

/// Receives every [`JobResult`] a polling session emits: `Pending` on each
/// non-terminal tick, then exactly one terminal variant (cancel emits
/// nothing).
#[async_trait]
pub trait JobObserver: Send + Sync {
    async fn on_update(&self, handle: &JobHandle, result: &JobResult);
}

/// Wraps a plain closure as an observer.
pub struct FnObserver<F> {
    callback: F,
}

impl<F> FnObserver<F>
where
    F: Fn(&JobHandle, &JobResult) + Send + Sync + 'static,
{
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

#[async_trait]
impl<F> JobObserver for FnObserver<F>
where
    F: Fn(&JobHandle, &JobResult) + Send + Sync + 'static,
{
    async fn on_update(&self, handle: &JobHandle, result: &JobResult) {
        (self.callback)(handle, result)
    }
}

/// One update as seen on a [`ChannelObserver`] receiver.
#[derive(Debug, Clone)]
pub struct JobUpdate {
    pub job_id: String,
    pub result: JobResult,
}

/// Fans updates out over a tokio broadcast channel.
pub struct ChannelObserver {
    sender: tokio::sync::broadcast::Sender<JobUpdate>,
}

impl ChannelObserver {
    pub fn new(capacity: usize) -> (Self, tokio::sync::broadcast::Receiver<JobUpdate>) {
        let (sender, receiver) = tokio::sync::broadcast::channel(capacity);
        (Self { sender }, receiver)
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<JobUpdate> {
        self.sender.subscribe()
    }
}

#[async_trait]
impl JobObserver for ChannelObserver {
    async fn on_update(&self, handle: &JobHandle, result: &JobResult) {
        // send only fails when nobody is listening
        let _ = self.sender.send(JobUpdate {
            job_id: handle.job_id.clone(),
            result: result.clone(),
        });
    }
}
