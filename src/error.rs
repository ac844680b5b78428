use thiserror::Error;

/// Failures the job client can report to callers.
///
/// Submission errors are surfaced immediately and never retried. Everything
/// the status path can produce (`Transport`, `MalformedResponse`) is treated
/// as transient by the polling controller: the tick is logged and counted,
/// and polling continues.
#[derive(Debug, Error)]
pub enum JobError {
    /// The job-creation call failed or returned an unusable response.
    #[error("submission failed: {message}")]
    Submission { message: String },

    /// A status check could not reach the backend or decode its body.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The backend answered with a body the endpoint config cannot read.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// The backend rejected a status query at the envelope level
    /// (`success: false`). Distinct from a job that reached a terminal
    /// `Failed` state; the polling controller retries it like any other
    /// transient status error.
    #[error("backend rejected request: {0}")]
    Backend(String),
}

impl JobError {
    pub fn submission(message: impl Into<String>) -> Self {
        Self::Submission {
            message: message.into(),
        }
    }
}
