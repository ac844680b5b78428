use std::fmt::Display;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// One submitted unit of work. Built from the submit response and immutable
/// afterwards; dropped when polling reaches a terminal state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobHandle {
    /// Opaque, server-assigned id (`job_id`, `creation_id`, `edit_id`, ...).
    pub job_id: String,
    /// Absolute status URL, when the submit response carries one. Takes
    /// precedence over the endpoint's configured status path.
    pub status_url: Option<String>,
    pub submitted_at: DateTime<Utc>,
}

impl JobHandle {
    pub fn new(job_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            status_url: None,
            submitted_at: Utc::now(),
        }
    }

    pub fn with_status_url(mut self, url: impl Into<String>) -> Self {
        self.status_url = Some(url.into());
        self
    }
}

/// Canonical job states. Backend vocabularies ("completed_with_music",
/// "completed_captioned", "stopped", ...) are normalized into these four.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }
}

impl Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// One normalized snapshot from a status query.
#[derive(Debug, Clone)]
pub struct JobStatus {
    pub state: JobState,
    /// Result payload (media URL or URLs), present only for `Completed`.
    pub payload: Option<Value>,
    /// Backend failure message, present only for `Failed`.
    pub error: Option<String>,
    /// The raw response body, kept for diagnostics.
    pub raw: Value,
}

impl JobStatus {
    pub fn new(state: JobState) -> Self {
        Self {
            state,
            payload: None,
            error: None,
            raw: Value::Null,
        }
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

/// What the polling controller delivers to observers. Consumers switch on
/// the variant and never see the backend's raw status vocabulary.
#[derive(Debug, Clone, PartialEq)]
pub enum JobResult {
    Pending { attempts_made: u32 },
    Succeeded { payload: Value },
    Failed { reason: String },
    Canceled,
    TimedOut,
}

impl JobResult {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobResult::Pending { .. })
    }
}

/// Caller identity attached to a submission. Passed explicitly so the
/// polling core never reads ambient state.
#[derive(Debug, Clone)]
pub struct SubmitContext {
    pub user: Option<String>,
    pub selected_user: Option<String>,
    pub request_id: Uuid,
}

impl Default for SubmitContext {
    fn default() -> Self {
        Self {
            user: None,
            selected_user: None,
            request_id: Uuid::new_v4(),
        }
    }
}

impl SubmitContext {
    pub fn for_user(user: impl Into<String>) -> Self {
        Self {
            user: Some(user.into()),
            ..Self::default()
        }
    }

    pub fn with_selected_user(mut self, selected_user: impl Into<String>) -> Self {
        self.selected_user = Some(selected_user.into());
        self
    }
}

/// A feature-specific JSON body plus the submission context merged into it
/// on the wire.
#[derive(Debug, Clone)]
pub struct SubmitRequest {
    pub body: Value,
    pub context: SubmitContext,
}

impl SubmitRequest {
    pub fn new(body: Value) -> Self {
        Self {
            body,
            context: SubmitContext::default(),
        }
    }

    pub fn with_context(mut self, context: SubmitContext) -> Self {
        self.context = context;
        self
    }

    /// The JSON body actually sent: the feature body with the context fields
    /// merged in. Non-object bodies are sent untouched.
    pub fn wire_body(&self) -> Value {
        let mut body = self.body.clone();
        if let Value::Object(map) = &mut body {
            if let Some(user) = &self.context.user {
                map.insert("user".to_string(), Value::String(user.clone()));
            }
            if let Some(selected) = &self.context.selected_user {
                map.insert("selected_user".to_string(), Value::String(selected.clone()));
            }
            map.insert(
                "request_id".to_string(),
                Value::String(self.context.request_id.to_string()),
            );
        }
        body
    }
}
