use std::sync::Arc;

use serde_json::Value;

use crate::job::{JobState, JobStatus};

/// Caller-supplied classifier closure over the raw status body.
pub type ClassifyFn = dyn Fn(&Value) -> JobState + Send + Sync;

/// Maps a backend status word onto the canonical [`JobState`] vocabulary.
///
/// Failure words are checked before success words: a body carrying both an
/// error and a stale result URL must classify as `Failed`, never `Completed`.
#[derive(Debug, Clone)]
pub struct Classifier {
    failure: Vec<String>,
    success: Vec<String>,
    queued: Vec<String>,
    processing: Vec<String>,
}

impl Default for Classifier {
    fn default() -> Self {
        Self {
            failure: to_words(&["failed", "error", "cancelled", "canceled", "stopped"]),
            success: to_words(&["completed", "done", "success"]),
            queued: to_words(&["queued", "pending"]),
            processing: to_words(&["processing", "in_progress", "running"]),
        }
    }
}

fn to_words(words: &[&str]) -> Vec<String> {
    words.iter().map(|w| w.to_string()).collect()
}

impl Classifier {
    pub fn with_success_states(mut self, words: &[&str]) -> Self {
        self.success.extend(to_words(words));
        self
    }

    pub fn with_failure_states(mut self, words: &[&str]) -> Self {
        self.failure.extend(to_words(words));
        self
    }

    /// Order matters: failure, success, queued, then processing. Unknown
    /// words keep the session polling.
    pub fn classify(&self, status: &str) -> JobState {
        let status = status.trim().to_ascii_lowercase();
        if self.failure.iter().any(|w| *w == status) {
            JobState::Failed
        } else if self.success.iter().any(|w| *w == status) {
            JobState::Completed
        } else if self.queued.iter().any(|w| *w == status) {
            JobState::Queued
        } else if self.processing.iter().any(|w| *w == status) {
            JobState::Processing
        } else {
            // vocabularies vary per endpoint; keep polling on unknown words
            JobState::Processing
        }
    }
}

/// Per-feature wiring for one submit/status endpoint pair.
///
/// Each dashboard feature (merge video, add music, captioned combine, bulk
/// product shots) is a thin configuration of this struct; the polling core
/// itself carries no backend-specific strings.
#[derive(Clone)]
pub struct JobEndpoint {
    pub name: String,
    pub submit_path: String,
    /// Relative status route. `None` means the submit response must carry an
    /// absolute `status_check_url`.
    pub status_path: Option<String>,
    /// Query parameter naming the job id on the status route.
    pub id_param: String,
    /// Candidate id fields in the submit response, searched top-level and
    /// under `data`.
    pub id_fields: Vec<String>,
    pub status_field: String,
    /// Candidate result fields in a completed status body, first match wins.
    pub payload_fields: Vec<String>,
    pub error_fields: Vec<String>,
    pub classifier: Classifier,
    classify_override: Option<Arc<ClassifyFn>>,
}

impl std::fmt::Debug for JobEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobEndpoint")
            .field("name", &self.name)
            .field("submit_path", &self.submit_path)
            .field("status_path", &self.status_path)
            .finish()
    }
}

impl JobEndpoint {
    pub fn new(name: impl Into<String>, submit_path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            submit_path: submit_path.into(),
            status_path: None,
            id_param: "job_id".to_string(),
            id_fields: to_words(&["job_id", "creation_id", "edit_id"]),
            status_field: "status".to_string(),
            payload_fields: to_words(&["final_video_url", "video_url", "image_urls", "url"]),
            error_fields: to_words(&["message", "error"]),
            classifier: Classifier::default(),
            classify_override: None,
        }
    }

    pub fn with_status_path(mut self, path: impl Into<String>) -> Self {
        self.status_path = Some(path.into());
        self
    }

    pub fn with_id_param(mut self, param: impl Into<String>) -> Self {
        self.id_param = param.into();
        self
    }

    pub fn with_status_field(mut self, field: impl Into<String>) -> Self {
        self.status_field = field.into();
        self
    }

    pub fn with_payload_fields(mut self, fields: &[&str]) -> Self {
        self.payload_fields = to_words(fields);
        self
    }

    pub fn with_classifier(mut self, classifier: Classifier) -> Self {
        self.classifier = classifier;
        self
    }

    /// Full override of status classification for endpoints the vocabulary
    /// lists cannot express.
    pub fn with_classify_fn<F>(mut self, classify: F) -> Self
    where
        F: Fn(&Value) -> JobState + Send + Sync + 'static,
    {
        self.classify_override = Some(Arc::new(classify));
        self
    }

    // The four job-oriented dashboard features.

    pub fn merge_video() -> Self {
        Self::new("merge_video", "/merged_video/")
            .with_status_path("/get_video_merge_job_status/")
            .with_classifier(Classifier::default().with_success_states(&["completed_merged"]))
    }

    pub fn add_music() -> Self {
        Self::new("add_music", "/music_to_merge_video/")
            .with_status_path("/factory_get_merge_music_job_status/")
            .with_classifier(Classifier::default().with_success_states(&["completed_with_music"]))
    }

    pub fn captioned_combine() -> Self {
        Self::new("captioned_combine", "/captioned_combined_video/")
            .with_classifier(Classifier::default().with_success_states(&["completed_captioned"]))
    }

    pub fn bulk_product_shots() -> Self {
        Self::new("bulk_product_shots", "/factory_bulk_generate_product_shots/")
            .with_payload_fields(&["image_urls", "final_video_url", "url"])
    }

    /// Pulls the job id out of a submit response, trying each candidate
    /// field top-level and then under `data`.
    pub fn extract_job_id(&self, body: &Value) -> Option<String> {
        for field in &self.id_fields {
            if let Some(id) = field_as_string(body, field) {
                return Some(id);
            }
            if let Some(id) = body.get("data").and_then(|d| field_as_string(d, field)) {
                return Some(id);
            }
        }
        None
    }

    pub fn extract_status_url(&self, body: &Value) -> Option<String> {
        field_as_string(body, "status_check_url")
            .or_else(|| body.get("data").and_then(|d| field_as_string(d, "status_check_url")))
    }

    /// Normalizes a raw status body into a [`JobStatus`], unwrapping the
    /// optional `data` envelope first.
    pub fn normalize(&self, raw: &Value) -> JobStatus {
        let inner = match raw.get("data") {
            Some(data) if data.is_object() => data,
            _ => raw,
        };

        let state = self.classify(inner);
        let mut status = JobStatus::new(state);
        status.raw = raw.clone();

        match state {
            JobState::Completed => {
                let payload = self
                    .payload_fields
                    .iter()
                    .find_map(|field| inner.get(field))
                    .cloned()
                    .unwrap_or_else(|| inner.clone());
                status = status.with_payload(payload);
            }
            JobState::Failed => {
                if let Some(message) = self.extract_error(inner) {
                    status = status.with_error(message);
                }
            }
            JobState::Queued | JobState::Processing => {}
        }

        status
    }

    fn classify(&self, inner: &Value) -> JobState {
        if let Some(classify) = &self.classify_override {
            return classify(inner);
        }
        let word = inner
            .get(&self.status_field)
            .and_then(Value::as_str)
            .unwrap_or("");
        if word.is_empty() {
            // some endpoints signal failure with a bare message field
            if self.extract_error(inner).is_some() {
                return JobState::Failed;
            }
            return JobState::Processing;
        }
        self.classifier.classify(word)
    }

    fn extract_error(&self, inner: &Value) -> Option<String> {
        self.error_fields
            .iter()
            .find_map(|field| inner.get(field).and_then(Value::as_str))
            .filter(|m| !m.is_empty())
            .map(|m| m.to_string())
    }
}

fn field_as_string(value: &Value, field: &str) -> Option<String> {
    match value.get(field) {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}
