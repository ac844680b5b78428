mod endpoint;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info};

use crate::error::JobError;
use crate::job::{JobHandle, JobStatus, SubmitRequest};

pub use endpoint::{Classifier, ClassifyFn, JobEndpoint};

/// The two remote calls every job-oriented feature needs.
#[async_trait]
pub trait JobBackend: Send + Sync {
    /// Submits a unit of work. Submission failures are surfaced immediately
    /// and never retried.
    async fn submit(&self, request: SubmitRequest) -> Result<JobHandle, JobError>;

    /// Queries the current status of a submitted job. Errors here are
    /// transient from the polling controller's point of view.
    async fn fetch_status(&self, handle: &JobHandle) -> Result<JobStatus, JobError>;
}

/// [`JobBackend`] over HTTP, configured by one [`JobEndpoint`].
pub struct HttpJobClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    endpoint: JobEndpoint,
}

impl HttpJobClient {
    pub fn new(base_url: impl Into<String>, endpoint: JobEndpoint) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: None,
            endpoint,
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn endpoint(&self) -> &JobEndpoint {
        &self.endpoint
    }

    fn submit_url(&self) -> String {
        format!(
            "{}{}",
            self.base_url.trim_end_matches('/'),
            self.endpoint.submit_path
        )
    }

    fn status_url(&self, handle: &JobHandle) -> Result<String, JobError> {
        if let Some(url) = &handle.status_url {
            return Ok(url.clone());
        }
        match &self.endpoint.status_path {
            Some(path) => Ok(format!(
                "{}{}?{}={}",
                self.base_url.trim_end_matches('/'),
                path,
                self.endpoint.id_param,
                handle.job_id
            )),
            None => Err(JobError::MalformedResponse(format!(
                "endpoint {} has no status path and submit returned no status_check_url",
                self.endpoint.name
            ))),
        }
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }
}

#[async_trait]
impl JobBackend for HttpJobClient {
    async fn submit(&self, request: SubmitRequest) -> Result<JobHandle, JobError> {
        let url = self.submit_url();
        let body = request.wire_body();
        debug!("Submitting {} job to {}", self.endpoint.name, url);

        let response = self
            .authorize(self.http.post(&url).json(&body))
            .send()
            .await
            .map_err(|e| JobError::submission(format!("submit request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(JobError::submission(format!(
                "submit returned HTTP {}",
                response.status()
            )));
        }

        let value: Value = response
            .json()
            .await
            .map_err(|e| JobError::submission(format!("submit response was not JSON: {}", e)))?;

        if value.get("success").and_then(Value::as_bool) == Some(false) {
            let message = value
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("submission rejected by backend");
            return Err(JobError::submission(message));
        }

        let job_id = self.endpoint.extract_job_id(&value).ok_or_else(|| {
            JobError::submission(format!(
                "submit response carried no job id (endpoint {})",
                self.endpoint.name
            ))
        })?;

        let mut handle = JobHandle::new(job_id);
        if let Some(status_url) = self.endpoint.extract_status_url(&value) {
            handle = handle.with_status_url(status_url);
        }

        info!("Submitted {} job {}", self.endpoint.name, handle.job_id);
        Ok(handle)
    }

    async fn fetch_status(&self, handle: &JobHandle) -> Result<JobStatus, JobError> {
        let url = self.status_url(handle)?;
        let response = self
            .authorize(self.http.get(&url))
            .send()
            .await?
            .error_for_status()?;
        let value: Value = response.json().await?;

        // envelope-level rejection of the query itself, not a job failure
        if value.get("success").and_then(Value::as_bool) == Some(false) {
            let message = value
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("status query rejected by backend");
            return Err(JobError::Backend(message.to_string()));
        }

        let status = self.endpoint.normalize(&value);
        debug!(
            "Job {} reported {} ({})",
            handle.job_id, status.state, self.endpoint.name
        );
        Ok(status)
    }
}
