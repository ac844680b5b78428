pub mod client;
pub mod error;
pub mod job;
pub mod poll;
pub mod utils;

use std::env;
use once_cell::sync::Lazy;

pub use client::{Classifier, HttpJobClient, JobBackend, JobEndpoint};
pub use error::JobError;
pub use job::{JobHandle, JobResult, JobState, JobStatus, SubmitContext, SubmitRequest};
pub use poll::{
    ChannelObserver, FnObserver, JobObserver, PollOptions, PollState, PollingController,
};

const STUDIOJOBS_API_BASE: &str = "http://127.0.0.1:8000";
const STUDIOJOBS_POLL_INTERVAL_MS: u64 = 3000;

pub static API_BASE: Lazy<String> = Lazy::new(|| {
    match env::var("STUDIOJOBS_API_BASE") {
        Ok(base) => base,
        Err(_) => {
            dotenv::var("STUDIOJOBS_API_BASE").unwrap_or_else(|_| STUDIOJOBS_API_BASE.to_string())
        }
    }
});

pub static POLL_INTERVAL_MS: Lazy<u64> = Lazy::new(|| {
    env::var("STUDIOJOBS_POLL_INTERVAL_MS")
        .ok()
        .or_else(|| dotenv::var("STUDIOJOBS_POLL_INTERVAL_MS").ok())
        .and_then(|v| v.parse().ok())
        .unwrap_or(STUDIOJOBS_POLL_INTERVAL_MS)
});

pub fn init_env() {
    dotenv::dotenv().ok();
}
