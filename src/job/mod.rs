pub mod types;

pub use types::{JobHandle, JobResult, JobState, JobStatus, SubmitContext, SubmitRequest};
