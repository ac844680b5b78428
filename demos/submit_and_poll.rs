use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use studiojobs::utils::http::download_media;
use studiojobs::{
    ChannelObserver, HttpJobClient, JobBackend, JobEndpoint, JobResult, PollOptions,
    PollingController, SubmitContext, SubmitRequest,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    studiojobs::init_env();
    let _guard = studiojobs::utils::logger::init("./logs".to_string())?;

    let mut client = HttpJobClient::new(studiojobs::API_BASE.clone(), JobEndpoint::merge_video());
    if let Ok(api_key) = std::env::var("STUDIOJOBS_API_KEY") {
        client = client.with_api_key(api_key);
    }
    let client = Arc::new(client);

    let request = SubmitRequest::new(json!({
        "video_urls": [
            "https://example.com/clips/a.mp4",
            "https://example.com/clips/b.mp4",
        ],
    }))
    .with_context(SubmitContext::for_user("demo-user"));

    let handle = client.submit(request).await?;
    println!("Submitted job: {}", handle.job_id);

    let controller = PollingController::new(client);
    let (observer, mut updates) = ChannelObserver::new(32);
    let options = PollOptions::default()
        .with_interval(Duration::from_secs(2))
        .with_max_attempts(150);
    controller.start(handle, options, Arc::new(observer)).await;

    while let Ok(update) = updates.recv().await {
        match update.result {
            JobResult::Pending { attempts_made } => {
                println!("Still working... (check {})", attempts_made);
            }
            JobResult::Succeeded { payload } => {
                println!("Job {} finished: {}", update.job_id, payload);
                if let Some(url) = payload.as_str() {
                    let http = reqwest::Client::new();
                    let path =
                        download_media(&http, url, Path::new("./downloads"), &update.job_id)
                            .await?;
                    println!("Saved to {:?}", path);
                }
                break;
            }
            JobResult::Failed { reason } => {
                println!("Job {} failed: {}", update.job_id, reason);
                break;
            }
            JobResult::TimedOut => {
                println!("Gave up waiting for job {}", update.job_id);
                break;
            }
            JobResult::Canceled => break,
        }
    }

    Ok(())
}
