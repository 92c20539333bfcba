//! Built-in handler for `website_scrape` jobs.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use conveyor_queue::{HandlerOutcome, Job, JobHandler};

const USER_AGENT: &str = concat!("conveyor-crawler/", env!("CARGO_PKG_VERSION"));

/// Fetches the job's target url and summarizes the page.
///
/// The client carries the same timeout the engine applies per attempt, so a
/// stalled connection fails inside that budget rather than outliving it.
#[derive(Debug, Clone)]
pub struct HttpFetchHandler {
    client: reqwest::Client,
}

impl HttpFetchHandler {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl JobHandler for HttpFetchHandler {
    async fn run(&self, job: &Job) -> HandlerOutcome {
        let Some(url) = job.target.url.as_deref() else {
            return HandlerOutcome::Failure("job has no target url".to_string());
        };

        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(e) => return HandlerOutcome::Failure(format!("fetch failed: {e}")),
        };

        let status = response.status();
        if !status.is_success() {
            return HandlerOutcome::Failure(format!("fetch returned {status}"));
        }

        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => return HandlerOutcome::Failure(format!("failed to read body: {e}")),
        };

        debug!(job_id = %job.id, url, bytes = body.len(), "page fetched");
        HandlerOutcome::Success(json!({
            "url": url,
            "status": status.as_u16(),
            "bytes": body.len(),
            "title": extract_title(&body),
        }))
    }
}

/// Pull the first `<title>` out of an HTML document, if any.
fn extract_title(body: &str) -> Option<String> {
    // Case folding can shift byte offsets on exotic input, so slice with
    // `get` rather than indexing.
    let lower = body.to_ascii_lowercase();
    let open = lower.find("<title")?;
    let start = lower.get(open..)?.find('>')? + open + 1;
    let end = lower.get(start..)?.find("</title>")? + start;
    let title = body.get(start..end)?.trim();
    (!title.is_empty()).then(|| title.to_string())
}
