//! Handler that delegates execution to an external runner service.
//!
//! POS automation and most crawler kinds run in dedicated runner processes;
//! this handler forwards the job over HTTP and translates the runner's reply
//! into a handler outcome. A runner that cannot be reached is an attempt
//! failure, so the job re-enters the queue instead of being lost.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use conveyor_queue::{HandlerOutcome, Job, JobHandler};

/// Forwards jobs to `POST {base_url}/jobs/{kind}` and maps the reply.
#[derive(Debug, Clone)]
pub struct DelegateHandler {
    client: reqwest::Client,
    base_url: String,
}

/// Reply shape every runner speaks: a success flag plus either payload.
#[derive(Debug, Deserialize)]
struct RunnerReply {
    success: bool,
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    error: Option<String>,
}

impl DelegateHandler {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    fn endpoint_for(&self, job: &Job) -> String {
        format!("{}/jobs/{}", self.base_url.trim_end_matches('/'), job.kind)
    }
}

#[async_trait]
impl JobHandler for DelegateHandler {
    async fn run(&self, job: &Job) -> HandlerOutcome {
        let url = self.endpoint_for(job);
        let payload = json!({
            "job_id": job.id,
            "tenant_id": job.tenant_id,
            "type": job.kind,
            "target": job.target,
            "input": job.input,
            "attempt": job.attempts,
        });

        let response = match self.client.post(&url).json(&payload).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(job_id = %job.id, url, error = %e, "runner unreachable");
                return HandlerOutcome::Failure(format!("runner unreachable: {e}"));
            }
        };

        let status = response.status();
        if !status.is_success() {
            return HandlerOutcome::Failure(format!("runner returned {status}"));
        }

        match response.json::<RunnerReply>().await {
            Ok(reply) if reply.success => {
                debug!(job_id = %job.id, "runner accepted job");
                HandlerOutcome::Success(reply.data.unwrap_or_else(|| json!({})))
            }
            Ok(reply) => HandlerOutcome::Failure(
                reply
                    .error
                    .unwrap_or_else(|| "runner reported failure".to_string()),
            ),
            Err(e) => HandlerOutcome::Failure(format!("malformed runner reply: {e}")),
        }
    }
}
