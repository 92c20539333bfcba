//! Queue engine: enqueue validation, batch processing, and reporting.
//!
//! The engine is deliberately invocation-shaped. There is no resident worker
//! loop; a `process` call claims one batch, runs it to completion, and
//! returns. Concurrent invocations coordinate only through the store.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use conveyor_core::{DomainError, JobId, TenantId};

use crate::report::{QueueReport, QueueStats};
use crate::store::{JobFilter, JobStore, StoreError};
use crate::types::{Job, JobKind, JobStatus, NewJob, QueueFamily};

/// Trailing window for the completed/failed counters in reports.
const REPORT_WINDOW_HOURS: i64 = 24;

/// How many waiting jobs a report previews.
const PENDING_PREVIEW_LIMIT: usize = 10;

/// Queue engine error.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// What a handler produced for one attempt.
#[derive(Debug, Clone)]
pub enum HandlerOutcome {
    /// The job finished; the payload becomes the job's result.
    Success(Value),
    /// The attempt failed; the message lands in the job's error column.
    Failure(String),
}

/// Type-specific job logic. One handler serves one kind, or a whole queue
/// through the family fallback.
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn run(&self, job: &Job) -> HandlerOutcome;
}

/// Adapter for plain closures, mostly used in tests.
pub struct FnHandler<F>(pub F);

#[async_trait]
impl<F> JobHandler for FnHandler<F>
where
    F: Fn(&Job) -> HandlerOutcome + Send + Sync,
{
    async fn run(&self, job: &Job) -> HandlerOutcome {
        (self.0)(job)
    }
}

/// Exponential delay between retries: `base * 2^(attempt - 1)`, capped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryBackoff {
    pub base: Duration,
    pub max: Duration,
}

impl RetryBackoff {
    pub fn new(base: Duration) -> Self {
        Self {
            base,
            max: Duration::from_secs(3600),
        }
    }

    /// Delay before the next attempt, given how many attempts have run.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let delay = self.base.saturating_mul(2u32.saturating_pow(exponent));
        delay.min(self.max)
    }
}

/// Engine tunables.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Most jobs accepted in one bulk enqueue; the rest are dropped.
    pub bulk_cap: usize,
    /// Claim size when the caller does not ask for one.
    pub default_claim_limit: usize,
    /// Hard ceiling on a single claim.
    pub max_claim_limit: usize,
    /// Per-attempt handler budget; overruns count as handler failures.
    pub handler_timeout: Duration,
    /// Delay schedule between retries. `None` retries immediately.
    pub retry_backoff: Option<RetryBackoff>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            bulk_cap: 100,
            default_claim_limit: 10,
            max_claim_limit: 50,
            handler_timeout: Duration::from_secs(30),
            retry_backoff: None,
        }
    }
}

impl EngineConfig {
    pub fn with_handler_timeout(mut self, timeout: Duration) -> Self {
        self.handler_timeout = timeout;
        self
    }

    pub fn with_retry_backoff(mut self, backoff: RetryBackoff) -> Self {
        self.retry_backoff = Some(backoff);
        self
    }

    pub fn with_max_claim_limit(mut self, limit: usize) -> Self {
        self.max_claim_limit = limit;
        self
    }
}

/// Claim parameters for one processing pass.
#[derive(Debug, Clone, Default)]
pub struct ProcessRequest {
    pub limit: Option<usize>,
    pub kind: Option<JobKind>,
}

/// Outcome of one job within a processing batch.
#[derive(Debug, Clone, Serialize)]
pub struct JobOutcome {
    pub job_id: JobId,
    pub kind: JobKind,
    pub status: JobStatus,
    pub attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&Job> for JobOutcome {
    fn from(job: &Job) -> Self {
        Self {
            job_id: job.id,
            kind: job.kind,
            status: job.status,
            attempts: job.attempts,
            error: job.error.clone(),
        }
    }
}

/// Result of one `process` invocation.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProcessReport {
    pub claimed: usize,
    pub completed: usize,
    pub failed: usize,
    pub retried: usize,
    pub outcomes: Vec<JobOutcome>,
}

/// Per-item failure inside a bulk enqueue.
#[derive(Debug, Clone, Serialize)]
pub struct BulkRejection {
    pub index: usize,
    pub error: String,
}

/// Result of a bulk enqueue: accepted jobs, per-item rejections, and the
/// overflow dropped past the cap.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BulkReport {
    pub accepted: Vec<Job>,
    pub rejected: Vec<BulkRejection>,
    pub dropped: usize,
}

impl BulkReport {
    pub fn accepted_ids(&self) -> Vec<JobId> {
        self.accepted.iter().map(|job| job.id).collect()
    }
}

/// The queue engine.
///
/// Owns handler registration and the enqueue/process/report/sweep operations
/// for both queues. Generic over the store so tests run in memory and
/// deployments run on Postgres.
pub struct QueueEngine<S> {
    store: S,
    handlers: HashMap<JobKind, Arc<dyn JobHandler>>,
    fallbacks: HashMap<QueueFamily, Arc<dyn JobHandler>>,
    config: EngineConfig,
}

impl<S: JobStore> QueueEngine<S> {
    pub fn new(store: S) -> Self {
        Self::with_config(store, EngineConfig::default())
    }

    pub fn with_config(store: S, config: EngineConfig) -> Self {
        Self {
            store,
            handlers: HashMap::new(),
            fallbacks: HashMap::new(),
            config,
        }
    }

    /// Register the handler for one job kind.
    pub fn register_handler(&mut self, kind: JobKind, handler: Arc<dyn JobHandler>) {
        self.handlers.insert(kind, handler);
    }

    /// Register a handler serving every kind of a queue that has no exact
    /// handler of its own.
    pub fn register_family_fallback(&mut self, family: QueueFamily, handler: Arc<dyn JobHandler>) {
        self.fallbacks.insert(family, handler);
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn resolve_handler(&self, job: &Job) -> Option<&Arc<dyn JobHandler>> {
        // Exact kind first, then the queue-wide fallback.
        self.handlers
            .get(&job.kind)
            .or_else(|| self.fallbacks.get(&job.family))
    }

    /// Validate and persist one job.
    pub async fn enqueue(
        &self,
        tenant: TenantId,
        family: QueueFamily,
        req: NewJob,
    ) -> Result<Job, QueueError> {
        let job = Job::enqueue(tenant, family, req, Utc::now())?;
        self.store.insert(&job).await?;
        info!(job_id = %job.id, kind = %job.kind, queue = %family, "job enqueued");
        Ok(job)
    }

    /// Enqueue up to `bulk_cap` jobs. Items validate independently; one bad
    /// request rejects that item only. Anything past the cap is dropped and
    /// counted in the report.
    pub async fn enqueue_bulk(
        &self,
        tenant: TenantId,
        family: QueueFamily,
        requests: Vec<NewJob>,
    ) -> BulkReport {
        let mut report = BulkReport::default();
        let total = requests.len();
        if total > self.config.bulk_cap {
            report.dropped = total - self.config.bulk_cap;
            warn!(
                queue = %family,
                total,
                cap = self.config.bulk_cap,
                dropped = report.dropped,
                "bulk enqueue truncated at cap"
            );
        }

        for (index, req) in requests.into_iter().take(self.config.bulk_cap).enumerate() {
            match self.enqueue_item(tenant, family, req).await {
                Ok(job) => report.accepted.push(job),
                Err(e) => report.rejected.push(BulkRejection {
                    index,
                    error: e.to_string(),
                }),
            }
        }

        info!(
            queue = %family,
            accepted = report.accepted.len(),
            rejected = report.rejected.len(),
            dropped = report.dropped,
            "bulk enqueue finished"
        );
        report
    }

    async fn enqueue_item(
        &self,
        tenant: TenantId,
        family: QueueFamily,
        req: NewJob,
    ) -> Result<Job, QueueError> {
        let job = Job::enqueue(tenant, family, req, Utc::now())?;
        self.store.insert(&job).await?;
        Ok(job)
    }

    /// Claim and execute one batch. Each claimed job runs its handler under
    /// the configured timeout and is finalized through the store; a store
    /// failure during finalize is recorded in the outcome and the batch
    /// moves on.
    pub async fn process(
        &self,
        tenant: Option<TenantId>,
        family: QueueFamily,
        req: ProcessRequest,
    ) -> Result<ProcessReport, QueueError> {
        let limit = req
            .limit
            .unwrap_or(self.config.default_claim_limit)
            .clamp(1, self.config.max_claim_limit);

        let claimed = self
            .store
            .claim_batch(tenant, family, req.kind, limit, Utc::now())
            .await?;

        let mut report = ProcessReport {
            claimed: claimed.len(),
            ..ProcessReport::default()
        };
        debug!(queue = %family, claimed = report.claimed, "processing batch");

        for job in claimed {
            let outcome = self.execute_and_finalize(job).await;
            match outcome.status {
                JobStatus::Completed => report.completed += 1,
                JobStatus::Failed => report.failed += 1,
                JobStatus::Pending | JobStatus::Scheduled => report.retried += 1,
                // Finalize write failed; the row is still processing.
                JobStatus::Processing => {}
            }
            report.outcomes.push(outcome);
        }

        info!(
            queue = %family,
            claimed = report.claimed,
            completed = report.completed,
            failed = report.failed,
            retried = report.retried,
            "batch finished"
        );
        Ok(report)
    }

    async fn execute_and_finalize(&self, job: Job) -> JobOutcome {
        let outcome = match self.resolve_handler(&job) {
            Some(handler) => {
                match tokio::time::timeout(self.config.handler_timeout, handler.run(&job)).await {
                    Ok(outcome) => outcome,
                    Err(_) => HandlerOutcome::Failure(format!(
                        "handler timed out after {}s",
                        self.config.handler_timeout.as_secs()
                    )),
                }
            }
            // A kind nobody serves fails the attempt, it does not crash the
            // batch.
            None => HandlerOutcome::Failure(format!("no handler registered for {}", job.kind)),
        };

        self.finalize(job, outcome).await
    }

    async fn finalize(&self, job: Job, outcome: HandlerOutcome) -> JobOutcome {
        let now = Utc::now();
        let updated = match outcome {
            HandlerOutcome::Success(result) => self.store.mark_completed(job.id, result, now).await,
            HandlerOutcome::Failure(error) => {
                let retry_at = self.retry_at(&job, now);
                self.store.mark_failed(job.id, &error, retry_at, now).await
            }
        };

        match updated {
            Ok(updated) => {
                match updated.status {
                    JobStatus::Completed => debug!(job_id = %updated.id, "job completed"),
                    JobStatus::Failed => warn!(
                        job_id = %updated.id,
                        attempts = updated.attempts,
                        error = ?updated.error,
                        "job failed permanently"
                    ),
                    _ => debug!(
                        job_id = %updated.id,
                        attempts = updated.attempts,
                        "job will retry"
                    ),
                }
                JobOutcome::from(&updated)
            }
            Err(e) => {
                warn!(job_id = %job.id, error = %e, "failed to finalize job");
                JobOutcome {
                    job_id: job.id,
                    kind: job.kind,
                    status: job.status,
                    attempts: job.attempts,
                    error: Some(format!("finalize failed: {e}")),
                }
            }
        }
    }

    fn retry_at(&self, job: &Job, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        // Only meaningful while attempts remain; at the ceiling mark_failed
        // goes terminal regardless.
        if job.attempts >= job.max_attempts {
            return None;
        }
        let backoff = self.config.retry_backoff?;
        let delay = backoff.delay_for_attempt(job.attempts);
        Some(now + chrono::Duration::from_std(delay).unwrap_or_default())
    }

    /// Build the status report for one queue. Never fails: when the store
    /// cannot answer, sections come back zeroed so the surface stays up.
    pub async fn report(&self, tenant: Option<TenantId>, family: QueueFamily) -> QueueReport {
        let now = Utc::now();
        let stats = match self
            .store
            .stats(tenant, family, chrono::Duration::hours(REPORT_WINDOW_HOURS), now)
            .await
        {
            Ok(stats) => stats,
            Err(e) => {
                warn!(queue = %family, error = %e, "stats unavailable, reporting zeroes");
                QueueStats::default()
            }
        };

        let next = match self
            .store
            .peek(tenant, family, PENDING_PREVIEW_LIMIT, now)
            .await
        {
            Ok(next) => next,
            Err(e) => {
                warn!(queue = %family, error = %e, "pending preview unavailable");
                Vec::new()
            }
        };

        QueueReport::assemble(family, stats, &next, now)
    }

    /// Retention sweep: delete terminal jobs finalized at or before
    /// `now - older_than`.
    pub async fn sweep(
        &self,
        tenant: Option<TenantId>,
        family: QueueFamily,
        older_than: chrono::Duration,
    ) -> Result<u64, QueueError> {
        let cutoff = Utc::now() - older_than;
        let removed = self.store.purge_terminal(tenant, family, cutoff).await?;
        info!(queue = %family, removed, "retention sweep finished");
        Ok(removed)
    }

    pub async fn job(&self, tenant: Option<TenantId>, id: JobId) -> Result<Option<Job>, QueueError> {
        Ok(self.store.get(tenant, id).await?)
    }

    pub async fn jobs(
        &self,
        tenant: Option<TenantId>,
        filter: JobFilter,
    ) -> Result<Vec<Job>, QueueError> {
        Ok(self.store.list(tenant, filter).await?)
    }
}
