//! Job storage: the store trait, errors, and the in-memory backend.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde_json::Value;

use conveyor_core::{JobId, TenantId};

use crate::report::{KindStatusCount, PriorityCount, QueueStats};
use crate::types::{Job, JobKind, JobStatus, QueueFamily};

/// Default page size for job listings.
pub const DEFAULT_LIST_LIMIT: usize = 50;

/// Hard cap on a single listing page.
pub const MAX_LIST_LIMIT: usize = 200;

/// Listing filter. `None` fields match everything.
#[derive(Debug, Clone)]
pub struct JobFilter {
    pub family: Option<QueueFamily>,
    pub kind: Option<JobKind>,
    pub status: Option<JobStatus>,
    pub limit: usize,
    pub offset: usize,
}

impl Default for JobFilter {
    fn default() -> Self {
        Self {
            family: None,
            kind: None,
            status: None,
            limit: DEFAULT_LIST_LIMIT,
            offset: 0,
        }
    }
}

impl JobFilter {
    pub fn with_family(mut self, family: QueueFamily) -> Self {
        self.family = Some(family);
        self
    }

    pub fn with_kind(mut self, kind: JobKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn with_status(mut self, status: JobStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit.min(MAX_LIST_LIMIT);
        self
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    fn matches(&self, job: &Job) -> bool {
        self.family.map_or(true, |f| job.family == f)
            && self.kind.map_or(true, |k| job.kind == k)
            && self.status.map_or(true, |s| job.status == s)
    }
}

/// Job store error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    #[error("job not found: {0}")]
    NotFound(JobId),
    #[error("job already exists: {0}")]
    AlreadyExists(JobId),
    #[error("conflicting update for job {id}: {reason}")]
    Conflict { id: JobId, reason: String },
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("storage error: {0}")]
    Storage(String),
}

/// Persistence seam for the queue.
///
/// Every mutation must be atomic within the single call; in particular
/// [`claim_batch`](JobStore::claim_batch) may never hand the same row to two
/// concurrent callers. A `tenant` of `None` means platform-wide scope.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Persist a freshly enqueued job.
    async fn insert(&self, job: &Job) -> Result<(), StoreError>;

    /// Fetch one job. A row owned by another tenant reads as absent.
    async fn get(&self, tenant: Option<TenantId>, id: JobId) -> Result<Option<Job>, StoreError>;

    /// List jobs matching `filter`, newest first.
    async fn list(
        &self,
        tenant: Option<TenantId>,
        filter: JobFilter,
    ) -> Result<Vec<Job>, StoreError>;

    /// Atomically claim up to `limit` eligible jobs: most urgent priority
    /// first, oldest first within a priority. Claimed rows flip to
    /// `processing` with the attempt counted.
    async fn claim_batch(
        &self,
        tenant: Option<TenantId>,
        family: QueueFamily,
        kind: Option<JobKind>,
        limit: usize,
        now: DateTime<Utc>,
    ) -> Result<Vec<Job>, StoreError>;

    /// Finalize a processing job as completed. Returns
    /// [`StoreError::Conflict`] when the row is not in `processing`.
    async fn mark_completed(
        &self,
        id: JobId,
        result: Value,
        now: DateTime<Utc>,
    ) -> Result<Job, StoreError>;

    /// Finalize a processing job as failed: back to `pending` while attempts
    /// remain (optionally deferred to `retry_at`), terminal `failed` at the
    /// ceiling.
    async fn mark_failed(
        &self,
        id: JobId,
        error: &str,
        retry_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<Job, StoreError>;

    /// Aggregate counters for one queue. `window` bounds the trailing
    /// completed/failed counts.
    async fn stats(
        &self,
        tenant: Option<TenantId>,
        family: QueueFamily,
        window: Duration,
        now: DateTime<Utc>,
    ) -> Result<QueueStats, StoreError>;

    /// The jobs the next claim would take, in claim order, without mutating
    /// anything.
    async fn peek(
        &self,
        tenant: Option<TenantId>,
        family: QueueFamily,
        limit: usize,
        now: DateTime<Utc>,
    ) -> Result<Vec<Job>, StoreError>;

    /// Delete terminal jobs finalized at or before `cutoff`. Returns the
    /// number of rows removed. The only deletion path in the system.
    async fn purge_terminal(
        &self,
        tenant: Option<TenantId>,
        family: QueueFamily,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, StoreError>;
}

#[async_trait]
impl<T> JobStore for Arc<T>
where
    T: JobStore + ?Sized,
{
    async fn insert(&self, job: &Job) -> Result<(), StoreError> {
        (**self).insert(job).await
    }

    async fn get(&self, tenant: Option<TenantId>, id: JobId) -> Result<Option<Job>, StoreError> {
        (**self).get(tenant, id).await
    }

    async fn list(
        &self,
        tenant: Option<TenantId>,
        filter: JobFilter,
    ) -> Result<Vec<Job>, StoreError> {
        (**self).list(tenant, filter).await
    }

    async fn claim_batch(
        &self,
        tenant: Option<TenantId>,
        family: QueueFamily,
        kind: Option<JobKind>,
        limit: usize,
        now: DateTime<Utc>,
    ) -> Result<Vec<Job>, StoreError> {
        (**self).claim_batch(tenant, family, kind, limit, now).await
    }

    async fn mark_completed(
        &self,
        id: JobId,
        result: Value,
        now: DateTime<Utc>,
    ) -> Result<Job, StoreError> {
        (**self).mark_completed(id, result, now).await
    }

    async fn mark_failed(
        &self,
        id: JobId,
        error: &str,
        retry_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<Job, StoreError> {
        (**self).mark_failed(id, error, retry_at, now).await
    }

    async fn stats(
        &self,
        tenant: Option<TenantId>,
        family: QueueFamily,
        window: Duration,
        now: DateTime<Utc>,
    ) -> Result<QueueStats, StoreError> {
        (**self).stats(tenant, family, window, now).await
    }

    async fn peek(
        &self,
        tenant: Option<TenantId>,
        family: QueueFamily,
        limit: usize,
        now: DateTime<Utc>,
    ) -> Result<Vec<Job>, StoreError> {
        (**self).peek(tenant, family, limit, now).await
    }

    async fn purge_terminal(
        &self,
        tenant: Option<TenantId>,
        family: QueueFamily,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        (**self).purge_terminal(tenant, family, cutoff).await
    }
}

/// In-memory job store for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryJobStore {
    jobs: RwLock<HashMap<JobId, Job>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    fn claimable_ids(
        jobs: &HashMap<JobId, Job>,
        tenant: Option<TenantId>,
        family: QueueFamily,
        kind: Option<JobKind>,
        limit: usize,
        now: DateTime<Utc>,
    ) -> Vec<JobId> {
        let mut candidates: Vec<_> = jobs
            .values()
            .filter(|j| {
                j.family == family
                    && j.is_eligible(now)
                    && tenant.map_or(true, |t| j.tenant_id == t)
                    && kind.map_or(true, |k| j.kind == k)
            })
            .map(|j| (j.priority, j.created_at, j.id))
            .collect();

        candidates.sort();
        candidates.truncate(limit);
        candidates.into_iter().map(|(_, _, id)| id).collect()
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn insert(&self, job: &Job) -> Result<(), StoreError> {
        let mut jobs = self.jobs.write().unwrap();
        if jobs.contains_key(&job.id) {
            return Err(StoreError::AlreadyExists(job.id));
        }
        jobs.insert(job.id, job.clone());
        Ok(())
    }

    async fn get(&self, tenant: Option<TenantId>, id: JobId) -> Result<Option<Job>, StoreError> {
        let jobs = self.jobs.read().unwrap();
        Ok(jobs
            .get(&id)
            .filter(|j| tenant.map_or(true, |t| j.tenant_id == t))
            .cloned())
    }

    async fn list(
        &self,
        tenant: Option<TenantId>,
        filter: JobFilter,
    ) -> Result<Vec<Job>, StoreError> {
        let jobs = self.jobs.read().unwrap();
        let mut result: Vec<_> = jobs
            .values()
            .filter(|j| tenant.map_or(true, |t| j.tenant_id == t) && filter.matches(j))
            .cloned()
            .collect();

        // Newest first; id breaks created_at ties deterministically.
        result.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(result.into_iter().skip(filter.offset).take(filter.limit).collect())
    }

    async fn claim_batch(
        &self,
        tenant: Option<TenantId>,
        family: QueueFamily,
        kind: Option<JobKind>,
        limit: usize,
        now: DateTime<Utc>,
    ) -> Result<Vec<Job>, StoreError> {
        // One write lock across select-and-flip keeps claims exclusive.
        let mut jobs = self.jobs.write().unwrap();
        let ids = Self::claimable_ids(&jobs, tenant, family, kind, limit, now);

        let mut claimed = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(job) = jobs.get_mut(&id) {
                job.mark_claimed(now).map_err(|e| StoreError::Conflict {
                    id,
                    reason: e.to_string(),
                })?;
                claimed.push(job.clone());
            }
        }
        Ok(claimed)
    }

    async fn mark_completed(
        &self,
        id: JobId,
        result: Value,
        now: DateTime<Utc>,
    ) -> Result<Job, StoreError> {
        let mut jobs = self.jobs.write().unwrap();
        let job = jobs.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        job.mark_completed(result, now).map_err(|e| StoreError::Conflict {
            id,
            reason: e.to_string(),
        })?;
        Ok(job.clone())
    }

    async fn mark_failed(
        &self,
        id: JobId,
        error: &str,
        retry_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<Job, StoreError> {
        let mut jobs = self.jobs.write().unwrap();
        let job = jobs.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        job.mark_failed(error, retry_at, now)
            .map_err(|e| StoreError::Conflict {
                id,
                reason: e.to_string(),
            })?;
        Ok(job.clone())
    }

    async fn stats(
        &self,
        tenant: Option<TenantId>,
        family: QueueFamily,
        window: Duration,
        now: DateTime<Utc>,
    ) -> Result<QueueStats, StoreError> {
        let jobs = self.jobs.read().unwrap();
        let since = now - window;

        let mut by_kind_status: HashMap<(JobKind, JobStatus), u64> = HashMap::new();
        let mut by_priority: HashMap<i16, u64> = HashMap::new();
        let mut completed_in_window = 0u64;
        let mut failed_in_window = 0u64;
        let mut exec_sum = 0.0f64;
        let mut exec_count = 0u64;

        for job in jobs.values() {
            if job.family != family || tenant.map_or(false, |t| job.tenant_id != t) {
                continue;
            }

            *by_kind_status.entry((job.kind, job.status)).or_default() += 1;
            *by_priority.entry(job.priority.as_i16()).or_default() += 1;

            let finished_since = job.completed_at.map_or(false, |at| at >= since);
            match job.status {
                JobStatus::Completed if finished_since => completed_in_window += 1,
                JobStatus::Failed if finished_since => failed_in_window += 1,
                _ => {}
            }

            if job.status == JobStatus::Completed {
                if let Some(secs) = job.execution_secs() {
                    exec_sum += secs;
                    exec_count += 1;
                }
            }
        }

        let mut by_kind_status: Vec<_> = by_kind_status
            .into_iter()
            .map(|((kind, status), count)| KindStatusCount { kind, status, count })
            .collect();
        by_kind_status.sort_by_key(|c| (c.kind.as_str(), c.status.as_str()));

        let mut by_priority: Vec<_> = by_priority
            .into_iter()
            .filter_map(|(p, count)| {
                crate::types::Priority::new(p)
                    .ok()
                    .map(|priority| PriorityCount { priority, count })
            })
            .collect();
        by_priority.sort_by_key(|c| c.priority);

        Ok(QueueStats {
            by_kind_status,
            by_priority,
            completed_in_window,
            failed_in_window,
            avg_execution_secs: (exec_count > 0).then(|| exec_sum / exec_count as f64),
        })
    }

    async fn peek(
        &self,
        tenant: Option<TenantId>,
        family: QueueFamily,
        limit: usize,
        now: DateTime<Utc>,
    ) -> Result<Vec<Job>, StoreError> {
        let jobs = self.jobs.read().unwrap();
        let ids = Self::claimable_ids(&jobs, tenant, family, None, limit, now);
        Ok(ids.into_iter().filter_map(|id| jobs.get(&id).cloned()).collect())
    }

    async fn purge_terminal(
        &self,
        tenant: Option<TenantId>,
        family: QueueFamily,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        let mut jobs = self.jobs.write().unwrap();
        let before = jobs.len();
        jobs.retain(|_, j| {
            let in_scope = j.family == family && tenant.map_or(true, |t| j.tenant_id == t);
            let expired = j.status.is_terminal() && j.completed_at.map_or(true, |at| at <= cutoff);
            !(in_scope && expired)
        });
        Ok((before - jobs.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{NewJob, Priority};
    use std::collections::HashSet;

    fn scrape(now: DateTime<Utc>, tenant: TenantId) -> Job {
        Job::enqueue(
            tenant,
            QueueFamily::Crawler,
            NewJob::new(JobKind::WebsiteScrape).with_url("https://example.com"),
            now,
        )
        .unwrap()
    }

    fn scrape_at_priority(now: DateTime<Utc>, tenant: TenantId, priority: Priority) -> Job {
        Job::enqueue(
            tenant,
            QueueFamily::Crawler,
            NewJob::new(JobKind::WebsiteScrape)
                .with_url("https://example.com")
                .with_priority(priority),
            now,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn insert_and_get() {
        let store = InMemoryJobStore::new();
        let tenant = TenantId::new();
        let job = scrape(Utc::now(), tenant);

        store.insert(&job).await.unwrap();
        let loaded = store.get(Some(tenant), job.id).await.unwrap().unwrap();
        assert_eq!(loaded, job);

        // Duplicate ids are rejected.
        assert!(matches!(
            store.insert(&job).await,
            Err(StoreError::AlreadyExists(_))
        ));
    }

    #[tokio::test]
    async fn cross_tenant_reads_are_absent() {
        let store = InMemoryJobStore::new();
        let owner = TenantId::new();
        let other = TenantId::new();
        let job = scrape(Utc::now(), owner);
        store.insert(&job).await.unwrap();

        assert!(store.get(Some(other), job.id).await.unwrap().is_none());
        assert!(store.get(Some(owner), job.id).await.unwrap().is_some());
        // Platform scope sees everything.
        assert!(store.get(None, job.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn claim_prefers_urgent_then_oldest() {
        let store = InMemoryJobStore::new();
        let tenant = TenantId::new();
        let base = Utc::now();

        for (i, priority) in [Priority::NORMAL, Priority::URGENT, Priority::HIGH]
            .into_iter()
            .enumerate()
        {
            let job = scrape_at_priority(base + Duration::milliseconds(i as i64), tenant, priority);
            store.insert(&job).await.unwrap();
        }

        let now = base + Duration::seconds(1);
        let claimed = store
            .claim_batch(Some(tenant), QueueFamily::Crawler, None, 2, now)
            .await
            .unwrap();
        let priorities: Vec<_> = claimed.iter().map(|j| j.priority).collect();
        assert_eq!(priorities, vec![Priority::URGENT, Priority::HIGH]);

        let rest = store
            .claim_batch(Some(tenant), QueueFamily::Crawler, None, 10, now)
            .await
            .unwrap();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].priority, Priority::NORMAL);
    }

    #[tokio::test]
    async fn claim_breaks_priority_ties_by_age() {
        let store = InMemoryJobStore::new();
        let tenant = TenantId::new();
        let base = Utc::now();

        let older = scrape(base, tenant);
        let newer = scrape(base + Duration::seconds(5), tenant);
        store.insert(&newer).await.unwrap();
        store.insert(&older).await.unwrap();

        let claimed = store
            .claim_batch(Some(tenant), QueueFamily::Crawler, None, 1, base + Duration::seconds(10))
            .await
            .unwrap();
        assert_eq!(claimed[0].id, older.id);
    }

    #[tokio::test]
    async fn claim_respects_schedule_gate() {
        let store = InMemoryJobStore::new();
        let tenant = TenantId::new();
        let now = Utc::now();

        let job = Job::enqueue(
            tenant,
            QueueFamily::Crawler,
            NewJob::new(JobKind::WebsiteScrape)
                .with_url("https://example.com")
                .scheduled_for(now + Duration::hours(1)),
            now,
        )
        .unwrap();
        store.insert(&job).await.unwrap();

        let early = store
            .claim_batch(Some(tenant), QueueFamily::Crawler, None, 10, now)
            .await
            .unwrap();
        assert!(early.is_empty());

        // Once due, the scheduled row is claimed directly into processing.
        let due = store
            .claim_batch(Some(tenant), QueueFamily::Crawler, None, 10, now + Duration::hours(2))
            .await
            .unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].status, JobStatus::Processing);
        assert_eq!(due[0].attempts, 1);
    }

    #[tokio::test]
    async fn claim_filters_by_kind_and_family() {
        let store = InMemoryJobStore::new();
        let tenant = TenantId::new();
        let now = Utc::now();

        store.insert(&scrape(now, tenant)).await.unwrap();
        let discovery = Job::enqueue(
            tenant,
            QueueFamily::Crawler,
            NewJob::new(JobKind::Discovery),
            now,
        )
        .unwrap();
        store.insert(&discovery).await.unwrap();
        let sync = Job::enqueue(
            tenant,
            QueueFamily::Automation,
            NewJob::new(JobKind::PosSync).with_entity("client-1"),
            now,
        )
        .unwrap();
        store.insert(&sync).await.unwrap();

        let claimed = store
            .claim_batch(
                Some(tenant),
                QueueFamily::Crawler,
                Some(JobKind::Discovery),
                10,
                now,
            )
            .await
            .unwrap();
        assert_eq!(claimed.len(), 1);
        assert_eq!(claimed[0].kind, JobKind::Discovery);

        let automation = store
            .claim_batch(Some(tenant), QueueFamily::Automation, None, 10, now)
            .await
            .unwrap();
        assert_eq!(automation.len(), 1);
        assert_eq!(automation[0].kind, JobKind::PosSync);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_claims_never_double_deliver() {
        let store = InMemoryJobStore::arc();
        let tenant = TenantId::new();
        let base = Utc::now();

        for i in 0..50 {
            let job = scrape(base + Duration::milliseconds(i), tenant);
            store.insert(&job).await.unwrap();
        }

        let now = base + Duration::seconds(1);
        let mut handles = Vec::new();
        for _ in 0..4 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store
                    .claim_batch(Some(tenant), QueueFamily::Crawler, None, 20, now)
                    .await
                    .unwrap()
            }));
        }

        let mut seen = HashSet::new();
        let mut total = 0;
        for handle in handles {
            for job in handle.await.unwrap() {
                total += 1;
                assert!(seen.insert(job.id), "job {} delivered twice", job.id);
            }
        }
        assert_eq!(total, 50);
    }

    #[tokio::test]
    async fn finalize_requires_processing_row() {
        let store = InMemoryJobStore::new();
        let tenant = TenantId::new();
        let now = Utc::now();
        let job = scrape(now, tenant);
        store.insert(&job).await.unwrap();

        assert!(matches!(
            store.mark_completed(job.id, serde_json::json!({}), now).await,
            Err(StoreError::Conflict { .. })
        ));
        assert!(matches!(
            store.mark_completed(JobId::new(), serde_json::json!({}), now).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn repeated_failures_exhaust_the_job() {
        let store = InMemoryJobStore::new();
        let tenant = TenantId::new();
        let now = Utc::now();
        let job = scrape(now, tenant);
        store.insert(&job).await.unwrap();

        for round in 1..=3 {
            let claimed = store
                .claim_batch(Some(tenant), QueueFamily::Crawler, None, 1, now)
                .await
                .unwrap();
            assert_eq!(claimed.len(), 1, "round {round} should claim the job");
            let failed = store
                .mark_failed(job.id, "connection refused", None, now)
                .await
                .unwrap();
            assert_eq!(failed.attempts, round);
        }

        let finished = store.get(Some(tenant), job.id).await.unwrap().unwrap();
        assert_eq!(finished.status, JobStatus::Failed);
        assert_eq!(finished.attempts, 3);
        assert!(finished.completed_at.is_some());

        let empty = store
            .claim_batch(Some(tenant), QueueFamily::Crawler, None, 1, now)
            .await
            .unwrap();
        assert!(empty.is_empty());
    }

    #[tokio::test]
    async fn stats_count_by_cell_and_window() {
        let store = InMemoryJobStore::new();
        let tenant = TenantId::new();
        let now = Utc::now();
        let long_ago = now - Duration::days(3);

        // One completed inside the window, one outside it.
        for (enqueued_at, finished_at) in [(now - Duration::hours(1), now), (long_ago, long_ago)] {
            let job = scrape(enqueued_at, tenant);
            store.insert(&job).await.unwrap();
            store
                .claim_batch(Some(tenant), QueueFamily::Crawler, None, 1, enqueued_at)
                .await
                .unwrap();
            store
                .mark_completed(job.id, serde_json::json!({}), finished_at)
                .await
                .unwrap();
        }
        store.insert(&scrape(now, tenant)).await.unwrap();

        let stats = store
            .stats(Some(tenant), QueueFamily::Crawler, Duration::hours(24), now)
            .await
            .unwrap();

        assert_eq!(stats.completed_in_window, 1);
        assert_eq!(stats.failed_in_window, 0);
        let completed_cell = stats
            .by_kind_status
            .iter()
            .find(|c| c.kind == JobKind::WebsiteScrape && c.status == JobStatus::Completed)
            .unwrap();
        assert_eq!(completed_cell.count, 2);
        let pending_cell = stats
            .by_kind_status
            .iter()
            .find(|c| c.kind == JobKind::WebsiteScrape && c.status == JobStatus::Pending)
            .unwrap();
        assert_eq!(pending_cell.count, 1);
        assert!(stats.avg_execution_secs.is_some());
    }

    #[tokio::test]
    async fn peek_reports_claim_order_without_mutating() {
        let store = InMemoryJobStore::new();
        let tenant = TenantId::new();
        let base = Utc::now();

        let normal = scrape_at_priority(base, tenant, Priority::NORMAL);
        let urgent = scrape_at_priority(base + Duration::seconds(1), tenant, Priority::URGENT);
        store.insert(&normal).await.unwrap();
        store.insert(&urgent).await.unwrap();

        let now = base + Duration::seconds(2);
        let preview = store
            .peek(Some(tenant), QueueFamily::Crawler, 10, now)
            .await
            .unwrap();
        assert_eq!(preview.len(), 2);
        assert_eq!(preview[0].id, urgent.id);
        assert_eq!(preview[1].id, normal.id);

        // Peeking claimed nothing.
        let untouched = store.get(Some(tenant), urgent.id).await.unwrap().unwrap();
        assert_eq!(untouched.status, JobStatus::Pending);
        assert_eq!(untouched.attempts, 0);
    }

    #[tokio::test]
    async fn purge_removes_only_old_terminal_rows() {
        let store = InMemoryJobStore::new();
        let tenant = TenantId::new();
        let now = Utc::now();
        let old = now - Duration::hours(2);

        let stale = scrape(old, tenant);
        store.insert(&stale).await.unwrap();
        store
            .claim_batch(Some(tenant), QueueFamily::Crawler, None, 1, old)
            .await
            .unwrap();
        store.mark_completed(stale.id, serde_json::json!({}), old).await.unwrap();

        let fresh = scrape(now, tenant);
        store.insert(&fresh).await.unwrap();
        store
            .claim_batch(Some(tenant), QueueFamily::Crawler, None, 1, now)
            .await
            .unwrap();
        store.mark_completed(fresh.id, serde_json::json!({}), now).await.unwrap();

        let waiting = scrape(now, tenant);
        store.insert(&waiting).await.unwrap();

        let removed = store
            .purge_terminal(Some(tenant), QueueFamily::Crawler, now - Duration::hours(1))
            .await
            .unwrap();
        assert_eq!(removed, 1);
        assert!(store.get(Some(tenant), stale.id).await.unwrap().is_none());
        assert!(store.get(Some(tenant), fresh.id).await.unwrap().is_some());

        // Cutoff at `now` sweeps every finalized row; waiting jobs survive.
        let removed = store
            .purge_terminal(Some(tenant), QueueFamily::Crawler, now)
            .await
            .unwrap();
        assert_eq!(removed, 1);
        assert!(store.get(Some(tenant), waiting.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn list_is_newest_first_and_filtered() {
        let store = InMemoryJobStore::new();
        let tenant = TenantId::new();
        let base = Utc::now();

        let first = scrape(base, tenant);
        let second = scrape(base + Duration::seconds(1), tenant);
        let discovery = Job::enqueue(
            tenant,
            QueueFamily::Crawler,
            NewJob::new(JobKind::Discovery),
            base + Duration::seconds(2),
        )
        .unwrap();
        store.insert(&first).await.unwrap();
        store.insert(&second).await.unwrap();
        store.insert(&discovery).await.unwrap();

        let all = store
            .list(Some(tenant), JobFilter::default().with_family(QueueFamily::Crawler))
            .await
            .unwrap();
        assert_eq!(
            all.iter().map(|j| j.id).collect::<Vec<_>>(),
            vec![discovery.id, second.id, first.id]
        );

        let scrapes = store
            .list(
                Some(tenant),
                JobFilter::default().with_kind(JobKind::WebsiteScrape).with_limit(1),
            )
            .await
            .unwrap();
        assert_eq!(scrapes.len(), 1);
        assert_eq!(scrapes[0].id, second.id);

        let offset = store
            .list(
                Some(tenant),
                JobFilter::default()
                    .with_kind(JobKind::WebsiteScrape)
                    .with_limit(1)
                    .with_offset(1),
            )
            .await
            .unwrap();
        assert_eq!(offset.len(), 1);
        assert_eq!(offset[0].id, first.id);
    }
}
