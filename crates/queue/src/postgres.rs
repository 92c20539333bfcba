//! Postgres-backed job store.
//!
//! Persists the queue in a single `jobs` table. Claims rely on
//! `FOR UPDATE SKIP LOCKED` so concurrent claimers never receive the same
//! row; finalization is a conditional update against `status = 'processing'`.
//! The schema is provisioned lazily: the first operation to hit a missing
//! table creates it and retries once.
//!
//! ## Error Mapping
//!
//! SQLx errors are mapped to `StoreError` as follows:
//!
//! | SQLx Error | PostgreSQL Code | StoreError | Scenario |
//! |------------|-----------------|------------|----------|
//! | Database (unique violation) | `23505` | `AlreadyExists` | Duplicate job id on insert |
//! | Database (undefined table) | `42P01` | retried | Schema created, operation retried once |
//! | Database (other) | Any other | `Storage` | Constraint breaches, malformed data |
//! | PoolClosed / PoolTimedOut | N/A | `Unavailable` | Connection pool exhausted or shut down |
//! | Io / Tls | N/A | `Unavailable` | Network failures |
//! | Other | N/A | `Storage` | Decode and driver errors |

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use sqlx::{FromRow, PgPool, Row};
use tracing::{instrument, warn};

use conveyor_core::{JobId, TenantId};

use crate::report::{KindStatusCount, PriorityCount, QueueStats};
use crate::store::{JobFilter, JobStore, StoreError};
use crate::types::{Job, JobKind, JobStatus, JobTarget, Priority, QueueFamily};

const SCHEMA_STATEMENTS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS jobs (
        id UUID PRIMARY KEY,
        tenant_id UUID NOT NULL,
        family TEXT NOT NULL,
        kind TEXT NOT NULL,
        target_url TEXT,
        target_entity TEXT,
        priority SMALLINT NOT NULL DEFAULT 3 CHECK (priority BETWEEN 1 AND 5),
        status TEXT NOT NULL DEFAULT 'pending',
        attempts INTEGER NOT NULL DEFAULT 0,
        max_attempts INTEGER NOT NULL DEFAULT 3,
        input JSONB,
        result JSONB,
        error TEXT,
        scheduled_for TIMESTAMPTZ,
        created_at TIMESTAMPTZ NOT NULL,
        started_at TIMESTAMPTZ,
        completed_at TIMESTAMPTZ,
        CHECK (attempts <= max_attempts)
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_jobs_claim
    ON jobs (family, status, priority, created_at)
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_jobs_tenant
    ON jobs (tenant_id, family, created_at DESC)
    "#,
];

/// Postgres-backed [`JobStore`].
///
/// ## Concurrency
///
/// `claim_batch` selects eligible rows with `FOR UPDATE SKIP LOCKED` inside a
/// single statement, so two concurrent claimers partition the backlog instead
/// of blocking on or double-claiming the same rows. Finalization updates are
/// conditional on `status = 'processing'`; a lost race surfaces as
/// [`StoreError::Conflict`], never as a silent overwrite.
#[derive(Debug, Clone)]
pub struct PostgresJobStore {
    pool: Arc<PgPool>,
}

impl PostgresJobStore {
    /// Create a store around an existing connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Connect to `url` with a small dedicated pool.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(url)
            .await
            .map_err(|e| StoreError::Unavailable(format!("failed to connect: {e}")))?;
        Ok(Self::new(pool))
    }

    /// Create the jobs table and claim indexes when missing. Safe to run on
    /// every boot; every statement is `IF NOT EXISTS`.
    #[instrument(skip(self), err)]
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        for statement in SCHEMA_STATEMENTS {
            sqlx::query(statement)
                .execute(&*self.pool)
                .await
                .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        }
        Ok(())
    }

    async fn insert_raw(&self, job: &Job) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO jobs (
                id, tenant_id, family, kind, target_url, target_entity,
                priority, status, attempts, max_attempts, input, result,
                error, scheduled_for, created_at, started_at, completed_at
            )
            VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13,
                $14, $15, $16, $17
            )
            "#,
        )
        .bind(job.id.as_uuid())
        .bind(job.tenant_id.as_uuid())
        .bind(job.family.as_str())
        .bind(job.kind.as_str())
        .bind(&job.target.url)
        .bind(&job.target.entity)
        .bind(job.priority.as_i16())
        .bind(job.status.as_str())
        .bind(job.attempts as i32)
        .bind(job.max_attempts as i32)
        .bind(&job.input)
        .bind(&job.result)
        .bind(&job.error)
        .bind(job.scheduled_for)
        .bind(job.created_at)
        .bind(job.started_at)
        .bind(job.completed_at)
        .execute(&*self.pool)
        .await?;
        Ok(())
    }

    async fn get_raw(
        &self,
        tenant: Option<TenantId>,
        id: JobId,
    ) -> Result<Option<JobRow>, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT
                id, tenant_id, family, kind, target_url, target_entity,
                priority, status, attempts, max_attempts, input, result,
                error, scheduled_for, created_at, started_at, completed_at
            FROM jobs
            WHERE id = $1 AND ($2::uuid IS NULL OR tenant_id = $2)
            "#,
        )
        .bind(id.as_uuid())
        .bind(tenant.map(|t| *t.as_uuid()))
        .fetch_optional(&*self.pool)
        .await?;

        row.map(|r| JobRow::from_row(&r)).transpose()
    }

    async fn list_raw(
        &self,
        tenant: Option<TenantId>,
        filter: &JobFilter,
    ) -> Result<Vec<JobRow>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT
                id, tenant_id, family, kind, target_url, target_entity,
                priority, status, attempts, max_attempts, input, result,
                error, scheduled_for, created_at, started_at, completed_at
            FROM jobs
            WHERE ($1::uuid IS NULL OR tenant_id = $1)
              AND ($2::text IS NULL OR family = $2)
              AND ($3::text IS NULL OR kind = $3)
              AND ($4::text IS NULL OR status = $4)
            ORDER BY created_at DESC, id DESC
            LIMIT $5 OFFSET $6
            "#,
        )
        .bind(tenant.map(|t| *t.as_uuid()))
        .bind(filter.family.map(|f| f.as_str()))
        .bind(filter.kind.map(|k| k.as_str()))
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.limit as i64)
        .bind(filter.offset as i64)
        .fetch_all(&*self.pool)
        .await?;

        rows.iter().map(JobRow::from_row).collect()
    }

    async fn claim_raw(
        &self,
        tenant: Option<TenantId>,
        family: QueueFamily,
        kind: Option<JobKind>,
        limit: usize,
        now: DateTime<Utc>,
    ) -> Result<Vec<JobRow>, sqlx::Error> {
        // The CTE takes the row locks; SKIP LOCKED partitions the backlog
        // between concurrent claimers.
        let rows = sqlx::query(
            r#"
            WITH eligible AS (
                SELECT id
                FROM jobs
                WHERE family = $1
                  AND status IN ('pending', 'scheduled')
                  AND (scheduled_for IS NULL OR scheduled_for <= $2)
                  AND attempts < max_attempts
                  AND ($3::uuid IS NULL OR tenant_id = $3)
                  AND ($4::text IS NULL OR kind = $4)
                ORDER BY priority ASC, created_at ASC, id ASC
                LIMIT $5
                FOR UPDATE SKIP LOCKED
            )
            UPDATE jobs j
            SET status = 'processing',
                started_at = $2,
                attempts = j.attempts + 1
            FROM eligible
            WHERE j.id = eligible.id
            RETURNING
                j.id, j.tenant_id, j.family, j.kind, j.target_url,
                j.target_entity, j.priority, j.status, j.attempts,
                j.max_attempts, j.input, j.result, j.error, j.scheduled_for,
                j.created_at, j.started_at, j.completed_at
            "#,
        )
        .bind(family.as_str())
        .bind(now)
        .bind(tenant.map(|t| *t.as_uuid()))
        .bind(kind.map(|k| k.as_str()))
        .bind(limit as i64)
        .fetch_all(&*self.pool)
        .await?;

        rows.iter().map(JobRow::from_row).collect()
    }

    async fn mark_completed_raw(
        &self,
        id: JobId,
        result: &Value,
        now: DateTime<Utc>,
    ) -> Result<Option<JobRow>, sqlx::Error> {
        let row = sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'completed', result = $2, completed_at = $3
            WHERE id = $1 AND status = 'processing'
            RETURNING
                id, tenant_id, family, kind, target_url, target_entity,
                priority, status, attempts, max_attempts, input, result,
                error, scheduled_for, created_at, started_at, completed_at
            "#,
        )
        .bind(id.as_uuid())
        .bind(result)
        .bind(now)
        .fetch_optional(&*self.pool)
        .await?;

        row.map(|r| JobRow::from_row(&r)).transpose()
    }

    async fn mark_failed_raw(
        &self,
        id: JobId,
        error: &str,
        retry_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<Option<JobRow>, sqlx::Error> {
        // attempts were already counted at claim time, so the ceiling check
        // compares the stored value directly.
        let row = sqlx::query(
            r#"
            UPDATE jobs
            SET status = CASE WHEN attempts >= max_attempts
                              THEN 'failed' ELSE 'pending' END,
                error = $2,
                scheduled_for = CASE WHEN attempts >= max_attempts
                                     THEN scheduled_for ELSE $3 END,
                completed_at = CASE WHEN attempts >= max_attempts
                                    THEN $4 ELSE completed_at END
            WHERE id = $1 AND status = 'processing'
            RETURNING
                id, tenant_id, family, kind, target_url, target_entity,
                priority, status, attempts, max_attempts, input, result,
                error, scheduled_for, created_at, started_at, completed_at
            "#,
        )
        .bind(id.as_uuid())
        .bind(error)
        .bind(retry_at)
        .bind(now)
        .fetch_optional(&*self.pool)
        .await?;

        row.map(|r| JobRow::from_row(&r)).transpose()
    }

    async fn stats_raw(
        &self,
        tenant: Option<TenantId>,
        family: QueueFamily,
        since: DateTime<Utc>,
    ) -> Result<QueueStats, sqlx::Error> {
        let tenant_uuid = tenant.map(|t| *t.as_uuid());

        let cells = sqlx::query(
            r#"
            SELECT kind, status, COUNT(*) AS count
            FROM jobs
            WHERE family = $1 AND ($2::uuid IS NULL OR tenant_id = $2)
            GROUP BY kind, status
            ORDER BY kind, status
            "#,
        )
        .bind(family.as_str())
        .bind(tenant_uuid)
        .fetch_all(&*self.pool)
        .await?;

        let mut by_kind_status = Vec::with_capacity(cells.len());
        for row in cells {
            let kind: String = row.try_get("kind")?;
            let status: String = row.try_get("status")?;
            let count: i64 = row.try_get("count")?;
            match (kind.parse::<JobKind>(), status.parse::<JobStatus>()) {
                (Ok(kind), Ok(status)) => by_kind_status.push(KindStatusCount {
                    kind,
                    status,
                    count: count as u64,
                }),
                _ => warn!(kind = %kind, status = %status, "skipping stats cell with unknown labels"),
            }
        }

        let priorities = sqlx::query(
            r#"
            SELECT priority, COUNT(*) AS count
            FROM jobs
            WHERE family = $1 AND ($2::uuid IS NULL OR tenant_id = $2)
            GROUP BY priority
            ORDER BY priority
            "#,
        )
        .bind(family.as_str())
        .bind(tenant_uuid)
        .fetch_all(&*self.pool)
        .await?;

        let mut by_priority = Vec::with_capacity(priorities.len());
        for row in priorities {
            let priority: i16 = row.try_get("priority")?;
            let count: i64 = row.try_get("count")?;
            if let Ok(priority) = Priority::new(priority) {
                by_priority.push(PriorityCount {
                    priority,
                    count: count as u64,
                });
            }
        }

        let window = sqlx::query(
            r#"
            SELECT
                COUNT(*) FILTER (
                    WHERE status = 'completed' AND completed_at >= $3
                ) AS completed_in_window,
                COUNT(*) FILTER (
                    WHERE status = 'failed' AND completed_at >= $3
                ) AS failed_in_window,
                (AVG(EXTRACT(EPOCH FROM (completed_at - started_at)))
                    FILTER (WHERE status = 'completed'))::double precision
                    AS avg_execution_secs
            FROM jobs
            WHERE family = $1 AND ($2::uuid IS NULL OR tenant_id = $2)
            "#,
        )
        .bind(family.as_str())
        .bind(tenant_uuid)
        .bind(since)
        .fetch_one(&*self.pool)
        .await?;

        let completed_in_window: i64 = window.try_get("completed_in_window")?;
        let failed_in_window: i64 = window.try_get("failed_in_window")?;
        let avg_execution_secs: Option<f64> = window.try_get("avg_execution_secs")?;

        Ok(QueueStats {
            by_kind_status,
            by_priority,
            completed_in_window: completed_in_window as u64,
            failed_in_window: failed_in_window as u64,
            avg_execution_secs,
        })
    }

    async fn peek_raw(
        &self,
        tenant: Option<TenantId>,
        family: QueueFamily,
        limit: usize,
        now: DateTime<Utc>,
    ) -> Result<Vec<JobRow>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT
                id, tenant_id, family, kind, target_url, target_entity,
                priority, status, attempts, max_attempts, input, result,
                error, scheduled_for, created_at, started_at, completed_at
            FROM jobs
            WHERE family = $1
              AND status IN ('pending', 'scheduled')
              AND (scheduled_for IS NULL OR scheduled_for <= $2)
              AND attempts < max_attempts
              AND ($3::uuid IS NULL OR tenant_id = $3)
            ORDER BY priority ASC, created_at ASC, id ASC
            LIMIT $4
            "#,
        )
        .bind(family.as_str())
        .bind(now)
        .bind(tenant.map(|t| *t.as_uuid()))
        .bind(limit as i64)
        .fetch_all(&*self.pool)
        .await?;

        rows.iter().map(JobRow::from_row).collect()
    }

    async fn purge_raw(
        &self,
        tenant: Option<TenantId>,
        family: QueueFamily,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            DELETE FROM jobs
            WHERE family = $1
              AND ($2::uuid IS NULL OR tenant_id = $2)
              AND status IN ('completed', 'failed')
              AND (completed_at IS NULL OR completed_at <= $3)
            "#,
        )
        .bind(family.as_str())
        .bind(tenant.map(|t| *t.as_uuid()))
        .bind(cutoff)
        .execute(&*self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Explain a finalize update that matched no row: missing job or a row
    /// outside `processing`.
    async fn diagnose_finalize_miss(&self, operation: &str, id: JobId) -> StoreError {
        let row = sqlx::query("SELECT status FROM jobs WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await;

        match row {
            Ok(Some(row)) => {
                let status = row
                    .try_get::<String, _>("status")
                    .unwrap_or_else(|_| String::from("unknown"));
                StoreError::Conflict {
                    id,
                    reason: format!("expected processing, found {status}"),
                }
            }
            Ok(None) => StoreError::NotFound(id),
            Err(e) => map_sqlx_error(operation, e),
        }
    }
}

#[async_trait]
impl JobStore for PostgresJobStore {
    #[instrument(skip(self, job), fields(job_id = %job.id, kind = %job.kind), err)]
    async fn insert(&self, job: &Job) -> Result<(), StoreError> {
        match self.insert_raw(job).await {
            Err(e) if is_undefined_table(&e) => {
                self.ensure_schema().await?;
                self.insert_raw(job).await.map_err(|e| {
                    if is_unique_violation(&e) {
                        StoreError::AlreadyExists(job.id)
                    } else {
                        map_sqlx_error("insert", e)
                    }
                })
            }
            Err(e) if is_unique_violation(&e) => Err(StoreError::AlreadyExists(job.id)),
            other => other.map_err(|e| map_sqlx_error("insert", e)),
        }
    }

    #[instrument(skip(self), fields(job_id = %id), err)]
    async fn get(&self, tenant: Option<TenantId>, id: JobId) -> Result<Option<Job>, StoreError> {
        let row = match self.get_raw(tenant, id).await {
            Err(e) if is_undefined_table(&e) => {
                self.ensure_schema().await?;
                self.get_raw(tenant, id)
                    .await
                    .map_err(|e| map_sqlx_error("get", e))?
            }
            other => other.map_err(|e| map_sqlx_error("get", e))?,
        };
        row.map(Job::try_from).transpose()
    }

    #[instrument(skip(self, filter), err)]
    async fn list(
        &self,
        tenant: Option<TenantId>,
        filter: JobFilter,
    ) -> Result<Vec<Job>, StoreError> {
        let rows = match self.list_raw(tenant, &filter).await {
            Err(e) if is_undefined_table(&e) => {
                self.ensure_schema().await?;
                self.list_raw(tenant, &filter)
                    .await
                    .map_err(|e| map_sqlx_error("list", e))?
            }
            other => other.map_err(|e| map_sqlx_error("list", e))?,
        };
        rows.into_iter().map(Job::try_from).collect()
    }

    #[instrument(skip(self), fields(family = %family, limit), err)]
    async fn claim_batch(
        &self,
        tenant: Option<TenantId>,
        family: QueueFamily,
        kind: Option<JobKind>,
        limit: usize,
        now: DateTime<Utc>,
    ) -> Result<Vec<Job>, StoreError> {
        let rows = match self.claim_raw(tenant, family, kind, limit, now).await {
            Err(e) if is_undefined_table(&e) => {
                self.ensure_schema().await?;
                self.claim_raw(tenant, family, kind, limit, now)
                    .await
                    .map_err(|e| map_sqlx_error("claim_batch", e))?
            }
            other => other.map_err(|e| map_sqlx_error("claim_batch", e))?,
        };

        let mut jobs = rows
            .into_iter()
            .map(Job::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        // UPDATE ... RETURNING does not promise an order; restore claim order.
        jobs.sort_by_key(|j| (j.priority, j.created_at, j.id));
        Ok(jobs)
    }

    #[instrument(skip(self, result), fields(job_id = %id), err)]
    async fn mark_completed(
        &self,
        id: JobId,
        result: Value,
        now: DateTime<Utc>,
    ) -> Result<Job, StoreError> {
        let row = match self.mark_completed_raw(id, &result, now).await {
            Err(e) if is_undefined_table(&e) => {
                self.ensure_schema().await?;
                self.mark_completed_raw(id, &result, now)
                    .await
                    .map_err(|e| map_sqlx_error("mark_completed", e))?
            }
            other => other.map_err(|e| map_sqlx_error("mark_completed", e))?,
        };

        match row {
            Some(row) => Job::try_from(row),
            None => Err(self.diagnose_finalize_miss("mark_completed", id).await),
        }
    }

    #[instrument(skip(self, error), fields(job_id = %id), err)]
    async fn mark_failed(
        &self,
        id: JobId,
        error: &str,
        retry_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<Job, StoreError> {
        let row = match self.mark_failed_raw(id, error, retry_at, now).await {
            Err(e) if is_undefined_table(&e) => {
                self.ensure_schema().await?;
                self.mark_failed_raw(id, error, retry_at, now)
                    .await
                    .map_err(|e| map_sqlx_error("mark_failed", e))?
            }
            other => other.map_err(|e| map_sqlx_error("mark_failed", e))?,
        };

        match row {
            Some(row) => Job::try_from(row),
            None => Err(self.diagnose_finalize_miss("mark_failed", id).await),
        }
    }

    #[instrument(skip(self), fields(family = %family), err)]
    async fn stats(
        &self,
        tenant: Option<TenantId>,
        family: QueueFamily,
        window: Duration,
        now: DateTime<Utc>,
    ) -> Result<QueueStats, StoreError> {
        let since = now - window;
        match self.stats_raw(tenant, family, since).await {
            Err(e) if is_undefined_table(&e) => {
                self.ensure_schema().await?;
                self.stats_raw(tenant, family, since)
                    .await
                    .map_err(|e| map_sqlx_error("stats", e))
            }
            other => other.map_err(|e| map_sqlx_error("stats", e)),
        }
    }

    #[instrument(skip(self), fields(family = %family, limit), err)]
    async fn peek(
        &self,
        tenant: Option<TenantId>,
        family: QueueFamily,
        limit: usize,
        now: DateTime<Utc>,
    ) -> Result<Vec<Job>, StoreError> {
        let rows = match self.peek_raw(tenant, family, limit, now).await {
            Err(e) if is_undefined_table(&e) => {
                self.ensure_schema().await?;
                self.peek_raw(tenant, family, limit, now)
                    .await
                    .map_err(|e| map_sqlx_error("peek", e))?
            }
            other => other.map_err(|e| map_sqlx_error("peek", e))?,
        };
        rows.into_iter().map(Job::try_from).collect()
    }

    #[instrument(skip(self), fields(family = %family), err)]
    async fn purge_terminal(
        &self,
        tenant: Option<TenantId>,
        family: QueueFamily,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        match self.purge_raw(tenant, family, cutoff).await {
            Err(e) if is_undefined_table(&e) => {
                self.ensure_schema().await?;
                self.purge_raw(tenant, family, cutoff)
                    .await
                    .map_err(|e| map_sqlx_error("purge_terminal", e))
            }
            other => other.map_err(|e| map_sqlx_error("purge_terminal", e)),
        }
    }
}

/// Map SQLx errors to StoreError.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => StoreError::Storage(format!(
            "database error in {}: {}",
            operation,
            db_err.message()
        )),
        sqlx::Error::PoolClosed | sqlx::Error::PoolTimedOut => {
            StoreError::Unavailable(format!("connection pool unavailable in {operation}"))
        }
        sqlx::Error::Io(e) => StoreError::Unavailable(format!("io error in {operation}: {e}")),
        sqlx::Error::Tls(e) => StoreError::Unavailable(format!("tls error in {operation}: {e}")),
        _ => StoreError::Storage(format!("sqlx error in {operation}: {err}")),
    }
}

/// Check if an error is a unique constraint violation.
fn is_unique_violation(err: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db_err) = err {
        if let Some(code) = db_err.code() {
            return code.as_ref() == "23505";
        }
    }
    false
}

/// Check if an error means the jobs table has not been provisioned yet.
fn is_undefined_table(err: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db_err) = err {
        if let Some(code) = db_err.code() {
            return code.as_ref() == "42P01";
        }
    }
    false
}

// SQLx row types

#[derive(Debug)]
struct JobRow {
    id: uuid::Uuid,
    tenant_id: uuid::Uuid,
    family: String,
    kind: String,
    target_url: Option<String>,
    target_entity: Option<String>,
    priority: i16,
    status: String,
    attempts: i32,
    max_attempts: i32,
    input: Option<serde_json::Value>,
    result: Option<serde_json::Value>,
    error: Option<String>,
    scheduled_for: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for JobRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(JobRow {
            id: row.try_get("id")?,
            tenant_id: row.try_get("tenant_id")?,
            family: row.try_get("family")?,
            kind: row.try_get("kind")?,
            target_url: row.try_get("target_url")?,
            target_entity: row.try_get("target_entity")?,
            priority: row.try_get("priority")?,
            status: row.try_get("status")?,
            attempts: row.try_get("attempts")?,
            max_attempts: row.try_get("max_attempts")?,
            input: row.try_get("input")?,
            result: row.try_get("result")?,
            error: row.try_get("error")?,
            scheduled_for: row.try_get("scheduled_for")?,
            created_at: row.try_get("created_at")?,
            started_at: row.try_get("started_at")?,
            completed_at: row.try_get("completed_at")?,
        })
    }
}

impl TryFrom<JobRow> for Job {
    type Error = StoreError;

    fn try_from(row: JobRow) -> Result<Self, Self::Error> {
        let family = row
            .family
            .parse::<QueueFamily>()
            .map_err(|e| StoreError::Storage(format!("bad family column: {e}")))?;
        let kind = row
            .kind
            .parse::<JobKind>()
            .map_err(|e| StoreError::Storage(format!("bad kind column: {e}")))?;
        let status = row
            .status
            .parse::<JobStatus>()
            .map_err(|e| StoreError::Storage(format!("bad status column: {e}")))?;
        let priority = Priority::new(row.priority)
            .map_err(|e| StoreError::Storage(format!("bad priority column: {e}")))?;

        Ok(Job {
            id: JobId::from_uuid(row.id),
            tenant_id: TenantId::from_uuid(row.tenant_id),
            family,
            kind,
            target: JobTarget {
                url: row.target_url,
                entity: row.target_entity,
            },
            priority,
            status,
            attempts: row.attempts as u32,
            max_attempts: row.max_attempts as u32,
            input: row.input,
            result: row.result,
            error: row.error,
            scheduled_for: row.scheduled_for,
            created_at: row.created_at,
            started_at: row.started_at,
            completed_at: row.completed_at,
        })
    }
}
