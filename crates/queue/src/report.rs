//! Read-model types for queue status reporting.

use chrono::{DateTime, Utc};
use serde::Serialize;

use conveyor_core::JobId;

use crate::types::{Job, JobKind, JobStatus, Priority, QueueFamily};

/// Count of jobs in one (kind, status) cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KindStatusCount {
    pub kind: JobKind,
    pub status: JobStatus,
    pub count: u64,
}

/// Count of jobs at one priority level, across all statuses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PriorityCount {
    pub priority: Priority,
    pub count: u64,
}

/// Aggregates the store computes in one pass over a queue.
#[derive(Debug, Clone, Default, Serialize)]
pub struct QueueStats {
    pub by_kind_status: Vec<KindStatusCount>,
    pub by_priority: Vec<PriorityCount>,
    pub completed_in_window: u64,
    pub failed_in_window: u64,
    /// Mean wall-clock seconds of completed jobs, start to finish.
    pub avg_execution_secs: Option<f64>,
}

/// Trailing-window outcome counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WindowCounts {
    pub completed: u64,
    pub failed: u64,
}

/// Claim-order preview of one waiting job.
#[derive(Debug, Clone, Serialize)]
pub struct PendingPreview {
    pub id: JobId,
    pub kind: JobKind,
    pub priority: Priority,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduled_for: Option<DateTime<Utc>>,
}

impl From<&Job> for PendingPreview {
    fn from(job: &Job) -> Self {
        Self {
            id: job.id,
            kind: job.kind,
            priority: job.priority,
            created_at: job.created_at,
            scheduled_for: job.scheduled_for,
        }
    }
}

/// Full status report for one queue. Reads only; generating it never
/// changes a job.
#[derive(Debug, Clone, Serialize)]
pub struct QueueReport {
    pub queue: QueueFamily,
    pub generated_at: DateTime<Utc>,
    pub counts: Vec<KindStatusCount>,
    pub by_priority: Vec<PriorityCount>,
    pub last_24h: WindowCounts,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_execution_secs: Option<f64>,
    pub next_pending: Vec<PendingPreview>,
}

impl QueueReport {
    pub fn assemble(
        queue: QueueFamily,
        stats: QueueStats,
        next: &[Job],
        generated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            queue,
            generated_at,
            counts: stats.by_kind_status,
            by_priority: stats.by_priority,
            last_24h: WindowCounts {
                completed: stats.completed_in_window,
                failed: stats.failed_in_window,
            },
            avg_execution_secs: stats.avg_execution_secs,
            next_pending: next.iter().map(PendingPreview::from).collect(),
        }
    }

    /// All-zero report. Served when the backing store cannot answer, so the
    /// status surface stays up.
    pub fn empty(queue: QueueFamily, generated_at: DateTime<Utc>) -> Self {
        Self::assemble(queue, QueueStats::default(), &[], generated_at)
    }

    pub fn count_for(&self, kind: JobKind, status: JobStatus) -> u64 {
        self.counts
            .iter()
            .find(|c| c.kind == kind && c.status == status)
            .map_or(0, |c| c.count)
    }
}
