//! Wire formats for the queue endpoints.
//!
//! The command body is a tagged union keyed by `action`; job kinds travel as
//! `type` on the wire. Parsing into domain types happens here so malformed
//! kinds, priorities, and statuses surface as 400s with the domain message.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use conveyor_core::DomainError;
use conveyor_queue::{JobFilter, JobTarget, NewJob, Priority, QueueFamily};

/// One queue action posted to `POST /{family}/queue`.
#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum QueueCommand {
    /// Enqueue one job.
    Add(AddJobRequest),
    /// Enqueue a batch; capped, with per-item failure reporting.
    BulkAdd { jobs: Vec<AddJobRequest> },
    /// Claim and run a batch right now.
    Process {
        #[serde(default)]
        limit: Option<usize>,
        #[serde(default, rename = "type", alias = "kind")]
        kind: Option<String>,
    },
    /// Delete terminal rows older than the cutoff.
    Clear {
        #[serde(default)]
        older_than_hours: Option<i64>,
    },
}

/// Enqueue payload: `{type, target?, priority?, scheduled_for?, input?,
/// max_attempts?}`.
#[derive(Debug, Clone, Deserialize)]
pub struct AddJobRequest {
    #[serde(rename = "type", alias = "kind")]
    pub job_type: String,
    #[serde(default)]
    pub target: JobTarget,
    #[serde(default)]
    pub priority: Option<i16>,
    #[serde(default)]
    pub scheduled_for: Option<DateTime<Utc>>,
    #[serde(default)]
    pub input: Option<Value>,
    #[serde(default)]
    pub max_attempts: Option<u32>,
}

impl AddJobRequest {
    pub fn into_new_job(self) -> Result<NewJob, DomainError> {
        let kind = self.job_type.parse()?;
        let priority = self.priority.map(Priority::new).transpose()?;
        Ok(NewJob {
            kind,
            target: self.target,
            priority,
            scheduled_for: self.scheduled_for,
            input: self.input,
            max_attempts: self.max_attempts,
        })
    }
}

/// Query string for `GET /{family}/jobs`.
#[derive(Debug, Default, Deserialize)]
pub struct ListJobsQuery {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, rename = "type", alias = "kind")]
    pub kind: Option<String>,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub offset: Option<usize>,
}

impl ListJobsQuery {
    pub fn into_filter(self, family: QueueFamily) -> Result<JobFilter, DomainError> {
        let mut filter = JobFilter::default().with_family(family);
        if let Some(status) = self.status.as_deref() {
            filter = filter.with_status(status.parse()?);
        }
        if let Some(kind) = self.kind.as_deref() {
            filter = filter.with_kind(kind.parse()?);
        }
        if let Some(limit) = self.limit {
            filter = filter.with_limit(limit);
        }
        if let Some(offset) = self.offset {
            filter = filter.with_offset(offset);
        }
        Ok(filter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conveyor_queue::{JobKind, JobStatus};
    use serde_json::json;

    #[test]
    fn add_action_parses_the_wire_type_field() {
        let cmd: QueueCommand = serde_json::from_value(json!({
            "action": "add",
            "type": "website_scrape",
            "target": { "url": "https://example.com" },
            "priority": 2
        }))
        .unwrap();

        let QueueCommand::Add(req) = cmd else {
            panic!("expected add");
        };
        let new_job = req.into_new_job().unwrap();
        assert_eq!(new_job.kind, JobKind::WebsiteScrape);
        assert_eq!(new_job.priority, Some(Priority::HIGH));
        assert_eq!(new_job.target.url.as_deref(), Some("https://example.com"));
    }

    #[test]
    fn unknown_type_is_a_domain_error() {
        let req = AddJobRequest {
            job_type: "teleport".to_string(),
            target: JobTarget::default(),
            priority: None,
            scheduled_for: None,
            input: None,
            max_attempts: None,
        };
        assert!(matches!(
            req.into_new_job(),
            Err(DomainError::InvalidKind(_))
        ));
    }

    #[test]
    fn out_of_band_priority_is_a_domain_error() {
        let req = AddJobRequest {
            job_type: "discovery".to_string(),
            target: JobTarget::default(),
            priority: Some(9),
            scheduled_for: None,
            input: None,
            max_attempts: None,
        };
        assert!(matches!(req.into_new_job(), Err(DomainError::Validation(_))));
    }

    #[test]
    fn bulk_process_and_clear_actions_parse() {
        let bulk: QueueCommand = serde_json::from_value(json!({
            "action": "bulk_add",
            "jobs": [{ "type": "discovery" }]
        }))
        .unwrap();
        assert!(matches!(bulk, QueueCommand::BulkAdd { jobs } if jobs.len() == 1));

        let process: QueueCommand = serde_json::from_value(json!({
            "action": "process",
            "limit": 5,
            "type": "pos_sync"
        }))
        .unwrap();
        assert!(matches!(
            process,
            QueueCommand::Process { limit: Some(5), kind: Some(ref k) } if k == "pos_sync"
        ));

        let clear: QueueCommand = serde_json::from_value(json!({
            "action": "clear",
            "older_than_hours": 48
        }))
        .unwrap();
        assert!(matches!(
            clear,
            QueueCommand::Clear {
                older_than_hours: Some(48)
            }
        ));
    }

    #[test]
    fn list_query_builds_a_scoped_filter() {
        let query = ListJobsQuery {
            status: Some("failed".to_string()),
            kind: Some("website_scrape".to_string()),
            limit: Some(500),
            offset: Some(10),
        };
        let filter = query.into_filter(QueueFamily::Crawler).unwrap();
        assert_eq!(filter.family, Some(QueueFamily::Crawler));
        assert_eq!(filter.status, Some(JobStatus::Failed));
        assert_eq!(filter.kind, Some(JobKind::WebsiteScrape));
        // Limit is clamped to the listing maximum.
        assert_eq!(filter.limit, conveyor_queue::MAX_LIST_LIMIT);
        assert_eq!(filter.offset, 10);
    }

    #[test]
    fn unknown_status_filter_is_rejected() {
        let query = ListJobsQuery {
            status: Some("paused".to_string()),
            ..Default::default()
        };
        assert!(query.into_filter(QueueFamily::Automation).is_err());
    }
}
