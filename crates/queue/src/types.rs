//! Job records, kinds, and the status state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use conveyor_core::{DomainError, DomainResult, JobId, TenantId};

/// Default retry ceiling fixed at enqueue time.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Upper bound accepted for a caller-supplied retry ceiling.
const MAX_ATTEMPTS_CEILING: u32 = 10;

/// Which queue a job was posted to.
///
/// Both families share the record shape, the state machine, and the store;
/// they differ only in which kinds they accept and which handlers serve them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueFamily {
    /// POS operations driven against client systems.
    Automation,
    /// Lead-intelligence collection (scrapes, enrichment, lookups).
    Crawler,
}

impl QueueFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueFamily::Automation => "automation",
            QueueFamily::Crawler => "crawler",
        }
    }

    /// The kinds this queue accepts at enqueue time.
    pub fn accepted_kinds(&self) -> &'static [JobKind] {
        match self {
            QueueFamily::Automation => &[
                JobKind::MenuDeployment,
                JobKind::PosSync,
                JobKind::Custom,
            ],
            QueueFamily::Crawler => &[
                JobKind::WebsiteScrape,
                JobKind::EnrichLead,
                JobKind::VerifyData,
                JobKind::PublicRecords,
                JobKind::SocialScan,
                JobKind::Discovery,
                JobKind::Custom,
            ],
        }
    }

    pub fn accepts(&self, kind: JobKind) -> bool {
        self.accepted_kinds().contains(&kind)
    }
}

impl core::fmt::Display for QueueFamily {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for QueueFamily {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "automation" => Ok(QueueFamily::Automation),
            "crawler" => Ok(QueueFamily::Crawler),
            other => Err(DomainError::validation(format!("unknown queue: {other}"))),
        }
    }
}

/// Job kind, used for enqueue validation and handler routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    MenuDeployment,
    PosSync,
    WebsiteScrape,
    EnrichLead,
    VerifyData,
    PublicRecords,
    SocialScan,
    Discovery,
    /// Escape hatch for one-off work; payload is fully opaque.
    Custom,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::MenuDeployment => "menu_deployment",
            JobKind::PosSync => "pos_sync",
            JobKind::WebsiteScrape => "website_scrape",
            JobKind::EnrichLead => "enrich_lead",
            JobKind::VerifyData => "verify_data",
            JobKind::PublicRecords => "public_records",
            JobKind::SocialScan => "social_scan",
            JobKind::Discovery => "discovery",
            JobKind::Custom => "custom",
        }
    }
}

impl Default for JobKind {
    fn default() -> Self {
        JobKind::Custom
    }
}

impl core::fmt::Display for JobKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for JobKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "menu_deployment" => Ok(JobKind::MenuDeployment),
            "pos_sync" => Ok(JobKind::PosSync),
            "website_scrape" => Ok(JobKind::WebsiteScrape),
            "enrich_lead" => Ok(JobKind::EnrichLead),
            "verify_data" => Ok(JobKind::VerifyData),
            "public_records" => Ok(JobKind::PublicRecords),
            "social_scan" => Ok(JobKind::SocialScan),
            "discovery" => Ok(JobKind::Discovery),
            "custom" => Ok(JobKind::Custom),
            other => Err(DomainError::invalid_kind(other)),
        }
    }
}

/// Job execution status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Eligible for claiming (subject to `scheduled_for`).
    Pending,
    /// Waiting for a future activation time; promoted lazily at claim.
    Scheduled,
    /// Claimed by a worker invocation.
    Processing,
    /// Finished successfully. Terminal.
    Completed,
    /// Retries exhausted. Terminal.
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Legal edges of the state machine. Everything else is a bug in the
    /// caller, not a storable state.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Scheduled, JobStatus::Pending)
                | (JobStatus::Scheduled, JobStatus::Processing)
                | (JobStatus::Pending, JobStatus::Processing)
                | (JobStatus::Processing, JobStatus::Completed)
                | (JobStatus::Processing, JobStatus::Pending)
                | (JobStatus::Processing, JobStatus::Failed)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Scheduled => "scheduled",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }
}

impl core::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for JobStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "scheduled" => Ok(JobStatus::Scheduled),
            "processing" => Ok(JobStatus::Processing),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            other => Err(DomainError::validation(format!("unknown status: {other}"))),
        }
    }
}

/// Claim priority: 1 is most urgent, 5 is background. Lower goes first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i16", into = "i16")]
pub struct Priority(i16);

impl Priority {
    pub const URGENT: Priority = Priority(1);
    pub const HIGH: Priority = Priority(2);
    pub const NORMAL: Priority = Priority(3);
    pub const LOW: Priority = Priority(4);
    pub const BACKGROUND: Priority = Priority(5);

    pub fn new(value: i16) -> DomainResult<Self> {
        if (1..=5).contains(&value) {
            Ok(Self(value))
        } else {
            Err(DomainError::validation(format!(
                "priority must be between 1 and 5, got {value}"
            )))
        }
    }

    pub fn as_i16(&self) -> i16 {
        self.0
    }
}

impl Default for Priority {
    fn default() -> Self {
        Self::NORMAL
    }
}

impl TryFrom<i16> for Priority {
    type Error = DomainError;

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        Priority::new(value)
    }
}

impl From<Priority> for i16 {
    fn from(value: Priority) -> Self {
        value.0
    }
}

impl core::fmt::Display for Priority {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Loosely-typed reference to the work subject: a URL, a foreign entity
/// (lead/client) reference, or both. Which parts are mandatory depends on the
/// job kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobTarget {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity: Option<String>,
}

impl JobTarget {
    pub fn url(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            entity: None,
        }
    }

    pub fn entity(entity: impl Into<String>) -> Self {
        Self {
            url: None,
            entity: Some(entity.into()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.url.is_none() && self.entity.is_none()
    }
}

/// Everything a caller supplies to enqueue one job. Validation happens in
/// [`Job::enqueue`]; until then this is just data.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewJob {
    pub kind: JobKind,
    #[serde(default)]
    pub target: JobTarget,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub scheduled_for: Option<DateTime<Utc>>,
    #[serde(default)]
    pub input: Option<Value>,
    #[serde(default)]
    pub max_attempts: Option<u32>,
}

impl NewJob {
    pub fn new(kind: JobKind) -> Self {
        Self {
            kind,
            ..Default::default()
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.target.url = Some(url.into());
        self
    }

    pub fn with_entity(mut self, entity: impl Into<String>) -> Self {
        self.target.entity = Some(entity.into());
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn scheduled_for(mut self, at: DateTime<Utc>) -> Self {
        self.scheduled_for = Some(at);
        self
    }

    pub fn with_input(mut self, input: Value) -> Self {
        self.input = Some(input);
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }
}

/// One unit of deferred work. The persisted row is the single owner of this
/// state; workers only ever see snapshots of it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub tenant_id: TenantId,
    pub family: QueueFamily,
    pub kind: JobKind,
    pub target: JobTarget,
    pub priority: Priority,
    pub status: JobStatus,
    /// Claims so far. Incremented by every claim, bounded by `max_attempts`.
    pub attempts: u32,
    pub max_attempts: u32,
    pub input: Option<Value>,
    pub result: Option<Value>,
    pub error: Option<String>,
    pub scheduled_for: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Job {
    /// Validate an enqueue request against the posting queue and build the
    /// initial record. Starts `pending`, or `scheduled` when `scheduled_for`
    /// lies in the future.
    pub fn enqueue(
        tenant_id: TenantId,
        family: QueueFamily,
        req: NewJob,
        now: DateTime<Utc>,
    ) -> DomainResult<Job> {
        validate_request(family, &req)?;

        let status = match req.scheduled_for {
            Some(at) if at > now => JobStatus::Scheduled,
            _ => JobStatus::Pending,
        };

        Ok(Job {
            id: JobId::new(),
            tenant_id,
            family,
            kind: req.kind,
            target: req.target,
            priority: req.priority.unwrap_or_default(),
            status,
            attempts: 0,
            max_attempts: req.max_attempts.unwrap_or(DEFAULT_MAX_ATTEMPTS),
            input: req.input,
            result: None,
            error: None,
            scheduled_for: req.scheduled_for,
            created_at: now,
            started_at: None,
            completed_at: None,
        })
    }

    /// Whether a claim at `now` may take this job.
    pub fn is_eligible(&self, now: DateTime<Utc>) -> bool {
        let claimable_status = matches!(self.status, JobStatus::Pending | JobStatus::Scheduled);
        let due = self.scheduled_for.map_or(true, |at| at <= now);
        claimable_status && due && self.attempts < self.max_attempts
    }

    /// Claim transition: flip to `processing`, stamp `started_at`, count the
    /// attempt. The caller is responsible for making this atomic against the
    /// store (one conditional write, not read-then-write).
    pub fn mark_claimed(&mut self, now: DateTime<Utc>) -> DomainResult<()> {
        if !self.is_eligible(now) {
            return Err(DomainError::invariant(format!(
                "job {} is not claimable (status {}, attempts {}/{})",
                self.id, self.status, self.attempts, self.max_attempts
            )));
        }
        self.status = JobStatus::Processing;
        self.started_at = Some(now);
        self.attempts += 1;
        Ok(())
    }

    /// Successful finalize: terminal `completed`, result recorded.
    pub fn mark_completed(&mut self, result: Value, now: DateTime<Utc>) -> DomainResult<()> {
        if self.status != JobStatus::Processing {
            return Err(DomainError::invariant(format!(
                "job {} cannot complete from status {}",
                self.id, self.status
            )));
        }
        self.status = JobStatus::Completed;
        self.result = Some(result);
        self.completed_at = Some(now);
        Ok(())
    }

    /// Failed finalize. With attempts left the job goes back to `pending`
    /// (the retry edge), optionally pushed out to `retry_at`; at the ceiling
    /// it becomes terminally `failed`.
    pub fn mark_failed(
        &mut self,
        error: impl Into<String>,
        retry_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        if self.status != JobStatus::Processing {
            return Err(DomainError::invariant(format!(
                "job {} cannot fail from status {}",
                self.id, self.status
            )));
        }
        self.error = Some(error.into());
        if self.attempts < self.max_attempts {
            self.status = JobStatus::Pending;
            self.scheduled_for = retry_at;
        } else {
            self.status = JobStatus::Failed;
            self.completed_at = Some(now);
        }
        Ok(())
    }

    /// Wall-clock execution time of the last attempt, if it finished.
    pub fn execution_secs(&self) -> Option<f64> {
        match (self.started_at, self.completed_at) {
            (Some(started), Some(completed)) => {
                Some((completed - started).num_milliseconds() as f64 / 1000.0)
            }
            _ => None,
        }
    }
}

fn validate_request(family: QueueFamily, req: &NewJob) -> DomainResult<()> {
    if !family.accepts(req.kind) {
        return Err(DomainError::invalid_kind(format!(
            "{} is not accepted by the {} queue",
            req.kind, family
        )));
    }

    match req.kind {
        JobKind::WebsiteScrape => {
            let url = req
                .target
                .url
                .as_deref()
                .ok_or_else(|| DomainError::validation("website_scrape requires a target url"))?;
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(DomainError::validation(format!(
                    "target url must be http(s), got: {url}"
                )));
            }
        }
        JobKind::MenuDeployment | JobKind::PosSync => {
            if req.target.entity.is_none() {
                return Err(DomainError::validation(format!(
                    "{} requires a target entity",
                    req.kind
                )));
            }
        }
        JobKind::EnrichLead | JobKind::VerifyData | JobKind::PublicRecords | JobKind::SocialScan => {
            if req.target.is_empty() {
                return Err(DomainError::validation(format!(
                    "{} requires a target url or entity",
                    req.kind
                )));
            }
        }
        JobKind::Discovery => {}
        JobKind::Custom => {
            if req.input.is_none() {
                return Err(DomainError::validation("custom jobs require an input payload"));
            }
        }
    }

    // Known kinds carry structured inputs; only `custom` is fully opaque.
    if req.kind != JobKind::Custom {
        if let Some(input) = &req.input {
            if !input.is_object() {
                return Err(DomainError::validation(format!(
                    "input for {} must be a JSON object",
                    req.kind
                )));
            }
        }
    }

    if let Some(max) = req.max_attempts {
        if max == 0 || max > MAX_ATTEMPTS_CEILING {
            return Err(DomainError::validation(format!(
                "max_attempts must be between 1 and {MAX_ATTEMPTS_CEILING}, got {max}"
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    fn tenant() -> TenantId {
        TenantId::new()
    }

    fn scrape_request() -> NewJob {
        NewJob::new(JobKind::WebsiteScrape).with_url("https://example.com")
    }

    #[test]
    fn families_accept_their_own_kinds() {
        assert!(QueueFamily::Crawler.accepts(JobKind::WebsiteScrape));
        assert!(QueueFamily::Automation.accepts(JobKind::PosSync));
        assert!(QueueFamily::Automation.accepts(JobKind::Custom));
        assert!(QueueFamily::Crawler.accepts(JobKind::Custom));
        assert!(!QueueFamily::Automation.accepts(JobKind::WebsiteScrape));
        assert!(!QueueFamily::Crawler.accepts(JobKind::MenuDeployment));
    }

    #[test]
    fn enqueue_defaults() {
        let now = Utc::now();
        let job = Job::enqueue(tenant(), QueueFamily::Crawler, scrape_request(), now).unwrap();

        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.priority, Priority::NORMAL);
        assert_eq!(job.attempts, 0);
        assert_eq!(job.max_attempts, DEFAULT_MAX_ATTEMPTS);
        assert_eq!(job.created_at, now);
        assert!(job.started_at.is_none());
        assert!(job.completed_at.is_none());
    }

    #[test]
    fn future_schedule_starts_scheduled() {
        let now = Utc::now();
        let job = Job::enqueue(
            tenant(),
            QueueFamily::Crawler,
            scrape_request().scheduled_for(now + Duration::hours(1)),
            now,
        )
        .unwrap();

        assert_eq!(job.status, JobStatus::Scheduled);
        assert!(!job.is_eligible(now));
        assert!(job.is_eligible(now + Duration::hours(2)));
    }

    #[test]
    fn past_schedule_starts_pending() {
        let now = Utc::now();
        let job = Job::enqueue(
            tenant(),
            QueueFamily::Crawler,
            scrape_request().scheduled_for(now - Duration::minutes(5)),
            now,
        )
        .unwrap();

        assert_eq!(job.status, JobStatus::Pending);
        assert!(job.is_eligible(now));
    }

    #[test]
    fn wrong_family_is_invalid_kind() {
        let err = Job::enqueue(tenant(), QueueFamily::Automation, scrape_request(), Utc::now())
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidKind(_)));
    }

    #[test]
    fn scrape_requires_http_url() {
        let missing = NewJob::new(JobKind::WebsiteScrape);
        assert!(Job::enqueue(tenant(), QueueFamily::Crawler, missing, Utc::now()).is_err());

        let ftp = NewJob::new(JobKind::WebsiteScrape).with_url("ftp://example.com");
        assert!(Job::enqueue(tenant(), QueueFamily::Crawler, ftp, Utc::now()).is_err());
    }

    #[test]
    fn pos_sync_requires_entity() {
        let req = NewJob::new(JobKind::PosSync);
        let err = Job::enqueue(tenant(), QueueFamily::Automation, req, Utc::now()).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));

        let req = NewJob::new(JobKind::PosSync).with_entity("client-42");
        assert!(Job::enqueue(tenant(), QueueFamily::Automation, req, Utc::now()).is_ok());
    }

    #[test]
    fn custom_requires_input() {
        let req = NewJob::new(JobKind::Custom);
        assert!(Job::enqueue(tenant(), QueueFamily::Crawler, req, Utc::now()).is_err());

        // Custom payloads are opaque: non-object input is allowed here.
        let req = NewJob::new(JobKind::Custom).with_input(json!([1, 2, 3]));
        assert!(Job::enqueue(tenant(), QueueFamily::Crawler, req, Utc::now()).is_ok());
    }

    #[test]
    fn structured_input_must_be_an_object() {
        let req = scrape_request().with_input(json!("just a string"));
        assert!(Job::enqueue(tenant(), QueueFamily::Crawler, req, Utc::now()).is_err());

        let req = scrape_request().with_input(json!({"depth": 2}));
        assert!(Job::enqueue(tenant(), QueueFamily::Crawler, req, Utc::now()).is_ok());
    }

    #[test]
    fn max_attempts_bounds() {
        let req = scrape_request().with_max_attempts(0);
        assert!(Job::enqueue(tenant(), QueueFamily::Crawler, req, Utc::now()).is_err());

        let req = scrape_request().with_max_attempts(11);
        assert!(Job::enqueue(tenant(), QueueFamily::Crawler, req, Utc::now()).is_err());

        let req = scrape_request().with_max_attempts(1);
        assert!(Job::enqueue(tenant(), QueueFamily::Crawler, req, Utc::now()).is_ok());
    }

    #[test]
    fn priority_band_is_enforced() {
        assert!(Priority::new(0).is_err());
        assert!(Priority::new(6).is_err());
        assert_eq!(Priority::new(1).unwrap(), Priority::URGENT);
        assert_eq!(Priority::default(), Priority::NORMAL);
    }

    #[test]
    fn claim_transition_counts_attempt() {
        let now = Utc::now();
        let mut job = Job::enqueue(tenant(), QueueFamily::Crawler, scrape_request(), now).unwrap();

        job.mark_claimed(now).unwrap();
        assert_eq!(job.status, JobStatus::Processing);
        assert_eq!(job.attempts, 1);
        assert_eq!(job.started_at, Some(now));

        // A processing job cannot be claimed again.
        assert!(job.mark_claimed(now).is_err());
    }

    #[test]
    fn complete_sets_result_and_timestamp() {
        let now = Utc::now();
        let mut job = Job::enqueue(tenant(), QueueFamily::Crawler, scrape_request(), now).unwrap();
        job.mark_claimed(now).unwrap();

        let finished = now + Duration::seconds(2);
        job.mark_completed(json!({"title": "Example"}), finished).unwrap();

        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.completed_at, Some(finished));
        assert_eq!(job.result, Some(json!({"title": "Example"})));
        assert_eq!(job.execution_secs(), Some(2.0));
    }

    #[test]
    fn failure_with_attempts_left_reverts_to_pending() {
        let now = Utc::now();
        let mut job = Job::enqueue(tenant(), QueueFamily::Crawler, scrape_request(), now).unwrap();
        job.mark_claimed(now).unwrap();

        job.mark_failed("connection refused", None, now).unwrap();
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.error.as_deref(), Some("connection refused"));
        assert!(job.completed_at.is_none());
        assert!(job.is_eligible(now));
    }

    #[test]
    fn failure_with_backoff_defers_eligibility() {
        let now = Utc::now();
        let mut job = Job::enqueue(tenant(), QueueFamily::Crawler, scrape_request(), now).unwrap();
        job.mark_claimed(now).unwrap();

        let retry_at = now + Duration::seconds(30);
        job.mark_failed("timeout", Some(retry_at), now).unwrap();

        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.scheduled_for, Some(retry_at));
        assert!(!job.is_eligible(now));
        assert!(job.is_eligible(retry_at));
    }

    #[test]
    fn failure_at_ceiling_is_permanent() {
        let now = Utc::now();
        let mut job = Job::enqueue(
            tenant(),
            QueueFamily::Crawler,
            scrape_request().with_max_attempts(1),
            now,
        )
        .unwrap();

        job.mark_claimed(now).unwrap();
        job.mark_failed("boom", None, now).unwrap();

        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.attempts, 1);
        assert!(job.completed_at.is_some());
        assert!(!job.is_eligible(now + Duration::days(1)));
    }

    #[test]
    fn three_cycles_exhaust_default_ceiling() {
        let now = Utc::now();
        let mut job = Job::enqueue(tenant(), QueueFamily::Crawler, scrape_request(), now).unwrap();

        let mut cycles = 0;
        while job.is_eligible(now) {
            job.mark_claimed(now).unwrap();
            job.mark_failed("still down", None, now).unwrap();
            cycles += 1;
        }

        assert_eq!(cycles, 3);
        assert_eq!(job.attempts, 3);
        assert_eq!(job.status, JobStatus::Failed);
    }

    #[test]
    fn finalize_requires_processing() {
        let now = Utc::now();
        let mut job = Job::enqueue(tenant(), QueueFamily::Crawler, scrape_request(), now).unwrap();

        assert!(job.mark_completed(json!({}), now).is_err());
        assert!(job.mark_failed("nope", None, now).is_err());
    }

    #[test]
    fn transition_table_matches_lifecycle() {
        use JobStatus::*;
        assert!(Pending.can_transition_to(Processing));
        assert!(Scheduled.can_transition_to(Pending));
        assert!(Scheduled.can_transition_to(Processing));
        assert!(Processing.can_transition_to(Completed));
        assert!(Processing.can_transition_to(Pending));
        assert!(Processing.can_transition_to(Failed));

        assert!(!Completed.can_transition_to(Pending));
        assert!(!Failed.can_transition_to(Pending));
        assert!(!Pending.can_transition_to(Completed));
        assert!(!Pending.can_transition_to(Scheduled));
    }

    #[test]
    fn kind_strings_round_trip() {
        for kind in QueueFamily::Crawler
            .accepted_kinds()
            .iter()
            .chain(QueueFamily::Automation.accepted_kinds())
        {
            let parsed: JobKind = kind.as_str().parse().unwrap();
            assert_eq!(parsed, *kind);
        }
        assert!("menu_builder".parse::<JobKind>().is_err());
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 256,
                ..ProptestConfig::default()
            })]

            /// Property: for any outcome sequence, attempts stay bounded by
            /// the ceiling, terminal states are absorbing, and completed_at
            /// is set exactly on the terminal transition.
            #[test]
            fn lifecycle_invariants_hold(
                outcomes in prop::collection::vec(any::<bool>(), 1..8),
                max_attempts in 1u32..6
            ) {
                let now = Utc::now();
                let mut job = Job::enqueue(
                    TenantId::new(),
                    QueueFamily::Crawler,
                    NewJob::new(JobKind::WebsiteScrape)
                        .with_url("https://example.com")
                        .with_max_attempts(max_attempts),
                    now,
                )
                .unwrap();

                for succeed in outcomes {
                    if !job.is_eligible(now) {
                        break;
                    }
                    job.mark_claimed(now).unwrap();
                    if succeed {
                        job.mark_completed(serde_json::json!({}), now).unwrap();
                    } else {
                        job.mark_failed("induced failure", None, now).unwrap();
                    }

                    prop_assert!(job.attempts <= job.max_attempts);
                    prop_assert_eq!(job.completed_at.is_some(), job.status.is_terminal());
                }

                if job.status.is_terminal() {
                    prop_assert!(!job.is_eligible(now));
                }
            }

            /// Property: the priority band accepts exactly 1..=5.
            #[test]
            fn priority_accepts_exactly_the_band(value in -100i16..100) {
                let result = Priority::new(value);
                prop_assert_eq!(result.is_ok(), (1..=5).contains(&value));
            }
        }
    }
}
