//! Job queue engine: records, storage, execution, and reporting.
//!
//! Two queues share one record shape and one state machine: `automation`
//! drives POS work against client systems, `crawler` collects lead
//! intelligence. The backing row store is the only synchronization point;
//! claims are store-native conditional writes, so any number of short-lived
//! invocations can share a queue safely.

pub mod engine;
pub mod postgres;
pub mod report;
pub mod store;
pub mod types;

pub use engine::{
    BulkRejection, BulkReport, EngineConfig, FnHandler, HandlerOutcome, JobHandler, JobOutcome,
    ProcessReport, ProcessRequest, QueueEngine, QueueError, RetryBackoff,
};
pub use postgres::PostgresJobStore;
pub use report::{
    KindStatusCount, PendingPreview, PriorityCount, QueueReport, QueueStats, WindowCounts,
};
pub use store::{
    InMemoryJobStore, JobFilter, JobStore, StoreError, DEFAULT_LIST_LIMIT, MAX_LIST_LIMIT,
};
pub use types::{
    Job, JobKind, JobStatus, JobTarget, NewJob, Priority, QueueFamily, DEFAULT_MAX_ATTEMPTS,
};
