use std::{convert::Infallible, sync::Arc, time::Duration};

use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use tokio::sync::broadcast;
use tokio_stream::{StreamExt, wrappers::BroadcastStream};

use conveyor_core::{JobId, TenantId};
use conveyor_handlers::{DelegateHandler, HttpFetchHandler};
use conveyor_queue::{
    EngineConfig, InMemoryJobStore, Job, JobKind, JobOutcome, JobStatus, JobStore,
    PostgresJobStore, QueueEngine, QueueFamily, RetryBackoff,
};

/// Realtime message broadcast to `/stream` subscribers on every enqueue and
/// finalize transition. `tenant_id` scopes delivery and stays off the wire.
#[derive(Debug, Clone, serde::Serialize)]
pub struct JobUpdate {
    #[serde(skip_serializing)]
    pub tenant_id: TenantId,
    pub job_id: JobId,
    pub family: QueueFamily,
    pub kind: JobKind,
    pub status: JobStatus,
    pub attempts: u32,
}

impl JobUpdate {
    pub fn from_job(job: &Job) -> Self {
        Self {
            tenant_id: job.tenant_id,
            job_id: job.id,
            family: job.family,
            kind: job.kind,
            status: job.status,
            attempts: job.attempts,
        }
    }

    pub fn from_outcome(tenant_id: TenantId, family: QueueFamily, outcome: &JobOutcome) -> Self {
        Self {
            tenant_id,
            job_id: outcome.job_id,
            family,
            kind: outcome.kind,
            status: outcome.status,
            attempts: outcome.attempts,
        }
    }

    fn topic(&self) -> String {
        format!("{}.job_updated", self.family)
    }
}

/// Everything the route handlers share: the engine over the selected store,
/// and the realtime channel feeding `/stream`.
pub struct AppServices {
    engine: QueueEngine<Arc<dyn JobStore>>,
    realtime_tx: broadcast::Sender<JobUpdate>,
}

impl AppServices {
    pub fn engine(&self) -> &QueueEngine<Arc<dyn JobStore>> {
        &self.engine
    }

    pub fn realtime_tx(&self) -> &broadcast::Sender<JobUpdate> {
        &self.realtime_tx
    }

    /// Broadcast a job transition (lossy; no backpressure on the queue).
    pub fn publish(&self, update: JobUpdate) {
        let _ = self.realtime_tx.send(update);
    }
}

pub async fn build_services() -> AppServices {
    let store = build_store().await;
    let config = engine_config_from_env();

    // Handler HTTP clients share the per-attempt budget.
    let handler_timeout = config.handler_timeout;
    let mut engine = QueueEngine::with_config(store, config);

    let fetch = HttpFetchHandler::new(handler_timeout).expect("failed to build the fetch client");
    engine.register_handler(JobKind::WebsiteScrape, Arc::new(fetch));

    if let Ok(url) = std::env::var("AUTOMATION_RUNNER_URL") {
        let delegate = DelegateHandler::new(url, handler_timeout)
            .expect("failed to build the automation runner client");
        engine.register_family_fallback(QueueFamily::Automation, Arc::new(delegate));
        tracing::info!(queue = %QueueFamily::Automation, "runner delegation enabled");
    }
    if let Ok(url) = std::env::var("ENRICHMENT_RUNNER_URL") {
        let delegate = DelegateHandler::new(url, handler_timeout)
            .expect("failed to build the enrichment runner client");
        engine.register_family_fallback(QueueFamily::Crawler, Arc::new(delegate));
        tracing::info!(queue = %QueueFamily::Crawler, "runner delegation enabled");
    }

    // Realtime channel (SSE): lossy broadcast, tenant-filtered per subscriber.
    let (realtime_tx, _realtime_rx) = broadcast::channel::<JobUpdate>(256);

    AppServices {
        engine,
        realtime_tx,
    }
}

async fn build_store() -> Arc<dyn JobStore> {
    let use_persistent = std::env::var("USE_PERSISTENT_STORES")
        .unwrap_or_else(|_| "false".to_string())
        .parse::<bool>()
        .unwrap_or(false);

    if use_persistent {
        let database_url = std::env::var("DATABASE_URL")
            .expect("DATABASE_URL must be set when USE_PERSISTENT_STORES=true");
        let store = PostgresJobStore::connect(&database_url)
            .await
            .expect("failed to connect to Postgres");
        store
            .ensure_schema()
            .await
            .expect("failed to provision the jobs schema");
        Arc::new(store)
    } else {
        Arc::new(InMemoryJobStore::new())
    }
}

fn engine_config_from_env() -> EngineConfig {
    let mut config = EngineConfig::default();
    if let Some(timeout) = env_secs("HANDLER_TIMEOUT_SECS") {
        config = config.with_handler_timeout(timeout);
    }
    if let Some(base) = env_secs("RETRY_BACKOFF_BASE_SECS") {
        config = config.with_retry_backoff(RetryBackoff::new(base));
        tracing::info!(
            base_secs = base.as_secs(),
            "retry backoff enabled; failed jobs reschedule instead of retrying immediately"
        );
    }
    config
}

fn env_secs(name: &str) -> Option<Duration> {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_secs)
}

/// Build the SSE stream for one tenant (used by `GET /stream`).
pub fn tenant_stream(
    services: Arc<AppServices>,
    tenant_id: TenantId,
) -> Sse<impl tokio_stream::Stream<Item = Result<SseEvent, Infallible>>> {
    let rx = services.realtime_tx().subscribe();
    let stream = BroadcastStream::new(rx).filter_map(move |msg| match msg {
        Ok(u) if u.tenant_id == tenant_id => {
            let data = serde_json::to_string(&u).unwrap_or_else(|_| "{}".to_string());
            Some(Ok(SseEvent::default().event(u.topic()).data(data)))
        }
        _ => None,
    });

    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}
