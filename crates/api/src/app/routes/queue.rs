use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    routing::get,
};
use serde_json::json;

use conveyor_core::JobId;
use conveyor_queue::{BulkRejection, JobKind, NewJob, ProcessRequest, QueueFamily};

use crate::app::dto::{AddJobRequest, ListJobsQuery, QueueCommand};
use crate::app::errors;
use crate::app::services::{AppServices, JobUpdate};
use crate::context::{PrincipalContext, TenantContext};

/// Routes for one queue family; the family rides along as router state so
/// `/automation/...` and `/crawler/...` share one set of handlers.
pub fn router(family: QueueFamily) -> Router {
    Router::new()
        .route("/queue", get(report).post(command))
        .route("/jobs", get(list_jobs))
        .route("/jobs/:id", get(get_job))
        .with_state(family)
}

/// `POST /{family}/queue`: the mutating actions, tagged by `action`.
async fn command(
    State(family): State<QueueFamily>,
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<serde_json::Value>,
) -> axum::response::Response {
    if let Err(forbidden) = crate::authz::require_operator(&principal) {
        return forbidden;
    }

    let command: QueueCommand = match serde_json::from_value(body) {
        Ok(c) => c,
        Err(e) => {
            return errors::json_error(
                StatusCode::BAD_REQUEST,
                format!("invalid request body: {e}"),
            );
        }
    };

    match command {
        QueueCommand::Add(req) => add_job(family, &services, tenant, req).await,
        QueueCommand::BulkAdd { jobs } => bulk_add(family, &services, tenant, jobs).await,
        QueueCommand::Process { limit, kind } => {
            process(family, &services, tenant, limit, kind).await
        }
        QueueCommand::Clear { older_than_hours } => {
            clear(family, &services, tenant, older_than_hours).await
        }
    }
}

async fn add_job(
    family: QueueFamily,
    services: &AppServices,
    tenant: TenantContext,
    req: AddJobRequest,
) -> axum::response::Response {
    let new_job = match req.into_new_job() {
        Ok(n) => n,
        Err(e) => return errors::queue_error_to_response(e.into()),
    };

    match services
        .engine()
        .enqueue(tenant.tenant_id(), family, new_job)
        .await
    {
        Ok(job) => {
            services.publish(JobUpdate::from_job(&job));
            errors::json_ok(
                StatusCode::CREATED,
                json!({
                    "id": job.id,
                    "status": job.status,
                    "scheduled_for": job.scheduled_for,
                }),
            )
        }
        Err(e) => errors::queue_error_to_response(e),
    }
}

async fn bulk_add(
    family: QueueFamily,
    services: &AppServices,
    tenant: TenantContext,
    jobs: Vec<AddJobRequest>,
) -> axum::response::Response {
    // The cap counts wire items: slots past it are not parsed or attempted.
    let total = jobs.len();
    let cap = services.engine().config().bulk_cap;
    let dropped = total.saturating_sub(cap);
    if dropped > 0 {
        tracing::warn!(queue = %family, total, cap, dropped, "bulk add truncated at cap");
    }

    // Parse each slot, keeping the wire index for the per-item report. A
    // malformed slot rejects that slot only, never the batch.
    let mut rejected: Vec<BulkRejection> = Vec::new();
    let mut requests: Vec<NewJob> = Vec::new();
    let mut wire_index: Vec<usize> = Vec::new();
    for (index, wire) in jobs.into_iter().take(cap).enumerate() {
        match wire.into_new_job() {
            Ok(req) => {
                requests.push(req);
                wire_index.push(index);
            }
            Err(e) => rejected.push(BulkRejection {
                index,
                error: e.to_string(),
            }),
        }
    }

    let report = services
        .engine()
        .enqueue_bulk(tenant.tenant_id(), family, requests)
        .await;
    for rejection in &report.rejected {
        rejected.push(BulkRejection {
            index: wire_index[rejection.index],
            error: rejection.error.clone(),
        });
    }
    rejected.sort_by_key(|r| r.index);

    for job in &report.accepted {
        services.publish(JobUpdate::from_job(job));
    }

    let accepted = report.accepted_ids();
    errors::json_ok(
        StatusCode::OK,
        json!({
            "accepted": accepted,
            "accepted_count": accepted.len(),
            "rejected": rejected,
            "dropped": dropped,
        }),
    )
}

async fn process(
    family: QueueFamily,
    services: &AppServices,
    tenant: TenantContext,
    limit: Option<usize>,
    kind: Option<String>,
) -> axum::response::Response {
    let kind: Option<JobKind> = match kind.as_deref().map(str::parse).transpose() {
        Ok(k) => k,
        Err(e) => return errors::queue_error_to_response(conveyor_queue::QueueError::Domain(e)),
    };

    let request = ProcessRequest { limit, kind };
    match services
        .engine()
        .process(Some(tenant.tenant_id()), family, request)
        .await
    {
        Ok(report) => {
            for outcome in &report.outcomes {
                services.publish(JobUpdate::from_outcome(tenant.tenant_id(), family, outcome));
            }
            errors::json_ok(
                StatusCode::OK,
                serde_json::to_value(&report).unwrap_or_default(),
            )
        }
        Err(e) => errors::queue_error_to_response(e),
    }
}

async fn clear(
    family: QueueFamily,
    services: &AppServices,
    tenant: TenantContext,
    older_than_hours: Option<i64>,
) -> axum::response::Response {
    let hours = older_than_hours.unwrap_or(0);
    if hours < 0 {
        return errors::json_error(
            StatusCode::BAD_REQUEST,
            "older_than_hours must be non-negative",
        );
    }

    match services
        .engine()
        .sweep(
            Some(tenant.tenant_id()),
            family,
            chrono::Duration::hours(hours),
        )
        .await
    {
        Ok(removed) => errors::json_ok(StatusCode::OK, json!({ "removed": removed })),
        Err(e) => errors::queue_error_to_response(e),
    }
}

/// `GET /{family}/queue`: the status report.
async fn report(
    State(family): State<QueueFamily>,
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
) -> axum::response::Response {
    let report = services
        .engine()
        .report(Some(tenant.tenant_id()), family)
        .await;
    errors::json_ok(
        StatusCode::OK,
        serde_json::to_value(&report).unwrap_or_default(),
    )
}

/// `GET /{family}/jobs`: filtered listing, newest first.
async fn list_jobs(
    State(family): State<QueueFamily>,
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Query(query): Query<ListJobsQuery>,
) -> axum::response::Response {
    let filter = match query.into_filter(family) {
        Ok(f) => f,
        Err(e) => return errors::queue_error_to_response(e.into()),
    };

    match services
        .engine()
        .jobs(Some(tenant.tenant_id()), filter)
        .await
    {
        Ok(jobs) => errors::json_ok(StatusCode::OK, json!({ "count": jobs.len(), "jobs": jobs })),
        Err(e) => errors::queue_error_to_response(e),
    }
}

/// `GET /{family}/jobs/{id}`: one full record, scoped to the path family.
async fn get_job(
    State(family): State<QueueFamily>,
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: JobId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid job id"),
    };

    match services.engine().job(Some(tenant.tenant_id()), id).await {
        Ok(Some(job)) if job.family == family => {
            errors::json_ok(StatusCode::OK, json!({ "job": job }))
        }
        Ok(_) => errors::json_error(StatusCode::NOT_FOUND, "job not found"),
        Err(e) => errors::queue_error_to_response(e),
    }
}
