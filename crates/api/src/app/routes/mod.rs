use axum::{Router, routing::get};

use conveyor_queue::QueueFamily;

pub mod queue;
pub mod system;

/// Router for all authenticated (tenant-scoped) endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .route("/stream", get(system::stream))
        .nest("/automation", queue::router(QueueFamily::Automation))
        .nest("/crawler", queue::router(QueueFamily::Crawler))
}
