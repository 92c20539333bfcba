use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use conveyor_core::DomainError;
use conveyor_queue::{QueueError, StoreError};

/// Map an engine error onto the wire: validation problems are the caller's
/// fault, missing rows are 404, transition races are 409, and everything the
/// store could not absorb is a 500.
pub fn queue_error_to_response(err: QueueError) -> axum::response::Response {
    let status = match &err {
        QueueError::Domain(e) => match e {
            DomainError::Validation(_)
            | DomainError::InvalidKind(_)
            | DomainError::InvalidId(_) => StatusCode::BAD_REQUEST,
            DomainError::NotFound => StatusCode::NOT_FOUND,
            DomainError::Conflict(_) => StatusCode::CONFLICT,
            DomainError::Unauthorized => StatusCode::FORBIDDEN,
            DomainError::InvariantViolation(_) => StatusCode::INTERNAL_SERVER_ERROR,
        },
        QueueError::Store(e) => match e {
            StoreError::NotFound(_) => StatusCode::NOT_FOUND,
            StoreError::AlreadyExists(_) | StoreError::Conflict { .. } => StatusCode::CONFLICT,
            StoreError::Unavailable(_) | StoreError::Storage(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        },
    };
    json_error(status, err.to_string())
}

pub fn json_error(status: StatusCode, message: impl Into<String>) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "success": false,
            "error": message.into(),
        })),
    )
        .into_response()
}

/// Success envelope: the payload's fields plus `"success": true`. A non-object
/// payload lands under `"data"` so the envelope stays an object.
pub fn json_ok(status: StatusCode, payload: serde_json::Value) -> axum::response::Response {
    let mut body = match payload {
        serde_json::Value::Object(map) => map,
        other => {
            let mut map = serde_json::Map::new();
            map.insert("data".to_string(), other);
            map
        }
    };
    body.insert("success".to_string(), serde_json::Value::Bool(true));

    (status, axum::Json(serde_json::Value::Object(body))).into_response()
}
