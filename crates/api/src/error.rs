//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use fulfillment::FulfillmentError;
use projections::ProjectionError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    /// No usable caller identity on the request.
    Unauthorized(String),
    /// The caller's role may not use this route.
    Forbidden(String),
    Fulfillment(FulfillmentError),
    Projection(ProjectionError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            ApiError::Fulfillment(err) => fulfillment_error_to_response(err),
            ApiError::Projection(err) => {
                tracing::error!(error = %err, "read model unavailable");
                (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
            }
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn fulfillment_error_to_response(err: FulfillmentError) -> (StatusCode, String) {
    let status = match &err {
        FulfillmentError::NotFound { .. } | FulfillmentError::AgentNotFound(_) => {
            StatusCode::NOT_FOUND
        }
        FulfillmentError::InvalidState { .. }
        | FulfillmentError::NotCancellable { .. }
        | FulfillmentError::InsufficientStock { .. }
        | FulfillmentError::Conflict(_) => StatusCode::CONFLICT,
        FulfillmentError::Validation(_) => StatusCode::BAD_REQUEST,
        FulfillmentError::InvalidOrExpiredCode => StatusCode::UNPROCESSABLE_ENTITY,
        FulfillmentError::NotificationFailed(_) => StatusCode::BAD_GATEWAY,
        FulfillmentError::Store(_) | FulfillmentError::Domain(_) => {
            tracing::error!(error = %err, "internal server error");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, err.to_string())
}

impl From<FulfillmentError> for ApiError {
    fn from(err: FulfillmentError) -> Self {
        ApiError::Fulfillment(err)
    }
}

impl From<ProjectionError> for ApiError {
    fn from(err: ProjectionError) -> Self {
        ApiError::Projection(err)
    }
}
