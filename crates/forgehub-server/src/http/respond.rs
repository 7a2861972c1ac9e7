// SPDX-License-Identifier: Apache-2.0

use crate::lease::LeaseError;
use crate::AppState;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use forgehub_api::{ApiError, ApiErrorCode};
use serde_json::json;
use std::sync::atomic::Ordering;

#[must_use]
pub(crate) fn api_error_status(code: ApiErrorCode) -> StatusCode {
    match code {
        ApiErrorCode::NotFound => StatusCode::NOT_FOUND,
        ApiErrorCode::Forbidden => StatusCode::FORBIDDEN,
        ApiErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
        // The public contract surfaces "already checked out" as a 400;
        // the machine-readable code still says Conflict.
        ApiErrorCode::Conflict | ApiErrorCode::ValidationFailed => StatusCode::BAD_REQUEST,
        ApiErrorCode::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
        ApiErrorCode::NotReady => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[must_use]
pub(crate) fn api_error_response(err: ApiError) -> Response {
    let status = api_error_status(err.code);
    (status, Json(json!({"error": err}))).into_response()
}

#[must_use]
pub(crate) fn lease_error_to_api(err: LeaseError, project_id: &str) -> ApiError {
    match err {
        LeaseError::NotFound => ApiError::not_found("project", project_id),
        LeaseError::Forbidden(reason) => ApiError::forbidden(&reason),
        LeaseError::Conflict(reason) => ApiError::conflict(&reason),
        LeaseError::Validation(reason) => ApiError::validation_failed("request", &reason),
        LeaseError::Store(e) => {
            tracing::error!("lease transition store failure: {e}");
            ApiError::internal("store failure")
        }
    }
}

pub(crate) fn make_request_id(state: &AppState) -> String {
    let id = state.request_id_seed.fetch_add(1, Ordering::Relaxed);
    format!("req-{id:016x}")
}

pub(crate) fn propagated_request_id(headers: &HeaderMap, state: &AppState) -> String {
    if let Some(raw) = headers.get("x-request-id").and_then(|v| v.to_str().ok()) {
        let trimmed = raw.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }
    make_request_id(state)
}

pub(crate) fn with_request_id(mut response: Response, request_id: &str) -> Response {
    if let Ok(v) = HeaderValue::from_str(request_id) {
        response.headers_mut().insert("x-request-id", v);
    }
    response
}
