// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum ApiErrorCode {
    NotFound,
    Forbidden,
    Conflict,
    ValidationFailed,
    Unauthorized,
    PayloadTooLarge,
    NotReady,
    Internal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ApiError {
    pub code: ApiErrorCode,
    pub message: String,
    pub details: Value,
}

impl ApiError {
    #[must_use]
    pub fn new(code: ApiErrorCode, message: impl Into<String>, details: Value) -> Self {
        Self {
            code,
            message: message.into(),
            details,
        }
    }

    #[must_use]
    pub fn not_found(kind: &str, id: &str) -> Self {
        Self::new(
            ApiErrorCode::NotFound,
            format!("{kind} not found"),
            json!({"kind": kind, "id": id}),
        )
    }

    #[must_use]
    pub fn forbidden(reason: &str) -> Self {
        Self::new(ApiErrorCode::Forbidden, reason, json!({"reason": reason}))
    }

    #[must_use]
    pub fn conflict(reason: &str) -> Self {
        Self::new(ApiErrorCode::Conflict, reason, json!({"reason": reason}))
    }

    #[must_use]
    pub fn validation_failed(field: &str, reason: &str) -> Self {
        Self::new(
            ApiErrorCode::ValidationFailed,
            "validation failed",
            json!({"field_errors": [{"field": field, "reason": reason}]}),
        )
    }

    #[must_use]
    pub fn unauthorized() -> Self {
        Self::new(
            ApiErrorCode::Unauthorized,
            "missing or invalid bearer token",
            json!({}),
        )
    }

    #[must_use]
    pub fn payload_too_large(limit_bytes: usize) -> Self {
        Self::new(
            ApiErrorCode::PayloadTooLarge,
            "payload too large",
            json!({"limit_bytes": limit_bytes}),
        )
    }

    #[must_use]
    pub fn internal(message: &str) -> Self {
        Self::new(ApiErrorCode::Internal, message, json!({}))
    }
}

const _: fn() = || {
    fn assert_traits<T: Serialize + for<'de> Deserialize<'de>>() {}
    assert_traits::<ApiErrorCode>();
};
