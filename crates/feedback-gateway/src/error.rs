//! HTTP error responses.

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header::RETRY_AFTER},
    response::{IntoResponse, Response},
};
use feedback_core::{FeedbackError, StoreError};
use serde::Serialize;

use crate::admission::Throttled;

/// Message returned when a submission cannot be persisted.
pub const SAVE_ERROR_MESSAGE: &str = "Error saving feedback";
/// Message returned when recent feedback cannot be read.
pub const RETRIEVE_ERROR_MESSAGE: &str = "Error retrieving feedback";
/// Message returned for malformed or invalid submissions.
pub const INVALID_PAYLOAD_MESSAGE: &str = "Invalid feedback payload";

/// Errors surfaced to HTTP clients.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The client exceeded its request budget.
    #[error(transparent)]
    Throttled(#[from] Throttled),

    /// The request body is not a valid submission.
    #[error("Invalid feedback payload: {0}")]
    InvalidPayload(String),

    /// The store failed.
    #[error("{context}: {source}")]
    Storage {
        /// What the request was doing.
        context: &'static str,
        /// Underlying store error.
        source: StoreError,
    },
}

impl ApiError {
    /// Map a failed submission.
    #[must_use]
    pub fn saving(err: FeedbackError) -> Self {
        Self::from_feedback(SAVE_ERROR_MESSAGE, err)
    }

    /// Map a failed listing.
    #[must_use]
    pub fn retrieving(err: FeedbackError) -> Self {
        Self::from_feedback(RETRIEVE_ERROR_MESSAGE, err)
    }

    fn from_feedback(context: &'static str, err: FeedbackError) -> Self {
        match err {
            FeedbackError::Validation(e) => Self::InvalidPayload(e.to_string()),
            FeedbackError::Storage(source) => Self::Storage { context, source },
        }
    }
}

/// JSON body of every error response.
#[derive(Debug, Serialize)]
struct ErrorBody {
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::Throttled(throttled) => {
                let retry_secs = throttled.retry_after.as_secs()
                    + u64::from(throttled.retry_after.subsec_nanos() > 0);
                let body = ErrorBody {
                    message: throttled.message,
                    error: None,
                };
                (
                    StatusCode::TOO_MANY_REQUESTS,
                    [(RETRY_AFTER, HeaderValue::from(retry_secs.max(1)))],
                    Json(body),
                )
                    .into_response()
            }
            Self::InvalidPayload(detail) => {
                let body = ErrorBody {
                    message: INVALID_PAYLOAD_MESSAGE.to_string(),
                    error: Some(detail),
                };
                (StatusCode::BAD_REQUEST, Json(body)).into_response()
            }
            Self::Storage { context, source } => {
                tracing::error!(error = %source, "{context}");
                let body = ErrorBody {
                    message: context.to_string(),
                    error: Some(source.to_string()),
                };
                (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
            }
        }
    }
}
