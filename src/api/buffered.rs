//! Responses recorded by a handler attempt and flushed once by the caller.

use axum::{
    body::Body,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::error;

use crate::domain::{AppError, DatabaseError, ErrorResponse, ValidationError};

/// What one handler attempt wants to send back.
///
/// Nothing reaches the client until the orchestrator decides the attempt is
/// terminal and converts the value with [`IntoResponse`]. A discarded attempt
/// leaves no trace on the response channel.
#[derive(Debug)]
pub struct BufferedResponse {
    status: StatusCode,
    body: Vec<u8>,
    error: Option<AppError>,
}

impl BufferedResponse {
    /// Successful outcome with an empty body
    #[must_use]
    pub fn empty(status: StatusCode) -> Self {
        Self {
            status,
            body: Vec::new(),
            error: None,
        }
    }

    /// Successful outcome with a JSON body
    pub fn json<T: Serialize>(status: StatusCode, value: &T) -> Self {
        match serde_json::to_vec(value) {
            Ok(body) => Self {
                status,
                body,
                error: None,
            },
            Err(e) => Self::error(AppError::Internal(format!(
                "failed to encode response: {e}"
            ))),
        }
    }

    /// Failed outcome; status and `{message}` body follow from the error
    #[must_use]
    pub fn error(err: AppError) -> Self {
        let status = status_for(&err);
        let body = serde_json::to_vec(&ErrorResponse {
            message: err.to_string(),
        })
        .unwrap_or_default();
        Self {
            status,
            body,
            error: Some(err),
        }
    }

    /// Record a handler result, using `status` for the success case
    #[must_use]
    pub fn from_result(result: Result<(), AppError>, status: StatusCode) -> Self {
        match result {
            Ok(()) => Self::empty(status),
            Err(e) => Self::error(e),
        }
    }

    pub fn recorded_status(&self) -> StatusCode {
        self.status
    }

    pub fn recorded_body(&self) -> &[u8] {
        &self.body
    }

    pub fn recorded_error(&self) -> Option<&AppError> {
        self.error.as_ref()
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Whether the recorded failure is a write conflict, the only kind of
    /// failure that may be retried silently
    pub fn is_conflict(&self) -> bool {
        self.error.as_ref().is_some_and(AppError::is_conflict)
    }
}

impl IntoResponse for BufferedResponse {
    fn into_response(self) -> Response {
        if let Some(err) = &self.error {
            if self.status.is_server_error() {
                error!(status = %self.status, error = %err, "Server error");
            }
        }
        if self.body.is_empty() {
            return self.status.into_response();
        }
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );
        response
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        BufferedResponse::error(self).into_response()
    }
}

/// HTTP status for an application error
fn status_for(err: &AppError) -> StatusCode {
    match err {
        AppError::Validation(ValidationError::BodyTooLarge(_)) => StatusCode::PAYLOAD_TOO_LARGE,
        AppError::Validation(_) => StatusCode::BAD_REQUEST,
        AppError::Database(db_err) => match db_err {
            DatabaseError::WriteConflict(_) => StatusCode::CONFLICT,
            DatabaseError::Connection(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        },
        AppError::Timeout(_) => StatusCode::REQUEST_TIMEOUT,
        AppError::Config(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
