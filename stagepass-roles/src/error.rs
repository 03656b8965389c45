//! Error types for stagepass-roles
//!
//! Entity operations and the workflow controller return [`WorkflowError`]; handlers
//! return it unchanged and axum renders it through [`IntoResponse`].

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Workflow error type
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// Missing or malformed input (400)
    #[error("Validation error: {0}")]
    Validation(String),

    /// No valid credentials supplied (401)
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    /// Caller lacks the privilege or ownership the operation needs (403)
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Unknown request or account (404)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Ordering rule violated, e.g. approving before KYC is verified (409)
    #[error("{0}")]
    PreconditionFailed(String),

    /// Conflicts with existing state, e.g. a duplicate pending request (409)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// stagepass-common error (database, IO, configuration)
    #[error("Common error: {0}")]
    Common(#[from] stagepass_common::Error),
}

impl From<sqlx::Error> for WorkflowError {
    fn from(err: sqlx::Error) -> Self {
        WorkflowError::Common(err.into())
    }
}

impl WorkflowError {
    /// HTTP status and machine-readable code for this error
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            WorkflowError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            WorkflowError::Unauthenticated(_) => (StatusCode::UNAUTHORIZED, "UNAUTHENTICATED"),
            WorkflowError::Forbidden(_) => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            WorkflowError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            WorkflowError::PreconditionFailed(_) => (StatusCode::CONFLICT, "PRECONDITION_FAILED"),
            WorkflowError::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            WorkflowError::Common(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }

    /// Message safe to show to the caller
    ///
    /// Internal failures are logged in full and reported generically.
    pub fn user_message(&self) -> String {
        match self {
            WorkflowError::Validation(msg)
            | WorkflowError::Unauthenticated(msg)
            | WorkflowError::Forbidden(msg)
            | WorkflowError::NotFound(msg)
            | WorkflowError::PreconditionFailed(msg)
            | WorkflowError::Conflict(msg) => msg.clone(),
            WorkflowError::Common(_) => "Internal server error".to_string(),
        }
    }
}

impl IntoResponse for WorkflowError {
    fn into_response(self) -> Response {
        let (status, error_code) = self.status_and_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": self.user_message(),
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for workflow operations and API handlers
pub type Result<T> = std::result::Result<T, WorkflowError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (WorkflowError::Validation("x".into()), StatusCode::BAD_REQUEST),
            (WorkflowError::Unauthenticated("x".into()), StatusCode::UNAUTHORIZED),
            (WorkflowError::Forbidden("x".into()), StatusCode::FORBIDDEN),
            (WorkflowError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (WorkflowError::PreconditionFailed("x".into()), StatusCode::CONFLICT),
            (WorkflowError::Conflict("x".into()), StatusCode::CONFLICT),
            (
                WorkflowError::Common(stagepass_common::Error::Internal("boom".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(err.status_and_code().0, expected, "{}", err);
        }
    }

    #[test]
    fn test_internal_details_are_not_leaked() {
        let err = WorkflowError::Common(stagepass_common::Error::Internal(
            "disk layout /srv/secret".into(),
        ));
        assert_eq!(err.user_message(), "Internal server error");
    }

    #[test]
    fn test_precondition_message_is_verbatim() {
        let err = WorkflowError::PreconditionFailed(
            "KYC must be verified before approving this request".into(),
        );
        assert_eq!(
            err.to_string(),
            "KYC must be verified before approving this request"
        );
    }
}
