use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Errors surfaced by the HTTP layer
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Browser automation error: {0}")]
    BrowserError(String),

    #[error("LLM provider error: {0}")]
    LLMError(String),

    #[error("Invalid request: {0}")]
    ValidationError(String),

    #[error("Run already active for session: {0}")]
    Conflict(String),

    #[error("Replay error: {0}")]
    ReplayError(String),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn status(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::SessionNotFound(_) => (StatusCode::NOT_FOUND, "Not Found"),
            AppError::ValidationError(_) => (StatusCode::BAD_REQUEST, "Bad Request"),
            AppError::Conflict(_) => (StatusCode::CONFLICT, "Conflict"),
            AppError::BrowserError(_) => (StatusCode::BAD_GATEWAY, "Browser Error"),
            AppError::LLMError(_) => (StatusCode::BAD_GATEWAY, "LLM Error"),
            AppError::ReplayError(_) => (StatusCode::UNPROCESSABLE_ENTITY, "Replay Error"),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Internal Error"),
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    detail: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, label) = self.status();
        if status.is_server_error() {
            tracing::error!("{}", self);
        }

        let body = Json(ErrorResponse {
            error: label.to_string(),
            detail: self.to_string(),
        });

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            AppError::SessionNotFound("s1".into()).status().0,
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::Conflict("s1".into()).status().0,
            StatusCode::CONFLICT
        );
        let internal: AppError = anyhow::anyhow!("boom").into();
        assert_eq!(internal.status().0, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(internal.to_string(), "Internal error: boom");
    }

    #[test]
    fn test_response_status() {
        let response = AppError::ValidationError("goal is empty".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
