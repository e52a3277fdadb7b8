// crates/backend-lib/src/error.rs

//! Central error type + Axum integration.
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Application error types with error codes and context
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Event not found")]
    EventNotFound,

    #[error("User not found")]
    UserNotFound,

    #[error("Already attending this event")]
    AlreadyAttending,

    #[error("Not attending this event")]
    NotAttending,

    #[error("Email already registered")]
    EmailTaken,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AppError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Auth(_) => StatusCode::UNAUTHORIZED,
            AppError::EventNotFound | AppError::UserNotFound => StatusCode::NOT_FOUND,
            AppError::AlreadyAttending | AppError::NotAttending | AppError::EmailTaken => {
                StatusCode::CONFLICT
            },
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Auth(_) => "AUTH_001",
            AppError::Internal(_) => "INT_001",
            AppError::EventNotFound => "EVENT_001",
            AppError::UserNotFound => "USER_001",
            AppError::AlreadyAttending => "EVENT_002",
            AppError::NotAttending => "EVENT_003",
            AppError::EmailTaken => "USER_002",
            AppError::InvalidInput(_) => "VAL_001",
            AppError::Io(_) => "IO_001",
            AppError::Json(_) => "JSON_001",
        }
    }

    /// Get a sanitized message suitable for production use
    pub fn sanitized_message(&self) -> String {
        match self {
            AppError::Auth(_) => "Authentication failed".to_string(),
            AppError::Internal(_) => "An internal server error occurred".to_string(),
            AppError::EventNotFound => "Event not found".to_string(),
            AppError::UserNotFound => "User not found".to_string(),
            AppError::AlreadyAttending => "You are already attending this event".to_string(),
            AppError::NotAttending => "You are not attending this event".to_string(),
            AppError::EmailTaken => "Email already registered".to_string(),
            AppError::InvalidInput(_) => "Invalid input provided".to_string(),
            AppError::Io(_) => "Internal server error".to_string(),
            AppError::Json(_) => "Invalid request format".to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_code = self.error_code();

        // Use detailed messages in development, sanitized in production
        let message = if cfg!(debug_assertions) {
            self.to_string()
        } else {
            self.sanitized_message()
        };

        let body = serde_json::json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        });

        (status, axum::Json(body)).into_response()
    }
}

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for AppError {
    fn from(_: tokio::sync::mpsc::error::SendError<T>) -> Self {
        AppError::Internal("Failed to send message".to_string())
    }
}

impl From<String> for AppError {
    fn from(msg: String) -> Self {
        AppError::Internal(msg)
    }
}

impl From<&str> for AppError {
    fn from(msg: &str) -> Self {
        AppError::Internal(msg.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use std::io::{Error as IoError, ErrorKind};

    #[test]
    fn test_app_error_display() {
        let auth_error = AppError::Auth("Invalid token".to_string());
        assert_eq!(auth_error.to_string(), "Authentication error: Invalid token");

        let io_error = AppError::Io(IoError::new(ErrorKind::NotFound, "File not found"));
        assert!(io_error.to_string().contains("IO error"));

        assert_eq!(AppError::AlreadyAttending.to_string(), "Already attending this event");
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(
            AppError::Auth("Invalid credentials".to_string()).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AppError::Internal("test".to_string()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(AppError::EventNotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::AlreadyAttending.status_code(), StatusCode::CONFLICT);
        assert_eq!(AppError::NotAttending.status_code(), StatusCode::CONFLICT);
        assert_eq!(
            AppError::InvalidInput("bad".to_string()).status_code(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_app_error_error_codes() {
        assert_eq!(AppError::Auth("x".to_string()).error_code(), "AUTH_001");
        assert_eq!(AppError::EventNotFound.error_code(), "EVENT_001");
        assert_eq!(AppError::AlreadyAttending.error_code(), "EVENT_002");
        assert_eq!(AppError::NotAttending.error_code(), "EVENT_003");
        assert_eq!(AppError::EmailTaken.error_code(), "USER_002");

        let json_err: serde_json::Error =
            serde_json::from_str::<serde_json::Value>("invalid json").unwrap_err();
        assert_eq!(AppError::Json(json_err).error_code(), "JSON_001");
    }

    #[test]
    fn test_app_error_into_response() {
        let error = AppError::EventNotFound;
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_error_from_impls() {
        let io_err = IoError::new(ErrorKind::PermissionDenied, "Permission denied");
        let app_err: AppError = io_err.into();
        assert!(matches!(app_err, AppError::Io(_)));

        let json_err: serde_json::Error =
            serde_json::from_str::<serde_json::Value>("invalid json").unwrap_err();
        let app_err: AppError = json_err.into();
        assert!(matches!(app_err, AppError::Json(_)));

        let app_err: AppError = "Str error".into();
        assert!(matches!(app_err, AppError::Internal(_)));
    }
}
