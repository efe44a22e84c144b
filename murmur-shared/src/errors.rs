use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use diesel::result::DatabaseErrorKind;
use serde::{Deserialize, Serialize};

use crate::types::ApiErrorResponse;

/// Application error codes following the pattern E{area}{sequence}
///
/// Ranges:
/// - E0xxx: Shared/infrastructure errors
/// - E1xxx: Session and identity errors
/// - E2xxx: User errors
/// - E3xxx: Post errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    // Shared (E0xxx)
    InternalError,
    NotFound,
    AuthenticationRequired,
    Forbidden,
    Conflict,
    ServiceUnavailable,
    BadRequest,
    PayloadTooLarge,

    // Session / identity (E1xxx)
    TokenExpired,
    TokenInvalid,
    WebhookSignatureInvalid,
    WebhookPayloadInvalid,

    // User (E2xxx)
    UserNotFound,
    UsernameTaken,
    InvalidDisplayName,
    InvalidBio,
    CannotFollowSelf,
    ImageRejected,
    ImageUploadFailed,

    // Post (E3xxx)
    PostNotFound,
    InvalidContent,
}

impl ErrorCode {
    pub fn code(&self) -> &'static str {
        match self {
            // Shared
            Self::InternalError => "E0001",
            Self::NotFound => "E0003",
            Self::AuthenticationRequired => "E0004",
            Self::Forbidden => "E0005",
            Self::Conflict => "E0006",
            Self::ServiceUnavailable => "E0007",
            Self::BadRequest => "E0008",
            Self::PayloadTooLarge => "E0009",

            // Session / identity
            Self::TokenExpired => "E1001",
            Self::TokenInvalid => "E1002",
            Self::WebhookSignatureInvalid => "E1003",
            Self::WebhookPayloadInvalid => "E1004",

            // User
            Self::UserNotFound => "E2001",
            Self::UsernameTaken => "E2002",
            Self::InvalidDisplayName => "E2003",
            Self::InvalidBio => "E2004",
            Self::CannotFollowSelf => "E2005",
            Self::ImageRejected => "E2006",
            Self::ImageUploadFailed => "E2007",

            // Post
            Self::PostNotFound => "E3001",
            Self::InvalidContent => "E3002",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::BadRequest | Self::InvalidDisplayName
            | Self::InvalidBio | Self::InvalidContent | Self::ImageRejected
            | Self::WebhookSignatureInvalid | Self::WebhookPayloadInvalid => StatusCode::BAD_REQUEST,
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::NotFound | Self::UserNotFound | Self::PostNotFound => StatusCode::NOT_FOUND,
            Self::AuthenticationRequired | Self::TokenExpired | Self::TokenInvalid => StatusCode::UNAUTHORIZED,
            Self::Forbidden | Self::CannotFollowSelf => StatusCode::FORBIDDEN,
            Self::Conflict | Self::UsernameTaken => StatusCode::CONFLICT,
            Self::ImageUploadFailed => StatusCode::BAD_GATEWAY,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{message}")]
    Known {
        code: ErrorCode,
        message: String,
        details: Option<serde_json::Value>,
    },

    #[error("internal server error")]
    Internal(#[from] anyhow::Error),

    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),
}

impl AppError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Known {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(code: ErrorCode, message: impl Into<String>, details: serde_json::Value) -> Self {
        Self::Known {
            code,
            message: message.into(),
            details: Some(details),
        }
    }

    pub fn authentication_required() -> Self {
        Self::new(ErrorCode::AuthenticationRequired, "authentication required, please sign in")
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::BadRequest, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Forbidden, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    /// The error code carried by this error, if it is a known one.
    pub fn error_code(&self) -> Option<ErrorCode> {
        match self {
            AppError::Known { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// True when the underlying database error is a unique-constraint violation.
    pub fn is_unique_violation(&self) -> bool {
        matches!(
            self,
            AppError::Database(diesel::result::Error::DatabaseError(
                DatabaseErrorKind::UniqueViolation,
                _
            ))
        )
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_response) = match &self {
            AppError::Known { code, message, details } => {
                let status = code.status_code();
                if status.is_server_error() {
                    tracing::error!(code = code.code(), error = %message, "request failed");
                }
                let mut resp = ApiErrorResponse::new(code.code(), message);
                if let Some(d) = details {
                    resp = resp.with_details(d.clone());
                }
                (status, resp)
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ApiErrorResponse::new("E0001", "internal server error"),
                )
            }
            AppError::Database(err) => {
                tracing::error!(error = %err, "database error");
                match err {
                    diesel::result::Error::NotFound => (
                        ErrorCode::NotFound.status_code(),
                        ApiErrorResponse::new(ErrorCode::NotFound.code(), "resource not found"),
                    ),
                    diesel::result::Error::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => (
                        ErrorCode::Conflict.status_code(),
                        ApiErrorResponse::new(ErrorCode::Conflict.code(), "resource already exists"),
                    ),
                    _ => (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        ApiErrorResponse::new("E0001", "database error"),
                    ),
                }
            }
        };

        (status, Json(error_response)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
