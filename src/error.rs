/**
 * API Errors
 * One error type for every handler, rendered as `{ error, message? }`
 */
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::identity::IdentityError;
use crate::store::StoreError;

/// Error body returned by every endpoint
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Success response (for delete and similar)
#[derive(Debug, Serialize, Deserialize)]
pub struct SuccessResponse {
    pub success: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{error}")]
    Invalid { error: String, message: String },

    #[error("{0}")]
    Unauthorized(String),

    #[error("Not found")]
    NotFound,

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    PayloadTooLarge(String),

    #[error("{0}")]
    TooManyRequests(String),

    /// Fails the request with a caller-facing message; the detail is only logged.
    #[error("{public}: {detail}")]
    Internal { public: String, detail: String },

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        ApiError::BadRequest(msg.into())
    }

    pub fn internal(public: impl Into<String>, detail: impl std::fmt::Display) -> Self {
        ApiError::Internal {
            public: public.into(),
            detail: detail.to_string(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) | ApiError::Invalid { .. } => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::TooManyRequests(_) => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Internal { .. } | ApiError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            ApiError::Invalid { error, message } => ErrorResponse {
                error,
                message: Some(message),
            },
            ApiError::Internal { public, detail } => {
                tracing::error!("{}: {}", public, detail);
                ErrorResponse {
                    error: public,
                    message: None,
                }
            }
            ApiError::Store(e) => {
                tracing::error!("Store error: {}", e);
                ErrorResponse {
                    error: "Request failed".to_string(),
                    message: None,
                }
            }
            other => ErrorResponse {
                error: other.to_string(),
                message: None,
            },
        };
        (status, Json(body)).into_response()
    }
}

impl From<IdentityError> for ApiError {
    fn from(err: IdentityError) -> Self {
        match err {
            IdentityError::InvalidCredentials | IdentityError::InvalidToken => {
                ApiError::Unauthorized(err.to_string())
            }
            IdentityError::Throttled => ApiError::TooManyRequests(err.to_string()),
            IdentityError::WrongCurrentPassword
            | IdentityError::WeakPassword
            | IdentityError::PasswordMismatch => ApiError::BadRequest(err.to_string()),
            IdentityError::Store(e) => ApiError::Store(e),
            other => ApiError::internal("Authentication service temporarily unavailable", other),
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_of(err: ApiError) -> (StatusCode, ErrorResponse) {
        let res = err.into_response();
        let status = res.status();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_store_errors_are_hidden_behind_generic_message() {
        let (status, body) = body_of(ApiError::Store(StoreError::Unavailable(
            "connection refused to 10.0.0.5".to_string(),
        )))
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.error, "Request failed");
        assert!(body.message.is_none());
    }

    #[tokio::test]
    async fn test_invalid_carries_message() {
        let (status, body) = body_of(ApiError::Invalid {
            error: "Invalid slug".to_string(),
            message: "Use lowercase letters".to_string(),
        })
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.error, "Invalid slug");
        assert_eq!(body.message.as_deref(), Some("Use lowercase letters"));
    }

    #[tokio::test]
    async fn test_internal_shows_public_text_only() {
        let (status, body) = body_of(ApiError::internal("Failed to send", "both legs down")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.error, "Failed to send");
    }
}
