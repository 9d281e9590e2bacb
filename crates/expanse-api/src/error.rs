use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use expanse_types::envelope::ErrorEnvelope;
use serde_json::json;

/// Every failure a handler can surface, each mapped to one status code and
/// one stable envelope message the frontend matches on.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0} Not Found")]
    NotFound(&'static str),

    #[error("No Posts Found for the Course")]
    NoPosts,

    #[error("Invalid Authorization header format")]
    MissingAuth,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Teacher role required")]
    TeacherOnly,

    #[error("Only students can take quizzes")]
    StudentOnly,

    #[error("User not enrolled in course")]
    NotEnrolled,

    #[error("Only the author can modify this")]
    NotAuthor,

    #[error("{0}")]
    Validation(String),

    #[error("Unknown user ids")]
    UnknownUsers(Vec<String>),

    #[error("{0}")]
    Conflict(String),

    #[error("Upload exceeds size limit")]
    PayloadTooLarge,

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::NotFound(_) | ApiError::NoPosts => StatusCode::NOT_FOUND,
            ApiError::MissingAuth | ApiError::InvalidToken | ApiError::InvalidCredentials => {
                StatusCode::UNAUTHORIZED
            }
            ApiError::TeacherOnly
            | ApiError::StudentOnly
            | ApiError::NotEnrolled
            | ApiError::NotAuthor => StatusCode::FORBIDDEN,
            ApiError::Validation(_) | ApiError::UnknownUsers(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let details = match &self {
            ApiError::UnknownUsers(ids) => json!({ "unknown_ids": ids }),
            _ => json!({}),
        };

        // Internal causes are logged, never sent to the client.
        let message = match &self {
            ApiError::Internal(e) => {
                tracing::error!("Internal error: {:#}", e);
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        (status, Json(ErrorEnvelope::new(message, details))).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
