/// Unified error types for the purrboard gallery service
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for the gallery service
#[derive(Error, Debug)]
pub enum GalleryError {
    /// Upstream API reachable but returned a non-success status
    #[error("Upstream returned {status}: {message}")]
    Transport { status: u16, message: String },

    /// Upstream API unreachable (connect failure, timeout, bad body)
    #[error("Upstream request failed: {0}")]
    Upstream(#[from] reqwest::Error),

    /// Remove-vote attempted but the user has no vote on that image
    #[error("No vote found for image")]
    VoteNotFound,

    /// Favourite attempted on an already-favourited image
    #[error("Image already favourited")]
    AlreadyFavourited,

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Rate limiting errors
    #[error("Rate limit exceeded")]
    RateLimitExceeded { retry_after: std::time::Duration },

    /// Internal server errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// API error response format
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorResponse {
    pub error: String,
    pub message: String,
}

/// Convert GalleryError to HTTP response
impl IntoResponse for GalleryError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            GalleryError::Validation(_) => (
                StatusCode::BAD_REQUEST,
                "InvalidRequest",
                self.to_string(),
            ),
            GalleryError::VoteNotFound => (
                StatusCode::NOT_FOUND,
                "NoVoteFound",
                self.to_string(),
            ),
            GalleryError::AlreadyFavourited => (
                StatusCode::CONFLICT,
                "AlreadyFavourited",
                self.to_string(),
            ),
            GalleryError::RateLimitExceeded { .. } => (
                StatusCode::TOO_MANY_REQUESTS,
                "RateLimitExceeded",
                "Rate limit exceeded".to_string(),
            ),
            GalleryError::Transport { .. } => (
                StatusCode::BAD_GATEWAY,
                "UpstreamError",
                self.to_string(),
            ),
            GalleryError::Upstream(_) => (
                StatusCode::BAD_GATEWAY,
                "UpstreamUnavailable",
                "Upstream image API unavailable".to_string(),
            ),
            GalleryError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "InternalServerError",
                "Internal server error".to_string(), // Don't leak details
            ),
        };

        let body = Json(ApiErrorResponse {
            error: error_code.to_string(),
            message,
        });

        (status, body).into_response()
    }
}

/// Result type alias for gallery operations
pub type GalleryResult<T> = Result<T, GalleryError>;
