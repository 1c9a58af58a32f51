use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// The application's error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// Unknown email or wrong password. Deliberately undifferentiated.
    #[error("Invalid email or password")]
    InvalidCredentials,

    /// The refresh token is missing, expired or was already rotated away.
    #[error("Refresh token is invalid or expired")]
    TokenRefresh,

    /// No valid access token was presented.
    #[error("Authentication required")]
    Unauthenticated,

    /// A resource not found error.
    #[error("Resource not found")]
    NotFound,

    /// A uniqueness conflict, e.g. an email that is already registered.
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// A validation error.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A rate limit exceeded error.
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    /// A database error.
    #[error("Database error: {0}")]
    Database(#[from] tokio_postgres::Error),

    /// The connection pool could not hand out a connection.
    #[error("Database pool error: {0}")]
    Pool(#[from] deadpool_postgres::PoolError),

    /// A Redis error.
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// An internal server error.
    #[error("Internal server error: {0}")]
    Internal(String),
}

/// A `Result` type that uses `AppError` as the error type.
pub type Result<T> = std::result::Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::InvalidCredentials => {
                tracing::warn!("Login rejected: invalid credentials");
                (StatusCode::UNAUTHORIZED, self.to_string())
            }

            AppError::TokenRefresh => {
                tracing::warn!("Token refresh rejected");
                (StatusCode::UNAUTHORIZED, self.to_string())
            }

            AppError::Unauthenticated => {
                tracing::debug!("Unauthenticated request");
                (StatusCode::UNAUTHORIZED, self.to_string())
            }

            AppError::NotFound => {
                tracing::debug!("Resource not found");
                (StatusCode::NOT_FOUND, self.to_string())
            }

            AppError::AlreadyExists(ref msg) => {
                tracing::debug!("Conflict: {}", msg);
                (StatusCode::CONFLICT, msg.clone())
            }

            AppError::Validation(ref msg) => {
                tracing::debug!("Validation error: {}", msg);
                (StatusCode::BAD_REQUEST, msg.clone())
            }

            AppError::RateLimitExceeded(ref msg) => {
                tracing::warn!("Rate limit exceeded: {}", msg);
                (StatusCode::TOO_MANY_REQUESTS, msg.clone())
            }

            AppError::Database(ref e) => {
                tracing::error!("Database error: {}", e);
                unavailable()
            }

            AppError::Pool(ref e) => {
                tracing::error!("Database pool error: {}", e);
                unavailable()
            }

            AppError::Redis(ref e) => {
                tracing::error!("Redis error: {}", e);
                unavailable()
            }

            AppError::Internal(ref msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
        };

        let body = sonic_rs::to_string(&sonic_rs::json!({
            "error": message
        }))
        .unwrap_or_else(|_| r#"{"error":"Internal server error"}"#.to_string());

        (
            status,
            [(http::header::CONTENT_TYPE, "application/json")],
            body,
        )
            .into_response()
    }
}

fn unavailable() -> (StatusCode, String) {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        "Service temporarily unavailable".to_string(),
    )
}
