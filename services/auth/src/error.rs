//! Custom error types for the authentication service
//!
//! Every failure of the credential verifier, the token service, and the
//! HTTP layer is one of these variants. All of them are terminal for the
//! current request; nothing is retried here.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// Custom error type for the authentication service
#[derive(Error, Debug)]
pub enum AuthError {
    /// Malformed input, caller's fault
    #[error("{0}")]
    Validation(String),

    /// Referenced user does not exist
    #[error("User not found")]
    NotFound,

    /// Uniqueness violation on registration
    #[error("Phone number already registered")]
    Conflict,

    /// Wrong code or password; must not reveal which check failed
    #[error("Invalid or expired credentials")]
    InvalidCredential,

    /// Account exists but password login was never enabled for it
    #[error("Password login not enabled for this account, use OTP login")]
    PasswordNotEnabled,

    /// Missing, invalid, or expired session token
    #[error("Not authenticated")]
    Unauthenticated,

    /// Authenticated but lacking the required role
    #[error("Admin only")]
    Forbidden,

    /// The code-delivery provider failed to send
    #[error("Failed to deliver verification code")]
    Delivery(anyhow::Error),

    /// The verification provider failed to answer
    #[error("Verification provider unavailable")]
    Provider(anyhow::Error),

    /// Database error
    #[error("Database error")]
    Database(#[from] common::error::DatabaseError),

    /// Everything else
    #[error("Internal server error")]
    Internal(anyhow::Error),
}

impl AuthError {
    fn status(&self) -> StatusCode {
        match self {
            AuthError::Validation(_) => StatusCode::BAD_REQUEST,
            AuthError::NotFound => StatusCode::NOT_FOUND,
            AuthError::Conflict => StatusCode::CONFLICT,
            AuthError::InvalidCredential => StatusCode::UNAUTHORIZED,
            AuthError::PasswordNotEnabled => StatusCode::BAD_REQUEST,
            AuthError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AuthError::Forbidden => StatusCode::FORBIDDEN,
            AuthError::Delivery(_) | AuthError::Provider(_) => StatusCode::BAD_GATEWAY,
            AuthError::Database(_) | AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// User-facing message; internal detail stays in the logs
    fn public_message(&self) -> String {
        match self {
            AuthError::Database(_) | AuthError::Internal(_) => "Internal server error".to_string(),
            AuthError::Delivery(_) => "Failed to deliver verification code".to_string(),
            AuthError::Provider(_) => "Verification provider unavailable".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            tracing::error!("Request failed: {:?}", self);
        }

        let body = Json(json!({
            "error": self.public_message(),
        }));

        (status, body).into_response()
    }
}

/// Type alias for authentication results
pub type AuthResult<T> = Result<T, AuthError>;
