//! Domain error taxonomy, translated to HTTP statuses at the gateway edge.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed or out-of-range request body -> 400.
    #[error("{0}")]
    Validation(String),

    /// Bad credentials, missing/invalid/expired token, disabled or
    /// unconfirmed account, failed second factor -> 401.
    #[error("{0}")]
    Authentication(String),

    /// Duplicate email or colliding pending action -> 409.
    #[error("{0}")]
    Conflict(String),

    /// Unknown confirmation token -> 404.
    #[error("not found")]
    NotFound,

    /// Unexpected internal state -> 500. Detail is logged, never exposed.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl Error {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn authentication(message: impl Into<String>) -> Self {
        Self::Authentication(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Authentication(_) => StatusCode::UNAUTHORIZED,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            Self::Internal(err) => {
                error!("internal error: {err:?}");
                "internal server error".to_string()
            }
            other => other.to_string(),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            Error::validation("bad body").status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            Error::authentication("bad credentials").status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            Error::conflict("email already registered").status(),
            StatusCode::CONFLICT
        );
        assert_eq!(Error::NotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            Error::Internal(anyhow::anyhow!("boom")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_internal_detail_not_exposed() {
        let response = Error::Internal(anyhow::anyhow!("store exploded")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
