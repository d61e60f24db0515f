//! Request handlers for the authentication-domain endpoints, plus the
//! bearer-token authentication shared with the proxy gate.

pub mod account;
pub mod otp;
pub mod session;

use axum::http::{header::AUTHORIZATION, HeaderMap};
use tracing::warn;
use uuid::Uuid;

use super::AppState;
use crate::error::{Error, Result};
use crate::util::valid_email;

/// Verified caller identity extracted from a bearer access token.
#[derive(Debug, Clone)]
pub struct Identity {
    pub user_id: Uuid,
}

/// Validate the `Authorization: Bearer` header and return the caller's
/// identity. Purely stateless; no store lookup.
///
/// # Errors
/// Returns [`Error::Authentication`] for a missing, malformed, invalid or
/// expired token.
pub fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<Identity> {
    let Some(value) = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()) else {
        warn!("request rejected: missing authorization header");
        return Err(Error::authentication("missing bearer token"));
    };
    let Some(token) = value.strip_prefix("Bearer ") else {
        warn!("request rejected: malformed authorization header");
        return Err(Error::authentication("missing bearer token"));
    };

    let claims = state.codec.validate(token)?;
    let user_id = Uuid::parse_str(&claims.sub)
        .map_err(|_| Error::authentication("invalid access token"))?;
    Ok(Identity { user_id })
}

/// Request-body email check; bounds on format only, uniqueness is the
/// service's concern.
pub(crate) fn require_email(email: &str) -> Result<()> {
    if valid_email(email.trim()) {
        Ok(())
    } else {
        Err(Error::validation("invalid email address"))
    }
}

/// Passwords must be 8 to 32 characters.
pub(crate) fn require_password(password: &str) -> Result<()> {
    if (8..=32).contains(&password.len()) {
        Ok(())
    } else {
        Err(Error::validation("password must be 8 to 32 characters"))
    }
}
