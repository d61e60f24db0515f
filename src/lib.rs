//! # Authgate
//!
//! `authgate` is an authenticating reverse proxy. It sits in front of an
//! arbitrary backend HTTP service and adds user authentication, access/refresh
//! token management, optional TOTP second-factor authentication, and
//! self-service account lifecycle flows (signup confirmation, password reset,
//! email change) without the backend having to implement any of it.
//!
//! ## Request handling
//!
//! Authentication-domain endpoints live under a configurable base path
//! (default `/auth/`) and are always reachable. Every other request hits the
//! proxy gate: route policy decides whether a valid bearer token is required,
//! rejected requests are never forwarded, and on success the verified user id
//! is injected into the `X-Auth-UserID` header after stripping any inbound
//! value (preventing identity spoofing).
//!
//! ## Trust boundaries
//!
//! Access tokens are stateless HS512 JWTs: logout revokes only the refresh
//! token, outstanding access tokens stay valid until natural expiry. TOTP
//! secrets are stored encrypted (ChaCha20-Poly1305) with a key configured at
//! startup.

pub mod auth;
pub mod cli;
pub mod config;
pub mod error;
pub mod gateway;
pub mod notify;
pub mod password;
pub mod pending;
pub mod session;
pub mod store;
pub mod token;
pub mod totp;
pub mod util;

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_user_agent_format() {
        assert!(APP_USER_AGENT.starts_with(env!("CARGO_PKG_NAME")));
        assert!(APP_USER_AGENT.contains(env!("CARGO_PKG_VERSION")));
    }
}
