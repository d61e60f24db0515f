//! Session endpoints: login, renew, logout, ping.

use axum::{
    extract::rejection::JsonRejection,
    http::{HeaderMap, StatusCode},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{authenticate, require_email, require_password};
use crate::auth::{LoginOutcome, SessionTokens};
use crate::error::{Error, Result};
use crate::gateway::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    pub passcode: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub access_token: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub refresh_token: String,
    #[serde(rename = "requireOTP", skip_serializing_if = "std::ops::Not::not")]
    pub require_otp: bool,
}

impl From<SessionTokens> for LoginResponse {
    fn from(tokens: SessionTokens) -> Self {
        Self {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            require_otp: false,
        }
    }
}

impl LoginResponse {
    const fn second_factor_required() -> Self {
        Self {
            access_token: String::new(),
            refresh_token: String::new(),
            require_otp: true,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTokenRequest {
    pub refresh_token: String,
}

/// `POST /login`
pub async fn login(
    Extension(state): Extension<Arc<AppState>>,
    payload: std::result::Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>> {
    let Json(body) = payload.map_err(|err| Error::validation(err.body_text()))?;
    require_email(&body.email)?;
    require_password(&body.password)?;

    let outcome = state
        .auth
        .login(&body.email, &body.password, body.passcode.as_deref())
        .await?;
    match outcome {
        LoginOutcome::Success(tokens) => Ok(Json(tokens.into())),
        LoginOutcome::SecondFactorRequired => Ok(Json(LoginResponse::second_factor_required())),
    }
}

/// `POST /renew` — requires a valid access token; returns a fresh access
/// token alongside the unchanged refresh token.
pub async fn renew(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
    payload: std::result::Result<Json<RefreshTokenRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>> {
    let identity = authenticate(&state, &headers)?;
    let Json(body) = payload.map_err(|err| Error::validation(err.body_text()))?;

    let tokens = state
        .auth
        .renew(identity.user_id, &body.refresh_token)
        .await?;
    Ok(Json(tokens.into()))
}

/// `POST /logout`
pub async fn logout(
    Extension(state): Extension<Arc<AppState>>,
    payload: std::result::Result<Json<RefreshTokenRequest>, JsonRejection>,
) -> Result<StatusCode> {
    let Json(body) = payload.map_err(|err| Error::validation(err.body_text()))?;
    state.auth.logout(&body.refresh_token).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /ping` — liveness probe for a bearer token.
pub async fn ping(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<StatusCode> {
    authenticate(&state, &headers)?;
    Ok(StatusCode::NO_CONTENT)
}
