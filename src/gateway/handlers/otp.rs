//! TOTP second-factor endpoints. Registered only when TOTP is enabled in
//! the configuration.

use anyhow::anyhow;
use axum::{
    extract::rejection::JsonRejection,
    http::{HeaderMap, StatusCode},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::authenticate;
use crate::error::{Error, Result};
use crate::gateway::AppState;
use crate::totp::TotpManager;

#[derive(Debug, Serialize)]
pub struct OtpInitResponse {
    pub secret: String,
    pub image: String,
}

#[derive(Debug, Deserialize)]
pub struct OtpConfirmRequest {
    pub passcode: String,
}

fn manager(state: &AppState) -> Result<&TotpManager> {
    state
        .totp
        .as_ref()
        .ok_or_else(|| Error::Internal(anyhow!("TOTP routes registered without manager")))
}

/// `POST /otp/init` — begin enrollment; `otpEnabled` stays false until the
/// first passcode is confirmed.
pub async fn init(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<OtpInitResponse>> {
    let identity = authenticate(&state, &headers)?;
    let mut user = state.auth.require_user(identity.user_id).await?;

    let enrollment = manager(&state)?.init(&mut user)?;
    state.users.update(user).await?;
    Ok(Json(OtpInitResponse {
        secret: enrollment.secret,
        image: enrollment.image,
    }))
}

/// `POST /otp/confirm` — verify the first passcode and activate the second
/// factor.
pub async fn confirm(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
    payload: std::result::Result<Json<OtpConfirmRequest>, JsonRejection>,
) -> Result<StatusCode> {
    let identity = authenticate(&state, &headers)?;
    let Json(body) = payload.map_err(|err| Error::validation(err.body_text()))?;
    if body.passcode.trim().is_empty() {
        return Err(Error::validation("passcode must not be empty"));
    }

    let mut user = state.auth.require_user(identity.user_id).await?;
    manager(&state)?.confirm(&mut user, body.passcode.trim())?;
    state.users.update(user).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /otp/disable` — unconditionally clear the secret and flag.
pub async fn disable(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<StatusCode> {
    let identity = authenticate(&state, &headers)?;
    let mut user = state.auth.require_user(identity.user_id).await?;

    manager(&state)?.disable(&mut user);
    state.users.update(user).await?;
    Ok(StatusCode::NO_CONTENT)
}
