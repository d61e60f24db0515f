//! Account lifecycle endpoints: signup, password change, email change,
//! forgot password, confirmation, account deletion.

use axum::{
    extract::{rejection::JsonRejection, Path},
    http::{HeaderMap, StatusCode},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use super::{authenticate, require_email, require_password};
use crate::error::{Error, Result};
use crate::gateway::AppState;

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct SignupResponse {
    pub id: Uuid,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangeEmailRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct DeleteAccountRequest {
    pub password: String,
}

/// `POST /signup`
pub async fn signup(
    Extension(state): Extension<Arc<AppState>>,
    payload: std::result::Result<Json<SignupRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<SignupResponse>)> {
    let Json(body) = payload.map_err(|err| Error::validation(err.body_text()))?;
    require_email(&body.email)?;
    require_password(&body.password)?;

    let id = state.auth.signup(&body.email, &body.password).await?;
    Ok((StatusCode::CREATED, Json(SignupResponse { id })))
}

/// `POST /setpw`
pub async fn change_password(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
    payload: std::result::Result<Json<ChangePasswordRequest>, JsonRejection>,
) -> Result<StatusCode> {
    let identity = authenticate(&state, &headers)?;
    let Json(body) = payload.map_err(|err| Error::validation(err.body_text()))?;
    require_password(&body.old_password)?;
    require_password(&body.new_password)?;

    state
        .auth
        .change_password(identity.user_id, &body.old_password, &body.new_password)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /changeemail` — the address only changes once confirmed.
pub async fn change_email(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
    payload: std::result::Result<Json<ChangeEmailRequest>, JsonRejection>,
) -> Result<StatusCode> {
    let identity = authenticate(&state, &headers)?;
    let Json(body) = payload.map_err(|err| Error::validation(err.body_text()))?;
    require_email(&body.email)?;
    require_password(&body.password)?;

    state
        .auth
        .change_email(identity.user_id, &body.email, &body.password)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /initpwreset`
pub async fn init_forgot_password(
    Extension(state): Extension<Arc<AppState>>,
    payload: std::result::Result<Json<ForgotPasswordRequest>, JsonRejection>,
) -> Result<StatusCode> {
    let Json(body) = payload.map_err(|err| Error::validation(err.body_text()))?;
    require_email(&body.email)?;

    state.auth.init_forgot_password(&body.email).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /confirm/{token}` — consumes a pending action.
pub async fn confirm(
    Extension(state): Extension<Arc<AppState>>,
    Path(token): Path<String>,
) -> Result<StatusCode> {
    state.auth.confirm(&token).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /delete` — deletes the account and its refresh tokens.
pub async fn delete_account(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
    payload: std::result::Result<Json<DeleteAccountRequest>, JsonRejection>,
) -> Result<StatusCode> {
    let identity = authenticate(&state, &headers)?;
    let Json(body) = payload.map_err(|err| Error::validation(err.body_text()))?;
    require_password(&body.password)?;

    state
        .auth
        .delete_account(identity.user_id, &body.password)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
