//! Magic link authentication routes.

use std::sync::Arc;

use axum::{Json, Router, extract::State, extract::rejection::JsonRejection, routing::post};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    adapters::http::app_state::AppState, app_error::AppResult, use_cases::auth::AuthUseCases,
};

#[derive(Deserialize)]
struct RequestMagicLinkPayload {
    #[serde(default)]
    email: String,
}

#[derive(Serialize)]
struct RequestMagicLinkResponse {
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    dev_login_url: Option<String>,
}

#[derive(Deserialize)]
struct VerifyPayload {
    #[serde(default)]
    token: String,
}

#[derive(Serialize)]
struct VerifyResponse {
    access_token: String,
    user: VerifiedUser,
}

#[derive(Serialize)]
struct VerifiedUser {
    id: Uuid,
    email: String,
}

#[derive(Serialize)]
struct OkResponse {
    ok: bool,
}

/// POST /auth/magic-link
/// Issues a login link for the email, creating the account on first use.
/// The link itself is only echoed back in dev mode.
async fn request_magic_link(
    State(auth): State<Arc<AuthUseCases>>,
    payload: Result<Json<RequestMagicLinkPayload>, JsonRejection>,
) -> AppResult<Json<RequestMagicLinkResponse>> {
    let Json(payload) = payload?;
    let issued = auth.request_magic_link(&payload.email).await?;
    Ok(Json(RequestMagicLinkResponse {
        ok: true,
        dev_login_url: issued.dev_login_url,
    }))
}

/// POST /auth/verify
/// Redeems a magic link token for an access token.
async fn verify(
    State(auth): State<Arc<AuthUseCases>>,
    payload: Result<Json<VerifyPayload>, JsonRejection>,
) -> AppResult<Json<VerifyResponse>> {
    let Json(payload) = payload?;
    let session = auth.redeem_magic_link(&payload.token).await?;
    Ok(Json(VerifyResponse {
        access_token: session.access_token.expose_secret().to_owned(),
        user: VerifiedUser {
            id: session.user_id,
            email: session.email,
        },
    }))
}

/// POST /auth/logout
/// There is no server-side session to drop.
async fn logout() -> Json<OkResponse> {
    Json(OkResponse { ok: true })
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/magic-link", post(request_magic_link))
        .route("/verify", post(verify))
        .route("/logout", post(logout))
}
