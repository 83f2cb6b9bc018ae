use axum::{extract::State, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;

use crate::api::extract::ApiJson;
use crate::api::middleware::auth::AuthUser;
use crate::api::middleware::client_ip::ClientIp;
use crate::api::validators::{EmailValidator, ValidationError, Validator};
use crate::api::AppState;
use crate::auth::{backend, token};
use crate::db::tokens;
use crate::error::{AppError, AppResult};

#[derive(Deserialize)]
pub struct TokenRequest {
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
}

/// Exchange an email/password pair for a bearer token.
pub async fn obtain_token(
    State(state): State<Arc<AppState>>,
    ClientIp(ip): ClientIp,
    ApiJson(req): ApiJson<TokenRequest>,
) -> AppResult<Json<Value>> {
    EmailValidator::new().validate(&req.email)?;
    if req.password.is_empty() {
        return Err(ValidationError::new("U010", "password", "This field is required.").into());
    }

    check_throttle(&state, &ip)?;

    let Some(user) = backend::authenticate(&state.db, &req.email, &req.password).await? else {
        record_failure(&state, &ip);
        tracing::info!(ip = %ip, "token request rejected");
        return Err(AppError::InvalidCredentials);
    };

    state.login_attempts.remove(&ip);

    let plain = token::generate();
    let digest = token::digest(&plain, &state.token_secret);
    tokens::insert(&state.db, &digest, &user.id, state.token_expiry_hours).await?;
    tracing::info!(user_id = %user.id, "token issued");

    Ok(Json(json!({
        "token": plain,
        "expires_in": state.token_expiry_hours.saturating_mul(3600),
    })))
}

/// Revoke the token used for this request.
pub async fn logout(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> AppResult<Json<Value>> {
    tokens::revoke(&state.db, &auth.token_digest).await?;
    tracing::info!(user_id = %auth.user.id, "token revoked");
    Ok(Json(json!({"success": true})))
}

fn check_throttle(state: &AppState, ip: &str) -> AppResult<()> {
    let blocked = state
        .login_attempts
        .get(ip)
        .map(|entry| {
            let (count, window_start) = *entry;
            count >= state.max_login_failures && window_start.elapsed() < state.login_failure_window
        })
        .unwrap_or(false);

    if blocked {
        tracing::warn!(ip = %ip, "token requests throttled");
        return Err(AppError::TooManyRequests);
    }
    Ok(())
}

fn record_failure(state: &AppState, ip: &str) {
    let mut entry = state
        .login_attempts
        .entry(ip.to_string())
        .or_insert((0, Instant::now()));
    if entry.1.elapsed() >= state.login_failure_window {
        *entry = (0, Instant::now());
    }
    entry.0 += 1;
}
