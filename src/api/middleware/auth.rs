use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use std::sync::Arc;

use crate::api::AppState;
use crate::auth::token;
use crate::db::models::User;
use crate::db::tokens;
use crate::error::AppError;

/// Axum extractor that resolves a `Bearer` token to its active owner.
/// Add this as a handler parameter to require authentication.
pub struct AuthUser {
    pub user: User,
    /// Digest of the presented token, used to revoke it on logout.
    pub token_digest: String,
}

impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or(AppError::AuthFailed)?;

        let presented = auth_header
            .strip_prefix("Bearer ")
            .or_else(|| auth_header.strip_prefix("Token "))
            .map(str::trim)
            .ok_or(AppError::AuthFailed)?;

        if !token::looks_valid(presented) {
            return Err(AppError::AuthFailed);
        }

        let token_digest = token::digest(presented, &state.token_secret);
        let user = tokens::find_user(&state.db, &token_digest)
            .await?
            .ok_or(AppError::AuthFailed)?;

        if !user.is_active {
            return Err(AppError::AuthFailed);
        }

        Ok(AuthUser { user, token_digest })
    }
}
