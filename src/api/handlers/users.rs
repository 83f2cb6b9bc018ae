use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::api::extract::ApiJson;
use crate::api::middleware::auth::AuthUser;
use crate::api::validators::{EmailValidator, NameValidator, PasswordValidator, Validator};
use crate::api::AppState;
use crate::db::models::PublicUser;
use crate::db::{tokens, users};
use crate::error::AppResult;

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateMeRequest {
    pub name: Option<String>,
    pub password: Option<String>,
}

/// Public registration. The response never carries the password.
pub async fn create(
    State(state): State<Arc<AppState>>,
    ApiJson(body): ApiJson<CreateUserRequest>,
) -> AppResult<(StatusCode, Json<PublicUser>)> {
    EmailValidator::new().validate(&body.email)?;
    PasswordValidator::new(state.password_min_length).validate(&body.password)?;
    NameValidator::required().validate(&body.name)?;

    let user = users::create_user(&state.db, &body.email, &body.password, &body.name).await?;
    Ok((StatusCode::CREATED, Json(user.public())))
}

pub async fn me(auth: AuthUser) -> AppResult<Json<Value>> {
    Ok(Json(profile(&auth.user)))
}

pub async fn update_me(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    ApiJson(body): ApiJson<UpdateMeRequest>,
) -> AppResult<Json<Value>> {
    let AuthUser { mut user, token_digest } = auth;

    if let Some(name) = &body.name {
        NameValidator::required().validate(name)?;
        user.name = name.trim().to_string();
    }

    let password_changed = match &body.password {
        Some(raw) => {
            PasswordValidator::new(state.password_min_length).validate(raw)?;
            user.password = users::hash_password(raw).await?;
            true
        }
        None => false,
    };

    users::update(&state.db, &mut user).await?;

    if password_changed {
        let revoked = tokens::revoke_others(&state.db, &user.id, &token_digest).await?;
        tracing::info!(user_id = %user.id, revoked, "password changed");
    }

    Ok(Json(profile(&user)))
}

fn profile(user: &crate::db::models::User) -> Value {
    json!({
        "id": user.id,
        "email": user.email,
        "name": user.name,
    })
}
