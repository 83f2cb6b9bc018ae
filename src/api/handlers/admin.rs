//! Admin user management: changelist, change, add and delete.
//!
//! Any staff account may read; every mutation needs a superuser and is
//! recorded in the audit log.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::api::extract::ApiJson;
use crate::api::handlers::PageWindow;
use crate::api::middleware::client_ip::ClientIp;
use crate::api::middleware::rbac::AdminUser;
use crate::api::validators::{EmailValidator, NameValidator, PasswordValidator, Validator};
use crate::api::AppState;
use crate::auth::rbac::Permission;
use crate::db::models::{normalize_email, User};
use crate::db::users::{self, UserFlags};
use crate::db::{audit, tokens};
use crate::error::{AppError, AppResult};

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub search: Option<String>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct AdminCreateUserRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub name: String,
    pub is_active: Option<bool>,
    pub is_staff: Option<bool>,
    pub is_superuser: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct AdminUpdateUserRequest {
    pub email: Option<String>,
    pub name: Option<String>,
    pub password: Option<String>,
    pub is_active: Option<bool>,
    pub is_staff: Option<bool>,
    pub is_superuser: Option<bool>,
}

pub async fn list(
    State(state): State<Arc<AppState>>,
    admin: AdminUser,
    Query(params): Query<ListParams>,
) -> AppResult<Json<Value>> {
    admin.require(Permission::ViewUsers)?;

    let window = PageWindow::resolve(params.page, params.per_page)?;
    let (rows, total) =
        users::list(&state.db, params.search.as_deref(), window.per_page, window.offset).await?;

    Ok(Json(json!({
        "data": rows,
        "total": total,
        "page": window.page,
        "per_page": window.per_page,
    })))
}

pub async fn get(
    State(state): State<Arc<AppState>>,
    admin: AdminUser,
    Path(id): Path<String>,
) -> AppResult<Json<User>> {
    admin.require(Permission::ViewUsers)?;
    Ok(Json(load(&state, &id).await?))
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    admin: AdminUser,
    ClientIp(ip): ClientIp,
    ApiJson(body): ApiJson<AdminCreateUserRequest>,
) -> AppResult<(StatusCode, Json<User>)> {
    admin.require(Permission::AddUsers)?;

    EmailValidator::new().validate(&body.email)?;
    PasswordValidator::new(state.password_min_length).validate(&body.password)?;
    NameValidator::optional().validate(&body.name)?;

    let flags = UserFlags {
        is_active: body.is_active.unwrap_or(true),
        is_staff: body.is_staff.unwrap_or(false),
        is_superuser: body.is_superuser.unwrap_or(false),
    };
    let user = users::create_with_flags(&state.db, &body.email, &body.password, &body.name, flags).await?;

    audit::log_action(
        state.db.clone(),
        admin.0.id.clone(),
        admin.0.email.clone(),
        "create",
        "user",
        Some(user.id.clone()),
        Some(user.email.clone()),
        ip,
    );

    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn update(
    State(state): State<Arc<AppState>>,
    admin: AdminUser,
    ClientIp(ip): ClientIp,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<AdminUpdateUserRequest>,
) -> AppResult<Json<User>> {
    admin.require(Permission::ChangeUsers)?;

    let mut user = load(&state, &id).await?;
    let mut changed: Vec<&str> = Vec::new();

    if let Some(email) = &body.email {
        EmailValidator::new().validate(email)?;
        let email = normalize_email(email);
        if email != user.email {
            user.email = email;
            changed.push("email");
        }
    }
    if let Some(name) = &body.name {
        NameValidator::optional().validate(name)?;
        user.name = name.trim().to_string();
        changed.push("name");
    }
    let password_changed = match &body.password {
        Some(raw) => {
            PasswordValidator::new(state.password_min_length).validate(raw)?;
            user.password = users::hash_password(raw).await?;
            changed.push("password");
            true
        }
        None => false,
    };
    if let Some(v) = body.is_active {
        user.is_active = v;
        changed.push("is_active");
    }
    if let Some(v) = body.is_staff {
        user.is_staff = v;
        changed.push("is_staff");
    }
    if let Some(v) = body.is_superuser {
        user.is_superuser = v;
        changed.push("is_superuser");
    }

    if user.is_superuser && !user.is_staff {
        return Err(AppError::Validation("A superuser must also be staff".to_string()));
    }

    // rejects demoting the last active superuser
    users::update(&state.db, &mut user).await?;

    if password_changed || !user.is_active {
        let revoked = tokens::revoke_all_for_user(&state.db, &user.id).await?;
        tracing::info!(user_id = %user.id, revoked, "tokens revoked after admin change");
    }

    audit::log_action(
        state.db.clone(),
        admin.0.id.clone(),
        admin.0.email.clone(),
        "update",
        "user",
        Some(user.id.clone()),
        Some(changed.join(",")),
        ip,
    );

    Ok(Json(user))
}

pub async fn delete(
    State(state): State<Arc<AppState>>,
    admin: AdminUser,
    ClientIp(ip): ClientIp,
    Path(id): Path<String>,
) -> AppResult<Json<Value>> {
    admin.require(Permission::DeleteUsers)?;

    if id == admin.0.id {
        return Err(AppError::Validation("You cannot delete your own account".to_string()));
    }

    let user = load(&state, &id).await?;
    if !users::delete(&state.db, &id).await? {
        return Err(AppError::NotFound(format!("User {} not found", id)));
    }

    audit::log_action(
        state.db.clone(),
        admin.0.id.clone(),
        admin.0.email.clone(),
        "delete",
        "user",
        Some(id),
        Some(user.email),
        ip,
    );

    Ok(Json(json!({"success": true})))
}

async fn load(state: &AppState, id: &str) -> AppResult<User> {
    users::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", id)))
}
