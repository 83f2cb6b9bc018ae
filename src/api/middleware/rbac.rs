use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use std::sync::Arc;

use super::auth::AuthUser;
use crate::api::AppState;
use crate::auth::rbac::{has_permission, Permission};
use crate::db::models::User;
use crate::error::AppError;

/// Axum extractor that requires a staff account.
/// Returns 403 Forbidden for authenticated non-staff users.
pub struct AdminUser(pub User);

impl AdminUser {
    pub fn require(&self, permission: Permission) -> Result<(), AppError> {
        if has_permission(&self.0, &permission) {
            Ok(())
        } else {
            Err(AppError::Forbidden(format!("{:?} requires a superuser", permission)))
        }
    }
}

impl FromRequestParts<Arc<AppState>> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        let AuthUser { user, .. } = AuthUser::from_request_parts(parts, state).await?;
        if has_permission(&user, &Permission::ViewUsers) {
            Ok(AdminUser(user))
        } else {
            Err(AppError::Forbidden("Staff account required".to_string()))
        }
    }
}
