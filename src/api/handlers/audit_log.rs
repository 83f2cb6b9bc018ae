use axum::{extract::{Query, State}, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::api::AppState;
use crate::api::handlers::PageWindow;
use crate::api::middleware::rbac::AdminUser;
use crate::auth::rbac::Permission;
use crate::db::audit;
use crate::error::AppResult;

#[derive(Deserialize)]
pub struct AuditLogParams {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub action: Option<String>,
}

pub async fn list(
    State(state): State<Arc<AppState>>,
    admin: AdminUser,
    Query(params): Query<AuditLogParams>,
) -> AppResult<Json<Value>> {
    admin.require(Permission::ViewAuditLog)?;

    let window = PageWindow::resolve(params.page, params.per_page)?;
    let (rows, total) =
        audit::list(&state.db, params.action.as_deref(), window.per_page, window.offset).await?;

    Ok(Json(json!({
        "data": rows,
        "total": total,
        "page": window.page,
        "per_page": window.per_page,
    })))
}
