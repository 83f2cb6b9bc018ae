use axum::{routing::{get, post}, Router};
use std::sync::Arc;
use super::AppState;
use super::handlers;

pub fn routes(state: Arc<AppState>) -> Router {
    Router::new()
        // Health (public)
        .route("/health", get(handlers::health::health_check))
        // Registration and token issuance (public)
        .route("/api/user/create", post(handlers::users::create))
        .route("/api/user/token", post(handlers::auth::obtain_token))
        // Self-service (bearer token)
        .route("/api/user/me", get(handlers::users::me).patch(handlers::users::update_me))
        .route("/api/user/logout", post(handlers::auth::logout))
        // Admin (staff; mutations superuser only)
        .route("/api/admin/users", get(handlers::admin::list).post(handlers::admin::create))
        .route(
            "/api/admin/users/{id}",
            get(handlers::admin::get)
                .put(handlers::admin::update)
                .delete(handlers::admin::delete),
        )
        .route("/api/admin/audit-log", get(handlers::audit_log::list))
        .with_state(state)
}
