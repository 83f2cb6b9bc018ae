use anyhow::Result;
use axum::Router;
use axum::http::{HeaderValue, Method, header};
use dashmap::DashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::{AuthConfig, Config};
use crate::db::DbPool;

pub mod extract;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod validators;

/// How often expired token rows are swept.
const TOKEN_REAP_INTERVAL: Duration = Duration::from_secs(3600);
/// How often lapsed login-failure windows are dropped from memory.
const THROTTLE_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

pub struct AppState {
    pub db: DbPool,
    pub token_secret: String,
    pub token_expiry_hours: u64,
    pub password_min_length: usize,
    pub max_login_failures: u32,
    pub login_failure_window: Duration,
    /// Token endpoint failures: ip → (failure_count, window_start)
    pub login_attempts: DashMap<String, (u32, Instant)>,
}

impl AppState {
    pub fn new(db: DbPool, auth: &AuthConfig) -> Self {
        Self {
            db,
            token_secret: auth.token_secret.clone(),
            token_expiry_hours: auth.token_expiry_hours,
            password_min_length: auth.password_min_length,
            max_login_failures: auth.max_login_failures,
            login_failure_window: Duration::from_secs(auth.login_failure_window_secs),
            login_attempts: DashMap::new(),
        }
    }

    /// Forget clients whose failure window has elapsed. Returns the number
    /// of entries still tracked.
    pub fn prune_login_attempts(&self) -> usize {
        let window = self.login_failure_window;
        self.login_attempts
            .retain(|_, (_, window_start)| window_start.elapsed() < window);
        self.login_attempts.len()
    }
}

fn spawn_throttle_sweeper(state: Arc<AppState>, every: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            let remaining = state.prune_login_attempts();
            tracing::debug!(remaining, "login throttle entries pruned");
        }
    })
}

pub async fn serve(cfg: Config, db: DbPool) -> Result<()> {
    let bind_addr = format!("{}:{}", cfg.api.bind, cfg.api.port);
    let state = Arc::new(AppState::new(db.clone(), &cfg.auth));
    let cors = build_cors_layer(&cfg.api.cors_allowed_origins);
    let sweeper = spawn_throttle_sweeper(state.clone(), THROTTLE_SWEEP_INTERVAL);
    let app = build_app(state, cors);

    let reaper = crate::db::tokens::spawn_reaper(db, TOKEN_REAP_INTERVAL);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("Account API listening on http://{}", bind_addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    reaper.abort();
    sweeper.abort();
    tracing::info!("Account API stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

fn build_cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| o.parse().ok())
        .collect();

    if origins.is_empty() {
        tracing::warn!("No valid CORS origins configured; CORS will block all cross-origin requests");
        return CorsLayer::new();
    }

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::PATCH, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}

pub fn build_app(state: Arc<AppState>, cors: CorsLayer) -> Router {
    Router::new()
        .merge(router::routes(state))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
