use anyhow::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::fmt::Display;
use std::future::Future;
use std::str::FromStr;
use std::time::Duration;

use crate::config::Config;

pub mod audit;
pub mod models;
pub mod tokens;
pub mod users;

pub type DbPool = SqlitePool;

/// Wait for the database, open the pool and run migrations.
pub async fn init(cfg: &Config) -> Result<DbPool> {
    let pool = wait_for_db(cfg).await?;

    sqlx::migrate!("./src/db/migrations").run(&pool).await?;

    tracing::info!("Database connected: {}", cfg.database.path);
    Ok(pool)
}

/// Probe the database until it answers, as configured by
/// `database.connect_retries` and `database.connect_retry_delay_ms`.
pub async fn wait_for_db(cfg: &Config) -> Result<DbPool> {
    let path = cfg.database.path.clone();
    let (pool, attempts) = wait_for(
        || {
            let path = path.clone();
            async move {
                let pool = connect(&path).await?;
                sqlx::query("SELECT 1").execute(&pool).await?;
                Ok::<_, sqlx::Error>(pool)
            }
        },
        cfg.database.connect_retries,
        Duration::from_millis(cfg.database.connect_retry_delay_ms),
    )
    .await?;

    tracing::info!(attempts, "Database available");
    Ok(pool)
}

/// Run `probe` until it succeeds or `max_attempts` is exhausted, sleeping
/// `delay` between failures. Returns the value and the number of attempts.
pub async fn wait_for<T, E, F, Fut>(mut probe: F, max_attempts: u32, delay: Duration) -> Result<(T, u32), E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let max_attempts = max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match probe().await {
            Ok(value) => return Ok((value, attempt)),
            Err(e) if attempt < max_attempts => {
                tracing::warn!(attempt, error = %e, "Database unavailable, waiting {:?}...", delay);
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

pub async fn connect(path: &str) -> Result<DbPool, sqlx::Error> {
    if path == ":memory:" {
        return connect_in_memory().await;
    }

    let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", path))?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal);

    SqlitePoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(5))
        .connect_with(options)
        .await
}

/// Single-connection in-memory database. The connection is never recycled,
/// since dropping it would discard the data.
pub async fn connect_in_memory() -> Result<DbPool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
    SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await
}

/// Create the configured bootstrap superuser if no superuser exists yet.
pub async fn bootstrap_superuser(pool: &DbPool, cfg: &Config) -> Result<()> {
    let Some(admin) = &cfg.admin else {
        return Ok(());
    };

    if users::count_active_superusers(pool).await? > 0 {
        return Ok(());
    }

    let email = models::normalize_email(&admin.email);
    if users::exists_by_email(pool, &email).await? {
        tracing::warn!(
            "Bootstrap admin {} exists but is not an active superuser; leaving it untouched",
            email
        );
        return Ok(());
    }

    users::create_superuser(pool, &email, &admin.password, &admin.name).await?;
    tracing::warn!("Created bootstrap superuser {}. Rotate its password after first login.", email);
    Ok(())
}
