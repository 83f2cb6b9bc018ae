use chrono::Utc;

use crate::db::models::User;
use crate::db::DbPool;
use crate::error::AppResult;

/// Store the digest of a freshly issued token. Returns its expiry (unix secs).
pub async fn insert(pool: &DbPool, digest: &str, user_id: &str, expiry_hours: u64) -> AppResult<i64> {
    let now = Utc::now().timestamp();
    let lifetime = i64::try_from(expiry_hours).unwrap_or(i64::MAX).saturating_mul(3600);
    let expires_at = now.saturating_add(lifetime);

    sqlx::query(
        "INSERT INTO auth_tokens (digest, user_id, created_at, expires_at) VALUES (?, ?, ?, ?)"
    )
    .bind(digest)
    .bind(user_id)
    .bind(now)
    .bind(expires_at)
    .execute(pool)
    .await?;

    Ok(expires_at)
}

/// Owner of an unexpired token, if any.
pub async fn find_user(pool: &DbPool, digest: &str) -> AppResult<Option<User>> {
    Ok(sqlx::query_as::<_, User>(
        "SELECT u.id AS id, u.email AS email, u.name AS name, u.password AS password,
                u.is_active AS is_active, u.is_staff AS is_staff, u.is_superuser AS is_superuser,
                u.created_at AS created_at, u.updated_at AS updated_at
         FROM auth_tokens t JOIN users u ON u.id = t.user_id
         WHERE t.digest = ? AND t.expires_at > ?"
    )
    .bind(digest)
    .bind(Utc::now().timestamp())
    .fetch_optional(pool)
    .await?)
}

pub async fn revoke(pool: &DbPool, digest: &str) -> AppResult<bool> {
    let result = sqlx::query("DELETE FROM auth_tokens WHERE digest = ?")
        .bind(digest)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn revoke_all_for_user(pool: &DbPool, user_id: &str) -> AppResult<u64> {
    let result = sqlx::query("DELETE FROM auth_tokens WHERE user_id = ?")
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

/// Revoke every token of the user except the one making the request.
pub async fn revoke_others(pool: &DbPool, user_id: &str, keep_digest: &str) -> AppResult<u64> {
    let result = sqlx::query("DELETE FROM auth_tokens WHERE user_id = ? AND digest != ?")
        .bind(user_id)
        .bind(keep_digest)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

pub async fn purge_expired(pool: &DbPool) -> AppResult<u64> {
    let result = sqlx::query("DELETE FROM auth_tokens WHERE expires_at <= ?")
        .bind(Utc::now().timestamp())
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

/// Background task deleting expired token rows on a fixed interval.
pub fn spawn_reaper(db: DbPool, every: std::time::Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            match purge_expired(&db).await {
                Ok(0) => {}
                Ok(n) => tracing::debug!(purged = n, "expired tokens removed"),
                Err(e) => tracing::warn!(error = %e, "token purge failed"),
            }
        }
    })
}
