use chrono::Utc;

use crate::db::models::AuditEntry;
use crate::db::DbPool;
use crate::error::AppResult;

/// Fire-and-forget: write an audit log entry to the database.
/// Spawns a background task so the caller is never blocked.
pub fn log_action(
    db: DbPool,
    user_id: String,
    email: String,
    action: impl Into<String> + Send + 'static,
    resource: impl Into<String> + Send + 'static,
    resource_id: Option<String>,
    detail: Option<String>,
    ip: String,
) {
    let action = action.into();
    let resource = resource.into();
    let now = Utc::now().to_rfc3339();

    tokio::spawn(async move {
        let result = sqlx::query(
            "INSERT INTO audit_log (time, user_id, email, action, resource, resource_id, detail, ip)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)"
        )
        .bind(&now)
        .bind(&user_id)
        .bind(&email)
        .bind(&action)
        .bind(&resource)
        .bind(resource_id.as_deref())
        .bind(detail.as_deref())
        .bind(&ip)
        .execute(&db)
        .await;

        if let Err(e) = result {
            tracing::warn!(error = %e, action = %action, "failed to write audit entry");
        }
    });
}

pub async fn list(
    pool: &DbPool,
    action: Option<&str>,
    limit: i64,
    offset: i64,
) -> AppResult<(Vec<AuditEntry>, i64)> {
    let where_clause = if action.is_some() { "WHERE action = ?" } else { "" };

    let count_sql = format!("SELECT COUNT(*) FROM audit_log {}", where_clause);
    let mut count_query = sqlx::query_as::<_, (i64,)>(&count_sql);
    if let Some(a) = action {
        count_query = count_query.bind(a);
    }
    let (total,) = count_query.fetch_one(pool).await?;

    let data_sql = format!(
        "SELECT id, time, user_id, email, action, resource, resource_id, detail, ip \
         FROM audit_log {} ORDER BY id DESC LIMIT ? OFFSET ?",
        where_clause
    );
    let mut data_query = sqlx::query_as::<_, AuditEntry>(&data_sql);
    if let Some(a) = action {
        data_query = data_query.bind(a);
    }
    let rows = data_query.bind(limit).bind(offset).fetch_all(pool).await?;

    Ok((rows, total))
}
