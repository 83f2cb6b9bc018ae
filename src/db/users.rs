//! User persistence. Callers validate input first; these functions only
//! normalize the email, hash passwords and enforce uniqueness.

use chrono::Utc;

use crate::auth::password;
use crate::db::models::{normalize_email, User};
use crate::db::DbPool;
use crate::error::{AppError, AppResult, ValidationError};

const USER_COLUMNS: &str =
    "id, email, name, password, is_active, is_staff, is_superuser, created_at, updated_at";

/// True when some active superuser other than the row at `id = ?` exists.
/// Evaluated inside the same statement as the write it guards.
const OTHER_SUPERUSER_EXISTS: &str =
    "EXISTS (SELECT 1 FROM users o WHERE o.is_superuser = 1 AND o.is_active = 1 AND o.id != ?)";

fn email_taken() -> AppError {
    ValidationError::new("U004", "email", "user with this email already exists.").into()
}

fn last_superuser() -> AppError {
    AppError::Validation("At least one active superuser must remain".to_string())
}

/// Account flags applied at creation time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UserFlags {
    pub is_active: bool,
    pub is_staff: bool,
    pub is_superuser: bool,
}

impl UserFlags {
    pub const REGULAR: Self = Self { is_active: true, is_staff: false, is_superuser: false };
    pub const SUPERUSER: Self = Self { is_active: true, is_staff: true, is_superuser: true };
}

pub async fn create_user(pool: &DbPool, email: &str, raw_password: &str, name: &str) -> AppResult<User> {
    create_with_flags(pool, email, raw_password, name, UserFlags::REGULAR).await
}

pub async fn create_superuser(pool: &DbPool, email: &str, raw_password: &str, name: &str) -> AppResult<User> {
    create_with_flags(pool, email, raw_password, name, UserFlags::SUPERUSER).await
}

pub async fn create_with_flags(
    pool: &DbPool,
    email: &str,
    raw_password: &str,
    name: &str,
    flags: UserFlags,
) -> AppResult<User> {
    let mut user = User::new(checked_email(email)?, hash_password(raw_password).await?, name.trim().to_string());
    user.is_active = flags.is_active;
    // superusers are always staff
    user.is_staff = flags.is_staff || flags.is_superuser;
    user.is_superuser = flags.is_superuser;

    insert(pool, &user).await?;
    tracing::info!(user_id = %user.id, is_staff = user.is_staff, is_superuser = user.is_superuser, "user created");
    Ok(user)
}

fn checked_email(email: &str) -> AppResult<String> {
    let email = normalize_email(email);
    if email.is_empty() {
        return Err(AppError::Validation("Users must have an email address".to_string()));
    }
    Ok(email)
}

pub async fn hash_password(raw_password: &str) -> AppResult<String> {
    password::hash_blocking(raw_password.to_string())
        .await
        .map_err(|e| AppError::Internal(e.to_string()))
}

pub async fn insert(pool: &DbPool, user: &User) -> AppResult<()> {
    if exists_by_email(pool, &user.email).await? {
        return Err(email_taken());
    }

    let result = sqlx::query(
        "INSERT INTO users (id, email, name, password, is_active, is_staff, is_superuser, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"
    )
    .bind(&user.id)
    .bind(&user.email)
    .bind(&user.name)
    .bind(&user.password)
    .bind(user.is_active)
    .bind(user.is_staff)
    .bind(user.is_superuser)
    .bind(user.created_at)
    .bind(user.updated_at)
    .execute(pool)
    .await;

    map_unique(result.map(|_| ()))
}

/// Persist every mutable column of `user` and bump `updated_at`.
///
/// Refuses to demote or deactivate the last active superuser. The check
/// runs in the UPDATE itself so concurrent demotions cannot both pass.
pub async fn update(pool: &DbPool, user: &mut User) -> AppResult<()> {
    user.updated_at = Utc::now();
    let sql = format!(
        "UPDATE users
         SET email = ?, name = ?, password = ?, is_active = ?, is_staff = ?, is_superuser = ?, updated_at = ?
         WHERE id = ?
           AND (NOT (is_superuser = 1 AND is_active = 1) OR (? AND ?) OR {})",
        OTHER_SUPERUSER_EXISTS
    );
    let result = sqlx::query(&sql)
        .bind(&user.email)
        .bind(&user.name)
        .bind(&user.password)
        .bind(user.is_active)
        .bind(user.is_staff)
        .bind(user.is_superuser)
        .bind(user.updated_at)
        .bind(&user.id)
        .bind(user.is_active)
        .bind(user.is_superuser)
        .bind(&user.id)
        .execute(pool)
        .await;

    match map_unique(result.map(|r| r.rows_affected()))? {
        0 => Err(missing_or_last_superuser(pool, &user.id).await),
        _ => Ok(()),
    }
}

/// Why a guarded write touched no rows.
async fn missing_or_last_superuser(pool: &DbPool, id: &str) -> AppError {
    match exists_by_id(pool, id).await {
        Ok(true) => last_superuser(),
        Ok(false) => AppError::NotFound(format!("User {} not found", id)),
        Err(e) => e,
    }
}

fn map_unique<T>(result: Result<T, sqlx::Error>) -> AppResult<T> {
    match result {
        Ok(v) => Ok(v),
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Err(email_taken()),
        Err(e) => Err(e.into()),
    }
}

pub async fn exists_by_email(pool: &DbPool, email: &str) -> AppResult<bool> {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users WHERE email = ?")
        .bind(email)
        .fetch_one(pool)
        .await?;
    Ok(count > 0)
}

pub async fn exists_by_id(pool: &DbPool, id: &str) -> AppResult<bool> {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users WHERE id = ?")
        .bind(id)
        .fetch_one(pool)
        .await?;
    Ok(count > 0)
}

pub async fn find_by_email(pool: &DbPool, email: &str) -> AppResult<Option<User>> {
    let sql = format!("SELECT {} FROM users WHERE email = ?", USER_COLUMNS);
    Ok(sqlx::query_as::<_, User>(&sql)
        .bind(email)
        .fetch_optional(pool)
        .await?)
}

pub async fn find_by_id(pool: &DbPool, id: &str) -> AppResult<Option<User>> {
    let sql = format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS);
    Ok(sqlx::query_as::<_, User>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?)
}

/// Page of users ordered by creation, optionally filtered on email or name.
/// Returns the page and the total number of matching rows.
pub async fn list(
    pool: &DbPool,
    search: Option<&str>,
    limit: i64,
    offset: i64,
) -> AppResult<(Vec<User>, i64)> {
    let pattern = search
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| format!("%{}%", escape_like(s)));

    let where_clause = if pattern.is_some() {
        "WHERE email LIKE ? ESCAPE '\\' OR name LIKE ? ESCAPE '\\'"
    } else {
        ""
    };

    let count_sql = format!("SELECT COUNT(*) FROM users {}", where_clause);
    let mut count_query = sqlx::query_as::<_, (i64,)>(&count_sql);
    if let Some(ref p) = pattern {
        count_query = count_query.bind(p).bind(p);
    }
    let (total,) = count_query.fetch_one(pool).await?;

    let data_sql = format!(
        "SELECT {} FROM users {} ORDER BY created_at ASC, email ASC LIMIT ? OFFSET ?",
        USER_COLUMNS, where_clause
    );
    let mut data_query = sqlx::query_as::<_, User>(&data_sql);
    if let Some(ref p) = pattern {
        data_query = data_query.bind(p).bind(p);
    }
    let rows = data_query.bind(limit).bind(offset).fetch_all(pool).await?;

    Ok((rows, total))
}

/// Treat `%`, `_` and `\` in user input as literals inside a LIKE pattern.
fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Delete a user. `Ok(false)` when no such user exists; a validation
/// error when it is the last active superuser.
pub async fn delete(pool: &DbPool, id: &str) -> AppResult<bool> {
    let sql = format!(
        "DELETE FROM users
         WHERE id = ? AND (NOT (is_superuser = 1 AND is_active = 1) OR {})",
        OTHER_SUPERUSER_EXISTS
    );
    let result = sqlx::query(&sql).bind(id).bind(id).execute(pool).await?;
    if result.rows_affected() > 0 {
        return Ok(true);
    }
    if exists_by_id(pool, id).await? {
        return Err(last_superuser());
    }
    Ok(false)
}

pub async fn count_active_superusers(pool: &DbPool) -> AppResult<i64> {
    let (count,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM users WHERE is_superuser = 1 AND is_active = 1"
    )
    .fetch_one(pool)
    .await?;
    Ok(count)
}
