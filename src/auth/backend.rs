use crate::auth::password;
use crate::db::models::{normalize_email, User};
use crate::db::{users, DbPool};
use crate::error::AppResult;

/// Resolve an email/password pair to an active user.
///
/// Unknown emails still pay for one hash verification so response timing
/// does not reveal which addresses are registered.
pub async fn authenticate(pool: &DbPool, email: &str, raw_password: &str) -> AppResult<Option<User>> {
    let email = normalize_email(email);
    let Some(user) = users::find_by_email(pool, &email).await? else {
        let raw = raw_password.to_string();
        let _ = tokio::task::spawn_blocking(move || password::verify_dummy(&raw)).await;
        return Ok(None);
    };

    if !password::verify_blocking(raw_password.to_string(), user.password.clone()).await {
        return Ok(None);
    }

    if !user.is_active {
        tracing::info!(user_id = %user.id, "rejected credentials for inactive user");
        return Ok(None);
    }

    Ok(Some(user))
}
