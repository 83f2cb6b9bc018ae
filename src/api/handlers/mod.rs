pub mod admin;
pub mod audit_log;
pub mod auth;
pub mod health;
pub mod users;

use crate::error::{AppError, AppResult};

const DEFAULT_PER_PAGE: i64 = 50;
const MAX_PER_PAGE: i64 = 200;

/// Resolved `page`/`per_page` query parameters and the row offset they imply.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageWindow {
    pub page: i64,
    pub per_page: i64,
    pub offset: i64,
}

impl PageWindow {
    /// Rejects pages whose offset does not fit in an `i64`.
    pub fn resolve(page: Option<i64>, per_page: Option<i64>) -> AppResult<Self> {
        let page = page.unwrap_or(1).max(1);
        let per_page = per_page.unwrap_or(DEFAULT_PER_PAGE).clamp(1, MAX_PER_PAGE);
        let offset = (page - 1)
            .checked_mul(per_page)
            .ok_or_else(|| AppError::Validation("page is out of range".to_string()))?;
        Ok(Self { page, per_page, offset })
    }
}
