pub mod audit;
pub mod user;

pub use audit::AuditEntry;
pub use user::{normalize_email, PublicUser, User};
