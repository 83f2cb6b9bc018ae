use crate::db::models::User;

#[derive(Debug, Clone, PartialEq)]
pub enum Permission {
    ViewUsers,
    AddUsers,
    ChangeUsers,
    DeleteUsers,
    ViewAuditLog,
}

/// Staff may look; only superusers may change anything.
pub fn has_permission(user: &User, permission: &Permission) -> bool {
    if !user.is_active || !user.is_staff {
        return false;
    }
    if user.is_superuser {
        return true;
    }
    matches!(permission, Permission::ViewUsers | Permission::ViewAuditLog)
}
