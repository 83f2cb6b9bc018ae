pub mod backend;
pub mod password;
pub mod rbac;
pub mod token;
