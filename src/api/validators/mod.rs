pub mod email;
pub mod name;
pub mod password;

pub use email::EmailValidator;
pub use name::NameValidator;
pub use password::PasswordValidator;

pub use crate::error::ValidationError;

pub trait Validator {
    fn validate(&self, input: &str) -> Result<(), ValidationError>;
}
