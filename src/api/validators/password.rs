use super::{ValidationError, Validator};

pub const MAX_PASSWORD_LENGTH: usize = 128;

/// Length policy for raw passwords. Whitespace is significant and never trimmed.
pub struct PasswordValidator {
    min_length: usize,
}

impl PasswordValidator {
    pub fn new(min_length: usize) -> Self {
        Self { min_length }
    }
}

impl Validator for PasswordValidator {
    fn validate(&self, input: &str) -> Result<(), ValidationError> {
        if input.is_empty() {
            return Err(ValidationError::new("U010", "password", "This field is required."));
        }

        let len = input.chars().count();
        if len < self.min_length {
            return Err(ValidationError::new(
                "U011",
                "password",
                format!("Ensure this field has at least {} characters.", self.min_length),
            ));
        }
        if len > MAX_PASSWORD_LENGTH {
            return Err(ValidationError::new(
                "U012",
                "password",
                format!("Ensure this field has no more than {} characters.", MAX_PASSWORD_LENGTH),
            ));
        }

        Ok(())
    }
}
