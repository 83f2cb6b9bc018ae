use super::{ValidationError, Validator};

pub const MAX_NAME_LENGTH: usize = 255;

pub struct NameValidator {
    required: bool,
}

impl NameValidator {
    /// Self-registration must supply a name.
    pub fn required() -> Self {
        Self { required: true }
    }

    /// Admin and CLI created accounts may leave it blank.
    pub fn optional() -> Self {
        Self { required: false }
    }
}

impl Validator for NameValidator {
    fn validate(&self, input: &str) -> Result<(), ValidationError> {
        let s = input.trim();
        if self.required && s.is_empty() {
            return Err(ValidationError::new("U020", "name", "This field may not be blank."));
        }
        if s.chars().count() > MAX_NAME_LENGTH {
            return Err(ValidationError::new(
                "U021",
                "name",
                format!("Ensure this field has no more than {} characters.", MAX_NAME_LENGTH),
            ));
        }
        Ok(())
    }
}
