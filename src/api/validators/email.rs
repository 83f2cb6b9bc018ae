use super::{ValidationError, Validator};

pub const MAX_EMAIL_LENGTH: usize = 255;

pub struct EmailValidator;

impl EmailValidator {
    pub fn new() -> Self {
        Self
    }

    fn is_valid_local_char(c: char) -> bool {
        c.is_ascii_alphanumeric() || "!#$%&'*+/=?^_`{|}~.-".contains(c)
    }

    fn is_valid_domain(domain: &str) -> bool {
        if domain == "localhost" {
            return true;
        }
        let labels: Vec<&str> = domain.split('.').collect();
        labels.len() >= 2
            && labels.iter().all(|label| {
                !label.is_empty()
                    && label.len() <= 63
                    && !label.starts_with('-')
                    && !label.ends_with('-')
                    && label.chars().all(|c| c.is_alphanumeric() || c == '-')
            })
    }
}

impl Default for EmailValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl Validator for EmailValidator {
    fn validate(&self, input: &str) -> Result<(), ValidationError> {
        let s = input.trim();

        if s.is_empty() {
            return Err(ValidationError::new("U001", "email", "This field is required."));
        }

        if s.chars().count() > MAX_EMAIL_LENGTH {
            return Err(ValidationError::new(
                "U002",
                "email",
                format!("Ensure this field has no more than {} characters.", MAX_EMAIL_LENGTH),
            ));
        }

        let invalid = || ValidationError::new("U003", "email", "Enter a valid email address.");

        let (local, domain) = s.rsplit_once('@').ok_or_else(invalid)?;
        if local.is_empty()
            || local.starts_with('.')
            || local.ends_with('.')
            || local.contains("..")
            || !local.chars().all(Self::is_valid_local_char)
        {
            return Err(invalid());
        }
        if !Self::is_valid_domain(domain) {
            return Err(invalid());
        }

        Ok(())
    }
}
