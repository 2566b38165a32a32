//! Client-side input checks. Failures are raised at the point of input and
//! never reach the Remote Access Layer.

use synergy_shared::ValidationError;

/// Trimmed, non-empty value of a required field.
pub fn required(field: &'static str, value: &str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(ValidationError::Required(field))
    } else {
        Ok(trimmed.to_string())
    }
}

/// Trimmed email of the shape `local@domain.tld`.
pub fn email(value: &str) -> Result<String, ValidationError> {
    let value = required("email", value)?;
    let valid = match value.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && !value.contains(char::is_whitespace)
                && domain
                    .split_once('.')
                    .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty())
                && !domain.ends_with('.')
        }
        None => false,
    };
    if valid {
        Ok(value)
    } else {
        Err(ValidationError::InvalidEmail(value))
    }
}

pub fn password(value: &str, min_len: usize) -> Result<(), ValidationError> {
    if value.is_empty() {
        return Err(ValidationError::Required("password"));
    }
    if value.chars().count() < min_len {
        return Err(ValidationError::PasswordTooShort { min: min_len });
    }
    Ok(())
}

/// Sign-up form as typed by the user.
#[derive(Debug, Clone, Default)]
pub struct SignUpForm {
    pub name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidSignUp {
    pub name: String,
    pub email: String,
    pub password: String,
}

impl SignUpForm {
    pub fn validate(&self, min_password_len: usize) -> Result<ValidSignUp, ValidationError> {
        let name = required("name", &self.name)?;
        let email = email(&self.email)?;
        password(&self.password, min_password_len)?;
        if self.password != self.confirm_password {
            return Err(ValidationError::PasswordMismatch);
        }
        Ok(ValidSignUp {
            name,
            email,
            password: self.password.clone(),
        })
    }
}
