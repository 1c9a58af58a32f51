use garde::Validate;

use crate::error::{AppError, Result};

/// Minimum password length accepted at signup and password change.
pub const PASSWORD_MIN_LEN: usize = 6;
/// Maximum password length accepted at signup and password change.
pub const PASSWORD_MAX_LEN: usize = 40;
/// Minimum display name length.
pub const NAME_MIN_LEN: usize = 2;
/// Maximum display name length.
pub const NAME_MAX_LEN: usize = 50;

/// Runs the garde rules of a request payload.
///
/// # Returns
///
/// A `Result<()>`, with every violated rule joined into one `Validation` message.
pub fn validate_payload<T>(payload: &T) -> Result<()>
where
    T: Validate,
    T::Context: Default,
{
    payload
        .validate()
        .map_err(|report| AppError::Validation(report.to_string().trim().to_string()))
}

/// Trims and lower-cases an email address so lookups are case-insensitive.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Validates a display name after trimming.
pub fn validate_display_name(name: &str) -> Result<()> {
    let len = name.trim().chars().count();
    if !(NAME_MIN_LEN..=NAME_MAX_LEN).contains(&len) {
        return Err(AppError::Validation(format!(
            "Name must be between {} and {} characters",
            NAME_MIN_LEN, NAME_MAX_LEN
        )));
    }
    Ok(())
}

/// Validates a password.
///
/// # Arguments
///
/// * `password` - The password to validate.
///
/// # Returns
///
/// A `Result<()>` indicating whether the password is valid.
pub fn validate_password(password: &str) -> Result<()> {
    if password.len() < PASSWORD_MIN_LEN {
        return Err(AppError::Validation(format!(
            "Password must be at least {} characters long",
            PASSWORD_MIN_LEN
        )));
    }

    if password.len() > PASSWORD_MAX_LEN {
        return Err(AppError::Validation(format!(
            "Password must be at most {} characters",
            PASSWORD_MAX_LEN
        )));
    }

    Ok(())
}
