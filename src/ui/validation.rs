//! Form field validation.
//!
//! Callers normalize first (trim, lower-case the email), then validate.
//! Messages are user-facing; they come back on the re-rendered form.

/// Upper bound on password input. Argon2 is intentionally expensive, so an
/// unbounded input would let a client buy arbitrary CPU per request.
pub const MAX_PASSWORD_LEN: usize = 512;

pub fn validate_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("Name is required.".to_string());
    }
    if name.chars().count() > 60 {
        return Err("Name must be at most 60 characters.".to_string());
    }
    Ok(())
}

pub fn validate_email(email: &str) -> Result<(), String> {
    if email.is_empty() {
        return Err("Email is required.".to_string());
    }
    if email.chars().count() > 120 {
        return Err("Email must be at most 120 characters.".to_string());
    }
    if !email.contains('@') {
        return Err("Please enter a valid email address.".to_string());
    }
    Ok(())
}

pub fn validate_password(password: &str) -> Result<(), String> {
    if password.chars().count() < 8 {
        return Err("Password must be at least 8 characters.".to_string());
    }
    if password.chars().count() > MAX_PASSWORD_LEN {
        return Err("Password is too long.".to_string());
    }
    Ok(())
}
