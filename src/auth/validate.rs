use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    static ref USERNAME_RE: Regex = Regex::new(r"^[a-zA-Z0-9_]+$").unwrap();
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

/// All validation failures for a registration payload, collected in order.
pub(crate) fn registration_errors(username: &str, email: &str, password: &str) -> Vec<String> {
    let mut errors = Vec::new();
    if username.chars().count() < 3 {
        errors.push("Username must be at least 3 characters long".to_string());
    }
    if !is_valid_email(email) {
        errors.push("Please provide a valid email address".to_string());
    }
    if password.chars().count() < 6 {
        errors.push("Password must be at least 6 characters long".to_string());
    }
    if !USERNAME_RE.is_match(username) {
        errors.push("Username can only contain letters, numbers, and underscores".to_string());
    }
    errors
}

/// Username/email failures shared by registration and profile update.
pub(crate) fn profile_errors(username: &str, email: &str) -> Vec<String> {
    let mut errors = Vec::new();
    if username.chars().count() < 3 {
        errors.push("Username must be at least 3 characters long".to_string());
    }
    if !is_valid_email(email) {
        errors.push("Please provide a valid email address".to_string());
    }
    if !USERNAME_RE.is_match(username) {
        errors.push("Username can only contain letters, numbers, and underscores".to_string());
    }
    errors
}
