use std::collections::HashMap;

use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;

fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex =
            Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

const MIN_PASSWORD_LEN: usize = 8;

fn check_password(errors: &mut HashMap<String, String>, field: &str, password: &str) {
    if password.is_empty() {
        errors.insert(field.to_owned(), format!("{field} is required"));
    } else if password.len() < MIN_PASSWORD_LEN {
        errors.insert(
            field.to_owned(),
            format!("{field} must be at least {MIN_PASSWORD_LEN} characters long"),
        );
    }
}

/// Request body for account registration.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub name: String,
    pub password: String,
}

impl RegisterRequest {
    pub fn validate(&self) -> HashMap<String, String> {
        let mut errors = HashMap::new();

        if self.email.is_empty() {
            errors.insert("email".to_owned(), "email is required".to_owned());
        } else if !is_valid_email(&self.email) {
            errors.insert(
                "email".to_owned(),
                "email must be a valid email address".to_owned(),
            );
        }

        if self.name.is_empty() {
            errors.insert("name".to_owned(), "name is required".to_owned());
        }

        check_password(&mut errors, "password", &self.password);

        errors
    }
}

/// Request body for login.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl LoginRequest {
    pub fn validate(&self) -> HashMap<String, String> {
        let mut errors = HashMap::new();

        if self.email.is_empty() {
            errors.insert("email".to_owned(), "email is required".to_owned());
        }
        if self.password.is_empty() {
            errors.insert("password".to_owned(), "password is required".to_owned());
        }

        errors
    }
}

/// Request body for a password change.
#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

impl ChangePasswordRequest {
    pub fn validate(&self) -> HashMap<String, String> {
        let mut errors = HashMap::new();

        if self.current_password.is_empty() {
            errors.insert(
                "current_password".to_owned(),
                "current_password is required".to_owned(),
            );
        }

        check_password(&mut errors, "new_password", &self.new_password);

        errors
    }
}
