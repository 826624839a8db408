//! Client-side checks run before a form is submitted.
//!
//! Failures use the same [`ValidationErrors`] shape as a server 422, so a
//! form renders local and remote errors the same way.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::{ClientError, ValidationErrors};

use super::types::{LoginCredentials, RegisterData, Secret};

static EMAIL: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"\S+@\S+\.\S+").ok());

fn is_email(value: &str) -> bool {
    EMAIL.as_ref().is_some_and(|re| re.is_match(value))
}

fn require(errors: &mut ValidationErrors, field: &str, value: &str, label: &str) {
    if value.trim().is_empty() {
        errors.add(field, format!("{label} is required"));
    }
}

pub fn validate_login(credentials: &LoginCredentials) -> Result<(), ClientError> {
    let mut errors = ValidationErrors::new();
    require(
        &mut errors,
        "credential",
        &credentials.credential,
        "Email or phone number",
    );
    if credentials.password.is_empty() {
        errors.add("password", "Password is required");
    }
    errors.into_result()
}

pub fn validate_register(data: &RegisterData, min_length: usize) -> Result<(), ClientError> {
    let mut errors = ValidationErrors::new();

    require(&mut errors, "first_name", &data.first_name, "First name");
    require(&mut errors, "last_name", &data.last_name, "Last name");
    require(&mut errors, "email", &data.email, "Email");
    require(&mut errors, "phone", &data.phone, "Phone number");
    if data.password.is_empty() {
        errors.add("password", "Password is required");
    }
    if data.password_confirmation.is_empty() {
        errors.add("password_confirmation", "Password confirmation is required");
    }
    require(&mut errors, "company_name", &data.company_name, "Company name");
    require(&mut errors, "company_type", &data.company_type, "Company type");
    require(&mut errors, "company_sector", &data.company_sector, "Business sector");
    require(&mut errors, "company_country", &data.company_country, "Country");

    if !data.email.trim().is_empty() && !is_email(&data.email) {
        errors.add("email", "Email is not valid");
    }

    check_new_password(
        &mut errors,
        ("password", &data.password),
        ("password_confirmation", &data.password_confirmation),
        min_length,
    );

    errors.into_result()
}

/// Check a new password and its confirmation.
pub fn validate_new_password(
    password: (&str, &Secret),
    confirmation: (&str, &Secret),
    min_length: usize,
) -> Result<(), ClientError> {
    let mut errors = ValidationErrors::new();
    if password.1.is_empty() {
        errors.add(password.0, "Password is required");
    }
    check_new_password(&mut errors, password, confirmation, min_length);
    errors.into_result()
}

fn check_new_password(
    errors: &mut ValidationErrors,
    (password_field, password): (&str, &Secret),
    (confirmation_field, confirmation): (&str, &Secret),
    min_length: usize,
) {
    if !password.is_empty() && !confirmation.is_empty() && password != confirmation {
        errors.add(confirmation_field, "Passwords do not match");
    }
    if !password.is_empty() && password.len() < min_length {
        errors.add(
            password_field,
            format!("Password must be at least {min_length} characters"),
        );
    }
}
