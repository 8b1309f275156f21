//! Sign-up input rules. Checked in field order, before any store access.

use super::SignUpRequest;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use utoipa::ToSchema;

/// Minimum password length in UTF-16 code units, as browsers count it.
pub const PASSWORD_MIN_CHARS: usize = 8;

// No lookaround in `regex`; leading and doubled dots are rejected in `valid_email`.
const EMAIL_PATTERN: &str = r"(?i)^[a-z0-9_'+\-.]*[a-z0-9_+-]@([a-z0-9][a-z0-9\-]*\.)+[a-z]{2,}$";
const SUBDOMAIN_PATTERN: &str = r"^[a-z0-9-]+$";

#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct FieldViolation {
    pub field: String,
    pub message: String,
}

impl FieldViolation {
    fn new(field: &str, message: &str) -> Self {
        Self {
            field: field.to_string(),
            message: message.to_string(),
        }
    }
}

fn email_regex() -> Option<&'static Regex> {
    static EMAIL: OnceLock<Option<Regex>> = OnceLock::new();
    EMAIL.get_or_init(|| Regex::new(EMAIL_PATTERN).ok()).as_ref()
}

fn subdomain_regex() -> Option<&'static Regex> {
    static SUBDOMAIN: OnceLock<Option<Regex>> = OnceLock::new();
    SUBDOMAIN
        .get_or_init(|| Regex::new(SUBDOMAIN_PATTERN).ok())
        .as_ref()
}

pub fn valid_email(email: &str) -> bool {
    !email.starts_with('.')
        && !email.contains("..")
        && email_regex().is_some_and(|re| re.is_match(email))
}

pub fn valid_subdomain(subdomain: &str) -> bool {
    subdomain_regex().is_some_and(|re| re.is_match(subdomain))
}

/// Collect every violation in `request`; an empty list means the input is valid.
#[must_use]
pub fn violations(request: &SignUpRequest) -> Vec<FieldViolation> {
    let mut violations = Vec::new();

    if request.full_name.is_empty() {
        violations.push(FieldViolation::new("fullName", "Full name is required"));
    }

    if !valid_email(&request.email) {
        violations.push(FieldViolation::new("email", "Invalid email address"));
    }

    if request.company_name.is_empty() {
        violations.push(FieldViolation::new(
            "companyName",
            "Company name is required",
        ));
    }

    if request.subdomain.is_empty() {
        violations.push(FieldViolation::new("subdomain", "Subdomain is required"));
    } else if !valid_subdomain(&request.subdomain) {
        violations.push(FieldViolation::new(
            "subdomain",
            "Subdomain can only contain lowercase letters, numbers, and hyphens",
        ));
    }

    if request.password.encode_utf16().count() < PASSWORD_MIN_CHARS {
        violations.push(FieldViolation::new(
            "password",
            "Password must be at least 8 characters",
        ));
    }

    violations
}
