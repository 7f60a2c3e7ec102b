//! Attendee identity value types.
//!
//! The public claim path has no session: an attendee *is* their normalized
//! phone number. Organizer and staff accounts live in a separate domain
//! ([`crate::types::AccountId`]) so the two are never confused.

use crate::error::ValidationFailed;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Domain used for phone-derived email addresses. Reserved TLD, never routable.
pub const SYNTHETIC_EMAIL_DOMAIN: &str = "phone.gatepass.invalid";

const MIN_PHONE_DIGITS: usize = 7;
const MAX_PHONE_DIGITS: usize = 15;
const MAX_NAME_CHARS: usize = 120;
const MAX_EMAIL_LEN: usize = 254;

/// A normalized phone number; the uniqueness key of a claim.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AttendeePhone(String);

impl AttendeePhone {
    /// Normalizes user input.
    ///
    /// Spaces, dashes, dots and parentheses are stripped, as is a single
    /// leading `+`. The remainder must be 7 to 15 digits, and those digits
    /// alone are the identity: `+9876543210` and `9876543210` are one caller.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationFailed`] for blank or malformed input.
    pub fn parse(input: &str) -> Result<Self, ValidationFailed> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(ValidationFailed::missing("phone"));
        }

        let rest = trimmed.strip_prefix('+').unwrap_or(trimmed);

        let mut digits = String::with_capacity(rest.len());
        for ch in rest.chars() {
            match ch {
                '0'..='9' => digits.push(ch),
                ' ' | '-' | '.' | '(' | ')' => {}
                _ => {
                    return Err(ValidationFailed::invalid(
                        "phone",
                        "may only contain digits, spaces, dashes, dots and parentheses",
                    ));
                }
            }
        }

        if !(MIN_PHONE_DIGITS..=MAX_PHONE_DIGITS).contains(&digits.len()) {
            return Err(ValidationFailed::invalid("phone", "must have 7 to 15 digits"));
        }

        Ok(Self(digits))
    }

    /// Normalized form as stored.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Digits only; identical to [`Self::as_str`].
    #[must_use]
    pub fn digits(&self) -> &str {
        &self.0
    }

    /// Placeholder email for phone-first claims.
    #[must_use]
    pub fn synthetic_email(&self) -> String {
        format!("{}@{SYNTHETIC_EMAIL_DOMAIN}", self.digits())
    }
}

impl fmt::Display for AttendeePhone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// True for addresses produced by [`AttendeePhone::synthetic_email`].
#[must_use]
pub fn is_synthetic_email(email: &str) -> bool {
    email
        .rsplit_once('@')
        .is_some_and(|(_, domain)| domain.eq_ignore_ascii_case(SYNTHETIC_EMAIL_DOMAIN))
}

/// Attendee display name.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendeeName(String);

impl AttendeeName {
    /// Trims and checks a display name.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationFailed`] for blank, over-long or control-character input.
    pub fn parse(input: &str) -> Result<Self, ValidationFailed> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(ValidationFailed::missing("name"));
        }
        if trimmed.chars().count() > MAX_NAME_CHARS {
            return Err(ValidationFailed::invalid("name", "must be at most 120 characters"));
        }
        if trimmed.chars().any(char::is_control) {
            return Err(ValidationFailed::invalid("name", "must not contain control characters"));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// The name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AttendeeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A deliverable attendee email address, lower-cased.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AttendeeEmail(String);

impl AttendeeEmail {
    /// Syntactic check only; deliverability is not verified.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationFailed`] for blank or malformed input.
    pub fn parse(input: &str) -> Result<Self, ValidationFailed> {
        let email = input.trim().to_lowercase();
        if email.is_empty() {
            return Err(ValidationFailed::missing("email"));
        }
        if email.len() > MAX_EMAIL_LEN {
            return Err(ValidationFailed::invalid("email", "is too long"));
        }
        if email.chars().any(|ch| ch.is_whitespace() || ch.is_control()) {
            return Err(ValidationFailed::invalid("email", "must not contain spaces"));
        }

        let Some((local, domain)) = email.split_once('@') else {
            return Err(ValidationFailed::invalid("email", "must contain '@'"));
        };
        if local.is_empty() || domain.contains('@') {
            return Err(ValidationFailed::invalid("email", "is not a valid address"));
        }
        let domain_ok = domain.contains('.')
            && !domain.starts_with('.')
            && !domain.ends_with('.')
            && !domain.contains("..");
        if !domain_ok {
            return Err(ValidationFailed::invalid("email", "domain is not valid"));
        }
        if is_synthetic_email(&email) {
            return Err(ValidationFailed::invalid("email", "domain is reserved"));
        }

        Ok(Self(email))
    }

    /// The address.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AttendeeEmail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
