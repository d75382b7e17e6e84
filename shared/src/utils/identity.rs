//! Identity utilities: normalization, validation and log masking
//!
//! An identity is the phone number or email address being verified. Every
//! store key and record uses the normalized form produced here.

use once_cell::sync::Lazy;
use regex::Regex;

// International phone number (E.164): '+' then 8-15 digits, no leading zero
static E164_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\+[1-9]\d{7,14}$").expect("E.164 pattern is valid")
});

static EMAIL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-z0-9._%+\-]+@[a-z0-9\-]+(\.[a-z0-9\-]+)*\.[a-z]{2,}$")
        .expect("email pattern is valid")
});

/// Kind of identity being verified
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityKind {
    Phone,
    Email,
}

/// Normalize a raw identity.
///
/// Emails are trimmed and lower-cased; anything else is treated as a phone
/// number and stripped of spaces, dashes, dots and parentheses. Returns
/// `None` when the result is neither a valid E.164 number nor a valid email.
pub fn normalize_identity(raw: &str) -> Option<(String, IdentityKind)> {
    let trimmed = raw.trim();
    if trimmed.contains('@') {
        let email = trimmed.to_lowercase();
        return EMAIL_REGEX
            .is_match(&email)
            .then_some((email, IdentityKind::Email));
    }

    let phone: String = trimmed
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '.' | '(' | ')'))
        .collect();
    E164_REGEX
        .is_match(&phone)
        .then_some((phone, IdentityKind::Phone))
}

/// Classify an already-normalized identity
pub fn identity_kind(identity: &str) -> IdentityKind {
    if identity.contains('@') {
        IdentityKind::Email
    } else {
        IdentityKind::Phone
    }
}

/// Mask an identity for logging (e.g. `+15******67`, `j***@example.com`)
pub fn mask_identity(identity: &str) -> String {
    match identity.split_once('@') {
        Some((local, domain)) => {
            let first = local.chars().next().map(String::from).unwrap_or_default();
            format!("{}***@{}", first, domain)
        }
        None => {
            let chars: Vec<char> = identity.chars().collect();
            if chars.len() < 7 {
                return "****".to_string();
            }
            let head: String = chars[..3].iter().collect();
            let tail: String = chars[chars.len() - 2..].iter().collect();
            format!("{}{}{}", head, "*".repeat(chars.len() - 5), tail)
        }
    }
}
