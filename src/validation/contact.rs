//! Contact submission validation.
//!
//! Checks run in a fixed order and the first failure wins: required
//! fields, minimum lengths, email format, threat signatures, then the
//! "no URL in name" rule. Every rejection maps to one of a small set of
//! fixed messages; raw input is never echoed back.

use serde::Serialize;
use serde_json::Value;

use crate::security::sanitize::{sanitize_html, sanitize_input, MAX_EMAIL_LEN};
use crate::security::threat::{detect_threat, ThreatKind};
use crate::validation::fields::{is_email, looks_like_url};

pub const MAX_NAME_LEN: usize = 100;
pub const MAX_SUBJECT_LEN: usize = 200;
pub const MAX_MESSAGE_LEN: usize = 5000;

const MIN_NAME_LEN: usize = 2;
const MIN_SUBJECT_LEN: usize = 3;
const MIN_MESSAGE_LEN: usize = 10;

/// Field names real users never fill in.
pub const HONEYPOT_FIELDS: [&str; 3] = ["website", "url", "honeypot"];

/// Raw submission fields as received. Non-string values count as empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContactSubmission {
    pub name: String,
    pub email: String,
    pub subject: String,
    pub message: String,
}

impl ContactSubmission {
    pub fn from_json(body: &Value) -> Self {
        let field = |key: &str| {
            body.get(key)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        Self {
            name: field("name"),
            email: field("email"),
            subject: field("subject"),
            message: field("message"),
        }
    }
}

/// A sanitized submission that passed every check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContactMessage {
    pub name: String,
    pub email: String,
    pub subject: String,
    pub message: String,
}

/// Why a submission was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactRejection {
    MissingFields,
    NameTooShort,
    SubjectTooShort,
    MessageTooShort,
    InvalidEmail,
    Threat {
        field: &'static str,
        kind: ThreatKind,
    },
    UrlInName,
}

impl ContactRejection {
    /// Caller-facing message. Identical for every threat signature.
    pub fn message(&self) -> &'static str {
        match self {
            Self::MissingFields => "All fields are required",
            Self::NameTooShort => "Name must be at least 2 characters",
            Self::SubjectTooShort => "Subject must be at least 3 characters",
            Self::MessageTooShort => "Message must be at least 10 characters",
            Self::InvalidEmail => "Invalid email address",
            Self::Threat { .. } => "Invalid characters detected in your message",
            Self::UrlInName => "Name cannot contain URLs",
        }
    }

    /// Stable label for metrics and logs.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::MissingFields => "missing_fields",
            Self::NameTooShort => "name_too_short",
            Self::SubjectTooShort => "subject_too_short",
            Self::MessageTooShort => "message_too_short",
            Self::InvalidEmail => "invalid_email",
            Self::Threat { .. } => "threat_detected",
            Self::UrlInName => "url_in_name",
        }
    }
}

/// True when any honeypot field holds a truthy value.
pub fn honeypot_triggered(body: &Value) -> bool {
    HONEYPOT_FIELDS
        .iter()
        .any(|key| body.get(key).is_some_and(is_truthy))
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

// Minimum lengths are measured in UTF-16 code units.
fn utf16_len(s: &str) -> usize {
    s.encode_utf16().count()
}

/// Sanitize then validate a submission.
pub fn validate_contact(submission: &ContactSubmission) -> Result<ContactMessage, ContactRejection> {
    let name = sanitize_html(&sanitize_input(&submission.name, MAX_NAME_LEN));
    let email = sanitize_input(&submission.email, MAX_EMAIL_LEN).to_lowercase();
    let subject = sanitize_html(&sanitize_input(&submission.subject, MAX_SUBJECT_LEN));
    let message = sanitize_html(&sanitize_input(&submission.message, MAX_MESSAGE_LEN));

    if name.is_empty() || email.is_empty() || subject.is_empty() || message.is_empty() {
        return Err(ContactRejection::MissingFields);
    }

    if utf16_len(&name) < MIN_NAME_LEN {
        return Err(ContactRejection::NameTooShort);
    }
    if utf16_len(&subject) < MIN_SUBJECT_LEN {
        return Err(ContactRejection::SubjectTooShort);
    }
    if utf16_len(&message) < MIN_MESSAGE_LEN {
        return Err(ContactRejection::MessageTooShort);
    }

    if !is_email(&email) {
        return Err(ContactRejection::InvalidEmail);
    }

    for (field, value) in [("name", &name), ("subject", &subject), ("message", &message)] {
        if let Some(kind) = detect_threat(value) {
            return Err(ContactRejection::Threat { field, kind });
        }
    }

    if looks_like_url(&name) {
        return Err(ContactRejection::UrlInName);
    }

    Ok(ContactMessage {
        name,
        email,
        subject,
        message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn submission(name: &str, email: &str, subject: &str, message: &str) -> ContactSubmission {
        ContactSubmission {
            name: name.into(),
            email: email.into(),
            subject: subject.into(),
            message: message.into(),
        }
    }

    #[test]
    fn test_valid_submission_is_sanitized() {
        let msg = validate_contact(&submission(
            "  <b>Ana-María</b> ",
            " Ana@Example.COM",
            "Hello\tthere",
            "I would like to <i>learn</i> more about this.",
        ))
        .unwrap();
        assert_eq!(msg.name, "Ana-María");
        assert_eq!(msg.email, "ana@example.com");
        assert_eq!(msg.subject, "Hellothere");
        assert_eq!(msg.message, "I would like to learn more about this.");
    }

    #[test]
    fn test_short_message_with_bad_email_fails_on_length_first() {
        let err = validate_contact(&submission("Bob", "not-an-email", "Hi", "Too short")).unwrap_err();
        assert_eq!(err, ContactRejection::SubjectTooShort);
    }

    #[test]
    fn test_check_order() {
        let cases = [
            (submission("", "a@b.co", "Hello", "0123456789"), ContactRejection::MissingFields),
            (submission("<p></p>", "a@b.co", "Hello", "0123456789"), ContactRejection::MissingFields),
            (submission("B", "a@b.co", "Hello", "0123456789"), ContactRejection::NameTooShort),
            (submission("Bob", "a@b.co", "Hello", "too short"), ContactRejection::MessageTooShort),
            (submission("Bob", "a@b", "Hello", "0123456789"), ContactRejection::InvalidEmail),
            (submission("bob.example.com", "a@b.co", "Hello", "0123456789"), ContactRejection::UrlInName),
        ];
        for (input, expected) in cases {
            assert_eq!(validate_contact(&input).unwrap_err(), expected, "{input:?}");
        }
    }

    #[test]
    fn test_min_lengths_count_utf16_units() {
        let msg = validate_contact(&submission("😀", "josé@example.com", "Hi!", "0123456789")).unwrap();
        assert_eq!(msg.name, "😀");
        assert_eq!(msg.email, "josé@example.com");

        let err = validate_contact(&submission("é", "a@b.co", "Hello", "0123456789")).unwrap_err();
        assert_eq!(err, ContactRejection::NameTooShort);
    }

    #[test]
    fn test_threat_after_sanitization() {
        let err = validate_contact(&submission(
            "Mallory",
            "m@example.com",
            "Hello",
            "click <a href=\"x\">here</a> javascript:alert(1)",
        ))
        .unwrap_err();
        assert_eq!(
            err,
            ContactRejection::Threat {
                field: "message",
                kind: ThreatKind::JavascriptScheme
            }
        );
        assert_eq!(err.message(), "Invalid characters detected in your message");
    }

    #[test]
    fn test_script_body_is_stripped_not_flagged() {
        let msg = validate_contact(&submission(
            "Eve",
            "eve@example.com",
            "Greetings",
            "<script>alert(1)</script>Just saying hello to you",
        ))
        .unwrap();
        assert_eq!(msg.message, "Just saying hello to you");
    }

    #[test]
    fn test_length_caps_apply_before_stripping() {
        let name = format!("{}<b>x</b>", "a".repeat(98));
        let msg = validate_contact(&submission(&name, "a@b.co", "Hello", "0123456789")).unwrap();
        // The cap cut the tag in half; the dangling fragment is stripped.
        assert_eq!(msg.name, "a".repeat(98));
    }

    #[test]
    fn test_honeypot_truthiness() {
        assert!(honeypot_triggered(&json!({"website": "http://spam"})));
        assert!(honeypot_triggered(&json!({"honeypot": 1})));
        assert!(honeypot_triggered(&json!({"url": true})));
        assert!(!honeypot_triggered(&json!({"website": ""})));
        assert!(!honeypot_triggered(&json!({"url": null, "honeypot": 0})));
        assert!(!honeypot_triggered(&json!(["website"])));
    }

    #[test]
    fn test_from_json_ignores_non_strings() {
        let sub = ContactSubmission::from_json(&json!({
            "name": "Bob",
            "email": 42,
            "subject": ["x"],
        }));
        assert_eq!(sub.name, "Bob");
        assert!(sub.email.is_empty());
        assert!(sub.subject.is_empty());
        assert!(sub.message.is_empty());
    }
}
