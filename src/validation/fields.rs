//! Reusable field validators.
//!
//! Each validator runs in three stages: length bounds on the raw input,
//! a sanitizing transform, then a structural check on the transformed
//! value. The result carries the transformed value on success.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr};

use crate::security::sanitize::{
    sanitize_email, sanitize_input, sanitize_url, DEFAULT_MAX_LEN, MAX_EMAIL_LEN, MAX_URL_LEN,
};

static NAME_CHARS: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-zA-Z\s'-]+$").expect("static regex"));
static SLUG_CHARS: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-z0-9-]+$").expect("static regex"));

const MAX_NAME_LEN: usize = 100;
const MAX_SLUG_LEN: usize = 100;
const MAX_LOCAL_PART_LEN: usize = 64;
const MAX_URL_LIKE_LEN: usize = 2083;

/// Human-readable validation messages, safe to return to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(pub Vec<String>);

impl ValidationErrors {
    pub fn single(message: impl Into<String>) -> Self {
        Self(vec![message.into()])
    }

    pub fn first(&self) -> Option<&str> {
        self.0.first().map(String::as_str)
    }

    pub fn messages(&self) -> &[String] {
        &self.0
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

pub type ValidationResult<T> = Result<T, ValidationErrors>;

#[derive(Debug, Clone, Copy)]
enum Transform {
    Input(usize),
    Email,
    Url,
}

impl Transform {
    fn apply(self, input: &str) -> String {
        match self {
            Transform::Input(max_len) => sanitize_input(input, max_len),
            Transform::Email => sanitize_email(input),
            Transform::Url => sanitize_url(input),
        }
    }
}

/// A transform-then-refine pipeline for one string field.
#[derive(Debug, Clone)]
pub struct FieldSchema {
    required: Option<&'static str>,
    max_len: usize,
    too_long: String,
    transform: Transform,
    refine: fn(&str) -> bool,
    invalid: &'static str,
}

impl FieldSchema {
    pub fn email() -> Self {
        Self {
            required: Some("Email is required"),
            max_len: MAX_EMAIL_LEN,
            too_long: "Email too long".into(),
            transform: Transform::Email,
            refine: is_email,
            invalid: "Invalid email address",
        }
    }

    pub fn url() -> Self {
        Self {
            required: Some("URL is required"),
            max_len: MAX_URL_LEN,
            too_long: "URL too long".into(),
            transform: Transform::Url,
            refine: is_http_url,
            invalid: "Invalid URL",
        }
    }

    pub fn text(max_len: usize) -> Self {
        Self {
            required: None,
            max_len,
            too_long: format!("Text must be {max_len} characters or less"),
            transform: Transform::Input(max_len),
            refine: |s| !s.is_empty(),
            invalid: "Text cannot be empty after sanitization",
        }
    }

    pub fn name() -> Self {
        Self {
            required: Some("Name is required"),
            max_len: MAX_NAME_LEN,
            too_long: "Name too long".into(),
            transform: Transform::Input(DEFAULT_MAX_LEN),
            refine: |s| NAME_CHARS.is_match(s),
            invalid: "Name can only contain letters, spaces, hyphens, and apostrophes",
        }
    }

    pub fn slug() -> Self {
        Self {
            required: Some("Slug is required"),
            max_len: MAX_SLUG_LEN,
            too_long: "Slug too long".into(),
            transform: Transform::Input(DEFAULT_MAX_LEN),
            refine: |s| SLUG_CHARS.is_match(s),
            invalid: "Slug can only contain lowercase letters, numbers, and hyphens",
        }
    }

    pub fn validate(&self, input: &str) -> ValidationResult<String> {
        let len = input.chars().count();
        if let Some(required) = self.required {
            if len == 0 {
                return Err(ValidationErrors::single(required));
            }
        }
        if len > self.max_len {
            return Err(ValidationErrors::single(self.too_long.clone()));
        }

        let value = self.transform.apply(input);
        if (self.refine)(&value) {
            Ok(value)
        } else {
            Err(ValidationErrors::single(self.invalid))
        }
    }
}

pub fn validate_email(input: &str) -> ValidationResult<String> {
    FieldSchema::email().validate(input)
}

pub fn validate_url(input: &str) -> ValidationResult<String> {
    FieldSchema::url().validate(input)
}

pub fn validate_text(input: &str, max_len: usize) -> ValidationResult<String> {
    FieldSchema::text(max_len).validate(input)
}

pub fn validate_name(input: &str) -> ValidationResult<String> {
    FieldSchema::name().validate(input)
}

pub fn validate_slug(input: &str) -> ValidationResult<String> {
    FieldSchema::slug().validate(input)
}

/// Newsletter sign-up: a single email field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewsletterForm {
    pub email: String,
}

pub fn validate_newsletter(email: &str) -> ValidationResult<NewsletterForm> {
    validate_email(email).map(|email| NewsletterForm { email })
}

/// Generic contact form schema (name, email, free text).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactForm {
    pub name: String,
    pub email: String,
    pub message: String,
}

/// Validate every field and report all failures together.
pub fn validate_contact_form(name: &str, email: &str, message: &str) -> ValidationResult<ContactForm> {
    let name = validate_name(name);
    let email = validate_email(email);
    let message = validate_text(message, 5000);

    match (name, email, message) {
        (Ok(name), Ok(email), Ok(message)) => Ok(ContactForm { name, email, message }),
        (name, email, message) => {
            let errors = [name.err(), email.err(), message.err()]
                .into_iter()
                .flatten()
                .flat_map(|e| e.0)
                .collect();
            Err(ValidationErrors(errors))
        }
    }
}

/// Email address syntax check (dot-atom local part, UTF-8 allowed; FQDN domain).
pub fn is_email(input: &str) -> bool {
    if input.is_empty() || input.len() > MAX_EMAIL_LEN {
        return false;
    }
    let Some((local, domain)) = input.rsplit_once('@') else {
        return false;
    };
    if local.is_empty() || local.len() > MAX_LOCAL_PART_LEN {
        return false;
    }
    let local_ok = local.split('.').all(|atom| {
        !atom.is_empty()
            && atom
                .chars()
                .all(|c| c.is_alphanumeric() || "!#$%&'*+-/=?^_`{|}~".contains(c))
    });
    local_ok && is_fqdn(domain)
}

/// Fully-qualified domain name with an alphabetic (or punycode) TLD.
pub fn is_fqdn(host: &str) -> bool {
    let host = host.strip_suffix('.').unwrap_or(host);
    if host.is_empty() || host.len() > 253 {
        return false;
    }
    let labels: Vec<&str> = host.split('.').collect();
    if labels.len() < 2 {
        return false;
    }

    let labels_ok = labels.iter().all(|label| {
        !label.is_empty()
            && label.len() <= 63
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label
                .chars()
                .all(|c| c.is_alphanumeric() || c == '-')
    });

    let tld = labels[labels.len() - 1];
    let tld_ok = (tld.chars().count() >= 2 && tld.chars().all(char::is_alphabetic))
        || (tld.len() > 4 && tld.to_ascii_lowercase().starts_with("xn--"));

    labels_ok && tld_ok
}

/// Absolute http(s) URL whose host is a FQDN or an IP literal.
pub fn is_http_url(input: &str) -> bool {
    let Ok(parsed) = url::Url::parse(input) else {
        return false;
    };
    if !matches!(parsed.scheme(), "http" | "https") {
        return false;
    }
    match parsed.host() {
        Some(url::Host::Domain(domain)) => is_fqdn(domain),
        Some(url::Host::Ipv4(_)) | Some(url::Host::Ipv6(_)) => true,
        None => false,
    }
}

/// Heuristic: does free text look like a URL (scheme optional)?
///
/// Accepts `[http|https|ftp://][user@]host[:port][/path|?query|#frag]`
/// where host is a FQDN, an IPv4 literal, or a bracketed IPv6 literal.
pub fn looks_like_url(input: &str) -> bool {
    if input.is_empty() || input.len() > MAX_URL_LIKE_LEN || input.chars().any(char::is_whitespace) {
        return false;
    }

    let rest = match input.split_once("://") {
        Some((scheme, rest)) => {
            if !matches!(scheme.to_ascii_lowercase().as_str(), "http" | "https" | "ftp") {
                return false;
            }
            rest
        }
        None => input.strip_prefix("//").unwrap_or(input),
    };

    let authority = rest
        .split(['/', '?', '#'])
        .next()
        .unwrap_or_default();
    let host_port = authority.rsplit_once('@').map_or(authority, |(_, h)| h);

    if let Some(inner) = host_port.strip_prefix('[') {
        return inner
            .split_once(']')
            .and_then(|(ip, _)| ip.parse::<IpAddr>().ok())
            .is_some();
    }

    let host = match host_port.rsplit_once(':') {
        Some((host, port)) => match port.parse::<u16>() {
            Ok(p) if p > 0 => host,
            _ => return false,
        },
        None => host_port,
    };

    host.parse::<Ipv4Addr>().is_ok() || is_fqdn(host)
}
