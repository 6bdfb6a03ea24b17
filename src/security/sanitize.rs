//! Total string transforms for untrusted input.
//!
//! Every function here returns a string and never fails; rejection is
//! expressed as the empty string. These are allow-list and pattern based,
//! not an HTML parser.
//!
//! When stages are combined, run [`sanitize_input`] before
//! [`sanitize_html`] so the length cap applies to the raw input.

use once_cell::sync::Lazy;
use regex::Regex;

pub const MAX_URL_LEN: usize = 2048;
pub const MAX_EMAIL_LEN: usize = 254;
pub const MAX_FILENAME_LEN: usize = 255;
pub const DEFAULT_MAX_LEN: usize = 1000;

static HTML_COMMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<!--.*?(?:-->|$)").expect("static regex"));

// Elements whose content is dropped along with the tags.
static DROPPED_ELEMENTS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?is)<(script|style|iframe|object|embed|noscript|template|textarea|title)\b[^>]*>.*?(?:</(script|style|iframe|object|embed|noscript|template|textarea|title)\s*>|$)",
    )
    .expect("static regex")
});

// Any tag-like token, including one left unterminated at end of input.
static TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[A-Za-z/!?][^>]*(?:>|$)").expect("static regex"));

static DANGEROUS_SCHEME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(javascript|data|vbscript|file):").expect("static regex"));

/// Trim, drop NUL and C0/DEL control characters, cap at `max_len` chars.
pub fn sanitize_input(input: &str, max_len: usize) -> String {
    let stripped: String = input
        .chars()
        .filter(|c| !matches!(*c, '\u{0}'..='\u{1F}' | '\u{7F}'))
        .collect();
    let capped: String = stripped.trim().chars().take(max_len).collect();
    capped.trim_end().to_string()
}

/// Remove all markup, keeping text content only.
pub fn sanitize_html(input: &str) -> String {
    let mut current = input.to_string();
    loop {
        let next = HTML_COMMENT.replace_all(&current, "");
        let next = DROPPED_ELEMENTS.replace_all(&next, "");
        let next = TAG.replace_all(&next, "").into_owned();
        if next == current {
            break;
        }
        current = next;
    }
    current.trim().to_string()
}

/// Keep only absolute http(s) URLs; everything else becomes `""`.
pub fn sanitize_url(input: &str) -> String {
    let sanitized = sanitize_input(input, MAX_URL_LEN);
    if sanitized.is_empty() || DANGEROUS_SCHEME.is_match(&sanitized) {
        return String::new();
    }
    match url::Url::parse(&sanitized) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => sanitized,
        _ => String::new(),
    }
}

/// Restrict to `[A-Za-z0-9._-]`, drop leading dots, collapse dot runs.
pub fn sanitize_filename(input: &str) -> String {
    let safe: String = sanitize_input(input, MAX_FILENAME_LEN)
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        .collect();

    let mut out = String::with_capacity(safe.len());
    for c in safe.trim_start_matches('.').chars() {
        if c == '.' && out.ends_with('.') {
            continue;
        }
        out.push(c);
    }
    out
}

static ICLOUD_DOMAINS: &[&str] = &["icloud.com", "me.com"];

static OUTLOOK_DOMAINS: &[&str] = &[
    "hotmail.at", "hotmail.be", "hotmail.ca", "hotmail.cl", "hotmail.co.il", "hotmail.co.nz",
    "hotmail.co.th", "hotmail.co.uk", "hotmail.com", "hotmail.com.ar", "hotmail.com.au",
    "hotmail.com.br", "hotmail.com.gr", "hotmail.com.mx", "hotmail.com.pe", "hotmail.com.tr",
    "hotmail.com.vn", "hotmail.cz", "hotmail.de", "hotmail.dk", "hotmail.es", "hotmail.fr",
    "hotmail.hu", "hotmail.id", "hotmail.ie", "hotmail.in", "hotmail.it", "hotmail.jp",
    "hotmail.kr", "hotmail.lv", "hotmail.my", "hotmail.ph", "hotmail.pt", "hotmail.sa",
    "hotmail.sg", "hotmail.sk", "live.be", "live.co.uk", "live.com", "live.com.ar",
    "live.com.mx", "live.de", "live.es", "live.eu", "live.fr", "live.it", "live.nl", "msn.com",
    "outlook.at", "outlook.be", "outlook.cl", "outlook.co.il", "outlook.co.nz", "outlook.co.th",
    "outlook.com", "outlook.com.ar", "outlook.com.au", "outlook.com.br", "outlook.com.gr",
    "outlook.com.pe", "outlook.com.tr", "outlook.com.vn", "outlook.cz", "outlook.de",
    "outlook.dk", "outlook.es", "outlook.fr", "outlook.hu", "outlook.id", "outlook.ie",
    "outlook.in", "outlook.it", "outlook.jp", "outlook.kr", "outlook.lv", "outlook.my",
    "outlook.ph", "outlook.pt", "outlook.sa", "outlook.sg", "outlook.sk", "passport.com",
];

static YAHOO_DOMAINS: &[&str] = &[
    "rocketmail.com", "yahoo.ca", "yahoo.co.uk", "yahoo.com", "yahoo.de", "yahoo.fr",
    "yahoo.in", "yahoo.it", "ymail.com",
];

/// Sanitize and canonicalize an email address; `""` if it has no single `@`.
///
/// Provider subaddresses are removed: `+tag` for Gmail, iCloud and Outlook
/// domains, the last `-tag` for Yahoo. Gmail additionally drops dots and
/// folds `googlemail.com` into `gmail.com`.
pub fn sanitize_email(input: &str) -> String {
    let sanitized = sanitize_input(input, MAX_EMAIL_LEN).to_lowercase();
    let Some((local, domain)) = sanitized.split_once('@') else {
        return String::new();
    };
    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return String::new();
    }

    let (local, domain) = if matches!(domain, "gmail.com" | "googlemail.com") {
        (strip_subaddress(local, '+').replace('.', ""), "gmail.com")
    } else if ICLOUD_DOMAINS.contains(&domain) || OUTLOOK_DOMAINS.contains(&domain) {
        (strip_subaddress(local, '+').to_string(), domain)
    } else if YAHOO_DOMAINS.contains(&domain) {
        let base = local.rsplit_once('-').map_or(local, |(base, _)| base);
        (base.to_string(), domain)
    } else {
        return sanitized;
    };

    if local.is_empty() {
        return String::new();
    }
    format!("{local}@{domain}")
}

fn strip_subaddress(local: &str, separator: char) -> &str {
    local.split(separator).next().unwrap_or_default()
}
