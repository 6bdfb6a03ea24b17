//! Query-parameter and redirect-target guards.
//!
//! Every value is screened with the threat detector before it is
//! sanitized or coerced; a single suspicious value rejects the whole set.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::security::sanitize::sanitize_input;
use crate::security::threat::is_suspicious;
use crate::validation::fields::{ValidationErrors, ValidationResult};

pub const DEFAULT_PARAM_LEN: usize = 1000;

static ID_CHARS: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("static regex"));

/// Ordered, possibly repeated query parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams(Vec<(String, String)>);

impl QueryParams {
    /// Parse an `application/x-www-form-urlencoded` query string.
    pub fn parse(query: &str) -> Self {
        let query = query.strip_prefix('?').unwrap_or(query);
        Self(
            url::form_urlencoded::parse(query.as_bytes())
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect(),
        )
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self(pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn get_all<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.0
            .iter()
            .filter(move |(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(_, v)| v.as_str())
    }
}

/// A single parameter, sanitized. `None` when missing, empty, or suspicious.
pub fn get_safe_param(params: &QueryParams, key: &str, max_len: usize) -> Option<String> {
    let value = params.get(key).filter(|v| !v.is_empty())?;
    if is_suspicious(value) {
        return None;
    }
    Some(sanitize_input(value, max_len))
}

/// Every value for `key` that is not suspicious and not empty once sanitized.
pub fn get_safe_param_array(params: &QueryParams, key: &str, max_len: usize) -> Vec<String> {
    params
        .get_all(key)
        .filter(|v| !is_suspicious(v))
        .map(|v| sanitize_input(v, max_len))
        .filter(|v| !v.is_empty())
        .collect()
}

/// Typed view over a parameter set.
pub trait ParamSchema: Sized {
    fn from_params(params: &QueryParams) -> ValidationResult<Self>;
}

/// Screen every value for threats, then coerce through `S`.
pub fn validate_params<S: ParamSchema>(params: &QueryParams) -> ValidationResult<S> {
    if params.values().any(is_suspicious) {
        return Err(ValidationErrors::single("Invalid parameter detected"));
    }
    S::from_params(params)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationParams {
    pub page: u32,
    pub limit: u32,
}

impl ParamSchema for PaginationParams {
    fn from_params(params: &QueryParams) -> ValidationResult<Self> {
        let mut errors = Vec::new();
        let page = bounded_int(params, "page", 1, 10_000, &mut errors);
        let limit = bounded_int(params, "limit", 20, 100, &mut errors);
        if errors.is_empty() {
            Ok(Self { page, limit })
        } else {
            Err(ValidationErrors(errors))
        }
    }
}

fn bounded_int(params: &QueryParams, key: &str, default: u32, max: u32, errors: &mut Vec<String>) -> u32 {
    let Some(raw) = params.get(key) else {
        return default;
    };
    match raw.trim().parse::<u32>() {
        Ok(n) if (1..=max).contains(&n) => n,
        _ => {
            errors.push(format!("{key} must be a whole number between 1 and {max}"));
            default
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchParams {
    pub q: Option<String>,
    pub sort: SortOrder,
    pub filter: Option<String>,
}

impl ParamSchema for SearchParams {
    fn from_params(params: &QueryParams) -> ValidationResult<Self> {
        let mut errors = Vec::new();

        let q = bounded_str(params, "q", 200, &mut errors);
        let filter = bounded_str(params, "filter", 100, &mut errors);
        let sort = match params.get("sort") {
            None => SortOrder::default(),
            Some("asc") => SortOrder::Asc,
            Some("desc") => SortOrder::Desc,
            Some(_) => {
                errors.push("sort must be 'asc' or 'desc'".to_string());
                SortOrder::default()
            }
        };

        if errors.is_empty() {
            Ok(Self { q, sort, filter })
        } else {
            Err(ValidationErrors(errors))
        }
    }
}

fn bounded_str(params: &QueryParams, key: &str, max: usize, errors: &mut Vec<String>) -> Option<String> {
    let raw = params.get(key)?;
    if raw.chars().count() > max {
        errors.push(format!("{key} must be {max} characters or less"));
        return None;
    }
    Some(sanitize_input(raw, max))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdParam {
    pub id: String,
}

impl ParamSchema for IdParam {
    fn from_params(params: &QueryParams) -> ValidationResult<Self> {
        match params.get("id") {
            None => Err(ValidationErrors::single("id is required")),
            Some(id) if id.len() > 100 => Err(ValidationErrors::single("id must be 100 characters or less")),
            Some(id) if !ID_CHARS.is_match(id) => Err(ValidationErrors::single(
                "id can only contain letters, numbers, hyphens, and underscores",
            )),
            Some(id) => Ok(Self { id: id.to_string() }),
        }
    }
}

/// Redirect target from `redirect` (or `returnUrl`) that cannot leave the site.
///
/// Single-slash relative paths are accepted. Absolute http(s) URLs are
/// accepted only when the host is, or is a subdomain of, an allowed domain.
pub fn get_safe_redirect_url(params: &QueryParams, allowed_domains: &[&str]) -> Option<String> {
    let target = get_safe_param(params, "redirect", DEFAULT_PARAM_LEN)
        .filter(|s| !s.is_empty())
        .or_else(|| get_safe_param(params, "returnUrl", DEFAULT_PARAM_LEN))
        .filter(|s| !s.is_empty())?;

    if target.starts_with('/') && !target.starts_with("//") && !target.starts_with("/\\") {
        return Some(target);
    }

    let parsed = url::Url::parse(&target).ok()?;
    if !matches!(parsed.scheme(), "http" | "https") || allowed_domains.is_empty() {
        return None;
    }

    let host = parsed.host_str()?.to_ascii_lowercase();
    let allowed = allowed_domains.iter().any(|domain| {
        let domain = domain.to_ascii_lowercase();
        host == domain || host.ends_with(&format!(".{domain}"))
    });
    allowed.then_some(target)
}
