//! Signature-based detection of injection payloads.
//!
//! A coarse second line of defense run over already-sanitized fields. Which
//! signature matched is for server-side diagnostics only; callers see the
//! same rejection regardless.

use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ThreatKind {
    ScriptTag,
    JavascriptScheme,
    EventHandler,
    Eval,
    CssExpression,
    ModuleImport,
    TemplateInjection,
    TemplateLiteral,
    IframeTag,
    ObjectTag,
    EmbedTag,
    PathTraversal,
    NullByte,
}

impl ThreatKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ScriptTag => "script_tag",
            Self::JavascriptScheme => "javascript_scheme",
            Self::EventHandler => "event_handler",
            Self::Eval => "eval",
            Self::CssExpression => "css_expression",
            Self::ModuleImport => "module_import",
            Self::TemplateInjection => "template_injection",
            Self::TemplateLiteral => "template_literal",
            Self::IframeTag => "iframe_tag",
            Self::ObjectTag => "object_tag",
            Self::EmbedTag => "embed_tag",
            Self::PathTraversal => "path_traversal",
            Self::NullByte => "null_byte",
        }
    }
}

impl fmt::Display for ThreatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// Checked in this order; first match wins.
static SIGNATURES: Lazy<Vec<(ThreatKind, Regex)>> = Lazy::new(|| {
    [
        (ThreatKind::ScriptTag, r"(?i)<script"),
        (ThreatKind::JavascriptScheme, r"(?i)javascript:"),
        (ThreatKind::EventHandler, r"(?i)on[a-z0-9_]+\s*="),
        (ThreatKind::Eval, r"(?i)eval\("),
        (ThreatKind::CssExpression, r"(?i)expression\("),
        (ThreatKind::ModuleImport, r"(?i)import\s"),
        (ThreatKind::TemplateInjection, r"\{\{.*\}\}"),
        (ThreatKind::TemplateLiteral, r"\$\{.*\}"),
        (ThreatKind::IframeTag, r"(?i)<iframe"),
        (ThreatKind::ObjectTag, r"(?i)<object"),
        (ThreatKind::EmbedTag, r"(?i)<embed"),
        (ThreatKind::PathTraversal, r"\.\./"),
        (ThreatKind::NullByte, r"\x00"),
    ]
    .into_iter()
    .filter_map(|(kind, pattern)| match Regex::new(pattern) {
        Ok(re) => Some((kind, re)),
        Err(e) => {
            tracing::error!(kind = %kind, error = %e, "Invalid threat signature");
            None
        }
    })
    .collect()
});

/// First matching signature, if any.
pub fn detect_threat(input: &str) -> Option<ThreatKind> {
    SIGNATURES
        .iter()
        .find(|(_, re)| re.is_match(input))
        .map(|(kind, _)| *kind)
}

/// True when `input` matches any injection signature.
pub fn is_suspicious(input: &str) -> bool {
    detect_threat(input).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_payloads_flagged() {
        assert!(is_suspicious("<script>alert(1)</script>"));
        assert!(is_suspicious("javascript:alert(1)"));
        assert!(is_suspicious("onclick=alert(1)"));
        assert!(is_suspicious("../../etc/passwd"));
    }

    #[test]
    fn test_benign_text_passes() {
        assert!(!is_suspicious("Hello, my name is Ana-María."));
        assert!(!is_suspicious("Looking forward to the conference in Lyon."));
        assert!(!is_suspicious("Prices went from $5 to $10 {approx}"));
    }

    #[test]
    fn test_signature_kinds() {
        let cases = [
            ("<SCRIPT src=x>", ThreatKind::ScriptTag),
            ("JaVaScRiPt:void(0)", ThreatKind::JavascriptScheme),
            ("<img onerror = x>", ThreatKind::EventHandler),
            ("eval(atob('x'))", ThreatKind::Eval),
            ("width: expression(alert(1))", ThreatKind::CssExpression),
            ("import os", ThreatKind::ModuleImport),
            ("{{ config.secret }}", ThreatKind::TemplateInjection),
            ("${process.env}", ThreatKind::TemplateLiteral),
            ("<iframe src=//evil>", ThreatKind::IframeTag),
            ("<object data=x>", ThreatKind::ObjectTag),
            ("<embed src=x>", ThreatKind::EmbedTag),
            ("..\u{0}", ThreatKind::NullByte),
        ];
        for (input, kind) in cases {
            assert_eq!(detect_threat(input), Some(kind), "input: {input:?}");
        }
    }

    #[test]
    fn test_first_match_wins() {
        assert_eq!(
            detect_threat("<script>../x</script>"),
            Some(ThreatKind::ScriptTag)
        );
    }

    #[test]
    fn test_template_markers_do_not_span_lines() {
        assert!(!is_suspicious("{{\n}}"));
    }
}
