//! Transient notices shown in the alert container.

use std::fmt;

use chrono::{DateTime, Local};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    Success,
    Danger,
    Warning,
    Info,
}

impl Severity {
    /// Parse a severity name; anything unrecognised is treated as info.
    pub fn parse(name: &str) -> Self {
        match name {
            "success" => Severity::Success,
            "danger" => Severity::Danger,
            "warning" => Severity::Warning,
            _ => Severity::Info,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Success => "success",
            Severity::Danger => "danger",
            Severity::Warning => "warning",
            Severity::Info => "info",
        }
    }

    /// Font Awesome icon name.
    pub fn icon(self) -> &'static str {
        match self {
            Severity::Success => "check-circle",
            Severity::Danger => "exclamation-triangle",
            Severity::Warning => "exclamation-circle",
            Severity::Info => "info-circle",
        }
    }

    /// Glyph used by the desktop window in place of the icon font.
    pub fn glyph(self) -> &'static str {
        match self {
            Severity::Success => "✔",
            Severity::Danger => "⚠",
            Severity::Warning => "❗",
            Severity::Info => "ℹ",
        }
    }
}

/// Unique, time-ordered alert identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AlertId(String);

impl AlertId {
    pub fn generate() -> Self {
        Self(format!("alert-{}", Uuid::now_v7().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AlertId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Alert {
    pub id: AlertId,
    pub severity: Severity,
    /// Literal text, never markup.
    pub message: String,
    pub created_at: DateTime<Local>,
}

impl Alert {
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            id: AlertId::generate(),
            severity,
            message: message.into(),
            created_at: Local::now(),
        }
    }

    pub fn to_html(&self) -> String {
        format!(
            r#"<div class="alert alert-{sev} alert-dismissible fade show" role="alert" id="{id}"><i class="fas fa-{icon} me-2"></i>{message}<button type="button" class="btn-close" data-bs-dismiss="alert"></button></div>"#,
            sev = self.severity.as_str(),
            id = self.id,
            icon = self.severity.icon(),
            message = escape_html(&self.message),
        )
    }
}

/// Escape text for insertion into HTML as literal content.
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_icon_mapping_with_default() {
        assert_eq!(Severity::parse("success").icon(), "check-circle");
        assert_eq!(Severity::parse("danger").icon(), "exclamation-triangle");
        assert_eq!(Severity::parse("warning").icon(), "exclamation-circle");
        assert_eq!(Severity::parse("info").icon(), "info-circle");
        assert_eq!(Severity::parse("primary"), Severity::Info);
        assert_eq!(Severity::parse("").icon(), "info-circle");
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html(r#"<script>alert("x")</script> & 'y'"#),
            "&lt;script&gt;alert(&quot;x&quot;)&lt;/script&gt; &amp; &#39;y&#39;"
        );
        assert_eq!(escape_html("plain text"), "plain text");
    }

    #[test]
    fn test_alert_html_keeps_markup_literal() {
        let alert = Alert::new(Severity::Danger, "<script>steal()</script>");
        let html = alert.to_html();
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;steal()&lt;/script&gt;"));
        assert!(html.contains("alert-danger"));
        assert!(html.contains("fa-exclamation-triangle"));
        assert!(html.contains(&format!(r#"id="{}""#, alert.id)));
    }

    #[test]
    fn test_alert_ids_are_unique() {
        let a = AlertId::generate();
        let b = AlertId::generate();
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("alert-"));
    }
}
