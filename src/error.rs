//! Diagnostics reported by every stage of the generation pipeline
//!
//! User mistakes (a malformed template, a missing argument) are data, not
//! Rust errors: stages return a [`Reported`] value carrying zero or more
//! [`Diagnostic`]s and the pipeline keeps going wherever it can.

use std::fmt;

use ariadne::{Color, Label, Report, ReportKind, Source};
use serde::Deserialize;

/// Byte range in template text
pub type Span = std::ops::Range<usize>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Severity {
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// Stable diagnostic codes
///
/// The numeric ranges group codes by stage: `GB1xxx` template syntax,
/// `GB2xxx` generator definitions, `GB3xxx` usage sites and `GB4xxx` output
/// collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticCode {
    UnclosedSection,
    UnmatchedClose,
    MismatchedClose,
    EmptyIdentifier,
    MalformedTag,
    NotSealed,
    PartialDeclaration,
    InvalidGeneratorName,
    InvalidRequiredOrder,
    DisallowedParameterType,
    InvalidGlobalTemplate,
    DuplicateRequiredOrder,
    EmptyGenerator,
    DuplicateGenerator,
    MissingRequiredArgument,
    TooManyArguments,
    InvalidUsageTarget,
    MultipleNotAllowed,
    UnknownNamedArgument,
    DuplicateArtifactKey,
}

impl DiagnosticCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticCode::UnclosedSection => "GB1001",
            DiagnosticCode::UnmatchedClose => "GB1002",
            DiagnosticCode::MismatchedClose => "GB1003",
            DiagnosticCode::EmptyIdentifier => "GB1004",
            DiagnosticCode::MalformedTag => "GB1005",
            DiagnosticCode::NotSealed => "GB2001",
            DiagnosticCode::PartialDeclaration => "GB2002",
            DiagnosticCode::InvalidGeneratorName => "GB2003",
            DiagnosticCode::InvalidRequiredOrder => "GB2004",
            DiagnosticCode::DisallowedParameterType => "GB2005",
            DiagnosticCode::InvalidGlobalTemplate => "GB2006",
            DiagnosticCode::DuplicateRequiredOrder => "GB2101",
            DiagnosticCode::EmptyGenerator => "GB2102",
            DiagnosticCode::DuplicateGenerator => "GB2103",
            DiagnosticCode::MissingRequiredArgument => "GB3001",
            DiagnosticCode::TooManyArguments => "GB3002",
            DiagnosticCode::InvalidUsageTarget => "GB3003",
            DiagnosticCode::MultipleNotAllowed => "GB3004",
            DiagnosticCode::UnknownNamedArgument => "GB3101",
            DiagnosticCode::DuplicateArtifactKey => "GB4001",
        }
    }

    /// Default severity of the code
    pub fn severity(&self) -> Severity {
        match self {
            DiagnosticCode::DuplicateRequiredOrder
            | DiagnosticCode::EmptyGenerator
            | DiagnosticCode::DuplicateGenerator
            | DiagnosticCode::UnknownNamedArgument => Severity::Warning,
            _ => Severity::Error,
        }
    }
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque location token supplied by the host integration layer
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(transparent)]
pub struct Location(pub String);

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Template text a diagnostic points into
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snippet {
    /// Display name, usually the member holding the template
    pub name: String,
    pub source: String,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub code: DiagnosticCode,
    pub severity: Severity,
    pub message: String,
    pub location: Option<Location>,
    pub snippet: Option<Snippet>,
}

impl Diagnostic {
    /// Create a diagnostic with the code's default severity
    pub fn new(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self {
            code,
            severity: code.severity(),
            message: message.into(),
            location: None,
            snippet: None,
        }
    }

    pub fn with_location(mut self, location: Option<Location>) -> Self {
        self.location = location;
        self
    }

    pub fn with_snippet(mut self, snippet: Snippet) -> Self {
        self.snippet = Some(snippet);
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    /// Format the diagnostic, with template context via ariadne when available
    pub fn format(&self) -> String {
        let Some(snippet) = &self.snippet else {
            return self.to_string();
        };

        let (kind, color) = match self.severity {
            Severity::Error => (ReportKind::Error, Color::Red),
            Severity::Warning => (ReportKind::Warning, Color::Yellow),
        };
        let name = snippet.name.as_str();
        let mut report = Report::build(kind, name, snippet.span.start)
            .with_code(self.code.as_str())
            .with_message(&self.message)
            .with_label(
                Label::new((name, snippet.span.clone()))
                    .with_message(&self.message)
                    .with_color(color),
            );
        if let Some(location) = &self.location {
            report = report.with_note(format!("declared at {}", location));
        }

        let mut buf = Vec::new();
        if report
            .finish()
            .write((name, Source::from(snippet.source.as_str())), &mut buf)
            .is_err()
        {
            return self.to_string();
        }
        String::from_utf8_lossy(&buf).into_owned()
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]: {}", self.severity, self.code, self.message)?;
        if let Some(location) = &self.location {
            write!(f, " (at {})", location)?;
        }
        Ok(())
    }
}

/// A stage result: an optional value plus the diagnostics produced on the way
#[derive(Debug, Clone, PartialEq)]
pub struct Reported<T> {
    pub value: Option<T>,
    pub diagnostics: Vec<Diagnostic>,
}

impl<T> Reported<T> {
    pub fn ok(value: T, diagnostics: Vec<Diagnostic>) -> Self {
        Self {
            value: Some(value),
            diagnostics,
        }
    }

    pub fn failed(diagnostics: Vec<Diagnostic>) -> Self {
        Self {
            value: None,
            diagnostics,
        }
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_severity() {
        assert_eq!(DiagnosticCode::EmptyGenerator.severity(), Severity::Warning);
        assert_eq!(DiagnosticCode::DuplicateArtifactKey.severity(), Severity::Error);
    }

    #[test]
    fn test_display_includes_code_and_location() {
        let diag = Diagnostic::new(DiagnosticCode::NotSealed, "generator 'X' must be sealed")
            .with_location(Some(Location("Gen.cs:4".to_string())));
        assert_eq!(
            diag.to_string(),
            "error[GB2001]: generator 'X' must be sealed (at Gen.cs:4)"
        );
    }

    #[test]
    fn test_format_with_snippet_mentions_message() {
        let diag = Diagnostic::new(DiagnosticCode::UnclosedSection, "section 'items' is never closed")
            .with_snippet(Snippet {
                name: "Body".to_string(),
                source: "{{#items}}x".to_string(),
                span: 0..10,
            });
        let formatted = diag.format();
        assert!(formatted.contains("section 'items' is never closed"));
        assert!(formatted.contains("GB1001"));
    }

    #[test]
    fn test_format_without_snippet_is_display() {
        let diag = Diagnostic::new(DiagnosticCode::EmptyGenerator, "nothing to emit");
        assert_eq!(diag.format(), diag.to_string());
    }
}
