//! Placeholder template language
//!
//! Templates are literal text interleaved with `{{ name }}` substitutions
//! and `{{# name }} ... {{/ name }}` sections. A section repeats for every
//! element of a list and renders once for any other truthy value. Inside a
//! section `{{ . }}` names the current element.

pub mod ast;
pub mod context;
mod grammar;
pub mod lexer;
mod render;

pub use ast::{Spanned, TemplateDefinition, TemplateNode};
pub use context::{RenderContext, Value};
pub use grammar::parse;

use thiserror::Error;

use crate::error::{Diagnostic, DiagnosticCode, Snippet};

/// Byte range in template text
pub type Span = std::ops::Range<usize>;

/// Placeholder aggregating the output of child templates
pub const CHILD_CONTENT: &str = "ChildContent";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyntaxErrorKind {
    UnclosedSection,
    UnmatchedClose,
    MismatchedClose,
    EmptyIdentifier,
    MalformedTag,
}

impl SyntaxErrorKind {
    pub fn code(&self) -> DiagnosticCode {
        match self {
            SyntaxErrorKind::UnclosedSection => DiagnosticCode::UnclosedSection,
            SyntaxErrorKind::UnmatchedClose => DiagnosticCode::UnmatchedClose,
            SyntaxErrorKind::MismatchedClose => DiagnosticCode::MismatchedClose,
            SyntaxErrorKind::EmptyIdentifier => DiagnosticCode::EmptyIdentifier,
            SyntaxErrorKind::MalformedTag => DiagnosticCode::MalformedTag,
        }
    }
}

/// A template syntax error
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message} at {span:?}")]
pub struct SyntaxError {
    pub kind: SyntaxErrorKind,
    pub message: String,
    pub span: Span,
}

impl SyntaxError {
    pub fn new(kind: SyntaxErrorKind, message: impl Into<String>, span: Span) -> Self {
        Self {
            kind,
            message: message.into(),
            span,
        }
    }

    /// Turn the error into a diagnostic pointing into the template text
    pub fn to_diagnostic(&self, template_name: &str, source: &str) -> Diagnostic {
        Diagnostic::new(
            self.kind.code(),
            format!("template '{}': {}", template_name, self.message),
        )
        .with_snippet(Snippet {
            name: template_name.to_string(),
            source: source.to_string(),
            span: self.span.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_diagnostic_carries_code_and_snippet() {
        let errors = parse("{{#a}}").unwrap_err();
        let diag = errors[0].to_diagnostic("Body", "{{#a}}");
        assert_eq!(diag.code, DiagnosticCode::UnclosedSection);
        assert!(diag.message.starts_with("template 'Body':"));
        assert_eq!(diag.snippet.map(|s| s.span), Some(0..6));
    }
}
