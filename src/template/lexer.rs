//! Lexer for template text using logos
//!
//! Logos splits the input into literal runs and raw `{{ ... }}` tags; each
//! tag is then classified into an identifier, a section open or a section
//! close. Tag problems are collected instead of aborting so that every
//! malformed tag in a template is reported at once.

use logos::Logos;

use super::{Span, SyntaxError, SyntaxErrorKind};

#[derive(Logos, Debug, Clone, PartialEq)]
enum RawToken {
    /// `{{` up to and including the closing braces, when present
    #[regex(r"\{\{[^}]*\}?\}?", |lex| lex.slice().to_string())]
    Tag(String),

    #[regex(r"[^{]+", |lex| lex.slice().to_string())]
    #[token("{", |lex| lex.slice().to_string())]
    Text(String),
}

/// Classified template token consumed by the grammar
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Piece {
    Text(String),
    Identifier(String),
    SectionOpen(String),
    SectionClose(String),
}

/// Tokenize template text
///
/// Adjacent literal runs are merged. Malformed or empty tags are dropped
/// from the token stream and returned as errors.
pub fn tokenize(input: &str) -> (Vec<(Piece, Span)>, Vec<SyntaxError>) {
    let mut pieces: Vec<(Piece, Span)> = Vec::new();
    let mut errors = Vec::new();

    for (token, span) in RawToken::lexer(input).spanned() {
        match token {
            Ok(RawToken::Text(text)) => push_text(&mut pieces, text, span),
            Ok(RawToken::Tag(raw)) => match classify_tag(&raw) {
                Ok(piece) => pieces.push((piece, span)),
                Err((kind, message)) => errors.push(SyntaxError::new(kind, message, span)),
            },
            Err(()) => errors.push(SyntaxError::new(
                SyntaxErrorKind::MalformedTag,
                format!("unexpected input '{}'", &input[span.clone()]),
                span,
            )),
        }
    }

    (pieces, errors)
}

fn push_text(pieces: &mut Vec<(Piece, Span)>, text: String, span: Span) {
    if let Some((Piece::Text(previous), previous_span)) = pieces.last_mut() {
        if previous_span.end == span.start {
            previous.push_str(&text);
            previous_span.end = span.end;
            return;
        }
    }
    pieces.push((Piece::Text(text), span));
}

fn classify_tag(raw: &str) -> Result<Piece, (SyntaxErrorKind, String)> {
    let Some(inner) = raw
        .strip_prefix("{{")
        .and_then(|rest| rest.strip_suffix("}}"))
    else {
        return Err((
            SyntaxErrorKind::MalformedTag,
            format!("tag '{}' is missing its closing '}}}}'", raw.trim_end()),
        ));
    };

    let inner = inner.trim();
    let (sigil, name) = match inner.chars().next() {
        Some(sigil @ ('#' | '/')) => (Some(sigil), inner[1..].trim()),
        _ => (None, inner),
    };

    if name.is_empty() {
        return Err((
            SyntaxErrorKind::EmptyIdentifier,
            format!("tag '{}' does not name anything", raw),
        ));
    }
    if !is_valid_name(name) {
        return Err((
            SyntaxErrorKind::MalformedTag,
            format!("'{}' is not a valid placeholder name", name),
        ));
    }
    let name = name.to_string();
    Ok(match sigil {
        Some('#') => Piece::SectionOpen(name),
        Some(_) => Piece::SectionClose(name),
        None => Piece::Identifier(name),
    })
}

/// Names are ASCII alphanumerics, `_` and `.`
fn is_valid_name(name: &str) -> bool {
    name.chars()
        .all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '.')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pieces(input: &str) -> Vec<Piece> {
        let (pieces, errors) = tokenize(input);
        assert!(errors.is_empty(), "unexpected errors: {:?}", errors);
        pieces.into_iter().map(|(p, _)| p).collect()
    }

    #[test]
    fn test_text_and_identifier() {
        assert_eq!(
            pieces("Hello {{ name }}!"),
            vec![
                Piece::Text("Hello ".to_string()),
                Piece::Identifier("name".to_string()),
                Piece::Text("!".to_string()),
            ]
        );
    }

    #[test]
    fn test_sections_and_iterator() {
        assert_eq!(
            pieces("{{#items}}[{{.}}]{{/ items }}"),
            vec![
                Piece::SectionOpen("items".to_string()),
                Piece::Text("[".to_string()),
                Piece::Identifier(".".to_string()),
                Piece::Text("]".to_string()),
                Piece::SectionClose("items".to_string()),
            ]
        );
    }

    #[test]
    fn test_single_braces_stay_text() {
        assert_eq!(
            pieces("void Run() { return; }"),
            vec![Piece::Text("void Run() { return; }".to_string())]
        );
    }

    #[test]
    fn test_whitespace_preserved() {
        assert_eq!(
            pieces("  a\n\t{{x}}  \n"),
            vec![
                Piece::Text("  a\n\t".to_string()),
                Piece::Identifier("x".to_string()),
                Piece::Text("  \n".to_string()),
            ]
        );
    }

    #[test]
    fn test_empty_identifier() {
        let (_, errors) = tokenize("a {{ }} b {{#}}");
        let kinds: Vec<_> = errors.iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![SyntaxErrorKind::EmptyIdentifier, SyntaxErrorKind::EmptyIdentifier]
        );
        assert_eq!(errors[0].span, 2..7);
    }

    #[test]
    fn test_unterminated_tag() {
        let (pieces, errors) = tokenize("Hello {{ name");
        assert_eq!(pieces.len(), 1);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, SyntaxErrorKind::MalformedTag);
    }

    #[test]
    fn test_invalid_name() {
        let (_, errors) = tokenize("{{ two words }}");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, SyntaxErrorKind::MalformedTag);
    }
}
