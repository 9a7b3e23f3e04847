//! Template parser using chumsky

use chumsky::input::{Stream, ValueInput};
use chumsky::prelude::*;

use super::ast::{Spanned, TemplateDefinition, TemplateNode};
use super::lexer::{self, Piece};
use super::{Span, SyntaxError, SyntaxErrorKind};

/// Section tree as parsed, before open and close names are checked
#[derive(Debug, Clone)]
enum RawNode {
    Text(String),
    Identifier(String),
    Section {
        name: String,
        children: Vec<Spanned<RawNode>>,
        close: Spanned<String>,
    },
}

/// Parse template text into a [`TemplateDefinition`]
///
/// All tag errors and name mismatches are reported together; the first
/// structural error (an unclosed section or a stray close) ends parsing.
pub fn parse(input: &str) -> Result<TemplateDefinition, Vec<SyntaxError>> {
    let len = input.len();
    let (pieces, mut errors) = lexer::tokenize(input);
    let unclosed = innermost_unclosed(&pieces);

    let token_iter = pieces
        .into_iter()
        .map(|(piece, span)| (piece, SimpleSpan::from(span)));
    let token_stream = Stream::from_iter(token_iter).map((len..len).into(), |(t, s): (_, _)| (t, s));

    match template_parser().parse(token_stream).into_result() {
        Ok(raw) => {
            let nodes = check_sections(raw, &mut errors);
            if errors.is_empty() {
                Ok(TemplateDefinition::new(nodes))
            } else {
                Err(errors)
            }
        }
        Err(errs) => {
            errors.extend(errs.into_iter().map(|err| {
                let at_end = err.found().is_none();
                match &unclosed {
                    Some((name, span)) if at_end => SyntaxError::new(
                        SyntaxErrorKind::UnclosedSection,
                        format!("section '{}' is never closed", name),
                        span.clone(),
                    ),
                    _ => SyntaxError::from(err),
                }
            }));
            errors.sort_by_key(|e| e.span.start);
            Err(errors)
        }
    }
}

/// Helper to extract span range from chumsky's MapExtra
fn span_range(e: &impl chumsky::span::Span<Offset = usize>) -> Span {
    e.start()..e.end()
}

fn template_parser<'a, I>() -> impl Parser<'a, I, Vec<Spanned<RawNode>>, extra::Err<Rich<'a, Piece>>> + Clone
where
    I: ValueInput<'a, Token = Piece, Span = SimpleSpan>,
{
    let node = recursive(|node| {
        let text = select! {
            Piece::Text(text) => RawNode::Text(text),
        };

        let identifier = select! {
            Piece::Identifier(name) => RawNode::Identifier(name),
        };

        let close = select! {
            Piece::SectionClose(name) => name,
        }
        .map_with(|name, e| Spanned::new(name, span_range(&e.span())));

        let section = select! {
            Piece::SectionOpen(name) => name,
        }
        .then(node.repeated().collect::<Vec<_>>())
        .then(close)
        .map(|((name, children), close)| RawNode::Section {
            name,
            children,
            close,
        });

        choice((text, identifier, section))
            .map_with(|node, e| Spanned::new(node, span_range(&e.span())))
    });

    node.repeated().collect::<Vec<_>>().then_ignore(end())
}

/// Convert the raw tree, reporting every section closed under another name
fn check_sections(raw: Vec<Spanned<RawNode>>, errors: &mut Vec<SyntaxError>) -> Vec<Spanned<TemplateNode>> {
    raw.into_iter()
        .map(|spanned| {
            let node = match spanned.node {
                RawNode::Text(text) => TemplateNode::Text(text),
                RawNode::Identifier(name) => TemplateNode::Identifier(name),
                RawNode::Section {
                    name,
                    children,
                    close,
                } => {
                    if close.node != name {
                        errors.push(SyntaxError::new(
                            SyntaxErrorKind::MismatchedClose,
                            format!("section '{}' is closed by '{}'", name, close.node),
                            close.span,
                        ));
                    }
                    TemplateNode::Section {
                        name,
                        children: check_sections(children, errors),
                    }
                }
            };
            Spanned::new(node, spanned.span)
        })
        .collect()
}

/// The innermost section still open at the end of the input, if any
fn innermost_unclosed(pieces: &[(Piece, Span)]) -> Option<(String, Span)> {
    let mut open: Vec<(String, Span)> = Vec::new();
    for (piece, span) in pieces {
        match piece {
            Piece::SectionOpen(name) => open.push((name.clone(), span.clone())),
            Piece::SectionClose(_) => {
                open.pop();
            }
            _ => {}
        }
    }
    open.pop()
}

impl<'a> From<Rich<'a, Piece>> for SyntaxError {
    fn from(err: Rich<'a, Piece>) -> Self {
        let span = err.span().into_range();
        match err.found() {
            None => SyntaxError::new(
                SyntaxErrorKind::UnclosedSection,
                "template ends inside an open section",
                span,
            ),
            Some(Piece::SectionClose(name)) => SyntaxError::new(
                SyntaxErrorKind::UnmatchedClose,
                format!("'{{{{/{}}}}}' closes a section that was never opened", name),
                span,
            ),
            Some(found) => SyntaxError::new(
                SyntaxErrorKind::MalformedTag,
                format!("unexpected {:?}", found),
                span,
            ),
        }
    }
}
