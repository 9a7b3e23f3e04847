//! Rendering of parsed templates
//!
//! Rendering never fails. Names resolve through a chain of scopes, innermost
//! first; anything that cannot be resolved renders as empty text.

use super::ast::{Spanned, TemplateNode};
use super::context::{RenderContext, Value};

/// Name of the current iteration element
const CURRENT: &str = ".";

#[derive(Clone, Copy)]
enum Scope<'a> {
    Map(&'a RenderContext),
    Scalar(&'a Value),
}

impl<'a> Scope<'a> {
    fn of(value: &'a Value) -> Self {
        match value {
            Value::Map(map) => Scope::Map(map),
            other => Scope::Scalar(other),
        }
    }
}

pub(crate) fn render(nodes: &[Spanned<TemplateNode>], context: &RenderContext) -> String {
    let mut out = String::new();
    let mut scopes = vec![Scope::Map(context)];
    render_nodes(nodes, &mut scopes, &mut out);
    out
}

fn render_nodes<'a>(
    nodes: &'a [Spanned<TemplateNode>],
    scopes: &mut Vec<Scope<'a>>,
    out: &mut String,
) {
    for node in nodes {
        match &node.node {
            TemplateNode::Text(text) => out.push_str(text),
            TemplateNode::Identifier(name) => {
                if let Some(value) = lookup(scopes, name) {
                    write_value(value, out);
                }
            }
            TemplateNode::Section { name, children } => {
                let Some(value) = lookup(scopes, name) else {
                    continue;
                };
                match value {
                    Value::List(items) => {
                        for item in items {
                            scopes.push(Scope::of(item));
                            render_nodes(children, scopes, out);
                            scopes.pop();
                        }
                    }
                    Value::Bool(true) => render_nodes(children, scopes, out),
                    other if other.is_truthy() => {
                        scopes.push(Scope::of(other));
                        render_nodes(children, scopes, out);
                        scopes.pop();
                    }
                    _ => {}
                }
            }
        }
    }
}

fn lookup<'a>(scopes: &[Scope<'a>], name: &str) -> Option<&'a Value> {
    if name == CURRENT {
        return match scopes.last() {
            Some(Scope::Scalar(value)) => Some(*value),
            _ => None,
        };
    }

    let mut segments = name.split('.');
    let first = segments.next()?;
    let mut value = scopes.iter().rev().find_map(|scope| match scope {
        Scope::Map(map) => map.get(first),
        Scope::Scalar(_) => None,
    })?;
    for segment in segments {
        value = match value {
            Value::Map(map) => map.get(segment)?,
            _ => return None,
        };
    }
    Some(value)
}

fn write_value(value: &Value, out: &mut String) {
    match value {
        Value::Text(text) => out.push_str(text),
        Value::Bool(flag) => out.push_str(if *flag { "true" } else { "false" }),
        Value::List(_) | Value::Map(_) => {}
    }
}
