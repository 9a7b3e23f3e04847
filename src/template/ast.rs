//! Abstract syntax tree for parsed templates

use super::context::RenderContext;
use super::render;
use super::Span;

/// A node with its byte range in the template text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Spanned<T> {
    pub node: T,
    pub span: Span,
}

impl<T> Spanned<T> {
    pub fn new(node: T, span: Span) -> Self {
        Self { node, span }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateNode {
    /// Literal text, emitted verbatim
    Text(String),
    /// `{{ name }}`
    Identifier(String),
    /// `{{# name }} ... {{/ name }}`
    Section {
        name: String,
        children: Vec<Spanned<TemplateNode>>,
    },
}

/// A successfully parsed template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateDefinition {
    nodes: Vec<Spanned<TemplateNode>>,
    identifiers: Vec<String>,
}

impl TemplateDefinition {
    pub fn new(nodes: Vec<Spanned<TemplateNode>>) -> Self {
        let mut identifiers: Vec<String> = Vec::new();
        for node in &nodes {
            let name = match &node.node {
                TemplateNode::Identifier(name) => name,
                TemplateNode::Section { name, .. } => name,
                TemplateNode::Text(_) => continue,
            };
            if !identifiers.contains(name) {
                identifiers.push(name.clone());
            }
        }
        Self { nodes, identifiers }
    }

    pub fn nodes(&self) -> &[Spanned<TemplateNode>] {
        &self.nodes
    }

    /// Names referenced by top-level identifiers and sections, in first-use order
    pub fn identifiers(&self) -> &[String] {
        &self.identifiers
    }

    /// A template without any root nodes renders nothing
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Count nodes anywhere in the tree matching a predicate
    pub fn count_nodes(&self, predicate: impl Fn(&TemplateNode) -> bool) -> usize {
        fn walk(nodes: &[Spanned<TemplateNode>], predicate: &dyn Fn(&TemplateNode) -> bool) -> usize {
            nodes
                .iter()
                .map(|n| {
                    let nested = match &n.node {
                        TemplateNode::Section { children, .. } => walk(children, predicate),
                        _ => 0,
                    };
                    usize::from(predicate(&n.node)) + nested
                })
                .sum()
        }
        walk(&self.nodes, &predicate)
    }

    /// Number of `{{ name }}` nodes anywhere in the tree
    pub fn identifier_node_count(&self) -> usize {
        self.count_nodes(|n| matches!(n, TemplateNode::Identifier(_)))
    }

    pub fn render(&self, context: &RenderContext) -> String {
        render::render(&self.nodes, context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn section(name: &str, children: Vec<Spanned<TemplateNode>>) -> Spanned<TemplateNode> {
        Spanned::new(
            TemplateNode::Section {
                name: name.to_string(),
                children,
            },
            0..0,
        )
    }

    fn ident(name: &str) -> Spanned<TemplateNode> {
        Spanned::new(TemplateNode::Identifier(name.to_string()), 0..0)
    }

    #[test]
    fn test_identifiers_are_top_level_and_unique() {
        let template = TemplateDefinition::new(vec![
            ident("a"),
            section("items", vec![ident("inner")]),
            ident("a"),
        ]);
        assert_eq!(template.identifiers(), &["a".to_string(), "items".to_string()]);
    }

    #[test]
    fn test_count_nodes_descends_into_sections() {
        let template = TemplateDefinition::new(vec![
            ident("a"),
            section("s", vec![ident("b"), section("t", vec![ident("c")])]),
        ]);
        assert_eq!(template.identifier_node_count(), 3);
        assert_eq!(
            template.count_nodes(|n| matches!(n, TemplateNode::Section { .. })),
            2
        );
    }

    #[test]
    fn test_empty_template() {
        assert!(TemplateDefinition::new(Vec::new()).is_empty());
    }
}
