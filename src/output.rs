//! Rendering bound usages and collecting the artifacts they produce
//!
//! Rendering is per usage and therefore memoized per usage by the graph.
//! Collection sees every rendered usage at once: it groups inline fragments
//! by target class, feeds child fragments into global templates and refuses
//! to emit anything when two artifacts would share a key.

use std::collections::HashMap;

use log::debug;

use crate::config::GenerationConfig;
use crate::error::{Diagnostic, DiagnosticCode};
use crate::identifier::escape_file_key;
use crate::template::{RenderContext, TemplateDefinition, Value, CHILD_CONTENT};
use crate::usage::{BoundUsage, UsageTarget};

/// One generated file, keyed by a filesystem-safe hint name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputArtifact {
    pub key: String,
    pub content: String,
}

impl OutputArtifact {
    pub fn new(key: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            content: content.into(),
        }
    }
}

/// Inline templates of one usage, destined for its target class's artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineFragment {
    pub key: String,
    pub text: String,
}

/// Output of a global child template, aggregated by generator name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildFragment {
    pub generator_name: String,
    pub text: String,
}

/// A global file template waiting for its `ChildContent`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalRequest {
    pub key: String,
    pub generator_name: String,
    pub template: TemplateDefinition,
    pub context: RenderContext,
    pub header: String,
}

/// Everything a single bound usage contributes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderedUsage {
    pub inline: Option<InlineFragment>,
    pub files: Vec<OutputArtifact>,
    pub children: Vec<ChildFragment>,
    pub globals: Vec<GlobalRequest>,
}

/// Result of a collection pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectedOutputs {
    pub artifacts: Vec<OutputArtifact>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Render every template of a bound usage with its context
pub fn render_usage(usage: &BoundUsage, config: &GenerationConfig) -> RenderedUsage {
    let definition = &usage.definition;
    let context = &usage.context;
    let header = if config.debug_header {
        debug_header(config, &definition.identifier.to_string(), context)
    } else {
        String::new()
    };

    let mut rendered = RenderedUsage::default();

    if !definition.templates.is_empty() {
        match usage.target.class() {
            Some(class) => {
                let body = definition
                    .templates
                    .iter()
                    .map(|t| t.template.render(context))
                    .collect::<Vec<_>>()
                    .join(&config.fragment_separator);
                rendered.inline = Some(InlineFragment {
                    key: class.escaped_file_key(),
                    text: format!("{}{}", header, body),
                });
            }
            None => debug!(
                "'{}' has inline templates but is applied to the assembly; they are skipped",
                definition.identifier
            ),
        }
    }

    for file in &definition.file_templates {
        let name = file.file_name.render(context);
        let name = match name.trim() {
            "" => file.member.as_str(),
            trimmed => trimmed,
        };
        rendered.files.push(OutputArtifact::new(
            escape_file_key(name),
            format!("{}{}", header, file.template.render(context)),
        ));
    }

    for child in &definition.global_child_templates {
        rendered.children.push(ChildFragment {
            generator_name: child.generator_name.clone(),
            text: child.template.render(context),
        });
    }

    if usage.target == UsageTarget::Assembly {
        for global in &definition.global_file_templates {
            rendered.globals.push(GlobalRequest {
                key: escape_file_key(global.file_name.trim()),
                generator_name: global.generator_name.clone(),
                template: global.template.clone(),
                context: context.clone(),
                header: header.clone(),
            });
        }
    }

    rendered
}

/// Comment lines naming the generator and listing the context
fn debug_header(config: &GenerationConfig, generator: &str, context: &RenderContext) -> String {
    let prefix = &config.comment_prefix;
    let mut header = format!("{} Generated by {}\n", prefix, generator);
    for (name, value) in context.iter() {
        let shown = match value {
            Value::Text(text) => text.clone(),
            Value::Bool(flag) => flag.to_string(),
            Value::List(items) => format!("[{} item(s)]", items.len()),
            Value::Map(map) => format!("{{{} entry(s)}}", map.len()),
        };
        header.push_str(&format!("{} {}: {}\n", prefix, name, shown));
    }
    header
}

/// Assemble the final artifact set
///
/// Any key produced more than once is reported and the whole set is
/// withheld.
pub fn collect_outputs(rendered: &[RenderedUsage], config: &GenerationConfig) -> CollectedOutputs {
    let mut artifacts: Vec<OutputArtifact> = Vec::new();

    let mut inline: Vec<OutputArtifact> = Vec::new();
    for fragment in rendered.iter().filter_map(|r| r.inline.as_ref()) {
        match inline.iter_mut().find(|a| a.key == fragment.key) {
            Some(existing) => {
                existing.content.push_str(&config.fragment_separator);
                existing.content.push_str(&fragment.text);
            }
            None => inline.push(OutputArtifact::new(fragment.key.clone(), fragment.text.clone())),
        }
    }
    artifacts.extend(inline);

    artifacts.extend(rendered.iter().flat_map(|r| r.files.iter().cloned()));

    let mut children: HashMap<&str, String> = HashMap::new();
    for child in rendered.iter().flat_map(|r| &r.children) {
        children
            .entry(child.generator_name.as_str())
            .or_default()
            .push_str(&child.text);
    }
    for request in rendered.iter().flat_map(|r| &r.globals) {
        let child_content = children
            .get(request.generator_name.as_str())
            .cloned()
            .unwrap_or_default();
        let context = request.context.clone().with(CHILD_CONTENT, child_content);
        artifacts.push(OutputArtifact::new(
            request.key.clone(),
            format!("{}{}", request.header, request.template.render(&context)),
        ));
    }

    let diagnostics = key_collisions(&artifacts);
    if !diagnostics.is_empty() {
        debug!("{} artifact key collision(s); nothing is emitted", diagnostics.len());
        return CollectedOutputs {
            artifacts: Vec::new(),
            diagnostics,
        };
    }
    CollectedOutputs {
        artifacts,
        diagnostics,
    }
}

fn key_collisions(artifacts: &[OutputArtifact]) -> Vec<Diagnostic> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for artifact in artifacts {
        *counts.entry(artifact.key.as_str()).or_default() += 1;
    }

    let mut reported: Vec<&str> = Vec::new();
    let mut diagnostics = Vec::new();
    for artifact in artifacts {
        let key = artifact.key.as_str();
        let count = counts.get(key).copied().unwrap_or(0);
        if count > 1 && !reported.contains(&key) {
            reported.push(key);
            diagnostics.push(Diagnostic::new(
                DiagnosticCode::DuplicateArtifactKey,
                format!("{} artifacts would be written to '{}'", count, key),
            ));
        }
    }
    diagnostics
}
