//! Validation and binding of declaration records into generator definitions

use std::fmt;
use std::sync::Arc;

use log::debug;

use crate::config::GenerationConfig;
use crate::error::{Diagnostic, DiagnosticCode, Location, Reported};
use crate::graph::{CancellationToken, Cancelled};
use crate::identifier::{ClassIdentifier, GENERATOR_SUFFIX};
use crate::parameter::{
    GenericParameter, OptionalParameter, ParameterType, RequiredParameter, RequiredParameterBuilder,
};
use crate::template::{self, TemplateDefinition, TemplateNode, CHILD_CONTENT};

use super::model::{
    FileTemplate, GeneratorDefinition, GlobalChildTemplate, GlobalFileTemplate, InlineTemplate,
};
use super::record::{DeclarationRecord, LiteralArg, MarkerTag, MemberRecord, PropertyRecord};

/// Bind a declaration record into a generator definition
///
/// Structural errors (partial or unsealed declarations, a bad name, an
/// unusable required order, a global template with forbidden placeholders)
/// reject the whole definition. A template that fails to parse or a
/// parameter of a disallowed type only drops that template or parameter.
/// Every diagnostic collected on the way is returned either way.
pub fn bind_definition(
    record: &DeclarationRecord,
    config: &GenerationConfig,
    cancel: &CancellationToken,
) -> Result<Reported<Arc<GeneratorDefinition>>, Cancelled> {
    DefinitionBinder {
        record,
        config,
        cancel,
        diagnostics: Vec::new(),
    }
    .bind()
}

/// Drop definitions whose attribute is already claimed by an earlier one
///
/// Usages resolve to the first definition in declaration order, primary
/// declarations before supplementary ones; each later claimant is reported.
pub fn dedupe_definitions(definitions: &[Arc<GeneratorDefinition>]) -> Reported<Vec<Arc<GeneratorDefinition>>> {
    let mut kept: Vec<Arc<GeneratorDefinition>> = Vec::with_capacity(definitions.len());
    let mut diagnostics = Vec::new();

    for definition in definitions {
        let claimed = kept
            .iter()
            .find(|k| k.attribute.is_same_class(&definition.attribute));
        if let Some(first) = claimed {
            diagnostics.push(
                Diagnostic::new(
                    DiagnosticCode::DuplicateGenerator,
                    format!(
                        "'{}' from '{}' is already declared by '{}'; this declaration is ignored",
                        definition.attribute, definition.identifier, first.identifier
                    ),
                )
                .with_location(definition.location.clone()),
            );
            continue;
        }
        kept.push(Arc::clone(definition));
    }

    Reported::ok(kept, diagnostics)
}

/// Check the placeholder restriction on global file templates
///
/// A global template may reference nothing, or exactly `{{ ChildContent }}`
/// once and no other placeholder anywhere in its tree.
pub fn check_global_template(template: &TemplateDefinition) -> Result<(), String> {
    match template.identifiers() {
        [] => Ok(()),
        [only] if only != CHILD_CONTENT => Err(format!(
            "references '{}' but may only reference '{}'",
            only, CHILD_CONTENT
        )),
        [_] => {
            let direct = template
                .nodes()
                .iter()
                .any(|n| matches!(&n.node, TemplateNode::Identifier(name) if name == CHILD_CONTENT));
            if direct && template.identifier_node_count() == 1 {
                Ok(())
            } else {
                Err(format!(
                    "'{{{{ {} }}}}' must be the only placeholder in the template",
                    CHILD_CONTENT
                ))
            }
        }
        many => Err(format!(
            "references {} names ({}) but may reference at most one",
            many.len(),
            many.join(", ")
        )),
    }
}

impl fmt::Display for LiteralArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LiteralArg::Integer(n) => write!(f, "{}", n),
            LiteralArg::Bool(b) => write!(f, "{}", b),
            LiteralArg::Text(s) => write!(f, "\"{}\"", s),
        }
    }
}

struct DefinitionBinder<'a> {
    record: &'a DeclarationRecord,
    config: &'a GenerationConfig,
    cancel: &'a CancellationToken,
    diagnostics: Vec<Diagnostic>,
}

#[derive(Default)]
struct Templates {
    inline: Vec<InlineTemplate>,
    file: Vec<FileTemplate>,
    global_file: Vec<GlobalFileTemplate>,
    global_child: Vec<GlobalChildTemplate>,
}

impl<'a> DefinitionBinder<'a> {
    fn bind(mut self) -> Result<Reported<Arc<GeneratorDefinition>>, Cancelled> {
        self.cancel.check()?;
        if !self.check_declaration() {
            return Ok(Reported::failed(self.diagnostics));
        }

        let (attribute, allow_multiple) = self.attribute_identity();
        let Some((required_parameters, optional_parameters)) = self.collect_parameters()? else {
            return Ok(Reported::failed(self.diagnostics));
        };
        let Some(templates) = self.collect_templates()? else {
            return Ok(Reported::failed(self.diagnostics));
        };

        let record = self.record;
        let definition = GeneratorDefinition {
            identifier: record.identifier.clone(),
            attribute,
            kind: record.kind,
            allow_multiple,
            required_parameters,
            optional_parameters,
            generic_parameters: self.generic_parameters(),
            templates: templates.inline,
            file_templates: templates.file,
            global_file_templates: templates.global_file,
            global_child_templates: templates.global_child,
            location: record.location.clone(),
        };

        if !definition.has_content() {
            self.report(
                DiagnosticCode::EmptyGenerator,
                format!(
                    "generator '{}' has no non-empty templates and produces nothing",
                    record.identifier
                ),
                record.location.clone(),
            );
        }
        debug!(
            "bound generator '{}' as '{}' ({} required, {} optional parameters)",
            definition.identifier,
            definition.attribute,
            definition.required_parameters.len(),
            definition.optional_parameters.len()
        );
        Ok(Reported::ok(Arc::new(definition), self.diagnostics))
    }

    fn report(&mut self, code: DiagnosticCode, message: String, location: Option<Location>) {
        self.diagnostics
            .push(Diagnostic::new(code, message).with_location(location));
    }

    fn has_explicit_name(&self) -> bool {
        self.record
            .name_override
            .as_ref()
            .is_some_and(|o| !o.name.trim().is_empty())
    }

    /// Partial, unsealed and misnamed declarations; all are reported together
    fn check_declaration(&mut self) -> bool {
        let record = self.record;
        let location = record.location.clone();
        let before = self.diagnostics.len();

        if record.is_partial {
            self.report(
                DiagnosticCode::PartialDeclaration,
                format!("generator '{}' must not be declared partial", record.identifier),
                location.clone(),
            );
        }
        if !record.is_sealed {
            self.report(
                DiagnosticCode::NotSealed,
                format!("generator '{}' must be sealed", record.identifier),
                location.clone(),
            );
        }
        if !self.has_explicit_name() && !record.identifier.has_generator_suffix() {
            self.report(
                DiagnosticCode::InvalidGeneratorName,
                format!(
                    "generator '{}' must end with '{}' or declare an explicit name",
                    record.identifier.class_name(),
                    GENERATOR_SUFFIX
                ),
                location,
            );
        }
        self.diagnostics.len() == before
    }

    fn attribute_identity(&self) -> (ClassIdentifier, bool) {
        let default_namespace = self.config.attribute_namespace.as_str();
        let Some(name_override) = &self.record.name_override else {
            return (
                self.record
                    .identifier
                    .attribute_for_generator()
                    .in_namespace(default_namespace),
                false,
            );
        };

        let namespace = name_override
            .namespace
            .as_deref()
            .map(str::trim)
            .filter(|ns| !ns.is_empty())
            .unwrap_or(default_namespace);
        let name = name_override.name.trim();
        let attribute = if name.is_empty() {
            self.record.identifier.attribute_for_generator().in_namespace(namespace)
        } else {
            ClassIdentifier::new(namespace, name).with_attribute_suffix()
        };
        (attribute, name_override.allow_multiple)
    }

    fn generic_parameters(&self) -> Vec<GenericParameter> {
        let names = if self.record.generic_parameters.is_empty() {
            self.record.identifier.generic_arguments().unwrap_or_default()
        } else {
            self.record.generic_parameters.clone()
        };
        names
            .into_iter()
            .map(|name| GenericParameter { name })
            .collect()
    }

    /// `Ok(None)` when a required order argument makes the declaration unusable
    #[allow(clippy::type_complexity)]
    fn collect_parameters(
        &mut self,
    ) -> Result<Option<(Vec<RequiredParameter>, Vec<OptionalParameter>)>, Cancelled> {
        let mut required = RequiredParameterBuilder::new();
        let mut optional = Vec::new();

        let record = self.record;
        for property in &record.properties {
            self.cancel.check()?;
            let Some(ty) = ParameterType::from_type_text(&property.type_text, property.type_kind) else {
                self.report(
                    DiagnosticCode::DisallowedParameterType,
                    format!(
                        "property '{}' has type '{}', which cannot be a generator parameter",
                        property.name, property.type_text
                    ),
                    property.location.clone(),
                );
                continue;
            };

            let Some(marker) = &property.required else {
                optional.push(OptionalParameter {
                    name: property.name.clone(),
                    ty,
                    type_text: property.type_text.clone(),
                    initializer: property.initializer.clone(),
                });
                continue;
            };

            let Some(order) = self.required_order(property, marker.order.as_ref()) else {
                return Ok(None);
            };
            required.add(
                property.name.clone(),
                order,
                ty,
                property.type_text.clone(),
                property.initializer.clone(),
                property.location.clone(),
            );
        }

        let (required, warnings) = required.finish();
        self.diagnostics.extend(warnings);
        Ok(Some((required, optional)))
    }

    /// The explicit order, `Some(None)` when absent, `None` when unusable
    fn required_order(&mut self, property: &PropertyRecord, order: Option<&LiteralArg>) -> Option<Option<i32>> {
        let arg = match order {
            None => return Some(None),
            Some(LiteralArg::Integer(n)) => match i32::try_from(*n) {
                Ok(n) => return Some(Some(n)),
                Err(_) => LiteralArg::Integer(*n),
            },
            Some(other) => other.clone(),
        };
        self.report(
            DiagnosticCode::InvalidRequiredOrder,
            format!(
                "required property '{}' has order {}, which is not a 32-bit integer",
                property.name, arg
            ),
            property.location.clone(),
        );
        None
    }

    /// `Ok(None)` when a global template breaks the placeholder restriction
    fn collect_templates(&mut self) -> Result<Option<Templates>, Cancelled> {
        let mut templates = Templates::default();
        let mut rejected = false;

        let record = self.record;
        for member in &record.members {
            self.cancel.check()?;
            let (Some(text), Some(marker)) = (&member.constant_text, member.markers.first()) else {
                continue;
            };

            match marker {
                MarkerTag::Template => {
                    if let Some(template) = self.parse_template(member, &member.name, text) {
                        templates.inline.push(InlineTemplate {
                            member: member.name.clone(),
                            template,
                        });
                    }
                }
                MarkerTag::FileTemplate { file_name } => {
                    let pattern = if file_name.trim().is_empty() {
                        member.name.as_str()
                    } else {
                        file_name.as_str()
                    };
                    let template = self.parse_template(member, &member.name, text);
                    let file_name =
                        self.parse_template(member, &format!("{}.file_name", member.name), pattern);
                    if let (Some(template), Some(file_name)) = (template, file_name) {
                        templates.file.push(FileTemplate {
                            member: member.name.clone(),
                            file_name,
                            template,
                        });
                    }
                }
                MarkerTag::GlobalFileTemplate {
                    generator_name,
                    file_name,
                } => {
                    let Some(template) = self.parse_template(member, &member.name, text) else {
                        continue;
                    };
                    match check_global_template(&template) {
                        Ok(()) => templates.global_file.push(GlobalFileTemplate {
                            member: member.name.clone(),
                            generator_name: generator_name.clone(),
                            file_name: if file_name.trim().is_empty() {
                                generator_name.clone()
                            } else {
                                file_name.clone()
                            },
                            template,
                        }),
                        Err(reason) => {
                            self.report(
                                DiagnosticCode::InvalidGlobalTemplate,
                                format!("global template '{}' {}", member.name, reason),
                                member.location.clone(),
                            );
                            rejected = true;
                        }
                    }
                }
                MarkerTag::GlobalChildTemplate { generator_name } => {
                    if let Some(template) = self.parse_template(member, &member.name, text) {
                        templates.global_child.push(GlobalChildTemplate {
                            member: member.name.clone(),
                            generator_name: generator_name.clone(),
                            template,
                        });
                    }
                }
            }
        }

        Ok((!rejected).then_some(templates))
    }

    fn parse_template(&mut self, member: &MemberRecord, name: &str, text: &str) -> Option<TemplateDefinition> {
        match template::parse(text) {
            Ok(template) => Some(template),
            Err(errors) => {
                self.diagnostics.extend(
                    errors
                        .iter()
                        .map(|e| e.to_diagnostic(name, text).with_location(member.location.clone())),
                );
                None
            }
        }
    }
}
