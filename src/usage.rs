//! Usage sites and their binding against generator definitions
//!
//! Binding turns a usage site into a [`RenderContext`]: positional
//! arguments fill the required parameters in resolved order, named
//! arguments override optional defaults, generic parameters take the usage's
//! type arguments and structural metadata about the target is added last.

use std::sync::Arc;

use log::debug;
use serde::Deserialize;

use crate::definition::{GeneratorDefinition, GeneratorKind};
use crate::error::{Diagnostic, DiagnosticCode, Location, Reported};
use crate::identifier::{upper_first, ClassIdentifier};
use crate::parameter::{Parameter, ParameterType};
use crate::template::{RenderContext, Value};

/// Target class name, including any generic argument list
pub const CLASS_NAME: &str = "ClassName";
pub const CLASS_NAMESPACE: &str = "ClassNamespace";
pub const CLASS_FULL_NAME: &str = "ClassFullName";
/// Annotated member name, as declared
pub const FIELD_NAME: &str = "FieldName";
/// Annotated member name with leading underscores removed and the first letter upper-cased
pub const FIELD_NAME_PASCAL: &str = "FieldNamePascal";

/// What a usage is attached to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum UsageTarget {
    Member {
        class: ClassIdentifier,
        member: String,
    },
    Class {
        class: ClassIdentifier,
    },
    Assembly,
}

impl UsageTarget {
    /// The class the target belongs to; `None` for assembly targets
    pub fn class(&self) -> Option<&ClassIdentifier> {
        match self {
            UsageTarget::Member { class, .. } | UsageTarget::Class { class } => Some(class),
            UsageTarget::Assembly => None,
        }
    }

    fn accepts(&self, kind: GeneratorKind) -> bool {
        matches!(
            (self, kind),
            (UsageTarget::Member { .. }, GeneratorKind::Field)
                | (UsageTarget::Class { .. }, GeneratorKind::Class)
                | (UsageTarget::Assembly, GeneratorKind::Assembly)
        )
    }
}

impl std::fmt::Display for UsageTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UsageTarget::Member { class, member } => write!(f, "member '{}.{}'", class, member),
            UsageTarget::Class { class } => write!(f, "class '{}'", class),
            UsageTarget::Assembly => write!(f, "the assembly"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NamedArgument {
    pub name: String,
    pub value: String,
}

/// A place where a generator is applied, as reported by the host
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UsageSite {
    /// The attribute written at the site, with or without its `Attribute` suffix
    pub generator: ClassIdentifier,
    pub target: UsageTarget,
    #[serde(default)]
    pub arguments: Vec<String>,
    #[serde(default)]
    pub named_arguments: Vec<NamedArgument>,
    #[serde(default)]
    pub location: Option<Location>,
}

impl UsageSite {
    pub fn new(generator: ClassIdentifier, target: UsageTarget) -> Self {
        Self {
            generator,
            target,
            arguments: Vec::new(),
            named_arguments: Vec::new(),
            location: None,
        }
    }

    pub fn with_argument(mut self, value: impl Into<String>) -> Self {
        self.arguments.push(value.into());
        self
    }

    pub fn with_named_argument(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.named_arguments.push(NamedArgument {
            name: name.into(),
            value: value.into(),
        });
        self
    }
}

/// A usage with its definition and fully built render context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundUsage {
    pub definition: Arc<GeneratorDefinition>,
    pub target: UsageTarget,
    pub context: RenderContext,
    pub location: Option<Location>,
}

/// Bind a usage site against the known definitions
///
/// Returns `None` when the site names no known generator. Missing or
/// surplus positional arguments and a target the generator cannot be
/// applied to fail this usage only.
pub fn bind_usage(
    usage: &UsageSite,
    definitions: &[Arc<GeneratorDefinition>],
) -> Option<Reported<BoundUsage>> {
    let Some(definition) = definitions.iter().find(|d| d.is_named_by(&usage.generator)) else {
        debug!("'{}' does not name a known generator", usage.generator);
        return None;
    };
    let error = |code, message: String| Diagnostic::new(code, message).with_location(usage.location.clone());
    let mut diagnostics = Vec::new();

    if !usage.target.accepts(definition.kind) {
        diagnostics.push(error(
            DiagnosticCode::InvalidUsageTarget,
            format!(
                "'{}' is a {:?} generator and cannot be applied to {}",
                definition.attribute, definition.kind, usage.target
            ),
        ));
        return Some(Reported::failed(diagnostics));
    }

    let required = &definition.required_parameters;
    if usage.arguments.len() > required.len() {
        diagnostics.push(error(
            DiagnosticCode::TooManyArguments,
            format!(
                "'{}' takes {} positional argument(s) but {} were supplied",
                definition.attribute,
                required.len(),
                usage.arguments.len()
            ),
        ));
    }
    for parameter in required.iter().skip(usage.arguments.len()) {
        diagnostics.push(error(
            DiagnosticCode::MissingRequiredArgument,
            format!(
                "'{}' on {} is missing required argument '{}'",
                definition.attribute, usage.target, parameter.name
            ),
        ));
    }
    if !diagnostics.is_empty() {
        return Some(Reported::failed(diagnostics));
    }

    let mut context = RenderContext::new();
    for (parameter, value) in required.iter().zip(&usage.arguments) {
        context.insert(parameter.name_pascal(), argument_value(&parameter.ty, value));
    }

    for argument in &usage.named_arguments {
        let known = definition
            .optional_parameters
            .iter()
            .any(|p| p.name == argument.name || p.name_pascal() == argument.name);
        if !known {
            diagnostics.push(error(
                DiagnosticCode::UnknownNamedArgument,
                format!(
                    "'{}' has no optional parameter named '{}'; the argument is ignored",
                    definition.attribute, argument.name
                ),
            ));
        }
    }
    for parameter in &definition.optional_parameters {
        let supplied = usage
            .named_arguments
            .iter()
            .rev()
            .find(|a| a.name == parameter.name || a.name == parameter.name_pascal());
        let value = supplied.map_or(parameter.default_value(), |a| a.value.as_str());
        context.insert(parameter.name_pascal(), argument_value(&parameter.ty, value));
    }

    if let Ok(arguments) = usage.generator.generic_arguments() {
        if arguments.len() == definition.generic_parameters.len() {
            for (parameter, argument) in definition.generic_parameters.iter().zip(arguments) {
                context.insert(parameter.name.clone(), argument);
            }
        }
    }

    insert_target_metadata(&mut context, &usage.target);

    Some(Reported::ok(
        BoundUsage {
            definition: Arc::clone(definition),
            target: usage.target.clone(),
            context,
            location: usage.location.clone(),
        },
        diagnostics,
    ))
}

/// Bool parameters spelled `true` or `false` become booleans so `false`
/// closes their sections; everything else stays text
fn argument_value(ty: &ParameterType, value: &str) -> Value {
    if *ty == ParameterType::Bool {
        if value.eq_ignore_ascii_case("true") {
            return Value::Bool(true);
        }
        if value.eq_ignore_ascii_case("false") {
            return Value::Bool(false);
        }
    }
    Value::Text(value.to_string())
}

fn insert_target_metadata(context: &mut RenderContext, target: &UsageTarget) {
    if let Some(class) = target.class() {
        context.insert(CLASS_NAME, class.class_name());
        context.insert(CLASS_NAMESPACE, class.namespace());
        context.insert(CLASS_FULL_NAME, class.full_name());
    }
    if let UsageTarget::Member { member, .. } = target {
        context.insert(FIELD_NAME, member.as_str());
        context.insert(FIELD_NAME_PASCAL, pascal_member_name(member));
    }
}

/// `_count` becomes `Count`; a name made only of underscores is kept as is
pub fn pascal_member_name(member: &str) -> String {
    let trimmed = member.trim_start_matches('_');
    if trimmed.is_empty() {
        member.to_string()
    } else {
        upper_first(trimmed)
    }
}

/// Drop repeated applications of generators that disallow them
///
/// The first usage of a generator on a target is kept; every later one on
/// the same target is reported and removed.
pub fn enforce_multiplicity(bound: &[BoundUsage]) -> Reported<Vec<BoundUsage>> {
    let mut kept: Vec<BoundUsage> = Vec::with_capacity(bound.len());
    let mut diagnostics = Vec::new();

    for usage in bound {
        let repeated = !usage.definition.allow_multiple
            && kept
                .iter()
                .any(|k| k.definition.attribute == usage.definition.attribute && k.target == usage.target);
        if repeated {
            diagnostics.push(
                Diagnostic::new(
                    DiagnosticCode::MultipleNotAllowed,
                    format!(
                        "'{}' may be applied to {} only once",
                        usage.definition.attribute, usage.target
                    ),
                )
                .with_location(usage.location.clone()),
            );
            continue;
        }
        kept.push(usage.clone());
    }

    Reported::ok(kept, diagnostics)
}
