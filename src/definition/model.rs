//! Bound generator definitions

use crate::error::Location;
use crate::identifier::ClassIdentifier;
use crate::parameter::{GenericParameter, OptionalParameter, RequiredParameter};
use crate::template::TemplateDefinition;

use super::record::GeneratorKind;

/// Rendered once per usage and merged into the target class's artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineTemplate {
    pub member: String,
    pub template: TemplateDefinition,
}

/// Rendered once per usage into an artifact of its own
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileTemplate {
    pub member: String,
    /// Rendered with the usage context to produce the artifact key
    pub file_name: TemplateDefinition,
    pub template: TemplateDefinition,
}

/// Rendered per assembly usage with the aggregated child output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalFileTemplate {
    pub member: String,
    pub generator_name: String,
    pub file_name: String,
    pub template: TemplateDefinition,
}

/// Rendered per usage; the output feeds a global file template's `ChildContent`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalChildTemplate {
    pub member: String,
    pub generator_name: String,
    pub template: TemplateDefinition,
}

/// A validated generator; immutable once bound
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratorDefinition {
    pub identifier: ClassIdentifier,
    /// The attribute users write at usage sites
    pub attribute: ClassIdentifier,
    pub kind: GeneratorKind,
    pub allow_multiple: bool,
    /// Sorted by their resolved order
    pub required_parameters: Vec<RequiredParameter>,
    pub optional_parameters: Vec<OptionalParameter>,
    pub generic_parameters: Vec<GenericParameter>,
    pub templates: Vec<InlineTemplate>,
    pub file_templates: Vec<FileTemplate>,
    pub global_file_templates: Vec<GlobalFileTemplate>,
    pub global_child_templates: Vec<GlobalChildTemplate>,
    pub location: Option<Location>,
}

impl GeneratorDefinition {
    /// Whether any template would render something
    pub fn has_content(&self) -> bool {
        self.templates.iter().any(|t| !t.template.is_empty())
            || self.file_templates.iter().any(|t| !t.template.is_empty())
            || self.global_file_templates.iter().any(|t| !t.template.is_empty())
            || self.global_child_templates.iter().any(|t| !t.template.is_empty())
    }

    /// Whether a usage naming `generator` refers to this definition
    ///
    /// The attribute may be written with or without its `Attribute` suffix.
    pub fn is_named_by(&self, generator: &ClassIdentifier) -> bool {
        self.attribute.is_same_class(generator)
            || self
                .attribute
                .without_attribute_suffix()
                .is_some_and(|short| short.is_same_class(generator))
    }
}
