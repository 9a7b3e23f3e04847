//! Declaration records supplied by the host integration layer
//!
//! The host extracts these from its own syntax trees; this crate never sees
//! host source code. Marker attributes are resolved into closed enums at
//! this boundary.

use serde::Deserialize;

use crate::error::Location;
use crate::identifier::ClassIdentifier;
use crate::parameter::{InitializerLiteral, TypeKind};

/// What a generator attaches to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeneratorKind {
    /// Applied to fields or properties of a class
    Field,
    /// Applied to a class
    Class,
    /// Applied once to a whole compilation unit
    Assembly,
}

impl GeneratorKind {
    /// Resolve the host's base-class spelling
    ///
    /// Accepts `ClassGenerator`, `FieldGenerator` and `GlobalGenerator`,
    /// optionally qualified with the `Stencil` namespace and `global::`.
    pub fn from_base_type_name(name: &str) -> Option<Self> {
        let name = name.trim();
        let name = name.strip_prefix("global::").unwrap_or(name);
        let name = name.strip_prefix("Stencil.").unwrap_or(name);
        match name {
            "FieldGenerator" => Some(GeneratorKind::Field),
            "ClassGenerator" => Some(GeneratorKind::Class),
            "GlobalGenerator" => Some(GeneratorKind::Assembly),
            _ => None,
        }
    }
}

/// Explicit attribute name for a generator
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NameOverride {
    pub name: String,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub allow_multiple: bool,
}

/// Template marker attached to a member
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "marker", rename_all = "snake_case")]
pub enum MarkerTag {
    /// Rendered inline into the target class's artifact
    Template,
    /// Rendered into its own artifact; the file name is itself a template
    FileTemplate {
        #[serde(default)]
        file_name: String,
    },
    /// Aggregates child templates into a single artifact
    GlobalFileTemplate {
        generator_name: String,
        #[serde(default)]
        file_name: String,
    },
    /// Contributes to the global file template of the named generator
    GlobalChildTemplate { generator_name: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MemberRecord {
    pub name: String,
    #[serde(default)]
    pub markers: Vec<MarkerTag>,
    /// Constant text, when the member is a string constant
    #[serde(default)]
    pub constant_text: Option<String>,
    #[serde(default)]
    pub location: Option<Location>,
}

/// A literal attribute argument
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum LiteralArg {
    Integer(i64),
    Bool(bool),
    Text(String),
}

/// The `required` marker, with its optional explicit order argument
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RequiredMarker {
    #[serde(default)]
    pub order: Option<LiteralArg>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PropertyRecord {
    pub name: String,
    pub type_text: String,
    #[serde(default)]
    pub type_kind: TypeKind,
    #[serde(default)]
    pub initializer: Option<InitializerLiteral>,
    #[serde(default)]
    pub required: Option<RequiredMarker>,
    #[serde(default)]
    pub location: Option<Location>,
}

/// A candidate generator declaration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DeclarationRecord {
    pub identifier: ClassIdentifier,
    pub kind: GeneratorKind,
    #[serde(default = "default_true")]
    pub is_sealed: bool,
    #[serde(default)]
    pub is_partial: bool,
    #[serde(default)]
    pub name_override: Option<NameOverride>,
    #[serde(default)]
    pub generic_parameters: Vec<String>,
    #[serde(default)]
    pub members: Vec<MemberRecord>,
    #[serde(default)]
    pub properties: Vec<PropertyRecord>,
    #[serde(default)]
    pub location: Option<Location>,
}

fn default_true() -> bool {
    true
}

impl DeclarationRecord {
    /// A sealed, complete declaration without members or properties
    pub fn new(identifier: ClassIdentifier, kind: GeneratorKind) -> Self {
        Self {
            identifier,
            kind,
            is_sealed: true,
            is_partial: false,
            name_override: None,
            generic_parameters: Vec::new(),
            members: Vec::new(),
            properties: Vec::new(),
            location: None,
        }
    }

    pub fn with_member(mut self, member: MemberRecord) -> Self {
        self.members.push(member);
        self
    }

    pub fn with_property(mut self, property: PropertyRecord) -> Self {
        self.properties.push(property);
        self
    }

    pub fn with_name_override(mut self, name_override: NameOverride) -> Self {
        self.name_override = Some(name_override);
        self
    }
}

impl MemberRecord {
    /// A string constant carrying one template marker
    pub fn template(name: impl Into<String>, marker: MarkerTag, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            markers: vec![marker],
            constant_text: Some(text.into()),
            location: None,
        }
    }
}

impl PropertyRecord {
    pub fn new(name: impl Into<String>, type_text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_text: type_text.into(),
            type_kind: TypeKind::Primitive,
            initializer: None,
            required: None,
            location: None,
        }
    }

    pub fn required(mut self, order: Option<LiteralArg>) -> Self {
        self.required = Some(RequiredMarker { order });
        self
    }

    pub fn with_initializer(mut self, text: impl Into<String>, value: impl Into<String>) -> Self {
        self.initializer = Some(InitializerLiteral {
            text: text.into(),
            value: value.into(),
        });
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_type_names() {
        assert_eq!(
            GeneratorKind::from_base_type_name("global::Stencil.FieldGenerator"),
            Some(GeneratorKind::Field)
        );
        assert_eq!(
            GeneratorKind::from_base_type_name("ClassGenerator"),
            Some(GeneratorKind::Class)
        );
        assert_eq!(
            GeneratorKind::from_base_type_name("GlobalGenerator"),
            Some(GeneratorKind::Assembly)
        );
        assert_eq!(GeneratorKind::from_base_type_name("Generator"), None);
    }

    #[test]
    fn test_deserialize_record() {
        let record: DeclarationRecord = toml::from_str(
            r#"
            identifier = "Acme.LoggingGenerator"
            kind = "field"

            [[members]]
            name = "Body"
            constant_text = "log {{ FieldName }}"
            markers = [{ marker = "template" }]

            [[members]]
            name = "File"
            constant_text = "x"
            markers = [{ marker = "file_template", file_name = "{{ ClassName }}Log" }]

            [[properties]]
            name = "Level"
            type_text = "int"
            required = { order = 2 }

            [[properties]]
            name = "prefix"
            type_text = "string"
            initializer = { text = '"log"', value = "log" }
            "#,
        )
        .unwrap();

        assert_eq!(record.identifier.class_name(), "LoggingGenerator");
        assert!(record.is_sealed);
        assert_eq!(record.members[0].markers, vec![MarkerTag::Template]);
        assert_eq!(
            record.members[1].markers,
            vec![MarkerTag::FileTemplate {
                file_name: "{{ ClassName }}Log".to_string()
            }]
        );
        assert_eq!(
            record.properties[0].required,
            Some(RequiredMarker {
                order: Some(LiteralArg::Integer(2))
            })
        );
        assert_eq!(record.properties[1].initializer.as_ref().map(|i| i.value.as_str()), Some("log"));
    }
}
