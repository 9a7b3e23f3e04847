//! Generator parameters
//!
//! A generator declares required parameters (bound positionally at a usage
//! site), optional parameters (bound by name, falling back to their default)
//! and generic parameters (bound to the usage's type arguments).

use serde::Deserialize;

use crate::error::{Diagnostic, DiagnosticCode, Location};
use crate::identifier::upper_first;

/// How the host classified a property's declared type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeKind {
    /// A built-in type, recognized by its spelling
    #[default]
    Primitive,
    Enum,
    Reference,
}

/// Parameter types that can carry a constant default
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParameterType {
    SByte,
    Byte,
    Short,
    UShort,
    Int,
    UInt,
    Long,
    ULong,
    Char,
    Float,
    Double,
    Decimal,
    Bool,
    String,
    Object,
    Enum(String),
    Reference(String),
}

impl ParameterType {
    /// Resolve a declared type against the allow-list
    ///
    /// Returns `None` for nullable types, arrays, constructed generics and
    /// unknown spellings.
    pub fn from_type_text(text: &str, kind: TypeKind) -> Option<Self> {
        let text = text.trim();
        let text = text.strip_prefix("global::").unwrap_or(text);
        match kind {
            TypeKind::Primitive => Self::primitive(text),
            TypeKind::Enum => is_plain_type_name(text).then(|| ParameterType::Enum(text.to_string())),
            TypeKind::Reference => {
                is_plain_type_name(text).then(|| ParameterType::Reference(text.to_string()))
            }
        }
    }

    fn primitive(text: &str) -> Option<Self> {
        let ty = match text {
            "sbyte" | "System.SByte" => ParameterType::SByte,
            "byte" | "System.Byte" => ParameterType::Byte,
            "short" | "System.Int16" => ParameterType::Short,
            "ushort" | "System.UInt16" => ParameterType::UShort,
            "int" | "System.Int32" => ParameterType::Int,
            "uint" | "System.UInt32" => ParameterType::UInt,
            "long" | "System.Int64" => ParameterType::Long,
            "ulong" | "System.UInt64" => ParameterType::ULong,
            "char" | "System.Char" => ParameterType::Char,
            "float" | "System.Single" => ParameterType::Float,
            "double" | "System.Double" => ParameterType::Double,
            "decimal" | "System.Decimal" => ParameterType::Decimal,
            "bool" | "System.Boolean" => ParameterType::Bool,
            "string" | "System.String" => ParameterType::String,
            "object" | "System.Object" => ParameterType::Object,
            _ => return None,
        };
        Some(ty)
    }
}

fn is_plain_type_name(text: &str) -> bool {
    !text.is_empty()
        && text
            .split('.')
            .all(|part| {
                let mut chars = part.chars();
                matches!(chars.next(), Some(c) if c.is_alphabetic() || c == '_')
                    && chars.all(|c| c.is_alphanumeric() || c == '_')
            })
}

/// A literal default: its source text and the constant it evaluates to
///
/// For `Name = "abc"` the text is `"abc"` (quotes included) and the value
/// is `abc`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InitializerLiteral {
    pub text: String,
    pub value: String,
}

/// Capabilities shared by every parameter kind
pub trait Parameter {
    fn name(&self) -> &str;

    fn type_text(&self) -> &str;

    fn initializer(&self) -> Option<&InitializerLiteral>;

    /// Property-style name: the declared name with its first character upper-cased
    fn name_pascal(&self) -> String {
        upper_first(self.name())
    }

    /// ` = <literal>;`, or an empty string without a default
    fn initializer_literal(&self) -> String {
        match self.initializer() {
            Some(init) if !init.text.trim().is_empty() => format!(" = {};", init.text),
            _ => String::new(),
        }
    }

    /// Constant value of the default, or an empty string
    fn default_value(&self) -> &str {
        self.initializer().map(|init| init.value.as_str()).unwrap_or("")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequiredParameter {
    /// Explicit position requested by the declaration
    pub requested_order: Option<i32>,
    /// 1-based position among the required parameters as declared
    pub declared_order: usize,
    pub name: String,
    pub ty: ParameterType,
    pub type_text: String,
    pub initializer: Option<InitializerLiteral>,
    pub location: Option<Location>,
}

impl RequiredParameter {
    /// Sort key: explicit order first (absent sorts last), then declaration order
    pub fn sort_key(&self) -> (i32, usize) {
        (self.requested_order.unwrap_or(i32::MAX), self.declared_order)
    }
}

impl Parameter for RequiredParameter {
    fn name(&self) -> &str {
        &self.name
    }

    fn type_text(&self) -> &str {
        &self.type_text
    }

    fn initializer(&self) -> Option<&InitializerLiteral> {
        self.initializer.as_ref()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionalParameter {
    pub name: String,
    pub ty: ParameterType,
    pub type_text: String,
    pub initializer: Option<InitializerLiteral>,
}

impl Parameter for OptionalParameter {
    fn name(&self) -> &str {
        &self.name
    }

    fn type_text(&self) -> &str {
        &self.type_text
    }

    fn initializer(&self) -> Option<&InitializerLiteral> {
        self.initializer.as_ref()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenericParameter {
    pub name: String,
}

impl Parameter for GenericParameter {
    fn name(&self) -> &str {
        &self.name
    }

    fn type_text(&self) -> &str {
        ""
    }

    fn initializer(&self) -> Option<&InitializerLiteral> {
        None
    }

    fn name_pascal(&self) -> String {
        self.name.clone()
    }
}

/// Accumulates required parameters in declaration order
///
/// [`finish`](Self::finish) hands back the parameters sorted by
/// [`RequiredParameter::sort_key`]; nothing downstream ever sees the
/// unsorted list.
#[derive(Debug, Default)]
pub struct RequiredParameterBuilder {
    parameters: Vec<RequiredParameter>,
}

impl RequiredParameterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the next required parameter; its declaration order is assigned here
    pub fn add(
        &mut self,
        name: impl Into<String>,
        requested_order: Option<i32>,
        ty: ParameterType,
        type_text: impl Into<String>,
        initializer: Option<InitializerLiteral>,
        location: Option<Location>,
    ) -> &mut Self {
        let declared_order = self.parameters.len() + 1;
        self.parameters.push(RequiredParameter {
            requested_order,
            declared_order,
            name: name.into(),
            ty,
            type_text: type_text.into(),
            initializer,
            location,
        });
        self
    }

    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }

    /// Sort the parameters and warn about repeated explicit orders
    ///
    /// The first parameter to claim an order keeps it; later claimants fall
    /// back to their declaration order among equals.
    pub fn finish(self) -> (Vec<RequiredParameter>, Vec<Diagnostic>) {
        let mut warnings = Vec::new();
        for (idx, parameter) in self.parameters.iter().enumerate() {
            let Some(order) = parameter.requested_order else {
                continue;
            };
            let first = self.parameters[..idx]
                .iter()
                .find(|earlier| earlier.requested_order == Some(order));
            if let Some(first) = first {
                warnings.push(
                    Diagnostic::new(
                        DiagnosticCode::DuplicateRequiredOrder,
                        format!(
                            "required parameter '{}' repeats order {} already used by '{}'",
                            parameter.name, order, first.name
                        ),
                    )
                    .with_location(parameter.location.clone()),
                );
            }
        }

        let mut parameters = self.parameters;
        parameters.sort_by_key(RequiredParameter::sort_key);
        (parameters, warnings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn names(parameters: &[RequiredParameter]) -> Vec<&str> {
        parameters.iter().map(|p| p.name.as_str()).collect()
    }

    fn add(builder: &mut RequiredParameterBuilder, name: &str, order: Option<i32>) {
        builder.add(name, order, ParameterType::String, "string", None, None);
    }

    #[test]
    fn test_ordering_law_with_duplicate_warning() {
        let mut builder = RequiredParameterBuilder::new();
        add(&mut builder, "param1", Some(3));
        add(&mut builder, "param2", Some(1));
        add(&mut builder, "param3", Some(1));

        let (parameters, warnings) = builder.finish();
        assert_eq!(names(&parameters), vec!["param2", "param3", "param1"]);
        assert_eq!(
            parameters.iter().map(|p| p.declared_order).collect::<Vec<_>>(),
            vec![2, 3, 1]
        );
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].code, DiagnosticCode::DuplicateRequiredOrder);
        assert!(warnings[0].message.contains("param3"));
    }

    #[test]
    fn test_unordered_parameters_sort_last_by_declaration() {
        let mut builder = RequiredParameterBuilder::new();
        add(&mut builder, "late", None);
        add(&mut builder, "first", Some(1));
        add(&mut builder, "later", None);

        let (parameters, warnings) = builder.finish();
        assert_eq!(names(&parameters), vec!["first", "late", "later"]);
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_type_allow_list() {
        assert_eq!(
            ParameterType::from_type_text("int", TypeKind::Primitive),
            Some(ParameterType::Int)
        );
        assert_eq!(
            ParameterType::from_type_text("System.Boolean", TypeKind::Primitive),
            Some(ParameterType::Bool)
        );
        assert_eq!(
            ParameterType::from_type_text("global::Acme.Level", TypeKind::Enum),
            Some(ParameterType::Enum("Acme.Level".to_string()))
        );
        assert_eq!(ParameterType::from_type_text("int?", TypeKind::Primitive), None);
        assert_eq!(ParameterType::from_type_text("int[]", TypeKind::Primitive), None);
        assert_eq!(
            ParameterType::from_type_text("List<int>", TypeKind::Reference),
            None
        );
    }

    #[test]
    fn test_optional_names_and_initializers() {
        let parameter = OptionalParameter {
            name: "prefix".to_string(),
            ty: ParameterType::String,
            type_text: "string".to_string(),
            initializer: Some(InitializerLiteral {
                text: "\"log_\"".to_string(),
                value: "log_".to_string(),
            }),
        };
        assert_eq!(parameter.name_pascal(), "Prefix");
        assert_eq!(parameter.initializer_literal(), " = \"log_\";");
        assert_eq!(parameter.default_value(), "log_");

        let bare = OptionalParameter {
            initializer: None,
            ..parameter
        };
        assert_eq!(bare.initializer_literal(), "");
        assert_eq!(bare.default_value(), "");
    }
}
