//! Class identifiers and the naming rules derived from them
//!
//! A [`ClassIdentifier`] is a `(namespace, class_name)` pair where the class
//! name may carry a generic argument list (`Cache<TKey, TValue>`). Identity
//! takes the generic arity into account but ignores the argument names, so
//! `Cache<K, V>` and `Cache<string, int>` name the same class.

use std::fmt;
use std::hash::{Hash, Hasher};

use serde::Deserialize;
use thiserror::Error;

/// Suffix every derived attribute name carries
pub const ATTRIBUTE_SUFFIX: &str = "Attribute";

/// Suffix a generator class must carry unless its name is overridden
pub const GENERATOR_SUFFIX: &str = "Generator";

/// Errors raised while taking a class name apart
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdentifierError {
    #[error("class name is empty")]
    Empty,

    #[error("unbalanced generic argument list in '{name}'")]
    UnbalancedGenerics { name: String },
}

/// A namespace-qualified class name
#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "String")]
pub struct ClassIdentifier {
    namespace: String,
    class_name: String,
}

impl ClassIdentifier {
    pub fn new(namespace: impl Into<String>, class_name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            class_name: class_name.into(),
        }
    }

    /// Parse a dotted name such as `Acme.Caching.Cache<K, V>`
    ///
    /// The namespace is everything before the last `.` that sits outside the
    /// generic argument list.
    pub fn parse(full_name: &str) -> Result<Self, IdentifierError> {
        let full_name = full_name.trim();
        if full_name.is_empty() {
            return Err(IdentifierError::Empty);
        }

        let mut depth = 0i32;
        let mut split = None;
        for (idx, ch) in full_name.char_indices() {
            match ch {
                '<' => depth += 1,
                '>' => depth -= 1,
                '.' if depth == 0 => split = Some(idx),
                _ => {}
            }
        }

        let identifier = match split {
            Some(idx) => Self::new(&full_name[..idx], &full_name[idx + 1..]),
            None => Self::new("", full_name),
        };
        if identifier.class_name.is_empty() {
            return Err(IdentifierError::Empty);
        }
        identifier.generic_arguments()?;
        Ok(identifier)
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    /// `Namespace.ClassName<T>`, or just the class name in the global namespace
    pub fn full_name(&self) -> String {
        if self.namespace.is_empty() {
            self.class_name.clone()
        } else {
            format!("{}.{}", self.namespace, self.class_name)
        }
    }

    /// Class name with any generic argument list removed
    pub fn name_without_generics(&self) -> &str {
        match self.class_name.find('<') {
            Some(idx) => &self.class_name[..idx],
            None => &self.class_name,
        }
    }

    /// The `<...>` part of the class name, or an empty string
    pub fn generic_suffix(&self) -> &str {
        match self.class_name.find('<') {
            Some(idx) => &self.class_name[idx..],
            None => "",
        }
    }

    /// Top-level generic arguments, split on commas outside nested lists
    ///
    /// `Map<string, List<int>>` yields `["string", "List<int>"]`.
    pub fn generic_arguments(&self) -> Result<Vec<String>, IdentifierError> {
        let suffix = self.generic_suffix();
        if suffix.is_empty() {
            return Ok(Vec::new());
        }
        let unbalanced = || IdentifierError::UnbalancedGenerics {
            name: self.class_name.clone(),
        };
        if !suffix.ends_with('>') {
            return Err(unbalanced());
        }

        let inner = &suffix[1..suffix.len() - 1];
        let mut arguments = Vec::new();
        let mut depth = 0i32;
        let mut start = 0;
        for (idx, ch) in inner.char_indices() {
            match ch {
                '<' => depth += 1,
                '>' => {
                    depth -= 1;
                    if depth < 0 {
                        return Err(unbalanced());
                    }
                }
                ',' if depth == 0 => {
                    arguments.push(inner[start..idx].trim().to_string());
                    start = idx + 1;
                }
                _ => {}
            }
        }
        if depth != 0 {
            return Err(unbalanced());
        }
        arguments.push(inner[start..].trim().to_string());
        Ok(arguments)
    }

    /// Number of generic arguments, counted leniently
    pub fn generic_arity(&self) -> usize {
        let suffix = self.generic_suffix();
        if suffix.is_empty() {
            return 0;
        }
        let mut depth = 0i32;
        let mut commas = 0;
        for ch in suffix.chars() {
            match ch {
                '<' => depth += 1,
                '>' => depth -= 1,
                ',' if depth == 1 => commas += 1,
                _ => {}
            }
        }
        commas + 1
    }

    /// Same class: namespace, base name and generic arity all agree
    pub fn is_same_class(&self, other: &ClassIdentifier) -> bool {
        self.namespace == other.namespace
            && self.name_without_generics() == other.name_without_generics()
            && self.generic_arity() == other.generic_arity()
    }

    /// Move the class into another namespace
    pub fn in_namespace(&self, namespace: impl Into<String>) -> Self {
        Self::new(namespace, self.class_name.clone())
    }

    /// Append `Attribute` ahead of the generic list unless already present
    pub fn with_attribute_suffix(&self) -> Self {
        let base = self.name_without_generics();
        if base.ends_with(ATTRIBUTE_SUFFIX) {
            return self.clone();
        }
        Self::new(
            self.namespace.clone(),
            format!("{}{}{}", base, ATTRIBUTE_SUFFIX, self.generic_suffix()),
        )
    }

    /// Whether the base name ends in `Generator`, ignoring case
    pub fn has_generator_suffix(&self) -> bool {
        strip_suffix_ignore_case(self.name_without_generics(), GENERATOR_SUFFIX).is_some()
    }

    /// Derive a generator's attribute identity: `LoggingGenerator` becomes
    /// `LoggingAttribute`
    pub fn attribute_for_generator(&self) -> Self {
        let base = self.name_without_generics();
        let stem = strip_suffix_ignore_case(base, GENERATOR_SUFFIX).unwrap_or(base);
        Self::new(
            self.namespace.clone(),
            format!("{}{}{}", stem, ATTRIBUTE_SUFFIX, self.generic_suffix()),
        )
    }

    /// The same class written without its `Attribute` suffix, if it has one
    pub fn without_attribute_suffix(&self) -> Option<Self> {
        let stem = self.name_without_generics().strip_suffix(ATTRIBUTE_SUFFIX)?;
        if stem.is_empty() {
            return None;
        }
        Some(Self::new(
            self.namespace.clone(),
            format!("{}{}", stem, self.generic_suffix()),
        ))
    }

    /// Filesystem-safe key for the full name
    pub fn escaped_file_key(&self) -> String {
        escape_file_key(&self.full_name())
    }
}

impl PartialEq for ClassIdentifier {
    fn eq(&self, other: &Self) -> bool {
        self.is_same_class(other)
    }
}

impl Eq for ClassIdentifier {}

impl Hash for ClassIdentifier {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.namespace.hash(state);
        self.name_without_generics().hash(state);
        self.generic_arity().hash(state);
    }
}

impl fmt::Display for ClassIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.full_name())
    }
}

impl TryFrom<String> for ClassIdentifier {
    type Error = IdentifierError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

/// Replace characters that cannot appear in file names
///
/// Generic delimiters become square brackets and `?` becomes `-`.
pub fn escape_file_key(name: &str) -> String {
    name.chars()
        .map(|ch| match ch {
            '<' => '[',
            '>' => ']',
            '?' => '-',
            other => other,
        })
        .collect()
}

/// Upper-case the first character, leaving the rest untouched
pub fn upper_first(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn strip_suffix_ignore_case<'a>(name: &'a str, suffix: &str) -> Option<&'a str> {
    let split = name.len().checked_sub(suffix.len())?;
    let tail = name.get(split..)?;
    tail.eq_ignore_ascii_case(suffix).then(|| &name[..split])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_splits_namespace_outside_generics() {
        let id = ClassIdentifier::parse("Acme.Caching.Cache<Acme.Key, int>").unwrap();
        assert_eq!(id.namespace(), "Acme.Caching");
        assert_eq!(id.class_name(), "Cache<Acme.Key, int>");
        assert_eq!(id.full_name(), "Acme.Caching.Cache<Acme.Key, int>");
    }

    #[test]
    fn test_parse_global_namespace() {
        let id = ClassIdentifier::parse("Widget").unwrap();
        assert_eq!(id.namespace(), "");
        assert_eq!(id.full_name(), "Widget");
    }

    #[test]
    fn test_parse_rejects_empty_and_unbalanced() {
        assert_eq!(ClassIdentifier::parse("  "), Err(IdentifierError::Empty));
        assert!(matches!(
            ClassIdentifier::parse("Ns.Foo<T"),
            Err(IdentifierError::UnbalancedGenerics { .. })
        ));
    }

    #[test]
    fn test_generic_arguments_respect_nesting() {
        let id = ClassIdentifier::new("Ns", "Map<string, List<Pair<int, int>>>");
        assert_eq!(
            id.generic_arguments().unwrap(),
            vec!["string".to_string(), "List<Pair<int, int>>".to_string()]
        );
        assert_eq!(id.generic_arity(), 2);
    }

    #[test]
    fn test_equality_ignores_argument_names() {
        let a = ClassIdentifier::new("Ns", "Foo<T>");
        let b = ClassIdentifier::new("Ns", "Foo<int>");
        let c = ClassIdentifier::new("Ns", "Foo<T, U>");
        let d = ClassIdentifier::new("Ns", "Foo");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
        assert_ne!(a, ClassIdentifier::new("Other", "Foo<T>"));
    }

    #[test]
    fn test_attribute_for_generator() {
        let id = ClassIdentifier::new("Stencil", "LoggingGenerator");
        assert_eq!(id.attribute_for_generator().class_name(), "LoggingAttribute");

        let lower = ClassIdentifier::new("Stencil", "Logginggenerator");
        assert!(lower.has_generator_suffix());
        assert_eq!(lower.attribute_for_generator().class_name(), "LoggingAttribute");

        let generic = ClassIdentifier::new("Stencil", "RepoGenerator<T>");
        assert_eq!(generic.attribute_for_generator().class_name(), "RepoAttribute<T>");
    }

    #[test]
    fn test_with_attribute_suffix_respects_generics() {
        let id = ClassIdentifier::new("Ns", "Track<T>");
        assert_eq!(id.with_attribute_suffix().class_name(), "TrackAttribute<T>");

        let already = ClassIdentifier::new("Ns", "TrackAttribute");
        assert_eq!(already.with_attribute_suffix().class_name(), "TrackAttribute");
    }

    #[test]
    fn test_without_attribute_suffix() {
        let id = ClassIdentifier::new("Ns", "TrackAttribute<T>");
        assert_eq!(
            id.without_attribute_suffix().map(|i| i.class_name().to_string()),
            Some("Track<T>".to_string())
        );
        assert!(ClassIdentifier::new("Ns", "Attribute").without_attribute_suffix().is_none());
    }

    #[test]
    fn test_escaped_file_key() {
        let id = ClassIdentifier::new("Ns", "Cache<int?, List<T>>");
        assert_eq!(id.escaped_file_key(), "Ns.Cache[int-, List[T]]");
    }

    #[test]
    fn test_upper_first() {
        assert_eq!(upper_first("name"), "Name");
        assert_eq!(upper_first("Name"), "Name");
        assert_eq!(upper_first(""), "");
    }
}
