//! Host manifest: a TOML snapshot of declarations and usage sites
//!
//! Stands in for a host integration layer. A manifest lists the generator
//! declarations of the compilation (`[[definitions]]`), declarations from
//! referenced libraries (`[[supplementary]]`) and usage sites (`[[usages]]`).

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::definition::DeclarationRecord;
use crate::usage::UsageSite;

#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("Failed to read manifest: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse manifest TOML: {0}")]
    ParseError(#[from] toml::de::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Manifest {
    pub definitions: Vec<DeclarationRecord>,
    pub supplementary: Vec<DeclarationRecord>,
    pub usages: Vec<UsageSite>,
}

impl Manifest {
    pub fn from_file(path: &Path) -> Result<Self, ManifestError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self, ManifestError> {
        Ok(toml::from_str(content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usage::UsageTarget;

    #[test]
    fn test_empty_manifest() {
        let manifest = Manifest::from_str("").unwrap();
        assert_eq!(manifest, Manifest::default());
    }

    #[test]
    fn test_parse_manifest() {
        let manifest = Manifest::from_str(
            r#"
            [[definitions]]
            identifier = "Acme.LoggingGenerator"
            kind = "field"

            [[definitions.members]]
            name = "Body"
            constant_text = "log {{ FieldName }}"
            markers = [{ marker = "template" }]

            [[usages]]
            generator = "Stencil.Logging"
            arguments = ["Debug"]
            named_arguments = [{ name = "Prefix", value = "x_" }]
            location = "Order.cs:12"
            target = { kind = "member", class = "Shop.Order", member = "_total" }

            [[usages]]
            generator = "Stencil.Registry"
            target = { kind = "assembly" }
            "#,
        )
        .unwrap();

        assert_eq!(manifest.definitions.len(), 1);
        assert_eq!(manifest.definitions[0].members.len(), 1);
        assert!(manifest.supplementary.is_empty());
        assert_eq!(manifest.usages.len(), 2);
        assert_eq!(manifest.usages[0].arguments, vec!["Debug".to_string()]);
        assert_eq!(manifest.usages[0].named_arguments[0].name, "Prefix");
        assert!(matches!(
            &manifest.usages[0].target,
            UsageTarget::Member { member, .. } if member == "_total"
        ));
        assert_eq!(manifest.usages[1].target, UsageTarget::Assembly);
    }

    #[test]
    fn test_unknown_table_rejected() {
        assert!(matches!(
            Manifest::from_str("[[generators]]\nname = \"x\""),
            Err(ManifestError::ParseError(_))
        ));
    }
}
