//! Configuration for a generation pipeline
//!
//! Loaded from TOML; every field has a default so an empty file is valid.

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

/// Errors that can occur when loading a configuration file
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse config TOML: {0}")]
    ParseError(#[from] toml::de::Error),
}

/// Options controlling naming, output assembly and evaluation
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GenerationConfig {
    /// Namespace derived attributes live in unless a definition overrides it
    pub attribute_namespace: String,

    /// Joins inline fragments that target the same class
    pub fragment_separator: String,

    /// Prefix every artifact with a comment listing its render context
    pub debug_header: bool,

    /// Line comment marker of the target language, used by the debug header
    pub comment_prefix: String,

    /// Extension appended to artifact keys when written to disk
    pub file_extension: String,

    /// Evaluate independent elements of a stage on the rayon pool
    pub parallel: bool,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            attribute_namespace: "Stencil".to_string(),
            fragment_separator: "\n".to_string(),
            debug_header: false,
            comment_prefix: "//".to_string(),
            file_extension: "g.cs".to_string(),
            parallel: false,
        }
    }
}

impl GenerationConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Load configuration from a TOML string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn with_attribute_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.attribute_namespace = namespace.into();
        self
    }

    pub fn with_fragment_separator(mut self, separator: impl Into<String>) -> Self {
        self.fragment_separator = separator.into();
        self
    }

    pub fn with_debug_header(mut self, enabled: bool) -> Self {
        self.debug_header = enabled;
        self
    }

    pub fn with_comment_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.comment_prefix = prefix.into();
        self
    }

    pub fn with_file_extension(mut self, extension: impl Into<String>) -> Self {
        self.file_extension = extension.into();
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }
}
