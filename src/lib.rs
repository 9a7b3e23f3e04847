//! Stencil Forge - template-driven code generation
//!
//! Users author *generator definitions*: named bundles of placeholder
//! templates with a parameter contract. The pipeline validates the
//! definitions, binds every usage site to a render context, renders the
//! templates and collects the results into uniquely keyed artifacts. All of
//! it runs on an incremental graph, so a repeated pass only recomputes what
//! its changed inputs affect.
//!
//! # Example
//!
//! ```rust
//! use stencil_forge::definition::{DeclarationRecord, GeneratorKind, MarkerTag, MemberRecord};
//! use stencil_forge::identifier::ClassIdentifier;
//! use stencil_forge::usage::{UsageSite, UsageTarget};
//! use stencil_forge::{generate, GenerationConfig, Manifest};
//!
//! let manifest = Manifest {
//!     definitions: vec![DeclarationRecord::new(
//!         ClassIdentifier::new("Acme", "GreeterGenerator"),
//!         GeneratorKind::Class,
//!     )
//!     .with_member(MemberRecord::template("Body", MarkerTag::Template, "// hi {{ ClassName }}"))],
//!     supplementary: Vec::new(),
//!     usages: vec![UsageSite::new(
//!         ClassIdentifier::new("Stencil", "Greeter"),
//!         UsageTarget::Class { class: ClassIdentifier::new("Shop", "Order") },
//!     )],
//! };
//!
//! let generation = generate(&manifest, GenerationConfig::default()).unwrap();
//! assert!(!generation.report.has_errors());
//! assert_eq!(generation.artifacts[0].content, "// hi Order");
//! ```

pub mod config;
pub mod definition;
pub mod error;
pub mod graph;
pub mod identifier;
pub mod manifest;
pub mod output;
pub mod parameter;
pub mod pipeline;
pub mod template;
pub mod usage;

pub use config::{ConfigError, GenerationConfig};
pub use error::{Diagnostic, DiagnosticCode, Reported, Severity};
pub use graph::{CancellationToken, Cancelled, IncrementalGraph};
pub use identifier::ClassIdentifier;
pub use manifest::{Manifest, ManifestError};
pub use output::OutputArtifact;
pub use pipeline::{ArtifactSink, DirectorySink, GenerationReport, Pipeline, PipelineError};

/// Artifacts and diagnostics of a one-shot generation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Generation {
    pub artifacts: Vec<OutputArtifact>,
    pub report: GenerationReport,
}

/// Run a single generation pass over a manifest
///
/// For repeated passes over an evolving snapshot keep a [`Pipeline`]
/// instead; it reuses everything that did not change.
pub fn generate(manifest: &Manifest, config: GenerationConfig) -> Result<Generation, PipelineError> {
    generate_with_cancel(manifest, config, &CancellationToken::none())
}

/// Like [`generate`], stopping early once `cancel` fires
pub fn generate_with_cancel(
    manifest: &Manifest,
    config: GenerationConfig,
    cancel: &CancellationToken,
) -> Result<Generation, PipelineError> {
    let mut pipeline = Pipeline::new(config);
    pipeline.set_declarations(manifest.definitions.clone());
    pipeline.set_supplementary_declarations(manifest.supplementary.clone());
    pipeline.set_usages(manifest.usages.clone());

    let mut artifacts = Vec::new();
    let report = pipeline.run(&mut artifacts, cancel)?;
    Ok(Generation { artifacts, report })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_empty_manifest() {
        let generation = generate(&Manifest::default(), GenerationConfig::default()).unwrap();
        assert!(generation.artifacts.is_empty());
        assert!(generation.report.diagnostics.is_empty());
    }

    #[test]
    fn test_generate_cancelled() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = generate_with_cancel(&Manifest::default(), GenerationConfig::default(), &cancel);
        assert!(matches!(result, Err(PipelineError::Cancelled(_))));
    }
}
