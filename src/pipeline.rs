//! The generation pipeline wired onto an [`IncrementalGraph`]
//!
//! ```text
//! declarations ─┐
//!               ├─ bind definitions ─┐
//! supplementary ┘                    ├─ bind usages ─ multiplicity ─ render ─ collect ─▶ artifacts
//! usages ────────────────────────────┘
//! config ───────────────────────────────────── (definitions, rendering, collection)
//! ```
//!
//! Every pass feeds the current host snapshot into the sources and runs the
//! graph. Artifacts are handed to the sink only when the collected set
//! differs from the one emitted by the previous pass.

use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use log::debug;
use thiserror::Error;

use crate::config::GenerationConfig;
use crate::definition::{bind_definition, dedupe_definitions, DeclarationRecord, GeneratorDefinition};
use crate::error::{Diagnostic, Reported};
use crate::graph::{
    CancellationToken, Cancelled, IncrementalGraph, Output, Single, SingleSource, Source, Values,
};
use crate::output::{collect_outputs, render_usage, CollectedOutputs, OutputArtifact, RenderedUsage};
use crate::usage::{bind_usage, enforce_multiplicity, BoundUsage, UsageSite};

/// Errors that abort a generation pass
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Cancelled(#[from] Cancelled),

    #[error("failed to write artifact: {0}")]
    Sink(#[from] io::Error),
}

/// Receives the artifacts of a pass
pub trait ArtifactSink {
    fn emit(&mut self, artifact: &OutputArtifact) -> io::Result<()>;
}

impl ArtifactSink for Vec<OutputArtifact> {
    fn emit(&mut self, artifact: &OutputArtifact) -> io::Result<()> {
        self.push(artifact.clone());
        Ok(())
    }
}

/// Writes each artifact to `<directory>/<key>.<extension>`
#[derive(Debug, Clone)]
pub struct DirectorySink {
    directory: PathBuf,
    extension: String,
}

impl DirectorySink {
    pub fn new(directory: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self {
            directory: directory.into(),
            extension: extension.into(),
        }
    }

    pub fn path_for(&self, artifact: &OutputArtifact) -> PathBuf {
        let extension = self.extension.trim_start_matches('.');
        if extension.is_empty() {
            self.directory.join(&artifact.key)
        } else {
            self.directory.join(format!("{}.{}", artifact.key, extension))
        }
    }
}

impl ArtifactSink for DirectorySink {
    fn emit(&mut self, artifact: &OutputArtifact) -> io::Result<()> {
        fs::create_dir_all(&self.directory)?;
        let path = self.path_for(artifact);
        debug!("writing {}", path.display());
        fs::write(path, &artifact.content)
    }
}

/// What a pass produced
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationReport {
    /// Every diagnostic of the current snapshot, in stage order
    pub diagnostics: Vec<Diagnostic>,
    /// Keys handed to the sink in this pass
    pub emitted: Vec<String>,
}

impl GenerationReport {
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| d.is_error())
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| !d.is_error())
    }
}

type Definitions = Vec<Arc<GeneratorDefinition>>;

/// A long-lived generation pipeline
///
/// Owns its graph; pipelines never share state.
pub struct Pipeline {
    graph: IncrementalGraph,
    config: SingleSource<GenerationConfig>,
    declarations: Source<DeclarationRecord>,
    supplementary: Source<DeclarationRecord>,
    usages: Source<UsageSite>,
    definitions: Single<Definitions>,
    bound: Single<Vec<BoundUsage>>,
    diagnostics: Single<Vec<Diagnostic>>,
    artifacts: Output<Vec<OutputArtifact>>,
    diagnostics_out: Output<Vec<Diagnostic>>,
}

impl Pipeline {
    pub fn new(config: GenerationConfig) -> Self {
        let mut graph = IncrementalGraph::new();
        graph.set_parallel(config.parallel);

        let config = graph.single_source(config);
        let declarations = graph.source::<DeclarationRecord>();
        let supplementary = graph.source::<DeclarationRecord>();
        let usages = graph.source::<UsageSite>();

        let (primary, primary_diagnostics) = bind_definitions(&mut graph, declarations.values(), config.value());
        let (extra, extra_diagnostics) = bind_definitions(&mut graph, supplementary.values(), config.value());
        let declared = graph.concat(primary, extra);
        let deduped = graph.map_single(declared, |definitions: &Definitions| dedupe_definitions(definitions));
        let definitions = graph.map_single(deduped, |reported: &Reported<Definitions>| {
            reported.value.clone().unwrap_or_default()
        });
        let duplicate_diagnostics = graph.map_single(deduped, |reported: &Reported<Definitions>| {
            reported.diagnostics.clone()
        });
        let definition_diagnostics = graph.concat(primary_diagnostics, extra_diagnostics);
        let definition_diagnostics = graph.concat(definition_diagnostics, duplicate_diagnostics);

        let with_definitions = graph.combine(usages.values(), definitions);
        let usage_results = graph.map(with_definitions, |(usage, definitions): &(UsageSite, Definitions)| {
            bind_usage(usage, definitions)
        });
        let usage_results = graph.flat_map(usage_results, |result: &Option<Reported<BoundUsage>>| {
            result.iter().cloned().collect::<Vec<_>>()
        });
        let bound_each = graph.flat_map(usage_results, |result: &Reported<BoundUsage>| {
            result.value.iter().cloned().collect::<Vec<_>>()
        });
        let usage_diagnostics = graph.flat_map(usage_results, |result: &Reported<BoundUsage>| {
            result.diagnostics.clone()
        });
        let usage_diagnostics = graph.collect(usage_diagnostics);

        let all_bound = graph.collect(bound_each);
        let multiplicity = graph.map_single(all_bound, |bound: &Vec<BoundUsage>| enforce_multiplicity(bound));
        let bound = graph.map_single(multiplicity, |reported: &Reported<Vec<BoundUsage>>| {
            reported.value.clone().unwrap_or_default()
        });
        let multiplicity_diagnostics = graph.map_single(multiplicity, |reported: &Reported<Vec<BoundUsage>>| {
            reported.diagnostics.clone()
        });

        let rendered = render_stage(&mut graph, bound, config.value());
        let with_config = graph.combine_single(rendered, config.value());
        let collected = graph.map_single(with_config, |(rendered, config): &(Vec<RenderedUsage>, GenerationConfig)| {
            collect_outputs(rendered, config)
        });
        let artifacts = graph.map_single(collected, |collected: &CollectedOutputs| collected.artifacts.clone());
        let collection_diagnostics = graph.map_single(collected, |collected: &CollectedOutputs| {
            collected.diagnostics.clone()
        });

        let diagnostics = graph.concat(definition_diagnostics, usage_diagnostics);
        let diagnostics = graph.concat(diagnostics, multiplicity_diagnostics);
        let diagnostics = graph.concat(diagnostics, collection_diagnostics);

        let artifacts = graph.output(artifacts);
        let diagnostics_out = graph.output(diagnostics);

        Self {
            graph,
            config,
            declarations,
            supplementary,
            usages,
            definitions,
            bound,
            diagnostics,
            artifacts,
            diagnostics_out,
        }
    }

    /// Replace the generator declarations of the compilation being generated
    pub fn set_declarations(&mut self, records: Vec<DeclarationRecord>) -> bool {
        self.graph.set_source(&self.declarations, records)
    }

    /// Replace declarations contributed by referenced libraries
    pub fn set_supplementary_declarations(&mut self, records: Vec<DeclarationRecord>) -> bool {
        self.graph.set_source(&self.supplementary, records)
    }

    pub fn set_usages(&mut self, usages: Vec<UsageSite>) -> bool {
        self.graph.set_source(&self.usages, usages)
    }

    pub fn set_config(&mut self, config: GenerationConfig) -> bool {
        self.graph.set_parallel(config.parallel);
        self.graph.set_single(&self.config, config)
    }

    /// Run one pass, handing changed artifacts to `sink`
    ///
    /// A cancelled pass emits nothing; the next pass picks up the pending
    /// work. The artifact set counts as emitted only once every artifact
    /// reached the sink, so a pass that fails to write is repeated in full.
    pub fn run(
        &mut self,
        sink: &mut dyn ArtifactSink,
        cancel: &CancellationToken,
    ) -> Result<GenerationReport, PipelineError> {
        let summary = self.graph.run(cancel)?;
        debug!(
            "generation pass: {} stage(s) recomputed, {} changed",
            summary.evaluated, summary.changed
        );

        // Mark the diagnostics as seen; the report always carries the full set.
        self.graph.take_output(&self.diagnostics_out);
        let diagnostics = self.graph.get(&self.diagnostics).cloned().unwrap_or_default();

        let mut emitted = Vec::new();
        if let Some(pending) = self.graph.pending_output(&self.artifacts) {
            for artifact in &pending.value {
                sink.emit(artifact)?;
                emitted.push(artifact.key.clone());
            }
            self.graph.commit_output(&self.artifacts, &pending);
        }

        Ok(GenerationReport {
            diagnostics,
            emitted,
        })
    }

    /// Definitions bound in the last completed pass
    pub fn definitions(&self) -> &[Arc<GeneratorDefinition>] {
        self.graph.get(&self.definitions).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Usages that survived binding in the last completed pass
    pub fn bound_usages(&self) -> &[BoundUsage] {
        self.graph.get(&self.bound).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The underlying graph, for inspecting per-stage statistics
    pub fn graph(&self) -> &IncrementalGraph {
        &self.graph
    }
}

fn bind_definitions(
    graph: &mut IncrementalGraph,
    records: Values<DeclarationRecord>,
    config: Single<GenerationConfig>,
) -> (Single<Definitions>, Single<Vec<Diagnostic>>) {
    let paired = graph.combine(records, config);
    let results = graph.try_map(
        paired,
        |(record, config): &(DeclarationRecord, GenerationConfig), cancel: &CancellationToken| {
            bind_definition(record, config, cancel)
        },
    );
    let definitions = graph.flat_map(results, |result: &Reported<Arc<GeneratorDefinition>>| {
        result.value.iter().cloned().collect::<Vec<_>>()
    });
    let diagnostics = graph.flat_map(results, |result: &Reported<Arc<GeneratorDefinition>>| {
        result.diagnostics.clone()
    });
    (graph.collect(definitions), graph.collect(diagnostics))
}

fn render_stage(
    graph: &mut IncrementalGraph,
    bound: Single<Vec<BoundUsage>>,
    config: Single<GenerationConfig>,
) -> Single<Vec<RenderedUsage>> {
    let each = graph.flat_map(bound.as_values(), |bound: &Vec<BoundUsage>| bound.clone());
    let paired = graph.combine(each, config);
    let rendered = graph.map(paired, |(usage, config): &(BoundUsage, GenerationConfig)| {
        render_usage(usage, config)
    });
    graph.collect(rendered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::{GeneratorKind, MarkerTag, MemberRecord};
    use crate::identifier::ClassIdentifier;
    use crate::usage::UsageTarget;
    use pretty_assertions::assert_eq;

    fn greeter() -> DeclarationRecord {
        DeclarationRecord::new(ClassIdentifier::new("Acme", "GreeterGenerator"), GeneratorKind::Class)
            .with_member(MemberRecord::template(
                "Body",
                MarkerTag::Template,
                "// hello {{ ClassName }}",
            ))
    }

    fn greet(class: &str) -> UsageSite {
        UsageSite::new(
            ClassIdentifier::new("Stencil", "Greeter"),
            UsageTarget::Class {
                class: ClassIdentifier::new("Shop", class),
            },
        )
    }

    fn run(pipeline: &mut Pipeline) -> (GenerationReport, Vec<OutputArtifact>) {
        let mut sink = Vec::new();
        let report = pipeline.run(&mut sink, &CancellationToken::none()).unwrap();
        (report, sink)
    }

    #[test]
    fn test_single_pass() {
        let mut pipeline = Pipeline::new(GenerationConfig::default());
        pipeline.set_declarations(vec![greeter()]);
        pipeline.set_usages(vec![greet("Order")]);

        let (report, artifacts) = run(&mut pipeline);
        assert!(report.diagnostics.is_empty());
        assert_eq!(artifacts, vec![OutputArtifact::new("Shop.Order", "// hello Order")]);
        assert_eq!(report.emitted, vec!["Shop.Order".to_string()]);
        assert_eq!(pipeline.definitions().len(), 1);
        assert_eq!(pipeline.bound_usages().len(), 1);
    }

    #[test]
    fn test_unchanged_snapshot_emits_nothing() {
        let mut pipeline = Pipeline::new(GenerationConfig::default());
        pipeline.set_declarations(vec![greeter()]);
        pipeline.set_usages(vec![greet("Order")]);
        run(&mut pipeline);

        assert!(!pipeline.set_usages(vec![greet("Order")]));
        let (report, artifacts) = run(&mut pipeline);
        assert!(artifacts.is_empty());
        assert!(report.emitted.is_empty());
    }

    #[test]
    fn test_supplementary_definitions_are_visible() {
        let mut pipeline = Pipeline::new(GenerationConfig::default());
        pipeline.set_supplementary_declarations(vec![greeter()]);
        pipeline.set_usages(vec![greet("Customer")]);

        let (_, artifacts) = run(&mut pipeline);
        assert_eq!(artifacts, vec![OutputArtifact::new("Shop.Customer", "// hello Customer")]);
    }

    #[test]
    fn test_cancelled_pass_emits_nothing() {
        let mut pipeline = Pipeline::new(GenerationConfig::default());
        pipeline.set_declarations(vec![greeter()]);
        pipeline.set_usages(vec![greet("Order")]);

        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut sink = Vec::new();
        let result = pipeline.run(&mut sink, &cancel);
        assert!(matches!(result, Err(PipelineError::Cancelled(_))));
        assert!(sink.is_empty());

        let (_, artifacts) = run(&mut pipeline);
        assert_eq!(artifacts.len(), 1);
    }

    #[test]
    fn test_duplicate_supplementary_definition_is_reported() {
        let mut pipeline = Pipeline::new(GenerationConfig::default());
        pipeline.set_declarations(vec![greeter()]);
        pipeline.set_supplementary_declarations(vec![greeter()]);
        pipeline.set_usages(vec![greet("Order")]);

        let (report, artifacts) = run(&mut pipeline);
        let codes: Vec<_> = report.diagnostics.iter().map(|d| d.code).collect();
        assert_eq!(codes, vec![crate::error::DiagnosticCode::DuplicateGenerator]);
        assert!(!report.has_errors());
        assert_eq!(pipeline.definitions().len(), 1);
        assert_eq!(artifacts, vec![OutputArtifact::new("Shop.Order", "// hello Order")]);
    }

    /// Fails every write after the first `healthy` ones
    struct FlakySink {
        healthy: usize,
        written: Vec<OutputArtifact>,
    }

    impl ArtifactSink for FlakySink {
        fn emit(&mut self, artifact: &OutputArtifact) -> io::Result<()> {
            if self.written.len() >= self.healthy {
                return Err(io::Error::new(io::ErrorKind::Other, "disk full"));
            }
            self.written.push(artifact.clone());
            Ok(())
        }
    }

    #[test]
    fn test_failed_write_is_retried_in_full() {
        let mut pipeline = Pipeline::new(GenerationConfig::default());
        pipeline.set_declarations(vec![greeter()]);
        pipeline.set_usages(vec![greet("A"), greet("B"), greet("C")]);

        let mut flaky = FlakySink {
            healthy: 1,
            written: Vec::new(),
        };
        let result = pipeline.run(&mut flaky, &CancellationToken::none());
        assert!(matches!(result, Err(PipelineError::Sink(_))));
        assert_eq!(flaky.written.len(), 1);

        let (report, artifacts) = run(&mut pipeline);
        assert_eq!(
            report.emitted,
            vec!["Shop.A".to_string(), "Shop.B".to_string(), "Shop.C".to_string()]
        );
        assert_eq!(artifacts.len(), 3);

        let (report, artifacts) = run(&mut pipeline);
        assert!(report.emitted.is_empty());
        assert!(artifacts.is_empty());
    }

    #[test]
    fn test_directory_sink_paths() {
        let sink = DirectorySink::new("out", ".g.cs");
        assert_eq!(
            sink.path_for(&OutputArtifact::new("Shop.Order", "")),
            PathBuf::from("out").join("Shop.Order.g.cs")
        );
        let bare = DirectorySink::new("out", "");
        assert_eq!(
            bare.path_for(&OutputArtifact::new("Shop.Order", "")),
            PathBuf::from("out").join("Shop.Order")
        );
    }
}
