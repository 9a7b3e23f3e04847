//! Stencil Forge CLI
//!
//! Usage:
//!   stencil-forge [OPTIONS] <MANIFEST>
//!
//! Options:
//!   -c, --config <FILE>  Generation config (TOML format)
//!   -o, --output <DIR>   Directory artifacts are written to [default: generated]
//!       --check          Report diagnostics without writing anything
//!   -h, --help           Print help
//!
//! Logging is controlled with `RUST_LOG` (default `warn`).

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use stencil_forge::{
    ArtifactSink, CancellationToken, DirectorySink, GenerationConfig, Manifest, OutputArtifact,
    Pipeline,
};

#[derive(Parser)]
#[command(name = "stencil-forge")]
#[command(about = "Template-driven code generation from a host manifest")]
struct Cli {
    /// Manifest listing generator declarations and usage sites (TOML format)
    manifest: PathBuf,

    /// Generation config file (TOML format)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory artifacts are written to
    #[arg(short, long, default_value = "generated")]
    output: PathBuf,

    /// Report diagnostics without writing anything
    #[arg(long)]
    check: bool,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => match GenerationConfig::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Error loading config '{}': {}", path.display(), e);
                return ExitCode::FAILURE;
            }
        },
        None => GenerationConfig::default(),
    };

    let manifest = match Manifest::from_file(&cli.manifest) {
        Ok(manifest) => manifest,
        Err(e) => {
            eprintln!("Error loading manifest '{}': {}", cli.manifest.display(), e);
            return ExitCode::FAILURE;
        }
    };

    let extension = config.file_extension.clone();
    let mut pipeline = Pipeline::new(config);
    pipeline.set_declarations(manifest.definitions);
    pipeline.set_supplementary_declarations(manifest.supplementary);
    pipeline.set_usages(manifest.usages);

    let mut collected: Vec<OutputArtifact> = Vec::new();
    let mut directory = DirectorySink::new(&cli.output, extension);
    let sink: &mut dyn ArtifactSink = if cli.check { &mut collected } else { &mut directory };

    let report = match pipeline.run(sink, &CancellationToken::none()) {
        Ok(report) => report,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    for diagnostic in &report.diagnostics {
        eprintln!("{}", diagnostic.format());
    }

    if cli.check {
        for artifact in &collected {
            println!("{}", artifact.key);
        }
    } else if !report.emitted.is_empty() {
        eprintln!(
            "wrote {} artifact(s) to {}",
            report.emitted.len(),
            cli.output.display()
        );
    }

    if report.has_errors() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
