//! pkgen - typed prompt accessors from registry manifests
//!
//! Fetches manifests through a `RegistryClient`, generates one Rust module per
//! prompt id and writes them next to a `mod.rs` index.
//!
//! # Modules
//!
//! - [`codegen`] - Pure manifest to source generation
//! - [`emit`] - Writing generated files to disk
//! - [`naming`] - Identifier, type and version naming
//! - [`cli`] - Command line definitions

use std::path::{Path, PathBuf};

use promptkit::{GenerationScope, PromptError, RegistryClient};
use tracing::{debug, info};

pub mod cli;
pub mod codegen;
pub mod emit;
pub mod naming;

pub use codegen::{GENERATED_HEADER, GeneratedFile, Generation, generate};
pub use emit::{EmitSummary, GenerateError, write_files};

/// Result of a full generation run
#[derive(Debug, Default)]
pub struct GenerateSummary {
    pub written: Vec<PathBuf>,
    pub unchanged: Vec<PathBuf>,
    pub removed: Vec<PathBuf>,
    /// Manifests that failed to generate
    pub failures: Vec<PromptError>,
}

impl GenerateSummary {
    pub fn is_ok(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Fetch, generate and write
///
/// A fetch failure aborts the run before anything is written. Per-manifest
/// generation failures are collected while the rest is written; stale files
/// are only pruned when every manifest generated. A prompt whose every version
/// failed keeps its last generated module, still declared in the index.
pub async fn run_generate(
    registry: &dyn RegistryClient,
    scope: &GenerationScope,
    output_dir: &Path,
) -> Result<GenerateSummary, GenerateError> {
    debug!(?scope, output_dir = %output_dir.display(), "run_generate: called");
    let manifests = registry.fetch_manifests_for_generation(scope).await?;
    info!(count = manifests.len(), "Fetched manifests for generation");

    let mut generation = generate(&manifests);
    let kept: Vec<String> = generation
        .failed_modules
        .iter()
        .filter(|module| {
            let path = output_dir.join(format!("{}.rs", module));
            path.is_file() && emit::is_generated(&path).unwrap_or(false)
        })
        .cloned()
        .collect();
    if !kept.is_empty() {
        info!(?kept, "Keeping last generated modules of failed prompts");
        generation.keep_modules(&kept);
    }
    let emitted = write_files(output_dir, &generation.files, generation.is_ok())?;

    Ok(GenerateSummary {
        written: emitted.written,
        unchanged: emitted.unchanged,
        removed: emitted.removed,
        failures: generation.errors,
    })
}
