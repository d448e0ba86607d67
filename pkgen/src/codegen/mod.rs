//! Code generation from prompt manifests
//!
//! `generate` is pure: manifests in, source files out. It never touches the
//! filesystem or the network, and identical input yields byte-identical
//! output.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use promptkit::{ItemKind, MajorVersion, PromptError, PromptId, PromptManifest};
use tracing::{debug, warn};

use crate::naming::{doc_text, literal, module_name, to_title_case};

mod items;
mod writer;

pub use items::{VersionNames, version_source};
pub use writer::SourceWriter;

/// First line of every generated file
pub const GENERATED_HEADER: &str = "// @generated by pkgen. DO NOT EDIT.";

/// Index module listing every generated prompt module
pub const INDEX_FILE: &str = "mod.rs";

/// One generated source file, path relative to the output directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedFile {
    pub path: PathBuf,
    pub source: String,
}

/// Output of one generation pass
#[derive(Debug, Default)]
pub struct Generation {
    pub files: Vec<GeneratedFile>,
    /// Manifests that could not be generated; their siblings still are
    pub errors: Vec<PromptError>,
    /// Modules of prompts where every version failed
    pub failed_modules: Vec<String>,
}

impl Generation {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn file(&self, path: &str) -> Option<&GeneratedFile> {
        self.files.iter().find(|f| f.path == PathBuf::from(path))
    }

    /// Declare previously generated modules in the index next to this pass's
    pub fn keep_modules(&mut self, kept: &[String]) {
        let mut modules: BTreeSet<String> = self
            .files
            .iter()
            .filter(|f| f.path != Path::new(INDEX_FILE))
            .filter_map(|f| f.path.file_stem().map(|stem| stem.to_string_lossy().into_owned()))
            .collect();
        modules.extend(kept.iter().cloned());
        if let Some(index) = self.files.iter_mut().find(|f| f.path == Path::new(INDEX_FILE)) {
            index.source = index_file(modules.iter());
        }
    }
}

/// Generate one module per prompt id plus the index module
pub fn generate(manifests: &[PromptManifest]) -> Generation {
    debug!(count = manifests.len(), "generate: called");
    let mut generation = Generation::default();
    let mut modules: BTreeMap<String, &PromptId> = BTreeMap::new();

    for (prompt_id, versions) in group(manifests) {
        let module = module_name(prompt_id.as_str());
        if module.is_empty() {
            generation.errors.push(PromptError::InvalidIdentifier {
                prompt_id: prompt_id.to_string(),
                kind: ItemKind::Prompt,
                item_id: prompt_id.to_string(),
                name: prompt_id.to_string(),
            });
            continue;
        }
        if let Some(first) = modules.get(&module) {
            generation.errors.push(PromptError::NameMappingCollision {
                prompt_id: prompt_id.to_string(),
                version: version_list(&versions),
                kind: ItemKind::Prompt,
                item_id: prompt_id.to_string(),
                first: first.to_string(),
                second: prompt_id.to_string(),
                mapped: module,
            });
            continue;
        }

        let title = to_title_case(prompt_id.as_str());
        let mut generated: Vec<(&MajorVersion, String)> = Vec::new();
        for manifest in versions {
            match version_source(manifest, &title) {
                Ok(source) => generated.push((&manifest.major, source)),
                Err(e) => {
                    warn!(%prompt_id, version = %manifest.version_label(), error = %e, "Skipping prompt version");
                    generation.errors.push(e);
                }
            }
        }
        if generated.is_empty() {
            generation.failed_modules.push(module);
            continue;
        }

        generation.files.push(GeneratedFile {
            path: PathBuf::from(format!("{}.rs", module)),
            source: prompt_file(prompt_id, &title, &generated),
        });
        modules.insert(module, prompt_id);
    }

    generation.files.push(GeneratedFile {
        path: PathBuf::from(INDEX_FILE),
        source: index_file(modules.keys()),
    });
    debug!(
        files = generation.files.len(),
        errors = generation.errors.len(),
        "generate: done"
    );
    generation
}

/// Manifests by prompt id, each sorted deployed majors first, one per major
fn group(manifests: &[PromptManifest]) -> BTreeMap<&PromptId, Vec<&PromptManifest>> {
    let mut grouped: BTreeMap<&PromptId, Vec<&PromptManifest>> = BTreeMap::new();
    for manifest in manifests {
        grouped.entry(&manifest.prompt_id).or_default().push(manifest);
    }
    for (prompt_id, versions) in grouped.iter_mut() {
        versions.sort_by_key(|m| major_order(&m.major));
        let before = versions.len();
        versions.dedup_by_key(|m| major_order(&m.major));
        if versions.len() != before {
            warn!(%prompt_id, "Duplicate major versions, keeping the first of each");
        }
    }
    grouped
}

fn major_order(major: &MajorVersion) -> (bool, u32) {
    match major.number() {
        Some(n) => (false, n),
        None => (true, 0),
    }
}

fn version_list(versions: &[&PromptManifest]) -> String {
    versions
        .iter()
        .map(|m| m.version_label())
        .collect::<Vec<_>>()
        .join(", ")
}

fn prompt_file(prompt_id: &PromptId, title: &str, versions: &[(&MajorVersion, String)]) -> String {
    let mut w = SourceWriter::new();
    w.line(GENERATED_HEADER);
    w.line(format!("//! Typed accessors for prompt `{}`", doc_text(prompt_id.as_str())));
    for (major, source) in versions {
        w.blank();
        w.line(format!("// Version {}", major));
        w.blank();
        w.raw(source);
    }
    w.blank();
    write_factory(&mut w, prompt_id, title, versions);
    w.finish()
}

/// Enum over every generated major plus a function that starts one by name
fn write_factory(w: &mut SourceWriter, prompt_id: &PromptId, title: &str, versions: &[(&MajorVersion, String)]) {
    let id_doc = doc_text(prompt_id.as_str());
    let enum_name = format!("{}Manager", title);
    let variants: Vec<(String, VersionNames, &MajorVersion)> = versions
        .iter()
        .map(|(major, _)| {
            let names = VersionNames::new(title, major);
            (names.tag.clone(), names, *major)
        })
        .collect();
    let default_major = versions.iter().rev().find_map(|(major, _)| major.number());
    let available = versions
        .iter()
        .map(|(major, _)| major.to_string())
        .collect::<Vec<_>>()
        .join(", ");

    w.doc(format!("A manager of `{}` at one major version", id_doc));
    w.line("#[derive(Debug)]");
    w.open(format!("pub enum {}", enum_name));
    for (tag, names, _) in &variants {
        w.line(format!("{}({}),", tag, names.manager));
    }
    w.close("");
    w.blank();
    w.open(format!("impl {}", enum_name));
    w.open("pub fn manager(&self) -> &promptkit::PromptManager");
    w.open("match self");
    for (tag, _, _) in &variants {
        w.line(format!("Self::{}(m) => m.manager(),", tag));
    }
    w.close("");
    w.close("");
    w.blank();
    w.open("pub async fn stop(&self)");
    w.line("self.manager().stop().await");
    w.close("");
    w.close("");
    w.blank();

    w.doc(format!("Start a manager of `{}` by major version", id_doc));
    w.line("///");
    match default_major {
        Some(n) => w.doc(format!("`None` selects major version {}, the latest deployed one.", n)),
        None => w.doc("This prompt has no deployed major version; request `\"undeployed\"`."),
    };
    w.open(format!(
        "pub async fn start_manager(major: Option<&str>, registry: std::sync::Arc<dyn promptkit::RegistryClient>, options: promptkit::ManagerOptions) -> Result<{}, promptkit::PromptError>",
        enum_name
    ));
    w.open("match major");
    for (tag, names, major) in &variants {
        let pattern = match (default_major, major.number()) {
            (Some(default), Some(n)) if default == n => format!("None | Some({})", literal(&n.to_string())),
            _ => format!("Some({})", literal(&major.to_string())),
        };
        w.line(format!(
            "{} => Ok({}::{}({}::start(registry, options).await?)),",
            pattern, enum_name, tag, names.manager
        ));
    }
    w.open("other => Err(promptkit::PromptError::InvalidVersionSpec");
    w.line("spec: other.unwrap_or_default().to_string(),");
    w.line(format!(
        "reason: {}.to_string(),",
        literal(&format!("prompt '{}' has major versions: {}", prompt_id, available))
    ));
    w.close("),");
    w.close("");
    w.close("");
}

fn index_file<'a>(modules: impl Iterator<Item = &'a String>) -> String {
    let mut w = SourceWriter::new();
    w.line(GENERATED_HEADER);
    w.line("//! Generated prompt modules");
    let modules: Vec<&String> = modules.collect();
    if !modules.is_empty() {
        w.blank();
    }
    for module in modules {
        w.line(format!("pub mod {};", module));
    }
    w.finish()
}
