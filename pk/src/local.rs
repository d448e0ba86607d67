//! Local prompt overrides
//!
//! A `LocalSource` is consulted before any network fetch. A hit becomes the
//! manager's permanent snapshot.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use tracing::debug;

use crate::manifest::{PromptId, PromptManifest};
use crate::registry::RegistryError;
use crate::registry::wire::WirePrompt;
use crate::version::FetchKey;

/// Source of locally supplied manifests
pub trait LocalSource: Send + Sync + fmt::Debug {
    /// Look up a manifest; `Ok(None)` means no override for this key
    fn lookup(&self, prompt_id: &PromptId, key: &FetchKey) -> Result<Option<PromptManifest>, RegistryError>;
}

/// Overrides held in memory, keyed by prompt id and major segment
#[derive(Debug, Default)]
pub struct InMemorySource {
    manifests: HashMap<(PromptId, String), PromptManifest>,
}

impl InMemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a manifest under its own prompt id and major version
    pub fn insert(&mut self, manifest: PromptManifest) {
        let key = (manifest.prompt_id.clone(), manifest.major.to_string());
        self.manifests.insert(key, manifest);
    }

    pub fn with(mut self, manifest: PromptManifest) -> Self {
        self.insert(manifest);
        self
    }

    pub fn len(&self) -> usize {
        self.manifests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.manifests.is_empty()
    }
}

impl LocalSource for InMemorySource {
    fn lookup(&self, prompt_id: &PromptId, key: &FetchKey) -> Result<Option<PromptManifest>, RegistryError> {
        let found = self
            .manifests
            .get(&(prompt_id.clone(), key.major_segment()))
            .filter(|m| minor_matches(m, key))
            .cloned();
        debug!(%prompt_id, %key, hit = found.is_some(), "InMemorySource::lookup: called");
        Ok(found)
    }
}

/// Overrides read from `{dir}/{prompt-id}/{major}.json` in the registry wire format
#[derive(Debug, Clone)]
pub struct DirectorySource {
    dir: PathBuf,
}

impl DirectorySource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Override file of a prompt version; ids that would leave the directory are rejected
    pub fn path_for(&self, prompt_id: &PromptId, key: &FetchKey) -> Result<PathBuf, RegistryError> {
        let id = prompt_id.as_str();
        let mut components = Path::new(id).components();
        let single_name = matches!(
            (components.next(), components.next()),
            (Some(Component::Normal(_)), None)
        );
        if !single_name || id.contains(['/', '\\']) {
            return Err(RegistryError::Config(format!(
                "prompt id '{}' cannot name a local override directory",
                id
            )));
        }
        Ok(self.dir.join(id).join(format!("{}.json", key.major_segment())))
    }
}

impl LocalSource for DirectorySource {
    fn lookup(&self, prompt_id: &PromptId, key: &FetchKey) -> Result<Option<PromptManifest>, RegistryError> {
        let path = self.path_for(prompt_id, key)?;
        debug!(%prompt_id, %key, path = %path.display(), "DirectorySource::lookup: called");
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(RegistryError::Io { path, source }),
        };
        let wire: WirePrompt = serde_json::from_str(&content)?;
        if wire.id != prompt_id.as_str() {
            return Err(RegistryError::InvalidResponse(format!(
                "{} declares prompt '{}', expected '{}'",
                path.display(),
                wire.id,
                prompt_id
            )));
        }
        // read the file's own minor so an exact key can be checked against it
        let manifest = match key {
            FetchKey::Exact { major, minor } => {
                let mut manifest = wire.into_manifest(&FetchKey::LatestMinor { major: *major })?;
                manifest.minor.get_or_insert(*minor);
                manifest
            }
            _ => wire.into_manifest(key)?,
        };
        Ok(Some(manifest).filter(|m| minor_matches(m, key)))
    }
}

/// An exact key only matches an override of the same minor, or one without a minor
fn minor_matches(manifest: &PromptManifest, key: &FetchKey) -> bool {
    match (key, manifest.minor) {
        (FetchKey::Exact { minor, .. }, Some(found)) => *minor == found,
        _ => true,
    }
}
