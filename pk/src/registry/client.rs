//! Registry client trait

use async_trait::async_trait;

use super::RegistryError;
use crate::manifest::{PromptId, PromptManifest};
use crate::version::FetchKey;

/// Which prompts a generation run covers
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum GenerationScope {
    #[default]
    All,
    Prompts(Vec<PromptId>),
}

impl GenerationScope {
    /// An empty id list means every prompt
    pub fn from_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<PromptId>,
    {
        let ids: Vec<PromptId> = ids.into_iter().map(Into::into).collect();
        if ids.is_empty() {
            GenerationScope::All
        } else {
            GenerationScope::Prompts(ids)
        }
    }

    pub fn includes(&self, prompt_id: &str) -> bool {
        match self {
            GenerationScope::All => true,
            GenerationScope::Prompts(ids) => ids.iter().any(|id| id.as_str() == prompt_id),
        }
    }
}

/// Source of prompt definitions
///
/// Implementations return classified `RegistryError`s and do not retry.
#[async_trait]
pub trait RegistryClient: Send + Sync {
    /// Fetch one resolved prompt version
    async fn fetch_manifest(&self, prompt_id: &PromptId, key: &FetchKey) -> Result<PromptManifest, RegistryError>;

    /// Fetch one manifest per (prompt, major) for code generation
    async fn fetch_manifests_for_generation(
        &self,
        scope: &GenerationScope,
    ) -> Result<Vec<PromptManifest>, RegistryError>;
}
