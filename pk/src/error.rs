//! Prompt error types

use thiserror::Error;

use crate::manifest::ItemKind;
use crate::registry::RegistryError;

/// Errors surfaced by prompt managers, renderers and the code generator
///
/// Every variant carries the prompt id and version (plus the template or tool
/// id where relevant) so a failure is actionable on its own.
#[derive(Debug, Error)]
pub enum PromptError {
    #[error("Invalid version spec '{spec}': {reason}")]
    InvalidVersionSpec { spec: String, reason: String },

    #[error("Invalid manager options: {0}")]
    InvalidOptions(String),

    #[error("Failed to fetch prompt '{prompt_id}' ({version}): {source}")]
    PromptFetch {
        prompt_id: String,
        version: String,
        #[source]
        source: RegistryError,
    },

    #[error(
        "Placeholder mismatch rendering {kind} '{item_id}' of prompt '{prompt_id}' ({version}): missing [{}], unexpected [{}]",
        .missing.join(", "),
        .unexpected.join(", ")
    )]
    PlaceholderMismatch {
        prompt_id: String,
        version: String,
        kind: ItemKind,
        item_id: String,
        missing: Vec<String>,
        unexpected: Vec<String>,
    },

    #[error("Unknown template '{template_id}' in prompt '{prompt_id}' ({version})")]
    UnknownTemplate {
        prompt_id: String,
        version: String,
        template_id: String,
    },

    #[error("Unknown tool '{tool_id}' in prompt '{prompt_id}' ({version})")]
    UnknownTool {
        prompt_id: String,
        version: String,
        tool_id: String,
    },

    #[error(
        "Name mapping collision in {kind} '{item_id}' of prompt '{prompt_id}' ({version}): '{first}' and '{second}' both map to '{mapped}'"
    )]
    NameMappingCollision {
        prompt_id: String,
        version: String,
        kind: ItemKind,
        item_id: String,
        first: String,
        second: String,
        mapped: String,
    },

    #[error("Name '{name}' in {kind} '{item_id}' of prompt '{prompt_id}' does not produce a valid identifier")]
    InvalidIdentifier {
        prompt_id: String,
        kind: ItemKind,
        item_id: String,
        name: String,
    },

    #[error("Params of prompt '{prompt_id}' ({version}) do not match the generated type: {source}")]
    InvalidParams {
        prompt_id: String,
        version: String,
        #[source]
        source: serde_json::Error,
    },
}

impl PromptError {
    /// The prompt this error refers to, when it refers to one
    pub fn prompt_id(&self) -> Option<&str> {
        match self {
            PromptError::InvalidVersionSpec { .. } | PromptError::InvalidOptions(_) => None,
            PromptError::PromptFetch { prompt_id, .. }
            | PromptError::PlaceholderMismatch { prompt_id, .. }
            | PromptError::UnknownTemplate { prompt_id, .. }
            | PromptError::UnknownTool { prompt_id, .. }
            | PromptError::NameMappingCollision { prompt_id, .. }
            | PromptError::InvalidIdentifier { prompt_id, .. }
            | PromptError::InvalidParams { prompt_id, .. } => Some(prompt_id),
        }
    }

    /// Check if this error came from the registry and is worth retrying
    pub fn is_retryable(&self) -> bool {
        match self {
            PromptError::PromptFetch { source, .. } => source.is_retryable(),
            _ => false,
        }
    }
}
