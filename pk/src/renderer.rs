//! Strict placeholder renderers
//!
//! Renderers are bound to one manifest. Callers pass `(mapped name, value)`
//! pairs; the supplied set must equal the required set exactly.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::error::PromptError;
use crate::manifest::{ItemKind, PromptManifest};
use crate::placeholder::{NameMap, NameMapError};

/// Build the name map of one template or tool, turning failures into errors
pub(crate) fn bind_names(
    manifest: &PromptManifest,
    kind: ItemKind,
    item_id: &str,
    names: &[String],
) -> Result<NameMap, PromptError> {
    NameMap::snake(names).map_err(|e| match e {
        NameMapError::Collision { first, second, mapped } => PromptError::NameMappingCollision {
            prompt_id: manifest.prompt_id.to_string(),
            version: manifest.version_label(),
            kind,
            item_id: item_id.to_string(),
            first,
            second,
            mapped,
        },
        NameMapError::Empty { source } => PromptError::InvalidIdentifier {
            prompt_id: manifest.prompt_id.to_string(),
            kind,
            item_id: item_id.to_string(),
            name: source,
        },
    })
}

/// Match supplied args against a name map
///
/// Returns the source-name lookup on success or the (missing, unexpected)
/// mapped names on failure. A repeated key counts as unexpected.
fn match_args<'a>(
    names: &'a NameMap,
    args: &[(&str, &'a str)],
) -> Result<HashMap<&'a str, &'a str>, (Vec<String>, Vec<String>)> {
    let mut lookup: HashMap<&str, &str> = HashMap::with_capacity(args.len());
    let mut unexpected: Vec<String> = Vec::new();

    for (mapped, value) in args {
        match names.source_for(mapped) {
            Some(source) if !lookup.contains_key(source) => {
                lookup.insert(source, *value);
            }
            _ => unexpected.push((*mapped).to_string()),
        }
    }

    let missing: Vec<String> = names
        .iter()
        .filter(|(source, _)| !lookup.contains_key(source))
        .map(|(_, mapped)| mapped.to_string())
        .collect();

    if missing.is_empty() && unexpected.is_empty() {
        Ok(lookup)
    } else {
        Err((missing, unexpected))
    }
}

fn mismatch(
    manifest: &PromptManifest,
    kind: ItemKind,
    item_id: &str,
    (missing, unexpected): (Vec<String>, Vec<String>),
) -> PromptError {
    PromptError::PlaceholderMismatch {
        prompt_id: manifest.prompt_id.to_string(),
        version: manifest.version_label(),
        kind,
        item_id: item_id.to_string(),
        missing,
        unexpected,
    }
}

/// Renders the templates of one manifest
#[derive(Debug, Clone)]
pub struct TemplateRenderer {
    manifest: Arc<PromptManifest>,
    names: Vec<NameMap>,
}

impl TemplateRenderer {
    pub fn bind(manifest: Arc<PromptManifest>) -> Result<Self, PromptError> {
        let names = manifest
            .templates
            .iter()
            .map(|t| bind_names(&manifest, ItemKind::Template, t.id(), t.placeholders()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { manifest, names })
    }

    /// Render a template with exactly its required mapped names
    pub fn render(&self, template_id: &str, args: &[(&str, &str)]) -> Result<String, PromptError> {
        debug!(prompt_id = %self.manifest.prompt_id, %template_id, arg_count = args.len(), "render_template: called");
        let index = self.index_of(template_id)?;
        let template = &self.manifest.templates[index];
        let lookup = match_args(&self.names[index], args)
            .map_err(|e| mismatch(&self.manifest, ItemKind::Template, template_id, e))?;
        Ok(template.compiled().render(|name| lookup.get(name).copied()))
    }

    /// Mapped names a template requires, in declaration order
    pub fn required(&self, template_id: &str) -> Result<Vec<&str>, PromptError> {
        let index = self.index_of(template_id)?;
        Ok(self.names[index].mapped_names().collect())
    }

    pub fn template_ids(&self) -> impl Iterator<Item = &str> {
        self.manifest.templates.iter().map(|t| t.id())
    }

    fn index_of(&self, template_id: &str) -> Result<usize, PromptError> {
        self.manifest
            .templates
            .iter()
            .position(|t| t.id() == template_id)
            .ok_or_else(|| PromptError::UnknownTemplate {
                prompt_id: self.manifest.prompt_id.to_string(),
                version: self.manifest.version_label(),
                template_id: template_id.to_string(),
            })
    }
}

/// Renders the tool schemas of one manifest
#[derive(Debug, Clone)]
pub struct ToolRenderer {
    manifest: Arc<PromptManifest>,
    names: Vec<NameMap>,
}

impl ToolRenderer {
    pub fn bind(manifest: Arc<PromptManifest>) -> Result<Self, PromptError> {
        let names = manifest
            .tools
            .iter()
            .map(|t| bind_names(&manifest, ItemKind::Tool, t.id(), t.placeholders()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { manifest, names })
    }

    /// Render a tool schema, substituting inside leaf strings only
    pub fn render(&self, tool_id: &str, args: &[(&str, &str)]) -> Result<Value, PromptError> {
        debug!(prompt_id = %self.manifest.prompt_id, %tool_id, arg_count = args.len(), "render_tool: called");
        let index = self.index_of(tool_id)?;
        let tool = &self.manifest.tools[index];
        let lookup = match_args(&self.names[index], args)
            .map_err(|e| mismatch(&self.manifest, ItemKind::Tool, tool_id, e))?;

        let mut schema = tool.schema().clone();
        for leaf in tool.leaves() {
            if let Some(slot) = schema.pointer_mut(&leaf.pointer) {
                *slot = Value::String(leaf.text.render(|name| lookup.get(name).copied()));
            }
        }
        Ok(schema)
    }

    pub fn required(&self, tool_id: &str) -> Result<Vec<&str>, PromptError> {
        let index = self.index_of(tool_id)?;
        Ok(self.names[index].mapped_names().collect())
    }

    pub fn tool_ids(&self) -> impl Iterator<Item = &str> {
        self.manifest.tools.iter().map(|t| t.id())
    }

    fn index_of(&self, tool_id: &str) -> Result<usize, PromptError> {
        self.manifest
            .tools
            .iter()
            .position(|t| t.id() == tool_id)
            .ok_or_else(|| PromptError::UnknownTool {
                prompt_id: self.manifest.prompt_id.to_string(),
                version: self.manifest.version_label(),
                tool_id: tool_id.to_string(),
            })
    }
}
