//! Prompt manifests
//!
//! A manifest is one resolved server payload: params, templates and tools of
//! a single (prompt id, major, minor). Placeholder sets and compiled segments
//! are computed here, once, when the manifest is built.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::placeholder::{CompiledText, contains_marker};
use crate::version::MajorVersion;

/// Opaque identifier of a prompt family
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PromptId(String);

impl PromptId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PromptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PromptId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for PromptId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl AsRef<str> for PromptId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Which part of a manifest an error or name map refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemKind {
    Prompt,
    Params,
    Template,
    Tool,
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ItemKind::Prompt => "prompt",
            ItemKind::Params => "params",
            ItemKind::Template => "template",
            ItemKind::Tool => "tool",
        };
        f.write_str(s)
    }
}

/// A template body with its placeholders
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    id: String,
    body: String,
    compiled: CompiledText,
    placeholders: Vec<String>,
}

impl Template {
    pub fn new(id: impl Into<String>, body: impl Into<String>) -> Self {
        let body = body.into();
        let compiled = CompiledText::parse(&body);
        let placeholders = compiled.placeholder_names();
        Self {
            id: id.into(),
            body,
            compiled,
            placeholders,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    /// Source-side placeholder names in first-occurrence order
    pub fn placeholders(&self) -> &[String] {
        &self.placeholders
    }

    pub(crate) fn compiled(&self) -> &CompiledText {
        &self.compiled
    }
}

/// A leaf string of a tool schema that contains markers
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ToolLeaf {
    pub(crate) pointer: String,
    pub(crate) text: CompiledText,
}

/// A tool schema with its placeholders
#[derive(Debug, Clone, PartialEq)]
pub struct Tool {
    id: String,
    schema: Value,
    leaves: Vec<ToolLeaf>,
    placeholders: Vec<String>,
}

impl Tool {
    /// Build a tool whose placeholders are discovered from its leaf strings
    pub fn new(id: impl Into<String>, schema: Value) -> Self {
        let leaves = collect_leaves(&schema);
        let mut placeholders: Vec<String> = Vec::new();
        for leaf in &leaves {
            for name in leaf.text.placeholder_names() {
                if !placeholders.contains(&name) {
                    placeholders.push(name);
                }
            }
        }
        Self {
            id: id.into(),
            schema,
            leaves,
            placeholders,
        }
    }

    /// Build a tool with an explicitly declared placeholder list
    ///
    /// Markers in the schema that are not declared are left untouched when
    /// rendering.
    pub fn with_declared(id: impl Into<String>, schema: Value, declared: Vec<String>) -> Self {
        let leaves = collect_leaves(&schema);
        let mut placeholders: Vec<String> = Vec::new();
        for name in declared {
            if !placeholders.contains(&name) {
                placeholders.push(name);
            }
        }
        Self {
            id: id.into(),
            schema,
            leaves,
            placeholders,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn schema(&self) -> &Value {
        &self.schema
    }

    pub fn placeholders(&self) -> &[String] {
        &self.placeholders
    }

    pub(crate) fn leaves(&self) -> &[ToolLeaf] {
        &self.leaves
    }
}

fn collect_leaves(schema: &Value) -> Vec<ToolLeaf> {
    let mut leaves = Vec::new();
    walk(schema, String::new(), &mut leaves);
    leaves
}

fn walk(value: &Value, pointer: String, leaves: &mut Vec<ToolLeaf>) {
    match value {
        Value::String(s) if contains_marker(s) => leaves.push(ToolLeaf {
            pointer,
            text: CompiledText::parse(s),
        }),
        Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                walk(item, format!("{}/{}", pointer, i), leaves);
            }
        }
        Value::Object(map) => {
            for (key, item) in map {
                let escaped = key.replace('~', "~0").replace('/', "~1");
                walk(item, format!("{}/{}", pointer, escaped), leaves);
            }
        }
        _ => {}
    }
}

/// The resolved definition of one prompt version
#[derive(Debug, Clone, PartialEq)]
pub struct PromptManifest {
    pub prompt_id: PromptId,
    /// `Deployed` or `Undeployed`; never `Pinned`
    pub major: MajorVersion,
    pub minor: Option<u32>,
    pub revision_id: Option<String>,
    pub params: Map<String, Value>,
    pub templates: Vec<Template>,
    pub tools: Vec<Tool>,
}

impl PromptManifest {
    pub fn new(prompt_id: impl Into<PromptId>, major: MajorVersion) -> Self {
        Self {
            prompt_id: prompt_id.into(),
            major,
            minor: None,
            revision_id: None,
            params: Map::new(),
            templates: Vec::new(),
            tools: Vec::new(),
        }
    }

    pub fn with_minor(mut self, minor: u32) -> Self {
        self.minor = Some(minor);
        self
    }

    pub fn with_revision(mut self, revision_id: impl Into<String>) -> Self {
        self.revision_id = Some(revision_id.into());
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: Value) -> Self {
        self.params.insert(key.into(), value);
        self
    }

    pub fn with_template(mut self, id: impl Into<String>, body: impl Into<String>) -> Self {
        self.templates.push(Template::new(id, body));
        self
    }

    pub fn with_tool(mut self, id: impl Into<String>, schema: Value) -> Self {
        self.tools.push(Tool::new(id, schema));
        self
    }

    /// Human-readable version, e.g. `1.3`, `1` or `undeployed`
    pub fn version_label(&self) -> String {
        match (&self.major, self.minor) {
            (MajorVersion::Undeployed, _) => self.major.to_string(),
            (major, Some(minor)) => format!("{}.{}", major.number().unwrap_or_default(), minor),
            (major, None) => major.to_string(),
        }
    }

    pub fn template(&self, id: &str) -> Option<&Template> {
        self.templates.iter().find(|t| t.id == id)
    }

    pub fn tool(&self, id: &str) -> Option<&Tool> {
        self.tools.iter().find(|t| t.id == id)
    }
}
