//! Execution contexts
//!
//! A context is an immutable view of one snapshot: params, renderers and an
//! optional tracking id. Contexts are cheap to clone and never observe a later
//! refresh.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::PromptError;
use crate::manifest::{PromptId, PromptManifest};
use crate::renderer::{TemplateRenderer, ToolRenderer};

/// A manifest bound to its renderers
#[derive(Debug)]
pub struct PromptSnapshot {
    manifest: Arc<PromptManifest>,
    templates: TemplateRenderer,
    tools: ToolRenderer,
    stamp: u64,
    fetched_at: DateTime<Utc>,
}

impl PromptSnapshot {
    /// Bind renderers; fails when a name map cannot be built
    pub fn bind(manifest: PromptManifest, stamp: u64) -> Result<Self, PromptError> {
        debug!(prompt_id = %manifest.prompt_id, version = %manifest.version_label(), %stamp, "PromptSnapshot::bind: called");
        let manifest = Arc::new(manifest);
        let templates = TemplateRenderer::bind(manifest.clone())?;
        let tools = ToolRenderer::bind(manifest.clone())?;
        Ok(Self {
            manifest,
            templates,
            tools,
            stamp,
            fetched_at: Utc::now(),
        })
    }

    pub fn manifest(&self) -> &PromptManifest {
        &self.manifest
    }

    pub fn stamp(&self) -> u64 {
        self.stamp
    }

    pub fn fetched_at(&self) -> DateTime<Utc> {
        self.fetched_at
    }
}

/// Serializable record of what a render pass used
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingInfo {
    pub id: String,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revision_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tracking_id: Option<String>,
}

/// Immutable render context over one snapshot
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    snapshot: Arc<PromptSnapshot>,
    tracking_id: Option<String>,
}

impl ExecutionContext {
    pub fn new(snapshot: Arc<PromptSnapshot>) -> Self {
        Self {
            snapshot,
            tracking_id: None,
        }
    }

    pub fn with_tracking_id(mut self, tracking_id: impl Into<String>) -> Self {
        self.tracking_id = Some(tracking_id.into());
        self
    }

    /// Attach a fresh time-ordered tracking id
    pub fn with_new_tracking_id(self) -> Self {
        self.with_tracking_id(uuid::Uuid::now_v7().to_string())
    }

    pub fn tracking_id(&self) -> Option<&str> {
        self.tracking_id.as_deref()
    }

    pub fn prompt_id(&self) -> &PromptId {
        &self.snapshot.manifest.prompt_id
    }

    /// Version label of the snapshot, e.g. `1.3` or `undeployed`
    pub fn version(&self) -> String {
        self.snapshot.manifest.version_label()
    }

    pub fn revision_id(&self) -> Option<&str> {
        self.snapshot.manifest.revision_id.as_deref()
    }

    /// Version stamp of the snapshot within its manager
    pub fn stamp(&self) -> u64 {
        self.snapshot.stamp
    }

    pub fn fetched_at(&self) -> DateTime<Utc> {
        self.snapshot.fetched_at
    }

    pub fn manifest(&self) -> &PromptManifest {
        &self.snapshot.manifest
    }

    pub fn params(&self) -> &Map<String, Value> {
        &self.snapshot.manifest.params
    }

    pub fn param(&self, key: &str) -> Option<&Value> {
        self.snapshot.manifest.params.get(key)
    }

    /// Deserialize params into a typed model
    pub fn typed_params<P: DeserializeOwned>(&self) -> Result<P, PromptError> {
        serde_json::from_value(Value::Object(self.params().clone())).map_err(|source| PromptError::InvalidParams {
            prompt_id: self.prompt_id().to_string(),
            version: self.version(),
            source,
        })
    }

    pub fn templates(&self) -> &TemplateRenderer {
        &self.snapshot.templates
    }

    pub fn tools(&self) -> &ToolRenderer {
        &self.snapshot.tools
    }

    pub fn render_template(&self, template_id: &str, args: &[(&str, &str)]) -> Result<String, PromptError> {
        self.snapshot.templates.render(template_id, args)
    }

    pub fn render_tool(&self, tool_id: &str, args: &[(&str, &str)]) -> Result<Value, PromptError> {
        self.snapshot.tools.render(tool_id, args)
    }

    /// Whether two contexts were built from the same snapshot
    pub fn same_snapshot(&self, other: &ExecutionContext) -> bool {
        Arc::ptr_eq(&self.snapshot, &other.snapshot)
    }

    pub fn track(&self) -> TrackingInfo {
        TrackingInfo {
            id: self.prompt_id().to_string(),
            version: self.version(),
            revision_id: self.revision_id().map(str::to_string),
            tracking_id: self.tracking_id.clone(),
        }
    }
}

/// Typed layer over an `ExecutionContext`
///
/// `P` is the params model, `T` and `U` the template and tool renderer types.
/// Generated code names a concrete alias of this type per prompt version.
#[derive(Debug, Clone)]
pub struct TypedExecutionContext<P, T, U> {
    inner: ExecutionContext,
    params: P,
    templates: T,
    tools: U,
}

impl<P, T, U> TypedExecutionContext<P, T, U>
where
    P: DeserializeOwned,
    T: From<ExecutionContext>,
    U: From<ExecutionContext>,
{
    pub fn new(inner: ExecutionContext) -> Result<Self, PromptError> {
        let params = inner.typed_params::<P>()?;
        Ok(Self {
            templates: T::from(inner.clone()),
            tools: U::from(inner.clone()),
            params,
            inner,
        })
    }
}

impl<P, T, U> TypedExecutionContext<P, T, U> {
    pub fn params(&self) -> &P {
        &self.params
    }

    pub fn render_template(&self) -> &T {
        &self.templates
    }

    pub fn render_tool(&self) -> &U {
        &self.tools
    }

    pub fn tracking_id(&self) -> Option<&str> {
        self.inner.tracking_id()
    }

    pub fn track(&self) -> TrackingInfo {
        self.inner.track()
    }

    /// The untyped context underneath
    pub fn raw(&self) -> &ExecutionContext {
        &self.inner
    }
}
