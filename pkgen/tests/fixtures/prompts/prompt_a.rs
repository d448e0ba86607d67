// @generated by pkgen. DO NOT EDIT.
//! Typed accessors for prompt `prompt-a`

// Version 1

/// Params of `prompt-a` major version 1
#[derive(Debug, Clone, PartialEq, promptkit::serde::Serialize, promptkit::serde::Deserialize)]
#[serde(crate = "promptkit::serde")]
pub struct PromptAV1Params {
    #[serde(rename = "model")]
    pub model: String,
    #[serde(rename = "maxTokens")]
    pub max_tokens: f64,
}

/// Templates of `prompt-a` major version 1
#[derive(Debug, Clone)]
pub struct PromptAV1Templates {
    ctx: promptkit::ExecutionContext,
}

impl From<promptkit::ExecutionContext> for PromptAV1Templates {
    fn from(ctx: promptkit::ExecutionContext) -> Self {
        Self { ctx }
    }
}

impl PromptAV1Templates {
    /// Render template `greeting`
    pub fn greeting(&self, args: PromptAV1GreetingTemplateArgs<'_>) -> Result<String, promptkit::PromptError> {
        self.ctx.render_template("greeting", &[("name", args.name), ("weather", args.weather)])
    }
}

/// Arguments of template `greeting`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromptAV1GreetingTemplateArgs<'a> {
    pub name: &'a str,
    pub weather: &'a str,
}

/// Tools of `prompt-a` major version 1
#[derive(Debug, Clone)]
pub struct PromptAV1Tools {
    ctx: promptkit::ExecutionContext,
}

impl From<promptkit::ExecutionContext> for PromptAV1Tools {
    fn from(ctx: promptkit::ExecutionContext) -> Self {
        Self { ctx }
    }
}

impl PromptAV1Tools {
    /// Render tool `lookup`
    pub fn lookup(&self, args: PromptAV1LookupToolArgs<'_>) -> Result<promptkit::serde_json::Value, promptkit::PromptError> {
        self.ctx.render_tool("lookup", &[("kind", args.kind)])
    }
}

/// Arguments of tool `lookup`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromptAV1LookupToolArgs<'a> {
    pub kind: &'a str,
}

/// Execution context of `prompt-a` major version 1
pub type PromptAV1ExecutionContext = promptkit::TypedExecutionContext<PromptAV1Params, PromptAV1Templates, PromptAV1Tools>;

/// Manager of `prompt-a` major version 1
#[derive(Debug)]
pub struct PromptAV1Manager {
    inner: promptkit::PromptManager,
}

impl PromptAV1Manager {
    pub const PROMPT_ID: &'static str = "prompt-a";
    pub const MAJOR_VERSION: &'static str = "1";

    /// Serve the latest minor version, refreshed in the background
    pub async fn start(registry: std::sync::Arc<dyn promptkit::RegistryClient>, options: promptkit::ManagerOptions) -> Result<Self, promptkit::PromptError> {
        Self::start_with_minor(registry, promptkit::MinorVersion::Latest, options).await
    }

    /// Serve a specific, latest or weighted minor version
    pub async fn start_with_minor(registry: std::sync::Arc<dyn promptkit::RegistryClient>, minor: promptkit::MinorVersion, options: promptkit::ManagerOptions) -> Result<Self, promptkit::PromptError> {
        let spec = promptkit::VersionSpec::new(promptkit::MajorVersion::Deployed(1), minor)?;
        let inner = promptkit::PromptManager::start(Self::PROMPT_ID, spec, registry, options).await?;
        Ok(Self { inner })
    }

    pub fn exec(&self) -> Result<PromptAV1ExecutionContext, promptkit::PromptError> {
        promptkit::TypedExecutionContext::new(self.inner.get())
    }

    pub fn exec_tracked(&self, tracking_id: impl Into<String>) -> Result<PromptAV1ExecutionContext, promptkit::PromptError> {
        promptkit::TypedExecutionContext::new(self.inner.get_tracked(tracking_id))
    }

    pub fn manager(&self) -> &promptkit::PromptManager {
        &self.inner
    }

    pub async fn stop(&self) {
        self.inner.stop().await
    }
}

/// A manager of `prompt-a` at one major version
#[derive(Debug)]
pub enum PromptAManager {
    V1(PromptAV1Manager),
}

impl PromptAManager {
    pub fn manager(&self) -> &promptkit::PromptManager {
        match self {
            Self::V1(m) => m.manager(),
        }
    }

    pub async fn stop(&self) {
        self.manager().stop().await
    }
}

/// Start a manager of `prompt-a` by major version
///
/// `None` selects major version 1, the latest deployed one.
pub async fn start_manager(major: Option<&str>, registry: std::sync::Arc<dyn promptkit::RegistryClient>, options: promptkit::ManagerOptions) -> Result<PromptAManager, promptkit::PromptError> {
    match major {
        None | Some("1") => Ok(PromptAManager::V1(PromptAV1Manager::start(registry, options).await?)),
        other => Err(promptkit::PromptError::InvalidVersionSpec {
            spec: other.unwrap_or_default().to_string(),
            reason: "prompt 'prompt-a' has major versions: 1".to_string(),
        }),
    }
}
