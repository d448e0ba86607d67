//! Items generated for one prompt version

use std::collections::BTreeMap;
use std::sync::Arc;

use promptkit::{ItemKind, MajorVersion, PromptError, PromptManifest, TemplateRenderer, ToolRenderer};
use tracing::debug;

use super::writer::SourceWriter;
use crate::naming::{doc_text, field_ident, item_names, literal, rust_type, to_title_case, version_tag};

/// Type names of one prompt version
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionNames {
    pub tag: String,
    pub params: String,
    pub templates: String,
    pub tools: String,
    pub context: String,
    pub manager: String,
}

impl VersionNames {
    pub fn new(title: &str, major: &MajorVersion) -> Self {
        let tag = version_tag(major);
        let prefix = format!("{}{}", title, tag);
        Self {
            params: format!("{}Params", prefix),
            templates: format!("{}Templates", prefix),
            tools: format!("{}Tools", prefix),
            context: format!("{}ExecutionContext", prefix),
            manager: format!("{}Manager", prefix),
            tag,
        }
    }

    fn prefix(&self) -> &str {
        self.manager.trim_end_matches("Manager")
    }
}

/// A renderer method: template or tool id, method ident, args struct and arguments
struct Method {
    item_id: String,
    ident: String,
    args_type: String,
    /// (mapped name, field ident)
    args: Vec<(String, String)>,
}

/// Generate every item of one prompt version
///
/// Fails without output when any name of the manifest cannot be mapped.
pub fn version_source(manifest: &PromptManifest, title: &str) -> Result<String, PromptError> {
    debug!(prompt_id = %manifest.prompt_id, version = %manifest.version_label(), "version_source: called");
    let names = VersionNames::new(title, &manifest.major);
    let manifest_arc = Arc::new(manifest.clone());
    let template_renderer = TemplateRenderer::bind(manifest_arc.clone())?;
    let tool_renderer = ToolRenderer::bind(manifest_arc)?;

    let template_ids: Vec<&str> = manifest.templates.iter().map(|t| t.id()).collect();
    let templates = methods(manifest, ItemKind::Template, &names, &template_ids, "TemplateArgs", |id| {
        template_renderer.required(id)
    })?;
    let tool_ids: Vec<&str> = manifest.tools.iter().map(|t| t.id()).collect();
    let tools = methods(manifest, ItemKind::Tool, &names, &tool_ids, "ToolArgs", |id| {
        tool_renderer.required(id)
    })?;
    check_type_names(manifest, &templates, &tools)?;

    let mut w = SourceWriter::new();
    write_params(&mut w, manifest, &names)?;
    w.blank();
    write_renderer(&mut w, manifest, &names.templates, "Templates", &templates, RenderKind::Template);
    w.blank();
    write_renderer(&mut w, manifest, &names.tools, "Tools", &tools, RenderKind::Tool);
    w.blank();
    write_context(&mut w, manifest, &names);
    w.blank();
    write_manager(&mut w, manifest, &names);
    Ok(w.finish())
}

fn methods<'a>(
    manifest: &PromptManifest,
    kind: ItemKind,
    names: &VersionNames,
    ids: &[&str],
    args_suffix: &str,
    required: impl Fn(&str) -> Result<Vec<&'a str>, PromptError>,
) -> Result<Vec<Method>, PromptError> {
    let map = item_names(manifest, kind, ids)?;
    map.iter()
        .map(|(item_id, mapped)| {
            let args = required(item_id)?
                .into_iter()
                .map(|name| (name.to_string(), field_ident(name)))
                .collect();
            Ok(Method {
                item_id: item_id.to_string(),
                ident: field_ident(mapped),
                args_type: format!("{}{}{}", names.prefix(), to_title_case(mapped), args_suffix),
                args,
            })
        })
        .collect()
}

/// Distinct method names can still produce equal TitleCase type names
fn check_type_names(manifest: &PromptManifest, templates: &[Method], tools: &[Method]) -> Result<(), PromptError> {
    let mut seen: BTreeMap<&str, &str> = BTreeMap::new();
    let with_args = templates
        .iter()
        .map(|m| (ItemKind::Template, m))
        .chain(tools.iter().map(|m| (ItemKind::Tool, m)))
        .filter(|(_, m)| !m.args.is_empty());
    for (kind, method) in with_args {
        if let Some(first) = seen.insert(&method.args_type, &method.item_id) {
            return Err(PromptError::NameMappingCollision {
                prompt_id: manifest.prompt_id.to_string(),
                version: manifest.version_label(),
                kind,
                item_id: method.item_id.clone(),
                first: first.to_string(),
                second: method.item_id.clone(),
                mapped: method.args_type.clone(),
            });
        }
    }
    Ok(())
}

fn describe(manifest: &PromptManifest) -> String {
    let id = doc_text(manifest.prompt_id.as_str());
    match manifest.major.number() {
        Some(n) => format!("`{}` major version {}", id, n),
        None => format!("`{}` undeployed version", id),
    }
}

fn write_params(w: &mut SourceWriter, manifest: &PromptManifest, names: &VersionNames) -> Result<(), PromptError> {
    let fields: Vec<(&str, String)> = manifest
        .params
        .iter()
        .filter_map(|(key, value)| rust_type(value).map(|ty| (key.as_str(), ty)))
        .collect();
    let keys: Vec<&str> = fields.iter().map(|(key, _)| *key).collect();
    let map = item_names(manifest, ItemKind::Params, &keys)?;

    w.doc(format!("Params of {}", describe(manifest)));
    w.line("#[derive(Debug, Clone, PartialEq, promptkit::serde::Serialize, promptkit::serde::Deserialize)]");
    w.line("#[serde(crate = \"promptkit::serde\")]");
    if fields.is_empty() {
        w.line(format!("pub struct {} {{}}", names.params));
        return Ok(());
    }
    w.open(format!("pub struct {}", names.params));
    for (key, ty) in &fields {
        let mapped = map.mapped_for(key).unwrap_or(*key);
        w.line(format!("#[serde(rename = {})]", literal(key)));
        w.line(format!("pub {}: {},", field_ident(mapped), ty));
    }
    w.close("");
    Ok(())
}

#[derive(Clone, Copy)]
enum RenderKind {
    Template,
    Tool,
}

fn write_renderer(
    w: &mut SourceWriter,
    manifest: &PromptManifest,
    type_name: &str,
    what: &str,
    methods: &[Method],
    kind: RenderKind,
) {
    w.doc(format!("{} of {}", what, describe(manifest)));
    w.line("#[derive(Debug, Clone)]");
    w.open(format!("pub struct {}", type_name));
    w.line("ctx: promptkit::ExecutionContext,");
    w.close("");
    w.blank();
    w.open(format!("impl From<promptkit::ExecutionContext> for {}", type_name));
    w.open("fn from(ctx: promptkit::ExecutionContext) -> Self");
    w.line("Self { ctx }");
    w.close("");
    w.close("");

    if methods.is_empty() {
        return;
    }

    let (noun, call, output) = match kind {
        RenderKind::Template => ("template", "render_template", "String"),
        RenderKind::Tool => ("tool", "render_tool", "promptkit::serde_json::Value"),
    };

    w.blank();
    w.open(format!("impl {}", type_name));
    for (i, method) in methods.iter().enumerate() {
        if i > 0 {
            w.blank();
        }
        w.doc(format!("Render {} `{}`", noun, doc_text(&method.item_id)));
        if method.args.is_empty() {
            w.open(format!(
                "pub fn {}(&self) -> Result<{}, promptkit::PromptError>",
                method.ident, output
            ));
            w.line(format!("self.ctx.{}({}, &[])", call, literal(&method.item_id)));
        } else {
            w.open(format!(
                "pub fn {}(&self, args: {}<'_>) -> Result<{}, promptkit::PromptError>",
                method.ident, method.args_type, output
            ));
            let pairs: Vec<String> = method
                .args
                .iter()
                .map(|(mapped, ident)| format!("({}, args.{})", literal(mapped), ident))
                .collect();
            w.line(format!(
                "self.ctx.{}({}, &[{}])",
                call,
                literal(&method.item_id),
                pairs.join(", ")
            ));
        }
        w.close("");
    }
    w.close("");

    for method in methods.iter().filter(|m| !m.args.is_empty()) {
        w.blank();
        w.doc(format!("Arguments of {} `{}`", noun, doc_text(&method.item_id)));
        w.line("#[derive(Debug, Clone, Copy, PartialEq, Eq)]");
        w.open(format!("pub struct {}<'a>", method.args_type));
        for (_, ident) in &method.args {
            w.line(format!("pub {}: &'a str,", ident));
        }
        w.close("");
    }
}

fn write_context(w: &mut SourceWriter, manifest: &PromptManifest, names: &VersionNames) {
    w.doc(format!("Execution context of {}", describe(manifest)));
    w.line(format!(
        "pub type {} = promptkit::TypedExecutionContext<{}, {}, {}>;",
        names.context, names.params, names.templates, names.tools
    ));
}

const START_SIGNATURE: &str = "pub async fn start(registry: std::sync::Arc<dyn promptkit::RegistryClient>, options: promptkit::ManagerOptions) -> Result<Self, promptkit::PromptError>";

const START_WITH_MINOR_SIGNATURE: &str = "pub async fn start_with_minor(registry: std::sync::Arc<dyn promptkit::RegistryClient>, minor: promptkit::MinorVersion, options: promptkit::ManagerOptions) -> Result<Self, promptkit::PromptError>";

fn write_manager(w: &mut SourceWriter, manifest: &PromptManifest, names: &VersionNames) {
    let prompt_id = literal(manifest.prompt_id.as_str());
    w.doc(format!("Manager of {}", describe(manifest)));
    w.line("#[derive(Debug)]");
    w.open(format!("pub struct {}", names.manager));
    w.line("inner: promptkit::PromptManager,");
    w.close("");
    w.blank();
    w.open(format!("impl {}", names.manager));
    w.line(format!("pub const PROMPT_ID: &'static str = {};", prompt_id));

    match manifest.major.number() {
        Some(major) => {
            w.line(format!(
                "pub const MAJOR_VERSION: &'static str = {};",
                literal(&major.to_string())
            ));
            w.blank();
            w.doc("Serve the latest minor version, refreshed in the background");
            w.open(START_SIGNATURE);
            w.line("Self::start_with_minor(registry, promptkit::MinorVersion::Latest, options).await");
            w.close("");
            w.blank();
            w.doc("Serve a specific, latest or weighted minor version");
            w.open(START_WITH_MINOR_SIGNATURE);
            w.line(format!(
                "let spec = promptkit::VersionSpec::new(promptkit::MajorVersion::Deployed({}), minor)?;",
                major
            ));
        }
        None => {
            w.line(format!(
                "pub const MAJOR_VERSION: &'static str = {};",
                literal(promptkit::version::UNDEPLOYED)
            ));
            w.blank();
            w.doc("Serve the undeployed version, refreshed in the background");
            w.open(START_SIGNATURE);
            w.line("let spec = promptkit::VersionSpec::undeployed();");
        }
    }
    w.line("let inner = promptkit::PromptManager::start(Self::PROMPT_ID, spec, registry, options).await?;");
    w.line("Ok(Self { inner })");
    w.close("");
    w.blank();
    w.open(format!(
        "pub fn exec(&self) -> Result<{}, promptkit::PromptError>",
        names.context
    ));
    w.line("promptkit::TypedExecutionContext::new(self.inner.get())");
    w.close("");
    w.blank();
    w.open(format!(
        "pub fn exec_tracked(&self, tracking_id: impl Into<String>) -> Result<{}, promptkit::PromptError>",
        names.context
    ));
    w.line("promptkit::TypedExecutionContext::new(self.inner.get_tracked(tracking_id))");
    w.close("");
    w.blank();
    w.open("pub fn manager(&self) -> &promptkit::PromptManager");
    w.line("&self.inner");
    w.close("");
    w.blank();
    w.open("pub async fn stop(&self)");
    w.line("self.inner.stop().await");
    w.close("");
    w.close("");
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn prompt_a() -> PromptManifest {
        PromptManifest::new("prompt-a", MajorVersion::Deployed(1))
            .with_param("model", json!("gpt-4o"))
            .with_param("maxTokens", json!(256))
            .with_param("stop", json!(null))
            .with_template("template-a", "Hello {{ name }}, it is {{ weather }}.")
            .with_template("intro", "No placeholders here.")
            .with_tool("lookup", json!({"name": "lookup", "description": "Find {{ type }}"}))
    }

    #[test]
    fn test_version_names() {
        let names = VersionNames::new("PromptA", &MajorVersion::Deployed(1));
        assert_eq!(names.params, "PromptAV1Params");
        assert_eq!(names.context, "PromptAV1ExecutionContext");
        assert_eq!(names.prefix(), "PromptAV1");
        let names = VersionNames::new("PromptA", &MajorVersion::Undeployed);
        assert_eq!(names.manager, "PromptAUndeployedManager");
    }

    #[test]
    fn test_params_struct() {
        let source = version_source(&prompt_a(), "PromptA").unwrap();
        assert!(source.contains("pub struct PromptAV1Params {\n"));
        assert!(source.contains("    #[serde(rename = \"maxTokens\")]\n    pub max_tokens: f64,\n"));
        assert!(source.contains("    #[serde(rename = \"model\")]\n    pub model: String,\n"));
        assert!(!source.contains("pub stop"));
    }

    #[test]
    fn test_template_methods() {
        let source = version_source(&prompt_a(), "PromptA").unwrap();
        assert!(source.contains(
            "pub fn template_a(&self, args: PromptAV1TemplateATemplateArgs<'_>) -> Result<String, promptkit::PromptError> {"
        ));
        assert!(source.contains(
            "self.ctx.render_template(\"template-a\", &[(\"name\", args.name), (\"weather\", args.weather)])"
        ));
        assert!(source.contains("pub fn intro(&self) -> Result<String, promptkit::PromptError> {"));
        assert!(!source.contains("IntroTemplateArgs"));
    }

    #[test]
    fn test_tool_keyword_argument() {
        let source = version_source(&prompt_a(), "PromptA").unwrap();
        assert!(source.contains("pub struct PromptAV1LookupToolArgs<'a> {\n    pub r#type: &'a str,\n}"));
        assert!(source.contains("self.ctx.render_tool(\"lookup\", &[(\"type\", args.r#type)])"));
    }

    #[test]
    fn test_empty_params_struct() {
        let manifest = PromptManifest::new("bare", MajorVersion::Undeployed);
        let source = version_source(&manifest, "Bare").unwrap();
        assert!(source.contains("pub struct BareUndeployedParams {}"));
        assert!(source.contains("pub const MAJOR_VERSION: &'static str = \"undeployed\";"));
        assert!(source.contains("let spec = promptkit::VersionSpec::undeployed();"));
        assert!(!source.contains("start_with_minor"));
    }

    #[test]
    fn test_param_collision() {
        let manifest = PromptManifest::new("prompt-a", MajorVersion::Deployed(1))
            .with_param("max-tokens", json!(1))
            .with_param("maxTokens", json!(2));
        let err = version_source(&manifest, "PromptA").unwrap_err();
        assert!(matches!(
            err,
            PromptError::NameMappingCollision {
                kind: ItemKind::Params,
                ..
            }
        ));
    }

    #[test]
    fn test_placeholder_collision() {
        let manifest = PromptManifest::new("prompt-a", MajorVersion::Deployed(1))
            .with_template("t", "{{ first-name }} {{ first_name }}");
        let err = version_source(&manifest, "PromptA").unwrap_err();
        assert!(matches!(
            err,
            PromptError::NameMappingCollision {
                kind: ItemKind::Template,
                ..
            }
        ));
    }

    #[test]
    fn test_args_type_collision() {
        let manifest = PromptManifest::new("prompt-a", MajorVersion::Deployed(1))
            .with_template("a_1b", "{{ x }}")
            .with_template("a1b", "{{ y }}");
        let err = version_source(&manifest, "PromptA").unwrap_err();
        match err {
            PromptError::NameMappingCollision { first, second, .. } => {
                assert_eq!(first, "a_1b");
                assert_eq!(second, "a1b");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
