//! Registry wire format
//!
//! JSON shapes served by the prompt registry, and their conversion into
//! `PromptManifest`s.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use super::RegistryError;
use crate::manifest::{PromptId, PromptManifest, Template, Tool};
use crate::version::{FetchKey, MajorVersion, UNDEPLOYED};

/// Params are nested one level on the wire: `{"params": {"params": {...}}}`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WireParams {
    #[serde(default)]
    pub params: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireTemplate {
    pub id: String,
    pub template: String,
}

/// Declared placeholders of one tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireToolParams {
    pub name: String,
    #[serde(default)]
    pub params: Vec<String>,
}

/// One resolved prompt version
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WirePrompt {
    pub id: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub revision_id: Option<String>,
    #[serde(default)]
    pub params: Option<WireParams>,
    #[serde(default)]
    pub templates: Vec<WireTemplate>,
    #[serde(default)]
    pub tools: Option<Vec<Value>>,
    #[serde(default)]
    pub tools_params: Option<Vec<WireToolParams>>,
}

impl WirePrompt {
    /// Convert into a manifest for the key it was fetched with
    pub fn into_manifest(self, key: &FetchKey) -> Result<PromptManifest, RegistryError> {
        debug!(id = %self.id, %key, version = ?self.version, "into_manifest: called");
        let (major, minor) = match key {
            FetchKey::Undeployed => (MajorVersion::Undeployed, None),
            FetchKey::Exact { major, minor } => {
                if let Some(reported) = self.reported_minor(*major)?
                    && reported != *minor
                {
                    return Err(RegistryError::InvalidResponse(format!(
                        "requested {}.{} of '{}', got minor {}",
                        major, minor, self.id, reported
                    )));
                }
                (MajorVersion::Deployed(*major), Some(*minor))
            }
            FetchKey::LatestMinor { major } => (MajorVersion::Deployed(*major), self.reported_minor(*major)?),
        };

        let declared = self.tools_params.unwrap_or_default();
        let tools = self
            .tools
            .unwrap_or_default()
            .into_iter()
            .map(|schema| {
                let name = tool_name(&schema)?;
                Ok(match declared.iter().find(|d| d.name == name) {
                    Some(d) => Tool::with_declared(name, schema, d.params.clone()),
                    None => Tool::new(name, schema),
                })
            })
            .collect::<Result<Vec<_>, RegistryError>>()?;

        Ok(PromptManifest {
            prompt_id: PromptId::new(self.id),
            major,
            minor,
            revision_id: self.revision_id,
            params: self.params.and_then(|p| p.params).unwrap_or_default(),
            templates: self
                .templates
                .into_iter()
                .map(|t| Template::new(t.id, t.template))
                .collect(),
            tools,
        })
    }

    /// Minor number from a `major.minor` version string
    fn reported_minor(&self, expected_major: u32) -> Result<Option<u32>, RegistryError> {
        let Some(version) = self.version.as_deref() else {
            return Ok(None);
        };
        if version == UNDEPLOYED {
            return Err(RegistryError::InvalidResponse(format!(
                "expected major version {} of '{}', got undeployed",
                expected_major, self.id
            )));
        }
        let Some((major, minor)) = version.split_once('.') else {
            return Ok(None);
        };
        let (Ok(major), Ok(minor)) = (major.parse::<u32>(), minor.parse::<u32>()) else {
            return Err(RegistryError::InvalidResponse(format!(
                "malformed version '{}' for '{}'",
                version, self.id
            )));
        };
        if major != expected_major {
            return Err(RegistryError::InvalidResponse(format!(
                "expected major version {} of '{}', got {}",
                expected_major, self.id, version
            )));
        }
        Ok(Some(minor))
    }
}

fn tool_name(schema: &Value) -> Result<String, RegistryError> {
    schema
        .get("name")
        .or_else(|| schema.get("function").and_then(|f| f.get("name")))
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| RegistryError::InvalidResponse("tool definition has no name".to_string()))
}

/// One deployed major version in the types listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireMajorVersion {
    pub major_version: String,
    #[serde(default)]
    pub minor_versions: Vec<String>,
    #[serde(default)]
    pub templates: Vec<WireTemplate>,
    #[serde(default)]
    pub params: Option<WireParams>,
    #[serde(default)]
    pub tools_params: Option<Vec<WireToolParams>>,
}

/// A prompt in the types listing; no majors means undeployed only
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WirePromptType {
    pub id: String,
    #[serde(default)]
    pub major_versions: Vec<WireMajorVersion>,
}

impl WirePromptType {
    pub fn is_undeployed(&self) -> bool {
        self.major_versions.is_empty()
    }

    /// One manifest per deployed major, ascending
    ///
    /// The listing carries tool placeholders but not tool schemas, so tools
    /// get a null schema.
    pub fn into_manifests(self) -> Result<Vec<PromptManifest>, RegistryError> {
        let id = self.id;
        let mut manifests = self
            .major_versions
            .into_iter()
            .map(|mv| {
                let major = mv.major_version.parse::<u32>().map_err(|_| {
                    RegistryError::InvalidResponse(format!(
                        "malformed major version '{}' for '{}'",
                        mv.major_version, id
                    ))
                })?;
                Ok(PromptManifest {
                    prompt_id: PromptId::new(id.clone()),
                    major: MajorVersion::Deployed(major),
                    minor: None,
                    revision_id: None,
                    params: mv.params.and_then(|p| p.params).unwrap_or_default(),
                    templates: mv
                        .templates
                        .into_iter()
                        .map(|t| Template::new(t.id, t.template))
                        .collect(),
                    tools: mv
                        .tools_params
                        .unwrap_or_default()
                        .into_iter()
                        .map(|t| Tool::with_declared(t.name, Value::Null, t.params))
                        .collect(),
                })
            })
            .collect::<Result<Vec<_>, RegistryError>>()?;
        manifests.sort_by_key(|m| m.major.number());
        Ok(manifests)
    }
}
