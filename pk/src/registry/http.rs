//! HTTP registry client
//!
//! Fetches prompts from `{base}/prompts/{id}/major/{major}/minor/{minor}` and
//! the generation listing from `{base}/prompts/types`. Failures are classified
//! and returned as-is; there are no retries here.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::wire::{WirePrompt, WirePromptType};
use super::{GenerationScope, RegistryClient, RegistryError};
use crate::config::RegistryConfig;
use crate::manifest::{PromptId, PromptManifest};
use crate::version::FetchKey;

/// Registry client over HTTP with bearer authentication
pub struct HttpRegistryClient {
    base_url: Url,
    api_key: String,
    http: Client,
    timeout: Duration,
}

impl HttpRegistryClient {
    pub fn new(base_url: &str, api_key: impl Into<String>, timeout: Duration) -> Result<Self, RegistryError> {
        debug!(%base_url, ?timeout, "HttpRegistryClient::new: called");
        let base_url = Url::parse(base_url)
            .map_err(|e| RegistryError::Config(format!("invalid base url '{}': {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(RegistryError::Config(format!(
                "base url '{}' cannot carry a path",
                base_url
            )));
        }
        let http = Client::builder().timeout(timeout).build().map_err(RegistryError::Network)?;
        Ok(Self {
            base_url,
            api_key: api_key.into(),
            http,
            timeout,
        })
    }

    /// Create a client from configuration
    ///
    /// Reads the API key from the environment variable named in config.
    pub fn from_config(config: &RegistryConfig) -> Result<Self, RegistryError> {
        debug!(?config, "from_config: called");
        let api_key = config
            .get_api_key()
            .map_err(|e| RegistryError::Config(e.to_string()))?;
        Self::new(&config.base_url, api_key, config.timeout())
    }

    /// Build a URL from the base plus encoded path segments
    pub fn url_for(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    pub fn prompt_url(&self, prompt_id: &PromptId, key: &FetchKey) -> Url {
        let major = key.major_segment();
        let minor = key.minor_segment();
        self.url_for(&["prompts", prompt_id.as_str(), "major", &major, "minor", &minor])
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, RegistryError> {
        debug!(%url, "get_json: called");
        let response = self
            .http
            .get(url.clone())
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| self.classify_transport(e))?;

        let status = response.status();
        if status.is_success() {
            let body = response.text().await.map_err(|e| self.classify_transport(e))?;
            return serde_json::from_str(&body).map_err(RegistryError::Json);
        }

        let message = response.text().await.unwrap_or_default();
        debug!(%url, %status, "get_json: request failed");
        Err(classify_status(status, url.as_str(), message))
    }

    fn classify_transport(&self, err: reqwest::Error) -> RegistryError {
        if err.is_timeout() {
            warn!(timeout = ?self.timeout, "registry request timed out");
            RegistryError::Timeout(self.timeout)
        } else {
            RegistryError::Network(err)
        }
    }
}

fn classify_status(status: StatusCode, url: &str, message: String) -> RegistryError {
    match status {
        StatusCode::NOT_FOUND => RegistryError::NotFound { url: url.to_string() },
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => RegistryError::Unauthorized {
            status: status.as_u16(),
        },
        _ => RegistryError::ApiError {
            status: status.as_u16(),
            message,
        },
    }
}

#[async_trait]
impl RegistryClient for HttpRegistryClient {
    async fn fetch_manifest(&self, prompt_id: &PromptId, key: &FetchKey) -> Result<PromptManifest, RegistryError> {
        debug!(%prompt_id, %key, "fetch_manifest: called");
        let wire: WirePrompt = self.get_json(self.prompt_url(prompt_id, key)).await?;
        if wire.id != prompt_id.as_str() {
            return Err(RegistryError::InvalidResponse(format!(
                "requested prompt '{}', registry returned '{}'",
                prompt_id, wire.id
            )));
        }
        wire.into_manifest(key)
    }

    async fn fetch_manifests_for_generation(
        &self,
        scope: &GenerationScope,
    ) -> Result<Vec<PromptManifest>, RegistryError> {
        debug!(?scope, "fetch_manifests_for_generation: called");
        let types: Vec<WirePromptType> = self.get_json(self.url_for(&["prompts", "types"])).await?;

        if let GenerationScope::Prompts(ids) = scope {
            for id in ids {
                if !types.iter().any(|t| t.id == id.as_str()) {
                    return Err(RegistryError::NotFound {
                        url: self.url_for(&["prompts", id.as_str()]).to_string(),
                    });
                }
            }
        }

        let mut manifests = Vec::new();
        for prompt_type in types.into_iter().filter(|t| scope.includes(&t.id)) {
            if prompt_type.is_undeployed() {
                debug!(prompt_id = %prompt_type.id, "fetch_manifests_for_generation: undeployed only");
                let id = PromptId::new(prompt_type.id);
                manifests.push(self.fetch_manifest(&id, &FetchKey::Undeployed).await?);
            } else {
                manifests.extend(prompt_type.into_manifests()?);
            }
        }
        debug!(count = manifests.len(), "fetch_manifests_for_generation: done");
        Ok(manifests)
    }
}
