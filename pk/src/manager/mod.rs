//! Prompt managers
//!
//! A `PromptManager` owns the cached snapshot(s) of one prompt at one version
//! spec. `start()` returns only once the first fetch has succeeded; after that
//! `get()` is a synchronous, infallible read. Latest and undeployed specs are
//! kept warm by a single background refresher task.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::context::ExecutionContext;
use crate::error::PromptError;
use crate::manifest::{PromptId, PromptManifest};
use crate::registry::{RegistryClient, RegistryError};
use crate::version::{FetchKey, MajorVersion, VersionSpec};

mod options;
mod refresher;
mod state;

pub use options::{DEFAULT_FETCH_TIMEOUT, DEFAULT_REFRESH_INTERVAL, MIN_REFRESH_INTERVAL, ManagerOptions};
pub use state::{RefreshOutcome, RefreshStats};

use refresher::{RefreshCommand, RefresherHandle};
use state::{ManagerState, Served};

/// State shared between a manager and its refresher
pub(crate) struct Shared {
    prompt_id: PromptId,
    spec: VersionSpec,
    registry: Arc<dyn RegistryClient>,
    options: ManagerOptions,
    state: ManagerState,
}

impl Shared {
    /// Fetch once and swap if the manifest changed
    async fn refresh_once(&self, key: &FetchKey) -> Result<RefreshOutcome, PromptError> {
        debug!(prompt_id = %self.prompt_id, %key, "refresh_once: called");
        let result = match fetch_checked(
            self.registry.as_ref(),
            &self.prompt_id,
            key,
            self.options.refresh_timeout,
        )
        .await
        {
            Ok(manifest) => self.state.apply(manifest),
            Err(e) => {
                self.state.record_failure(&e);
                Err(e)
            }
        };
        if let Err(e) = &result {
            warn!(prompt_id = %self.prompt_id, %key, error = %e, "Refresh failed, keeping previous snapshot");
        }
        result
    }
}

/// Cache and refresher for one prompt at one version spec
pub struct PromptManager {
    shared: Arc<Shared>,
    refresher: Mutex<Option<RefresherHandle>>,
}

impl PromptManager {
    /// Fetch the prompt and start background refresh when applicable
    ///
    /// A matching local override is used instead of the registry and never
    /// refreshed. Weighted specs fetch every listed minor up front.
    pub async fn start(
        prompt_id: impl Into<PromptId>,
        spec: VersionSpec,
        registry: Arc<dyn RegistryClient>,
        options: ManagerOptions,
    ) -> Result<Self, PromptError> {
        let prompt_id = prompt_id.into();
        debug!(%prompt_id, %spec, "start: called");
        options.validate()?;

        let keys = spec.resolve();
        let (manifests, from_override) = match load_override(&prompt_id, &keys, &options)? {
            Some(manifests) => {
                info!(%prompt_id, %spec, "Using local override");
                (manifests, true)
            }
            None => {
                let mut manifests = Vec::with_capacity(keys.len());
                for (key, weight) in &keys {
                    let manifest = fetch_checked(registry.as_ref(), &prompt_id, key, options.init_timeout).await?;
                    manifests.push((manifest, *weight));
                }
                (manifests, false)
            }
        };

        let served = Served::bind(manifests)?.ok_or_else(|| PromptError::InvalidVersionSpec {
            spec: spec.to_string(),
            reason: "resolves to no versions".to_string(),
        })?;

        let refresh_key = match keys.as_slice() {
            [(key, _)] if key.is_mutable() && options.refresh_enabled && !from_override => Some(key.clone()),
            _ => None,
        };

        let shared = Arc::new(Shared {
            prompt_id,
            spec,
            registry,
            options,
            state: ManagerState::new(served),
        });
        let refresher = refresh_key.map(|key| refresher::spawn(shared.clone(), key));

        info!(
            prompt_id = %shared.prompt_id,
            spec = %shared.spec,
            refreshing = refresher.is_some(),
            "Prompt manager started"
        );
        Ok(Self {
            shared,
            refresher: Mutex::new(refresher),
        })
    }

    /// Context over the current snapshot
    pub fn get(&self) -> ExecutionContext {
        let served = self.shared.state.load();
        ExecutionContext::new(served.pick().clone())
    }

    /// Context over the current snapshot, carrying a tracking id
    pub fn get_tracked(&self, tracking_id: impl Into<String>) -> ExecutionContext {
        self.get().with_tracking_id(tracking_id)
    }

    /// Refresh now through the refresher task
    ///
    /// Returns `Disabled` when this manager does not refresh or was stopped.
    pub async fn refresh_now(&self) -> Result<RefreshOutcome, PromptError> {
        debug!(prompt_id = %self.shared.prompt_id, "refresh_now: called");
        let commands = self
            .refresher
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|h| h.commands.clone());
        let Some(commands) = commands else {
            return Ok(RefreshOutcome::Disabled);
        };

        let (reply_tx, reply_rx) = tokio::sync::oneshot::channel();
        if commands.send(RefreshCommand::Refresh { reply: reply_tx }).await.is_err() {
            return Ok(RefreshOutcome::Disabled);
        }
        reply_rx.await.unwrap_or(Ok(RefreshOutcome::Disabled))
    }

    pub fn stats(&self) -> RefreshStats {
        self.shared.state.stats()
    }

    pub fn is_refreshing(&self) -> bool {
        self.refresher.lock().unwrap_or_else(PoisonError::into_inner).is_some()
    }

    pub fn prompt_id(&self) -> &PromptId {
        &self.shared.prompt_id
    }

    pub fn spec(&self) -> &VersionSpec {
        &self.shared.spec
    }

    /// Stop the refresher and wait for it to exit
    ///
    /// No snapshot swap happens after this returns. `get()` keeps serving the
    /// last snapshot.
    pub async fn stop(&self) {
        debug!(prompt_id = %self.shared.prompt_id, "stop: called");
        let handle = self.refresher.lock().unwrap_or_else(PoisonError::into_inner).take();
        let Some(RefresherHandle { shutdown, join, .. }) = handle else {
            debug!(prompt_id = %self.shared.prompt_id, "stop: no refresher running");
            return;
        };

        let _ = shutdown.send(());
        match join.await {
            Ok(()) => {}
            Err(e) if e.is_cancelled() => debug!("stop: refresher was cancelled"),
            Err(e) => warn!(prompt_id = %self.shared.prompt_id, error = %e, "Refresher task failed"),
        }
        info!(prompt_id = %self.shared.prompt_id, "Prompt manager stopped");
    }
}

impl fmt::Debug for PromptManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PromptManager")
            .field("prompt_id", &self.shared.prompt_id)
            .field("spec", &self.shared.spec)
            .field("refreshing", &self.is_refreshing())
            .finish()
    }
}

impl Drop for PromptManager {
    fn drop(&mut self) {
        let handle = self.refresher.get_mut().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(handle) = handle {
            debug!(prompt_id = %self.shared.prompt_id, "drop: aborting refresher");
            handle.join.abort();
        }
    }
}

/// Every key must hit the override, otherwise the registry is used
fn load_override(
    prompt_id: &PromptId,
    keys: &[(FetchKey, f64)],
    options: &ManagerOptions,
) -> Result<Option<Vec<(PromptManifest, f64)>>, PromptError> {
    let Some(source) = &options.local_override else {
        return Ok(None);
    };
    let mut manifests = Vec::with_capacity(keys.len());
    for (key, weight) in keys {
        let found = source.lookup(prompt_id, key).map_err(|e| fetch_error(prompt_id, key, e))?;
        match found {
            Some(manifest) => manifests.push((manifest, *weight)),
            None => {
                debug!(%prompt_id, %key, "load_override: no override");
                return Ok(None);
            }
        }
    }
    Ok(Some(manifests))
}

/// Fetch with a timeout and check the manifest answers the request
async fn fetch_checked(
    registry: &dyn RegistryClient,
    prompt_id: &PromptId,
    key: &FetchKey,
    timeout: Duration,
) -> Result<PromptManifest, PromptError> {
    let manifest = match tokio::time::timeout(timeout, registry.fetch_manifest(prompt_id, key)).await {
        Ok(Ok(manifest)) => manifest,
        Ok(Err(e)) => return Err(fetch_error(prompt_id, key, e)),
        Err(_) => return Err(fetch_error(prompt_id, key, RegistryError::Timeout(timeout))),
    };
    check_manifest(prompt_id, key, &manifest).map_err(|e| fetch_error(prompt_id, key, e))?;
    Ok(manifest)
}

fn check_manifest(prompt_id: &PromptId, key: &FetchKey, manifest: &PromptManifest) -> Result<(), RegistryError> {
    if &manifest.prompt_id != prompt_id {
        return Err(RegistryError::InvalidResponse(format!(
            "expected prompt '{}', got '{}'",
            prompt_id, manifest.prompt_id
        )));
    }
    let matches = match (key, &manifest.major, manifest.minor) {
        (FetchKey::Undeployed, MajorVersion::Undeployed, _) => true,
        (FetchKey::LatestMinor { major }, MajorVersion::Deployed(found), _) => major == found,
        (FetchKey::Exact { major, minor }, MajorVersion::Deployed(found), found_minor) => {
            major == found && found_minor.is_none_or(|m| m == *minor)
        }
        _ => false,
    };
    if !matches {
        return Err(RegistryError::InvalidResponse(format!(
            "requested {}, got {}",
            key,
            manifest.version_label()
        )));
    }
    Ok(())
}

fn fetch_error(prompt_id: &PromptId, key: &FetchKey, source: RegistryError) -> PromptError {
    PromptError::PromptFetch {
        prompt_id: prompt_id.to_string(),
        version: key.to_string(),
        source,
    }
}
