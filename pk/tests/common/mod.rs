//! Shared registry stubs for integration tests

#![allow(dead_code)]

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use promptkit::{FetchKey, GenerationScope, PromptId, PromptManifest, RegistryClient, RegistryError};

type Responder = Box<dyn FnMut(usize, &FetchKey) -> Result<PromptManifest, RegistryError> + Send>;

/// Registry whose answers are scripted by the test
pub struct ScriptedRegistry {
    responder: Mutex<Responder>,
    calls: AtomicUsize,
}

impl ScriptedRegistry {
    /// Answer every fetch with a clone of `manifest`
    pub fn serving(manifest: PromptManifest) -> Self {
        Self::from_fn(move |_, _| Ok(manifest.clone()))
    }

    /// Answer with `f(call_index, key)`
    pub fn from_fn(f: impl FnMut(usize, &FetchKey) -> Result<PromptManifest, RegistryError> + Send + 'static) -> Self {
        Self {
            responder: Mutex::new(Box::new(f)),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn set_manifest(&self, manifest: PromptManifest) {
        *self.responder.lock().unwrap() = Box::new(move |_, _| Ok(manifest.clone()));
    }

    pub fn fail_with_status(&self, status: u16) {
        *self.responder.lock().unwrap() = Box::new(move |_, _| {
            Err(RegistryError::ApiError {
                status,
                message: "scripted failure".to_string(),
            })
        });
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RegistryClient for ScriptedRegistry {
    async fn fetch_manifest(&self, _prompt_id: &PromptId, key: &FetchKey) -> Result<PromptManifest, RegistryError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let mut responder = self.responder.lock().unwrap();
        (responder)(call, key)
    }

    async fn fetch_manifests_for_generation(
        &self,
        _scope: &GenerationScope,
    ) -> Result<Vec<PromptManifest>, RegistryError> {
        Ok(Vec::new())
    }
}

/// Registry that fails the test if it is ever called
pub struct PanicRegistry;

#[async_trait]
impl RegistryClient for PanicRegistry {
    async fn fetch_manifest(&self, prompt_id: &PromptId, key: &FetchKey) -> Result<PromptManifest, RegistryError> {
        panic!("registry called for {} {}", prompt_id, key);
    }

    async fn fetch_manifests_for_generation(
        &self,
        _scope: &GenerationScope,
    ) -> Result<Vec<PromptManifest>, RegistryError> {
        panic!("registry called for generation");
    }
}
