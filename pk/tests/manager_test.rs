//! Prompt manager integration tests
//!
//! Refresh timing runs on tokio's paused clock: `sleep` auto-advances time to
//! the next pending timer, so the refresher's ticks fire deterministically.

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use common::{PanicRegistry, ScriptedRegistry};
use promptkit::{
    DirectorySource, FetchKey, GenerationScope, InMemorySource, MajorVersion, ManagerOptions, MinorVersion,
    PromptError, PromptId, PromptManager, PromptManifest, RefreshOutcome, RegistryClient, RegistryError, VersionSpec,
    WeightedMinor,
};
use serde_json::{Value, json};
use tempfile::TempDir;

// =============================================================================
// Helpers
// =============================================================================

fn undeployed(text: &str) -> PromptManifest {
    PromptManifest::new("prompt-a", MajorVersion::Undeployed)
        .with_param("text", json!(text))
        .with_template("body", text)
}

fn deployed(minor: u32, text: &str) -> PromptManifest {
    PromptManifest::new("prompt-a", MajorVersion::Deployed(1))
        .with_minor(minor)
        .with_param("text", json!(text))
        .with_template("body", text)
}

fn body(manager: &PromptManager) -> String {
    manager.get().render_template("body", &[]).unwrap()
}

/// Answers the first fetch, then never answers again
struct HangingRegistry {
    first: Option<PromptManifest>,
    calls: AtomicUsize,
}

#[async_trait]
impl RegistryClient for HangingRegistry {
    async fn fetch_manifest(&self, _prompt_id: &PromptId, _key: &FetchKey) -> Result<PromptManifest, RegistryError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        match (&self.first, call) {
            (Some(manifest), 0) => Ok(manifest.clone()),
            _ => std::future::pending().await,
        }
    }

    async fn fetch_manifests_for_generation(
        &self,
        _scope: &GenerationScope,
    ) -> Result<Vec<PromptManifest>, RegistryError> {
        Ok(Vec::new())
    }
}

// =============================================================================
// Refresh timing
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_undeployed_reflects_remote_change_after_one_interval() {
    let registry = Arc::new(ScriptedRegistry::serving(undeployed("first")));
    let manager = PromptManager::start(
        "prompt-a",
        VersionSpec::undeployed(),
        registry.clone(),
        ManagerOptions::default(),
    )
    .await
    .unwrap();
    assert_eq!(body(&manager), "first");

    registry.set_manifest(undeployed("second"));

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(body(&manager), "first");

    tokio::time::sleep(Duration::from_secs(6)).await;
    assert_eq!(body(&manager), "second");
    assert_eq!(manager.get().stamp(), 2);
    assert_eq!(registry.calls(), 2);

    manager.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_latest_minor_is_reconciled() {
    let registry = Arc::new(ScriptedRegistry::serving(deployed(0, "minor zero")));
    let options = ManagerOptions::default().with_refresh_interval(Duration::from_secs(2));
    let manager = PromptManager::start("prompt-a", VersionSpec::latest(1), registry.clone(), options)
        .await
        .unwrap();
    assert_eq!(manager.get().version(), "1.0");

    registry.set_manifest(deployed(1, "minor one"));
    tokio::time::sleep(Duration::from_millis(2500)).await;

    let ctx = manager.get();
    assert_eq!(ctx.version(), "1.1");
    assert_eq!(ctx.param("text"), Some(&json!("minor one")));
    manager.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_unchanged_refresh_keeps_stamp() {
    let registry = Arc::new(ScriptedRegistry::serving(undeployed("same")));
    let manager = PromptManager::start(
        "prompt-a",
        VersionSpec::undeployed(),
        registry.clone(),
        ManagerOptions::default(),
    )
    .await
    .unwrap();
    let before = manager.get();

    tokio::time::sleep(Duration::from_secs(35)).await;

    let after = manager.get();
    assert!(before.same_snapshot(&after));
    assert_eq!(after.stamp(), 1);
    let stats = manager.stats();
    assert_eq!(stats.refresh_count, 3);
    assert_eq!(stats.error_count, 0);
    assert_eq!(registry.calls(), 4);
    manager.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_pinned_version_never_refetches() {
    let registry = Arc::new(ScriptedRegistry::serving(deployed(3, "pinned")));
    let spec = VersionSpec::parse("1.3", "latest").unwrap();
    let manager = PromptManager::start("prompt-a", spec, registry.clone(), ManagerOptions::default())
        .await
        .unwrap();
    assert!(!manager.is_refreshing());

    registry.set_manifest(deployed(3, "changed remotely"));
    tokio::time::sleep(Duration::from_secs(120)).await;

    assert_eq!(body(&manager), "pinned");
    assert_eq!(manager.get().version(), "1.3");
    assert_eq!(registry.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_failed_refresh_keeps_previous_snapshot() {
    let registry = Arc::new(ScriptedRegistry::serving(undeployed("good")));
    let manager = PromptManager::start(
        "prompt-a",
        VersionSpec::undeployed(),
        registry.clone(),
        ManagerOptions::default(),
    )
    .await
    .unwrap();

    registry.fail_with_status(503);
    tokio::time::sleep(Duration::from_secs(21)).await;

    assert_eq!(body(&manager), "good");
    let stats = manager.stats();
    assert_eq!(stats.error_count, 2);
    assert_eq!(stats.stamp, 1);
    assert!(stats.last_error.unwrap().contains("503"));

    // recovers on the next good fetch
    registry.set_manifest(undeployed("better"));
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(body(&manager), "better");
    assert_eq!(manager.stats().error_count, 2);
    manager.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_invalid_manifest_on_refresh_is_rejected() {
    let registry = Arc::new(ScriptedRegistry::serving(undeployed("good")));
    let manager = PromptManager::start(
        "prompt-a",
        VersionSpec::undeployed(),
        registry.clone(),
        ManagerOptions::default(),
    )
    .await
    .unwrap();

    registry.set_manifest(
        PromptManifest::new("prompt-a", MajorVersion::Undeployed).with_template("body", "{{ first-name }} {{ first_name }}"),
    );
    let err = manager.refresh_now().await.unwrap_err();
    assert!(matches!(err, PromptError::NameMappingCollision { .. }));
    assert_eq!(body(&manager), "good");
    assert_eq!(manager.stats().error_count, 1);
    manager.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_refresh_timeout_is_recorded() {
    let registry = Arc::new(HangingRegistry {
        first: Some(undeployed("only")),
        calls: AtomicUsize::new(0),
    });
    let options = ManagerOptions::default().with_refresh_timeout(Duration::from_secs(3));
    let manager = PromptManager::start("prompt-a", VersionSpec::undeployed(), registry, options)
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_secs(14)).await;

    assert_eq!(body(&manager), "only");
    let stats = manager.stats();
    assert_eq!(stats.error_count, 1);
    assert!(stats.last_error.unwrap().contains("Timeout"));
    manager.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_init_timeout_fails_start() {
    let registry = Arc::new(HangingRegistry {
        first: None,
        calls: AtomicUsize::new(0),
    });
    let options = ManagerOptions::default().with_init_timeout(Duration::from_secs(2));
    let err = PromptManager::start("prompt-a", VersionSpec::latest(1), registry, options)
        .await
        .unwrap_err();
    match err {
        PromptError::PromptFetch { source, .. } => {
            assert!(matches!(source, RegistryError::Timeout(d) if d == Duration::from_secs(2)));
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

// =============================================================================
// Lifecycle
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_no_swap_after_stop() {
    let registry = Arc::new(ScriptedRegistry::serving(undeployed("before stop")));
    let manager = PromptManager::start(
        "prompt-a",
        VersionSpec::undeployed(),
        registry.clone(),
        ManagerOptions::default(),
    )
    .await
    .unwrap();

    manager.stop().await;
    assert!(!manager.is_refreshing());

    registry.set_manifest(undeployed("after stop"));
    tokio::time::sleep(Duration::from_secs(60)).await;

    assert_eq!(body(&manager), "before stop");
    assert_eq!(registry.calls(), 1);
    assert_eq!(manager.refresh_now().await.unwrap(), RefreshOutcome::Disabled);

    // stopping twice is harmless
    manager.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_drop_aborts_refresher() {
    let registry = Arc::new(ScriptedRegistry::serving(undeployed("x")));
    let manager = PromptManager::start(
        "prompt-a",
        VersionSpec::undeployed(),
        registry.clone(),
        ManagerOptions::default(),
    )
    .await
    .unwrap();
    drop(manager);

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(registry.calls(), 1);
}

#[tokio::test]
async fn test_contexts_outlive_refreshes() {
    let registry = Arc::new(ScriptedRegistry::serving(undeployed("old")));
    let manager = PromptManager::start(
        "prompt-a",
        VersionSpec::undeployed(),
        registry.clone(),
        ManagerOptions::default(),
    )
    .await
    .unwrap();
    let held = manager.get_tracked("request-1");

    registry.set_manifest(undeployed("new"));
    assert_eq!(
        manager.refresh_now().await.unwrap(),
        RefreshOutcome::Updated { stamp: 2 }
    );

    assert_eq!(held.render_template("body", &[]).unwrap(), "old");
    assert_eq!(held.tracking_id(), Some("request-1"));
    assert_eq!(body(&manager), "new");
    manager.stop().await;
}

// =============================================================================
// Concurrency
// =============================================================================

fn generation(n: u64) -> PromptManifest {
    PromptManifest::new("prompt-a", MajorVersion::Undeployed)
        .with_param("generation", json!(n))
        .with_template("body", format!("generation {}{{{{ suffix }}}}", n))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_readers_never_see_mixed_snapshots() {
    let registry = Arc::new(ScriptedRegistry::from_fn(|call, _| Ok(generation(call as u64))));
    let options = ManagerOptions::default().with_refresh_interval(Duration::from_secs(3600));
    let manager = Arc::new(
        PromptManager::start("prompt-a", VersionSpec::undeployed(), registry.clone(), options)
            .await
            .unwrap(),
    );

    let mut readers = Vec::new();
    for _ in 0..4 {
        let manager = manager.clone();
        readers.push(tokio::spawn(async move {
            let mut last_stamp = 0;
            for _ in 0..2_000 {
                let ctx = manager.get();
                let generation = ctx.param("generation").and_then(Value::as_u64).unwrap();
                let rendered = ctx.render_template("body", &[("suffix", "!")]).unwrap();
                assert_eq!(rendered, format!("generation {}!", generation));
                assert_eq!(ctx.stamp(), generation + 1);
                assert!(ctx.stamp() >= last_stamp, "stamps never go backwards for one reader");
                last_stamp = ctx.stamp();
                tokio::task::yield_now().await;
            }
        }));
    }

    let writer = {
        let manager = manager.clone();
        tokio::spawn(async move {
            for _ in 0..50 {
                let outcome = manager.refresh_now().await.unwrap();
                assert!(matches!(outcome, RefreshOutcome::Updated { .. }));
            }
        })
    };

    for reader in readers {
        reader.await.unwrap();
    }
    writer.await.unwrap();

    assert_eq!(manager.get().stamp(), 51);
    assert_eq!(registry.calls(), 51);
    manager.stop().await;
}

// =============================================================================
// Local overrides
// =============================================================================

#[tokio::test]
async fn test_in_memory_override_never_calls_registry() {
    let local = InMemorySource::new().with(deployed(2, "local copy"));
    let options = ManagerOptions::default().with_local_override(Arc::new(local));
    let manager = PromptManager::start("prompt-a", VersionSpec::latest(1), Arc::new(PanicRegistry), options)
        .await
        .unwrap();

    assert_eq!(body(&manager), "local copy");
    assert!(!manager.is_refreshing());
    assert_eq!(manager.refresh_now().await.unwrap(), RefreshOutcome::Disabled);
}

#[tokio::test]
async fn test_directory_override_never_calls_registry() {
    let dir = TempDir::new().unwrap();
    std::fs::create_dir_all(dir.path().join("prompt-a")).unwrap();
    std::fs::write(
        dir.path().join("prompt-a").join("undeployed.json"),
        json!({
            "id": "prompt-a",
            "version": "undeployed",
            "params": {"params": {"model": "from-disk"}},
            "templates": [{"id": "body", "template": "Hello, {{ name }}!"}]
        })
        .to_string(),
    )
    .unwrap();

    let options = ManagerOptions::default().with_local_override(Arc::new(DirectorySource::new(dir.path())));
    let manager = PromptManager::start("prompt-a", VersionSpec::undeployed(), Arc::new(PanicRegistry), options)
        .await
        .unwrap();

    let ctx = manager.get();
    assert_eq!(ctx.param("model"), Some(&json!("from-disk")));
    assert_eq!(ctx.render_template("body", &[("name", "Ada")]).unwrap(), "Hello, Ada!");
}

#[tokio::test]
async fn test_override_miss_falls_through_to_registry() {
    let local = InMemorySource::new().with(undeployed("staged"));
    let registry = Arc::new(ScriptedRegistry::serving(deployed(0, "remote")));
    let options = ManagerOptions::default().with_local_override(Arc::new(local));
    let manager = PromptManager::start("prompt-a", VersionSpec::latest(1), registry.clone(), options)
        .await
        .unwrap();

    assert_eq!(body(&manager), "remote");
    assert_eq!(registry.calls(), 1);
    assert!(manager.is_refreshing());
    manager.stop().await;
}

// =============================================================================
// Version resolution through the manager
// =============================================================================

#[tokio::test]
async fn test_missing_pinned_minor_is_fetch_error() {
    let registry = Arc::new(ScriptedRegistry::from_fn(|_, key| {
        Err(RegistryError::NotFound {
            url: format!("test://prompt-a/{}", key),
        })
    }));
    let err = PromptManager::start(
        "prompt-a",
        VersionSpec::exact(1, 9),
        registry,
        ManagerOptions::default(),
    )
    .await
    .unwrap_err();
    match err {
        PromptError::PromptFetch {
            prompt_id,
            version,
            source,
        } => {
            assert_eq!(prompt_id, "prompt-a");
            assert_eq!(version, "1.9");
            assert!(source.is_not_found());
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_weighted_minors_are_all_served() {
    let registry = Arc::new(ScriptedRegistry::from_fn(|_, key| match key {
        FetchKey::Exact { minor, .. } => Ok(deployed(*minor, &format!("minor {}", minor))),
        other => panic!("weighted specs fetch exact keys only, got {}", other),
    }));
    let spec = VersionSpec::new(
        MajorVersion::Deployed(1),
        MinorVersion::Weighted(vec![WeightedMinor::new(0, 1.0), WeightedMinor::new(1, 1.0)]),
    )
    .unwrap();
    let manager = PromptManager::start("prompt-a", spec, registry.clone(), ManagerOptions::default())
        .await
        .unwrap();

    assert_eq!(registry.calls(), 2);
    assert!(!manager.is_refreshing());

    let mut seen = std::collections::BTreeSet::new();
    for _ in 0..200 {
        seen.insert(manager.get().version());
    }
    let seen: Vec<String> = seen.into_iter().collect();
    assert_eq!(seen, vec!["1.0", "1.1"]);
}
