//! Per-manager state: the served snapshots and refresh bookkeeping

use std::sync::{Arc, Mutex, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use crate::context::PromptSnapshot;
use crate::error::PromptError;
use crate::manifest::PromptManifest;

/// Result of one refresh
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// A different manifest was fetched and swapped in
    Updated { stamp: u64 },
    /// The fetched manifest equals the current one
    Unchanged,
    /// This manager does not refresh
    Disabled,
}

/// Refresh bookkeeping of one manager
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RefreshStats {
    /// Stamp of the snapshot currently served
    pub stamp: u64,
    pub last_fetch: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub error_count: u64,
    /// Successful refresh fetches, changed or not
    pub refresh_count: u64,
}

#[derive(Debug)]
struct Weighted {
    snapshot: Arc<PromptSnapshot>,
    weight: f64,
}

/// Snapshots a manager serves; never empty
#[derive(Debug)]
pub(crate) struct Served {
    head: Weighted,
    tail: Vec<Weighted>,
    total_weight: f64,
}

impl Served {
    pub(crate) fn single(snapshot: Arc<PromptSnapshot>) -> Self {
        Self {
            head: Weighted { snapshot, weight: 1.0 },
            tail: Vec::new(),
            total_weight: 1.0,
        }
    }

    /// Bind manifests at stamp 1; `None` when there are none
    pub(crate) fn bind(manifests: Vec<(PromptManifest, f64)>) -> Result<Option<Self>, PromptError> {
        let mut bound = manifests
            .into_iter()
            .map(|(manifest, weight)| {
                Ok(Weighted {
                    snapshot: Arc::new(PromptSnapshot::bind(manifest, 1)?),
                    weight,
                })
            })
            .collect::<Result<Vec<_>, PromptError>>()?
            .into_iter();
        let Some(head) = bound.next() else {
            return Ok(None);
        };
        let tail: Vec<Weighted> = bound.collect();
        let total_weight = head.weight + tail.iter().map(|w| w.weight).sum::<f64>();
        Ok(Some(Self {
            head,
            tail,
            total_weight,
        }))
    }

    /// The snapshot refreshes compare against
    pub(crate) fn primary(&self) -> &Arc<PromptSnapshot> {
        &self.head.snapshot
    }

    pub(crate) fn pick(&self) -> &Arc<PromptSnapshot> {
        if self.tail.is_empty() {
            return &self.head.snapshot;
        }
        self.pick_with(rand::random::<f64>())
    }

    /// Pick by a roll in `[0, 1)`, proportional to weight
    pub(crate) fn pick_with(&self, roll: f64) -> &Arc<PromptSnapshot> {
        let mut remaining = roll * self.total_weight;
        for entry in std::iter::once(&self.head).chain(self.tail.iter()) {
            if remaining < entry.weight {
                return &entry.snapshot;
            }
            remaining -= entry.weight;
        }
        self.tail.last().map(|w| &w.snapshot).unwrap_or(&self.head.snapshot)
    }

    pub(crate) fn len(&self) -> usize {
        1 + self.tail.len()
    }
}

/// Mutable cell of one manager
///
/// Readers clone the `Arc<Served>` under the read lock; the refresher is the
/// only writer and replaces it whole.
#[derive(Debug)]
pub(crate) struct ManagerState {
    served: RwLock<Arc<Served>>,
    stats: Mutex<RefreshStats>,
}

impl ManagerState {
    pub(crate) fn new(served: Served) -> Self {
        let stats = RefreshStats {
            stamp: served.primary().stamp(),
            last_fetch: Some(served.primary().fetched_at()),
            ..RefreshStats::default()
        };
        Self {
            served: RwLock::new(Arc::new(served)),
            stats: Mutex::new(stats),
        }
    }

    pub(crate) fn load(&self) -> Arc<Served> {
        self.served.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Swap in a fetched manifest if it differs from the current one
    pub(crate) fn apply(&self, manifest: PromptManifest) -> Result<RefreshOutcome, PromptError> {
        let current = self.load();
        if current.primary().manifest() == &manifest {
            debug!(prompt_id = %manifest.prompt_id, "apply: manifest unchanged");
            self.record_success(None);
            return Ok(RefreshOutcome::Unchanged);
        }

        let stamp = current.primary().stamp() + 1;
        let snapshot = match PromptSnapshot::bind(manifest, stamp) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                self.record_failure(&e);
                return Err(e);
            }
        };
        info!(
            prompt_id = %snapshot.manifest().prompt_id,
            version = %snapshot.manifest().version_label(),
            revision_id = ?snapshot.manifest().revision_id,
            %stamp,
            "Prompt updated"
        );

        *self.served.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(Served::single(Arc::new(snapshot)));
        self.record_success(Some(stamp));
        Ok(RefreshOutcome::Updated { stamp })
    }

    pub(crate) fn record_failure(&self, err: &PromptError) {
        let mut stats = self.stats.lock().unwrap_or_else(PoisonError::into_inner);
        stats.error_count += 1;
        stats.last_error = Some(err.to_string());
    }

    fn record_success(&self, swapped_to: Option<u64>) {
        let mut stats = self.stats.lock().unwrap_or_else(PoisonError::into_inner);
        stats.refresh_count += 1;
        stats.last_fetch = Some(Utc::now());
        if let Some(stamp) = swapped_to {
            stats.stamp = stamp;
        }
    }

    pub(crate) fn stats(&self) -> RefreshStats {
        self.stats.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}
