//! Model handle
//!
//! A [`LangModel`] is one configured upstream model: identity, health flag,
//! latency tracker, routing tunables, and the provider client that serves it.
//! Everything except `healthy` is immutable after construction.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::latency::LatencyTracker;
use crate::providers::ProviderClient;

/// Handle to one configured upstream model.
///
/// `healthy` is a single-word atomic: writers are dispatch outcomes and the
/// health monitor, readers are routing strategies. A stale read at worst
/// routes one extra request to a just-failed model.
pub struct LangModel {
    id: String,
    weight: u32,
    healthy: AtomicBool,
    latency_update_interval: Duration,
    latency: LatencyTracker,
    client: Arc<dyn ProviderClient>,
}

impl LangModel {
    /// Create a model handle. Models start healthy.
    ///
    /// # Arguments
    ///
    /// * `id` — configured id, unique within a router.
    /// * `weight` — weighted-round-robin share, ≥ 1.
    /// * `latency_update_interval` — how long a latency estimate stays fresh
    ///   before the least-latency strategy forces a re-probe.
    /// * `warmup_samples` — latency samples required before the model leaves
    ///   the warm-up pool.
    /// * `latency_decay` — EWMA decay factor in (0, 1).
    /// * `client` — the provider adapter serving this model.
    pub fn new(
        id: impl Into<String>,
        weight: u32,
        latency_update_interval: Duration,
        warmup_samples: u32,
        latency_decay: f64,
        client: Arc<dyn ProviderClient>,
    ) -> Self {
        Self {
            id: id.into(),
            weight,
            healthy: AtomicBool::new(true),
            latency_update_interval,
            latency: LatencyTracker::new(warmup_samples, latency_decay),
            client,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn weight(&self) -> u32 {
        self.weight
    }

    pub fn healthy(&self) -> bool {
        self.healthy.load(Ordering::Relaxed)
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::Relaxed);
    }

    pub fn latency(&self) -> &LatencyTracker {
        &self.latency
    }

    pub fn latency_update_interval(&self) -> Duration {
        self.latency_update_interval
    }

    pub fn client(&self) -> &Arc<dyn ProviderClient> {
        &self.client
    }
}

impl fmt::Debug for LangModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LangModel")
            .field("id", &self.id)
            .field("weight", &self.weight)
            .field("healthy", &self.healthy())
            .field("provider", &self.client.id())
            .field("latency_ms", &self.latency.value())
            .finish()
    }
}
