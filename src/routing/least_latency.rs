//! Least-latency strategy
//!
//! Routes to the model with the lowest measured response latency. Selection
//! runs in two phases:
//!
//! - **warm up**: cold models (healthy but below their warm-up sample
//!   threshold) are probed in round-robin order regardless of observed
//!   latency, so every model earns a trustworthy estimate.
//! - **least-latency selection**: once no cold model remains, the healthy
//!   model with the smallest EWMA wins — unless some model's schedule has
//!   expired. A latency estimate is only trusted for the model's update
//!   interval; an expired schedule always beats a non-expired one, most
//!   stale first, so no model is starved and estimates keep refreshing.
//!
//! Churn between comparable models is bounded by the update interval: the
//! winner's schedule is touched on every yield.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use crate::model::LangModel;

/// Latency-refresh schedule for one model.
///
/// Kept separate from [`LangModel`] because the schedule is mutated per
/// request while the model is effectively immutable. Schedules sit in a
/// slice indexed parallel to the strategy's model list.
#[derive(Debug)]
pub struct ModelSchedule {
    expire_at: RwLock<Instant>,
}

impl ModelSchedule {
    fn new(update_interval: Duration) -> Self {
        Self {
            expire_at: RwLock::new(Instant::now() + update_interval),
        }
    }

    fn expire_at(&self) -> Instant {
        *self
            .expire_at
            .read()
            .unwrap_or_else(|e| e.into_inner())
    }

    fn expired(&self) -> bool {
        Instant::now() > self.expire_at()
    }

    /// Push the expiration deadline one update interval into the future.
    fn touch(&self, update_interval: Duration) {
        let mut expire_at = self
            .expire_at
            .write()
            .unwrap_or_else(|e| e.into_inner());
        *expire_at = Instant::now() + update_interval;
    }
}

/// Adaptive latency-based strategy.
#[derive(Debug)]
pub struct LeastLatency {
    models: Vec<Arc<LangModel>>,
    schedules: Vec<ModelSchedule>,
    warmup_cursor: AtomicU64,
}

impl LeastLatency {
    pub fn new(models: Vec<Arc<LangModel>>) -> Self {
        let schedules = models
            .iter()
            .map(|m| ModelSchedule::new(m.latency_update_interval()))
            .collect();
        Self {
            models,
            schedules,
            warmup_cursor: AtomicU64::new(0),
        }
    }

    /// Start a fresh candidate sequence for one request.
    pub fn candidates(&self) -> LeastLatencyCandidates<'_> {
        LeastLatencyCandidates {
            strategy: self,
            yielded: vec![false; self.models.len()],
        }
    }

    fn touch_and_get(&self, idx: usize) -> Arc<LangModel> {
        let model = &self.models[idx];
        self.schedules[idx].touch(model.latency_update_interval());
        Arc::clone(model)
    }
}

/// Per-request candidate sequence.
///
/// Every `next()` re-evaluates live health, warm-up, and schedule state,
/// excluding models already yielded this request.
pub struct LeastLatencyCandidates<'a> {
    strategy: &'a LeastLatency,
    yielded: Vec<bool>,
}

impl LeastLatencyCandidates<'_> {
    /// Healthy, not yet yielded, below the warm-up threshold.
    fn cold_indices(&self) -> Vec<usize> {
        self.strategy
            .models
            .iter()
            .enumerate()
            .filter(|(idx, m)| !self.yielded[*idx] && m.healthy() && !m.latency().warmed_up())
            .map(|(idx, _)| idx)
            .collect()
    }

    /// The cascade over warmed models: expired beats non-expired; among
    /// expired the earliest deadline wins; among fresh the smallest EWMA
    /// wins, ties broken by configured order.
    fn pick_warmed(&self) -> Option<usize> {
        let mut best: Option<(usize, bool, Instant, f64)> = None;

        for (idx, model) in self.strategy.models.iter().enumerate() {
            if self.yielded[idx] || !model.healthy() {
                continue;
            }
            let schedule = &self.strategy.schedules[idx];
            let expired = schedule.expired();
            let expire_at = schedule.expire_at();
            let latency = model.latency().value();

            let better = match &best {
                None => true,
                Some((_, best_expired, best_expire_at, best_latency)) => {
                    if expired != *best_expired {
                        expired
                    } else if expired {
                        expire_at < *best_expire_at
                    } else {
                        latency < *best_latency
                    }
                }
            };
            if better {
                best = Some((idx, expired, expire_at, latency));
            }
        }

        best.map(|(idx, _, _, _)| idx)
    }
}

impl Iterator for LeastLatencyCandidates<'_> {
    type Item = Arc<LangModel>;

    fn next(&mut self) -> Option<Self::Item> {
        let cold = self.cold_indices();
        if !cold.is_empty() {
            let turn = self.strategy.warmup_cursor.fetch_add(1, Ordering::Relaxed) as usize;
            let idx = cold[turn % cold.len()];
            self.yielded[idx] = true;
            return Some(self.strategy.touch_and_get(idx));
        }

        let idx = self.pick_warmed()?;
        self.yielded[idx] = true;
        Some(self.strategy.touch_and_get(idx))
    }
}

// ── Tests ──────────────────────────────────────────────────────────────
