//! Weighted round-robin strategy
//!
//! Like round-robin, but each model occupies `weight` consecutive slots in an
//! expanded ring of `Σ weights` slots, so it receives `weight` consecutive
//! turns before the rotation advances. Over any window of `Σ weights`
//! requests with all models healthy, each model is picked exactly `weight`
//! times.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::model::LangModel;

/// Weight-expanded cursor rotation.
#[derive(Debug)]
pub struct WeightedRoundRobin {
    models: Vec<Arc<LangModel>>,
    /// Expanded ring: slot → model index, `weight` consecutive slots each.
    slots: Vec<usize>,
    cursor: AtomicU64,
}

impl WeightedRoundRobin {
    pub fn new(models: Vec<Arc<LangModel>>) -> Self {
        let slots = models
            .iter()
            .enumerate()
            .flat_map(|(idx, model)| std::iter::repeat(idx).take(model.weight() as usize))
            .collect();
        Self {
            models,
            slots,
            cursor: AtomicU64::new(0),
        }
    }

    /// Start a fresh candidate sequence for one request, advancing the
    /// shared cursor by one slot.
    pub fn candidates(&self) -> WeightedCandidates<'_> {
        let start = if self.slots.is_empty() {
            0
        } else {
            self.cursor.fetch_add(1, Ordering::Relaxed) as usize % self.slots.len()
        };
        WeightedCandidates {
            strategy: self,
            start,
            stepped: 0,
            yielded: vec![false; self.models.len()],
        }
    }
}

/// Per-request candidate sequence over the expanded ring.
///
/// Fallback candidates after a failed attempt continue around the ring,
/// skipping models already yielded this request.
pub struct WeightedCandidates<'a> {
    strategy: &'a WeightedRoundRobin,
    start: usize,
    stepped: usize,
    yielded: Vec<bool>,
}

impl Iterator for WeightedCandidates<'_> {
    type Item = Arc<LangModel>;

    fn next(&mut self) -> Option<Self::Item> {
        let slots = &self.strategy.slots;
        while self.stepped < slots.len() {
            let slot = (self.start + self.stepped) % slots.len();
            self.stepped += 1;
            let idx = slots[slot];
            if self.yielded[idx] {
                continue;
            }
            let model = &self.strategy.models[idx];
            if !model.healthy() {
                continue;
            }
            self.yielded[idx] = true;
            return Some(Arc::clone(model));
        }
        None
    }
}

// ── Tests ──────────────────────────────────────────────────────────────
