//! Round-robin strategy
//!
//! A cursor shared across requests picks the starting model; each request
//! gets at most one full pass over the healthy models. The cursor advances
//! exactly once per request, when the candidate sequence is created.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::model::LangModel;

/// Cursor-based fair rotation.
#[derive(Debug)]
pub struct RoundRobin {
    models: Vec<Arc<LangModel>>,
    cursor: AtomicU64,
}

impl RoundRobin {
    pub fn new(models: Vec<Arc<LangModel>>) -> Self {
        Self {
            models,
            cursor: AtomicU64::new(0),
        }
    }

    /// Start a fresh candidate sequence for one request, advancing the
    /// shared cursor by one.
    pub fn candidates(&self) -> RoundRobinCandidates<'_> {
        let start = if self.models.is_empty() {
            0
        } else {
            self.cursor.fetch_add(1, Ordering::Relaxed) as usize % self.models.len()
        };
        RoundRobinCandidates {
            models: &self.models,
            start,
            stepped: 0,
        }
    }
}

/// Per-request candidate sequence: one pass starting at the cursor.
pub struct RoundRobinCandidates<'a> {
    models: &'a [Arc<LangModel>],
    start: usize,
    stepped: usize,
}

impl Iterator for RoundRobinCandidates<'_> {
    type Item = Arc<LangModel>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.stepped < self.models.len() {
            let idx = (self.start + self.stepped) % self.models.len();
            self.stepped += 1;
            let model = &self.models[idx];
            if model.healthy() {
                return Some(Arc::clone(model));
            }
        }
        None
    }
}

// ── Tests ──────────────────────────────────────────────────────────────
