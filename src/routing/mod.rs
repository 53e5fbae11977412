//! # Routing strategies
//!
//! ## Responsibility
//! Produce, per request, a finite lazy sequence of candidate models for the
//! dispatch loop to try. Four strategies: priority, round-robin, weighted
//! round-robin, and adaptive least-latency.
//!
//! ## Guarantees
//! - A candidate sequence never yields the same model twice per request.
//! - Unhealthy models are skipped; an empty sequence means no healthy model.
//! - Shared cursors live inside the strategy value (init at router
//!   construction), never in module-global state.
//! - Selection never blocks: strategies read atomics and short-lived locks,
//!   no I/O.
//!
//! ## NOT Responsible For
//! - Calling providers or recording outcomes (see `router`)
//! - Health recovery (see `health`)

pub mod least_latency;
pub mod priority;
pub mod round_robin;
pub mod weighted;

use std::sync::Arc;

use crate::config::RoutingStrategyKind;
use crate::model::LangModel;

pub use least_latency::LeastLatency;
pub use priority::Priority;
pub use round_robin::RoundRobin;
pub use weighted::WeightedRoundRobin;

/// The configured routing strategy.
///
/// A closed set of variants rather than an open trait hierarchy: the router
/// matches on the variant to obtain a per-request candidate sequence.
#[derive(Debug)]
pub enum RoutingStrategy {
    Priority(Priority),
    RoundRobin(RoundRobin),
    WeightedRoundRobin(WeightedRoundRobin),
    LeastLatency(LeastLatency),
}

impl RoutingStrategy {
    /// Build the strategy named by `kind` over the fixed model set.
    ///
    /// The model order is the configured priority order; it is meaningful to
    /// the priority and round-robin strategies and used for tie-breaking by
    /// least-latency.
    pub fn new(kind: RoutingStrategyKind, models: Vec<Arc<LangModel>>) -> Self {
        match kind {
            RoutingStrategyKind::Priority => Self::Priority(Priority::new(models)),
            RoutingStrategyKind::RoundRobin => Self::RoundRobin(RoundRobin::new(models)),
            RoutingStrategyKind::WeightedRoundRobin => {
                Self::WeightedRoundRobin(WeightedRoundRobin::new(models))
            }
            RoutingStrategyKind::LeastLatency => Self::LeastLatency(LeastLatency::new(models)),
        }
    }

    /// Start a fresh candidate sequence for one request.
    pub fn candidates(&self) -> Candidates<'_> {
        match self {
            Self::Priority(s) => Candidates::Priority(s.candidates()),
            Self::RoundRobin(s) => Candidates::RoundRobin(s.candidates()),
            Self::WeightedRoundRobin(s) => Candidates::WeightedRoundRobin(s.candidates()),
            Self::LeastLatency(s) => Candidates::LeastLatency(s.candidates()),
        }
    }

    /// Strategy name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Priority(_) => "priority",
            Self::RoundRobin(_) => "round_robin",
            Self::WeightedRoundRobin(_) => "weighted_round_robin",
            Self::LeastLatency(_) => "least_latency",
        }
    }
}

/// Per-request candidate sequence.
///
/// Lives only for the duration of one inbound request and owns the
/// already-yielded bookkeeping that prevents duplicate candidates.
pub enum Candidates<'a> {
    Priority(priority::PriorityCandidates<'a>),
    RoundRobin(round_robin::RoundRobinCandidates<'a>),
    WeightedRoundRobin(weighted::WeightedCandidates<'a>),
    LeastLatency(least_latency::LeastLatencyCandidates<'a>),
}

impl Iterator for Candidates<'_> {
    type Item = Arc<LangModel>;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            Self::Priority(it) => it.next(),
            Self::RoundRobin(it) => it.next(),
            Self::WeightedRoundRobin(it) => it.next(),
            Self::LeastLatency(it) => it.next(),
        }
    }
}
