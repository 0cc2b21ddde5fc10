//! Result Record
//!
//! One record per session: caller metadata (backend versions, host tags),
//! session-level convergence, and per-candidate interval estimates keyed by
//! candidate name.

use chrono::{DateTime, Utc};
use rankbench_core::{Convergence, RefineOutcome};
use rankbench_stats::OnlineEstimate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Final estimate for one candidate.
///
/// Interval fields are `None` while they are unbounded (fewer than two
/// observations), so every record survives a JSON round trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateSummary {
    /// Mean cost per call (nanoseconds)
    pub mean: f64,
    /// Confidence half-width around the mean
    pub half_width: Option<f64>,
    /// `half_width / |mean|`; absent when the mean is exactly zero
    pub relative_half_width: Option<f64>,
    /// Lower interval bound
    pub lower_bound: Option<f64>,
    /// Upper interval bound
    pub upper_bound: Option<f64>,
    /// Samples folded into the estimate
    pub observation_count: u64,
    /// Zero-based position in the mean ordering (0 = cheapest)
    pub rank: usize,
    /// Interval disjoint from both ranking neighbours
    pub stable: bool,
}

fn finite(x: f64) -> Option<f64> {
    x.is_finite().then_some(x)
}

impl CandidateSummary {
    fn from_estimate(est: &OnlineEstimate, rank: usize, stable: bool) -> Self {
        Self {
            mean: est.mean(),
            half_width: finite(est.half_width()),
            relative_half_width: est.relative_half_width().ok().and_then(finite),
            lower_bound: finite(est.lower_bound()),
            upper_bound: finite(est.upper_bound()),
            observation_count: est.count(),
            rank,
            stable,
        }
    }
}

/// Outcome of one benchmark session, merged with caller metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkRecord {
    /// Session identity, when the session was persisted
    pub session: Option<String>,
    /// When the record was produced
    pub created_at: DateTime<Utc>,
    /// Caller-supplied static tags
    pub metadata: BTreeMap<String, String>,
    /// Calls per trial sample
    pub repeat_count: u64,
    /// Observations per candidate
    pub rounds: u64,
    /// Observations per candidate carried over from a previous run
    pub resumed_from: u64,
    /// How the session ended
    pub convergence: Convergence,
    /// Whether the whole ranking is significant
    pub stable: bool,
    /// Per-candidate estimates
    pub results: BTreeMap<String, CandidateSummary>,
}

impl BenchmarkRecord {
    /// Build a record from a refinement outcome.
    ///
    /// `names` must be in the same order as the outcome's estimates.
    pub fn from_outcome(
        names: &[String],
        outcome: &RefineOutcome,
        repeat_count: u64,
        metadata: BTreeMap<String, String>,
    ) -> Self {
        let order = &outcome.ranking.order;
        let estimates = &outcome.estimates;

        let mut results = BTreeMap::new();
        for (rank, &index) in order.iter().enumerate() {
            let below_prev = rank == 0 || estimates[order[rank - 1]].is_below(&estimates[index]);
            let above_next = order
                .get(rank + 1)
                .is_none_or(|&next| estimates[index].is_below(&estimates[next]));
            results.insert(
                names[index].clone(),
                CandidateSummary::from_estimate(&estimates[index], rank, below_prev && above_next),
            );
        }

        Self {
            session: None,
            created_at: Utc::now(),
            metadata,
            repeat_count,
            rounds: outcome.rounds,
            resumed_from: outcome.resumed_from,
            convergence: outcome.convergence,
            stable: outcome.is_stable(),
            results,
        }
    }

    /// Candidate names, cheapest first
    pub fn ranking(&self) -> Vec<&str> {
        let mut ranked: Vec<(&str, usize)> = self
            .results
            .iter()
            .map(|(name, summary)| (name.as_str(), summary.rank))
            .collect();
        ranked.sort_by_key(|&(_, rank)| rank);
        ranked.into_iter().map(|(name, _)| name).collect()
    }

    /// Cheapest candidate by mean
    pub fn fastest(&self) -> Option<&str> {
        self.ranking().first().copied()
    }

    /// Whether the round cap was hit without a significant ranking
    pub fn is_low_confidence(&self) -> bool {
        self.convergence == Convergence::NonStabilizingRanking
    }

    /// Pretty JSON rendering
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
