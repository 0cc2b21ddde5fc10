#![warn(missing_docs)]
//! RankBench Statistical Engine
//!
//! Streaming statistics used by the adaptive refiner:
//! - Welford mean/variance accumulation with O(1) state per candidate
//! - Normal-approximation confidence intervals from a one-sided tail probability
//! - Interval-separation ordering between candidates
//! - Ranking by mean with an adjacent-pair stability check

mod estimate;
mod normal;
mod ranking;

pub use estimate::{EstimateState, OnlineEstimate, StatsError};
pub use normal::normal_quantile;
pub use ranking::{Ranking, all_precise, is_stable, rank_by_mean};

/// Default one-sided tail probability (99% one-sided interval bounds)
pub const DEFAULT_TAIL_PROBABILITY: f64 = 0.01;

/// Observations needed before the sample variance is defined
pub const MIN_VARIANCE_OBSERVATIONS: u64 = 2;
