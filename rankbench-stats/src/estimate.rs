//! Online Mean-Variance Estimator
//!
//! Single-pass Welford accumulation of mean and sample variance, with a
//! normal-approximation confidence interval derived on demand.
//!
//! The interval multiplier `z` is fixed at construction from a one-sided tail
//! probability `q`: `z = Φ⁻¹(1 − q)`. Every derived quantity is a pure function
//! of `(count, mean, m2, z)`, so re-reading it without new samples never changes
//! the answer.

use crate::MIN_VARIANCE_OBSERVATIONS;
use crate::normal::normal_quantile;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use thiserror::Error;

/// Errors from estimator operations
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StatsError {
    /// Relative half-width requested while the mean is exactly zero
    #[error("relative half-width is undefined for a mean of exactly zero")]
    DivisionUndefined,

    /// Tail probability outside the open interval (0, 0.5)
    #[error("invalid tail probability: {0} (must be in (0, 0.5))")]
    InvalidTailProbability(f64),

    /// Persisted state that cannot describe a real sample stream
    #[error("invalid estimate state: {0}")]
    InvalidState(String),
}

/// Persisted form of an estimate.
///
/// These three fields are the whole resumable state; the interval multiplier is
/// supplied again on restore.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EstimateState {
    /// Number of samples folded in so far
    pub observation_count: u64,
    /// Running mean of the samples
    pub running_mean: f64,
    /// Running sample variance (`n - 1` denominator; 0 below two samples)
    pub running_variance: f64,
}

/// Streaming estimate of one candidate's mean cost
#[derive(Debug, Clone)]
pub struct OnlineEstimate {
    count: u64,
    mean: f64,
    /// Sum of squared deviations from the current mean
    m2: f64,
    /// Interval multiplier, Φ⁻¹(1 − q)
    z: f64,
}

impl Default for OnlineEstimate {
    fn default() -> Self {
        Self::with_multiplier(normal_quantile(1.0 - crate::DEFAULT_TAIL_PROBABILITY))
    }
}

impl OnlineEstimate {
    /// Create an empty estimate for the given one-sided tail probability
    pub fn new(tail_probability: f64) -> Result<Self, StatsError> {
        Ok(Self::with_multiplier(multiplier_for(tail_probability)?))
    }

    fn with_multiplier(z: f64) -> Self {
        Self {
            count: 0,
            mean: 0.0,
            m2: 0.0,
            z,
        }
    }

    /// Restore an estimate from persisted state.
    ///
    /// The restored estimate continues exactly as one grown to the same count
    /// within a single session would.
    pub fn from_state(state: EstimateState, tail_probability: f64) -> Result<Self, StatsError> {
        let z = multiplier_for(tail_probability)?;

        if !state.running_mean.is_finite() {
            return Err(StatsError::InvalidState(format!(
                "non-finite mean {}",
                state.running_mean
            )));
        }
        if !state.running_variance.is_finite() || state.running_variance < 0.0 {
            return Err(StatsError::InvalidState(format!(
                "variance {} is not a finite non-negative number",
                state.running_variance
            )));
        }
        if state.observation_count == 0 && state.running_mean != 0.0 {
            return Err(StatsError::InvalidState(
                "mean recorded without observations".to_string(),
            ));
        }

        let m2 = if state.observation_count >= MIN_VARIANCE_OBSERVATIONS {
            state.running_variance * (state.observation_count - 1) as f64
        } else {
            0.0
        };

        Ok(Self {
            count: state.observation_count,
            mean: state.running_mean,
            m2,
            z,
        })
    }

    /// Snapshot the resumable state
    pub fn state(&self) -> EstimateState {
        EstimateState {
            observation_count: self.count,
            running_mean: self.mean,
            running_variance: self.variance(),
        }
    }

    /// Fold in one sample (Welford update)
    pub fn push(&mut self, x: f64) {
        self.count += 1;
        let delta = x - self.mean;
        self.mean += delta / self.count as f64;
        let delta2 = x - self.mean;
        self.m2 += delta * delta2;
    }

    /// Number of samples folded in
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Running mean (0 before the first sample)
    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// Sample variance; 0 until two samples have been seen
    pub fn variance(&self) -> f64 {
        if self.count < MIN_VARIANCE_OBSERVATIONS {
            0.0
        } else {
            // Rounding in the Welford update can push m2 a hair below zero.
            (self.m2 / (self.count - 1) as f64).max(0.0)
        }
    }

    /// Interval multiplier in use
    pub fn multiplier(&self) -> f64 {
        self.z
    }

    /// Standard error of the mean.
    ///
    /// Infinite until the variance is defined, so an under-sampled candidate
    /// never looks precise or separated.
    pub fn standard_error(&self) -> f64 {
        if self.count < MIN_VARIANCE_OBSERVATIONS {
            f64::INFINITY
        } else {
            (self.variance() / self.count as f64).sqrt()
        }
    }

    /// Confidence half-width, `z · standard_error`
    pub fn half_width(&self) -> f64 {
        self.z * self.standard_error()
    }

    /// Half-width relative to `|mean|`
    pub fn relative_half_width(&self) -> Result<f64, StatsError> {
        if self.mean == 0.0 {
            return Err(StatsError::DivisionUndefined);
        }
        Ok(self.half_width() / self.mean.abs())
    }

    /// Relative half-width with `floor` standing in for a vanishing mean
    pub fn relative_half_width_or(&self, floor: f64) -> f64 {
        let scale = if self.mean == 0.0 {
            floor.abs()
        } else {
            self.mean.abs()
        };
        self.half_width() / scale
    }

    /// Lower interval bound
    pub fn lower_bound(&self) -> f64 {
        self.mean - self.half_width()
    }

    /// Upper interval bound
    pub fn upper_bound(&self) -> f64 {
        self.mean + self.half_width()
    }

    /// Whether this interval lies strictly below `other`'s
    pub fn is_below(&self, other: &Self) -> bool {
        self.upper_bound() < other.lower_bound()
    }

    /// Interval-separation ordering.
    ///
    /// `Some(Less)` or `Some(Greater)` only when the intervals are disjoint;
    /// overlapping intervals are incomparable and yield `None`.
    pub fn interval_cmp(&self, other: &Self) -> Option<Ordering> {
        if self.is_below(other) {
            Some(Ordering::Less)
        } else if other.is_below(self) {
            Some(Ordering::Greater)
        } else {
            None
        }
    }
}

fn multiplier_for(tail_probability: f64) -> Result<f64, StatsError> {
    if !(tail_probability > 0.0 && tail_probability < 0.5) {
        return Err(StatsError::InvalidTailProbability(tail_probability));
    }
    Ok(normal_quantile(1.0 - tail_probability))
}
