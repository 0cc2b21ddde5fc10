//! Ranking and Stopping Checks
//!
//! Pure functions of the current estimates. Evaluating them twice without new
//! samples gives the same answer.

use crate::estimate::{OnlineEstimate, StatsError};

/// Order of candidates by current mean, plus whether that order is significant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ranking {
    /// Candidate indices, cheapest mean first
    pub order: Vec<usize>,
    /// Every adjacent pair in `order` has disjoint intervals
    pub stable: bool,
}

impl Ranking {
    /// Rank a set of estimates
    pub fn of(estimates: &[OnlineEstimate]) -> Self {
        let order = rank_by_mean(estimates);
        let stable = adjacent_separated(estimates, &order);
        Self { order, stable }
    }

    /// Zero-based rank of candidate `index`
    pub fn position(&self, index: usize) -> Option<usize> {
        self.order.iter().position(|&i| i == index)
    }
}

/// Candidate indices sorted by ascending mean (ties keep input order)
pub fn rank_by_mean(estimates: &[OnlineEstimate]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..estimates.len()).collect();
    order.sort_by(|&a, &b| estimates[a].mean().total_cmp(&estimates[b].mean()));
    order
}

/// Whether the mean ordering is statistically distinguishable.
///
/// Only neighbours in sorted order are compared, not every pair.
pub fn is_stable(estimates: &[OnlineEstimate]) -> bool {
    adjacent_separated(estimates, &rank_by_mean(estimates))
}

fn adjacent_separated(estimates: &[OnlineEstimate], order: &[usize]) -> bool {
    order
        .windows(2)
        .all(|pair| estimates[pair[0]].is_below(&estimates[pair[1]]))
}

/// Whether every relative half-width is below `rtol`.
///
/// With `zero_mean_floor` set, a mean of exactly zero is replaced by the floor;
/// without it such a candidate fails with [`StatsError::DivisionUndefined`].
pub fn all_precise(
    estimates: &[OnlineEstimate],
    rtol: f64,
    zero_mean_floor: Option<f64>,
) -> Result<bool, StatsError> {
    for est in estimates {
        let relative = match zero_mean_floor {
            Some(floor) => est.relative_half_width_or(floor),
            None => est.relative_half_width()?,
        };
        if !(relative < rtol) {
            return Ok(false);
        }
    }
    Ok(true)
}
