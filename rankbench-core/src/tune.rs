//! Repeat-Count Tuning
//!
//! Picks how many calls make up one trial sample so that a sample costs about
//! a given wall-time budget. This is a single wall-clock pass, not an
//! estimator: the two warm-up calls are charged against the budget, then calls
//! are made until the budget is spent, and the number of completed calls after
//! warm-up is the answer.

use crate::RandomSource;
use crate::measure::{Clock, Timer};
use std::hint::black_box;
use tracing::{debug, warn};

/// Untimed calls made before counting
pub const WARMUP_CALLS: u32 = 2;

/// Calibrate the per-sample repeat count for `call` against `budget_nanos`.
///
/// Returns 0 when the warm-up calls alone exhaust the budget; pass the result
/// through [`effective_repeats`] before building a runner.
pub fn tune<F, T, C>(mut call: F, budget_nanos: u64, rng: &mut RandomSource, clock: &C) -> u64
where
    F: FnMut(&mut RandomSource) -> T,
    C: Clock + ?Sized,
{
    let timer = Timer::start(clock);
    for _ in 0..WARMUP_CALLS {
        black_box(call(rng));
    }

    let warmup_nanos = timer.elapsed().wall_nanos;
    if warmup_nanos >= budget_nanos {
        warn!(
            warmup_nanos,
            budget_nanos, "warm-up alone exhausted the tuning budget; one call per sample will overshoot"
        );
        return 0;
    }

    let mut repeats = 0u64;
    while timer.elapsed().wall_nanos < budget_nanos {
        black_box(call(rng));
        repeats += 1;
    }

    debug!(repeats, budget_nanos, warmup_nanos, "tuned repeat count");
    repeats
}

/// Repeat count to actually use: at least one call per sample
pub fn effective_repeats(tuned: u64) -> u64 {
    tuned.max(1)
}
