//! Timed Trial Runner
//!
//! One [`Trial::sample`] is one observation for the estimator: the net time of
//! `repeats` back-to-back calls divided by `repeats`. The first sample is
//! preceded by an untimed warm-up call so one-time setup (lazy statics, page
//! faults, cold caches) stays out of the measurements.

use crate::RandomSource;
use crate::measure::{Clock, Timer};
use std::hint::black_box;

/// A source of per-call cost samples
pub trait Trial {
    /// Draw one sample (nanoseconds per call) using the given random stream
    fn sample(&mut self, rng: &mut RandomSource) -> f64;
}

impl<T: Trial + ?Sized> Trial for Box<T> {
    fn sample(&mut self, rng: &mut RandomSource) -> f64 {
        (**self).sample(rng)
    }
}

impl<T: Trial + ?Sized> Trial for &mut T {
    fn sample(&mut self, rng: &mut RandomSource) -> f64 {
        (**self).sample(rng)
    }
}

/// Times a candidate callable over its own scratch state.
///
/// The scratch value is owned by the runner and reused for every call, so
/// buffers allocated once are not re-allocated inside the timed region.
pub struct TrialRunner<S, F, C> {
    scratch: S,
    call: F,
    repeats: u64,
    clock: C,
    warmed_up: bool,
}

impl<S, F, T, C> TrialRunner<S, F, C>
where
    F: FnMut(&mut RandomSource, &mut S) -> T,
    C: Clock,
{
    /// Create a runner; a repeat count of 0 is raised to 1
    pub fn new(scratch: S, call: F, repeats: u64, clock: C) -> Self {
        Self {
            scratch,
            call,
            repeats: repeats.max(1),
            clock,
            warmed_up: false,
        }
    }

    /// Calls per sample
    pub fn repeats(&self) -> u64 {
        self.repeats
    }

    /// Whether the warm-up call has happened
    pub fn is_warmed_up(&self) -> bool {
        self.warmed_up
    }

    /// Scratch state as left by the latest call
    pub fn scratch(&self) -> &S {
        &self.scratch
    }

    /// Run the untimed warm-up call now instead of lazily
    pub fn warm_up(&mut self, rng: &mut RandomSource) {
        black_box((self.call)(rng, &mut self.scratch));
        self.warmed_up = true;
    }
}

impl<S, F, T, C> Trial for TrialRunner<S, F, C>
where
    F: FnMut(&mut RandomSource, &mut S) -> T,
    C: Clock,
{
    fn sample(&mut self, rng: &mut RandomSource) -> f64 {
        if !self.warmed_up {
            // warm up on a copy so the timed calls see the round stream from its start
            self.warm_up(&mut rng.clone());
        }

        let timer = Timer::start(&self.clock);
        for _ in 0..self.repeats {
            black_box((self.call)(rng, &mut self.scratch));
        }
        let elapsed = timer.elapsed();

        elapsed.net_nanos() as f64 / self.repeats as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::measure::ManualClock;
    use rand::{Rng, SeedableRng};

    #[test]
    fn test_sample_is_per_call_average() {
        let clock = ManualClock::new();
        let mut runner = TrialRunner::new(
            0u64,
            |_rng: &mut RandomSource, calls: &mut u64| {
                *calls += 1;
                clock.advance(250);
            },
            4,
            &clock,
        );
        let mut rng = RandomSource::seed_from_u64(1);

        let sample = runner.sample(&mut rng);
        assert!((sample - 250.0).abs() < f64::EPSILON);
        // warm-up plus four timed calls
        assert_eq!(*runner.scratch(), 5);
    }

    #[test]
    fn test_warm_up_only_once() {
        let clock = ManualClock::new();
        let mut runner = TrialRunner::new(
            0u64,
            |_rng: &mut RandomSource, calls: &mut u64| *calls += 1,
            3,
            &clock,
        );
        let mut rng = RandomSource::seed_from_u64(1);

        assert!(!runner.is_warmed_up());
        runner.sample(&mut rng);
        runner.sample(&mut rng);
        assert!(runner.is_warmed_up());
        assert_eq!(*runner.scratch(), 1 + 3 + 3);
    }

    #[test]
    fn test_warm_up_not_timed() {
        let clock = ManualClock::new();
        let mut first = true;
        let mut runner = TrialRunner::new(
            (),
            |_rng: &mut RandomSource, _: &mut ()| {
                // cold first call is expensive
                clock.advance(if first { 1_000_000 } else { 10 });
                first = false;
            },
            1,
            &clock,
        );
        let mut rng = RandomSource::seed_from_u64(1);
        assert!((runner.sample(&mut rng) - 10.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_pause_time_excluded() {
        let clock = ManualClock::new();
        let mut runner = TrialRunner::new(
            (),
            |_rng: &mut RandomSource, _: &mut ()| {
                clock.advance(100);
                clock.pause(900);
            },
            2,
            &clock,
        );
        let mut rng = RandomSource::seed_from_u64(1);
        assert!((runner.sample(&mut rng) - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_zero_repeats_raised_to_one() {
        let clock = ManualClock::new();
        let runner = TrialRunner::new((), |_rng: &mut RandomSource, _: &mut ()| (), 0, &clock);
        assert_eq!(runner.repeats(), 1);
    }

    #[test]
    fn test_warm_up_leaves_round_stream_intact() {
        let clock = ManualClock::new();
        let mut runner = TrialRunner::new(
            Vec::new(),
            |rng: &mut RandomSource, seen: &mut Vec<u32>| seen.push(rng.gen_range(0..1000)),
            2,
            &clock,
        );
        let mut rng = RandomSource::seed_from_u64(9);
        runner.sample(&mut rng);

        let mut replay = RandomSource::seed_from_u64(9);
        let first = replay.gen_range(0..1000);
        let second = replay.gen_range(0..1000);
        // warm-up draw, then the two timed draws replaying the same stream
        assert_eq!(runner.scratch(), &vec![first, first, second]);
    }
}
