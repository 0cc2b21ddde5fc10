//! Multi-Arm Adaptive Refiner
//!
//! Drives one estimate per candidate through rounds. Each round draws exactly
//! one sample from every candidate, in order, with the common random stream
//! rewound before each draw. After `n_min` rounds, a round where every
//! candidate is precise (relative half-width below `rtol`) and the mean
//! ranking is stable (adjacent intervals disjoint) ends the session early.
//! Otherwise the loop stops at `n_max`.
//!
//! ```text
//! round = resumed + 1 ..= n_max
//!   ├─ for each arm: rewind(round) → sample → push
//!   ├─ on_round(round)
//!   ├─ round < n_min ? next
//!   ├─ all precise ? else next
//!   └─ stable ? stop early
//! ```

use crate::random::CommonRandom;
use crate::trial::Trial;
use rankbench_stats::{EstimateState, OnlineEstimate, Ranking, StatsError, all_precise};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Boxed error raised by an observer
pub type ObserverError = Box<dyn std::error::Error + Send + Sync>;

/// Errors from a refinement session
#[derive(Debug, Error)]
pub enum RefineError {
    /// Rejected configuration
    #[error("invalid refiner configuration: {0}")]
    InvalidConfig(String),

    /// Nothing to measure
    #[error("no candidates to refine")]
    NoCandidates,

    /// Resumed state does not line up with the candidates
    #[error("resumed state has {got} estimates for {expected} candidates")]
    ResumeMismatch {
        /// Candidates in this session
        expected: usize,
        /// Estimates supplied
        got: usize,
    },

    /// Resumed estimates disagree on how many rounds were completed
    #[error("resumed estimates have uneven observation counts ({min}..={max})")]
    UnevenResume {
        /// Smallest observation count
        min: u64,
        /// Largest observation count
        max: u64,
    },

    /// Statistical failure, e.g. a zero mean without a floor
    #[error(transparent)]
    Stats(#[from] StatsError),

    /// An observer aborted the session
    #[error("observer failed: {0}")]
    Observer(#[source] ObserverError),
}

/// Refinement parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefineConfig {
    /// Rounds before any stopping check
    pub n_min: u64,
    /// Hard cap on rounds (observations per candidate)
    pub n_max: u64,
    /// Relative half-width every candidate must get below
    pub rtol: f64,
    /// One-sided tail probability for the intervals
    pub tail_probability: f64,
    /// Base seed of the common random stream
    pub seed: u64,
    /// Stand-in for a mean of exactly zero in the precision check
    pub zero_mean_floor: Option<f64>,
}

impl Default for RefineConfig {
    fn default() -> Self {
        Self {
            n_min: 10,
            n_max: 100,
            rtol: 0.05,
            tail_probability: rankbench_stats::DEFAULT_TAIL_PROBABILITY,
            seed: crate::DEFAULT_SEED,
            zero_mean_floor: None,
        }
    }
}

impl RefineConfig {
    /// Check parameter ranges
    pub fn validate(&self) -> Result<(), RefineError> {
        if self.n_min < rankbench_stats::MIN_VARIANCE_OBSERVATIONS {
            return Err(RefineError::InvalidConfig(format!(
                "n_min must be at least {}, got {}",
                rankbench_stats::MIN_VARIANCE_OBSERVATIONS,
                self.n_min
            )));
        }
        if self.n_min > self.n_max {
            return Err(RefineError::InvalidConfig(format!(
                "n_min ({}) exceeds n_max ({})",
                self.n_min, self.n_max
            )));
        }
        if !(self.rtol > 0.0) || !self.rtol.is_finite() {
            return Err(RefineError::InvalidConfig(format!(
                "rtol must be positive and finite, got {}",
                self.rtol
            )));
        }
        if !(self.tail_probability > 0.0 && self.tail_probability < 0.5) {
            return Err(RefineError::InvalidConfig(format!(
                "tail_probability must be in (0, 0.5), got {}",
                self.tail_probability
            )));
        }
        if let Some(floor) = self.zero_mean_floor {
            if !(floor > 0.0) || !floor.is_finite() {
                return Err(RefineError::InvalidConfig(format!(
                    "zero_mean_floor must be positive and finite, got {floor}"
                )));
            }
        }
        Ok(())
    }
}

/// How a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Convergence {
    /// Precise and stable in the same round
    Converged,
    /// Round cap reached with a stable ranking but some interval still too wide
    ImpreciseAtLimit,
    /// Round cap reached without a stable ranking; estimates are best effort
    NonStabilizingRanking,
}

impl std::fmt::Display for Convergence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Convergence::Converged => write!(f, "converged"),
            Convergence::ImpreciseAtLimit => write!(f, "imprecise at round limit"),
            Convergence::NonStabilizingRanking => write!(f, "non-stabilizing ranking"),
        }
    }
}

/// Result of a refinement session
#[derive(Debug, Clone)]
pub struct RefineOutcome {
    /// Final estimates, in candidate order
    pub estimates: Vec<OnlineEstimate>,
    /// Ranking of the final estimates
    pub ranking: Ranking,
    /// Observations per candidate at return
    pub rounds: u64,
    /// Observations per candidate when the session began
    pub resumed_from: u64,
    /// Stop status
    pub convergence: Convergence,
}

impl RefineOutcome {
    /// Whether the final ranking is statistically distinguishable
    pub fn is_stable(&self) -> bool {
        self.ranking.stable
    }

    /// Whether the session ended before the round cap
    pub fn stopped_early(&self, config: &RefineConfig) -> bool {
        self.convergence == Convergence::Converged && self.rounds < config.n_max
    }

    /// Persistable snapshot of every estimate
    pub fn states(&self) -> Vec<EstimateState> {
        self.estimates.iter().map(OnlineEstimate::state).collect()
    }
}

/// Hooks fired during a session
pub trait RefineObserver {
    /// Session picked up from persisted estimates at `round`
    fn on_resume(&mut self, _round: u64) {}

    /// Round `round` finished; every estimate has one more sample
    fn on_round(&mut self, _round: u64, _estimates: &[OnlineEstimate]) -> Result<(), ObserverError> {
        Ok(())
    }

    /// Stopping criteria met at `round`
    fn on_early_stop(&mut self, _round: u64) {}
}

/// Observer that does nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl RefineObserver for NoopObserver {}

/// Observer that reports through `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl RefineObserver for TracingObserver {
    fn on_resume(&mut self, round: u64) {
        info!(round, "resuming refinement");
    }

    fn on_round(&mut self, round: u64, estimates: &[OnlineEstimate]) -> Result<(), ObserverError> {
        debug!(
            round,
            candidates = estimates.len(),
            widest = estimates
                .iter()
                .map(OnlineEstimate::half_width)
                .fold(0.0_f64, f64::max),
            "round complete"
        );
        Ok(())
    }

    fn on_early_stop(&mut self, round: u64) {
        info!(round, "stopping early");
    }
}

/// The adaptive round loop
#[derive(Debug, Clone)]
pub struct Refiner {
    config: RefineConfig,
}

impl Refiner {
    /// Build a refiner from a validated configuration
    pub fn new(config: RefineConfig) -> Result<Self, RefineError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Active configuration
    pub fn config(&self) -> &RefineConfig {
        &self.config
    }

    /// Refine `arms`, optionally continuing from persisted estimates.
    ///
    /// A panic inside a candidate unwinds straight through; the round it
    /// interrupted is lost.
    pub fn run<T: Trial>(
        &self,
        arms: &mut [T],
        resume: Option<&[EstimateState]>,
        observer: &mut dyn RefineObserver,
    ) -> Result<RefineOutcome, RefineError> {
        if arms.is_empty() {
            return Err(RefineError::NoCandidates);
        }

        let mut estimates = self.initial_estimates(arms.len(), resume)?;
        let resumed_from = estimates[0].count();
        if resumed_from > 0 {
            observer.on_resume(resumed_from);
        }

        let mut random = CommonRandom::new(self.config.seed);
        let mut rounds = resumed_from;
        let mut converged = false;

        for round in (resumed_from + 1)..=self.config.n_max {
            for (arm, estimate) in arms.iter_mut().zip(estimates.iter_mut()) {
                let rng = random.rewind(round);
                estimate.push(arm.sample(rng));
            }
            rounds = round;
            observer
                .on_round(round, &estimates)
                .map_err(RefineError::Observer)?;

            if round < self.config.n_min {
                continue;
            }
            if !all_precise(&estimates, self.config.rtol, self.config.zero_mean_floor)? {
                continue;
            }
            if Ranking::of(&estimates).stable {
                observer.on_early_stop(round);
                converged = true;
                break;
            }
        }

        let ranking = Ranking::of(&estimates);
        let convergence = if converged {
            Convergence::Converged
        } else if !ranking.stable {
            Convergence::NonStabilizingRanking
        } else if rounds >= self.config.n_min
            && all_precise(&estimates, self.config.rtol, self.config.zero_mean_floor)?
        {
            // only reachable when resumed at or past the cap
            Convergence::Converged
        } else {
            Convergence::ImpreciseAtLimit
        };

        if convergence == Convergence::NonStabilizingRanking {
            warn!(rounds, "round limit reached without a stable ranking");
        }

        Ok(RefineOutcome {
            estimates,
            ranking,
            rounds,
            resumed_from,
            convergence,
        })
    }

    fn initial_estimates(
        &self,
        arms: usize,
        resume: Option<&[EstimateState]>,
    ) -> Result<Vec<OnlineEstimate>, RefineError> {
        let q = self.config.tail_probability;
        let Some(states) = resume else {
            return (0..arms)
                .map(|_| OnlineEstimate::new(q).map_err(RefineError::from))
                .collect();
        };

        if states.len() != arms {
            return Err(RefineError::ResumeMismatch {
                expected: arms,
                got: states.len(),
            });
        }

        let min = states.iter().map(|s| s.observation_count).min().unwrap_or(0);
        let max = states.iter().map(|s| s.observation_count).max().unwrap_or(0);
        if min != max {
            return Err(RefineError::UnevenResume { min, max });
        }

        states
            .iter()
            .map(|&state| OnlineEstimate::from_state(state, q).map_err(RefineError::from))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RandomSource;
    use rand_distr::{Distribution, Normal};

    /// Synthetic candidate: `mean + sigma * N(0, 1)` drawn from the round stream
    struct Gaussian {
        mean: f64,
        sigma: f64,
    }

    impl Trial for Gaussian {
        fn sample(&mut self, rng: &mut RandomSource) -> f64 {
            let noise: f64 = Normal::new(0.0, 1.0).unwrap().sample(rng);
            self.mean + self.sigma * noise
        }
    }

    fn arms(specs: &[(f64, f64)]) -> Vec<Gaussian> {
        specs
            .iter()
            .map(|&(mean, sigma)| Gaussian { mean, sigma })
            .collect()
    }

    #[derive(Default)]
    struct Recorder {
        resumed: Option<u64>,
        rounds: Vec<u64>,
        stopped: Option<u64>,
    }

    impl RefineObserver for Recorder {
        fn on_resume(&mut self, round: u64) {
            self.resumed = Some(round);
        }

        fn on_round(&mut self, round: u64, estimates: &[OnlineEstimate]) -> Result<(), ObserverError> {
            assert!(estimates.iter().all(|e| e.count() == round));
            self.rounds.push(round);
            Ok(())
        }

        fn on_early_stop(&mut self, round: u64) {
            self.stopped = Some(round);
        }
    }

    #[test]
    fn test_noise_free_stops_at_n_min() {
        let refiner = Refiner::new(RefineConfig {
            n_min: 10,
            ..Default::default()
        })
        .unwrap();
        let mut recorder = Recorder::default();
        let mut arms = arms(&[(2.0, 0.0), (1.0, 0.0)]);

        let outcome = refiner.run(&mut arms, None, &mut recorder).unwrap();

        assert_eq!(outcome.rounds, 10);
        assert_eq!(outcome.convergence, Convergence::Converged);
        assert!(outcome.is_stable());
        assert!(outcome.stopped_early(refiner.config()));
        assert_eq!(outcome.ranking.order, vec![1, 0]);
        assert!((outcome.estimates[0].mean() - 2.0).abs() < 1e-12);
        assert!((outcome.estimates[1].mean() - 1.0).abs() < 1e-12);
        assert_eq!(recorder.stopped, Some(10));
        assert_eq!(recorder.rounds, (1..=10).collect::<Vec<_>>());
        assert_eq!(recorder.resumed, None);
    }

    #[test]
    fn test_close_means_never_stabilize() {
        let refiner = Refiner::new(RefineConfig {
            n_min: 10,
            n_max: 100,
            rtol: 0.01,
            ..Default::default()
        })
        .unwrap();
        let mut arms = arms(&[(1.00, 0.5), (1.01, 0.5), (1.02, 0.5)]);

        let outcome = refiner.run(&mut arms, None, &mut NoopObserver).unwrap();

        assert_eq!(outcome.rounds, 100);
        assert_eq!(outcome.convergence, Convergence::NonStabilizingRanking);
        assert!(!outcome.is_stable());
        assert!(outcome.estimates.iter().all(|e| e.count() == 100));
    }

    #[test]
    fn test_no_stop_before_n_min() {
        let refiner = Refiner::new(RefineConfig {
            n_min: 25,
            n_max: 50,
            ..Default::default()
        })
        .unwrap();
        let mut arms = arms(&[(1.0, 0.0), (5.0, 0.0)]);

        let outcome = refiner.run(&mut arms, None, &mut NoopObserver).unwrap();
        assert_eq!(outcome.rounds, 25);
    }

    #[test]
    fn test_precision_alone_does_not_stop() {
        // identical candidates are precise but never separated
        let refiner = Refiner::new(RefineConfig {
            n_min: 5,
            n_max: 40,
            rtol: 0.5,
            ..Default::default()
        })
        .unwrap();
        let mut arms = arms(&[(10.0, 0.1), (10.0, 0.1)]);

        let outcome = refiner.run(&mut arms, None, &mut NoopObserver).unwrap();
        assert_eq!(outcome.rounds, 40);
        assert_eq!(outcome.convergence, Convergence::NonStabilizingRanking);
    }

    #[test]
    fn test_stable_but_imprecise_at_limit() {
        let refiner = Refiner::new(RefineConfig {
            n_min: 5,
            n_max: 30,
            rtol: 1e-6,
            ..Default::default()
        })
        .unwrap();
        let mut arms = arms(&[(1.0, 0.01), (100.0, 0.01)]);

        let outcome = refiner.run(&mut arms, None, &mut NoopObserver).unwrap();
        assert_eq!(outcome.rounds, 30);
        assert_eq!(outcome.convergence, Convergence::ImpreciseAtLimit);
        assert!(outcome.is_stable());
    }

    #[test]
    fn test_resume_matches_uninterrupted_run() {
        let specs = [(3.0, 0.8), (3.5, 0.8), (2.0, 0.3)];
        let no_stop = |n: u64| RefineConfig {
            n_min: n,
            n_max: n,
            ..Default::default()
        };

        let full = Refiner::new(no_stop(50))
            .unwrap()
            .run(&mut arms(&specs), None, &mut NoopObserver)
            .unwrap();

        let head = Refiner::new(no_stop(20))
            .unwrap()
            .run(&mut arms(&specs), None, &mut NoopObserver)
            .unwrap();
        let states = head.states();

        let mut recorder = Recorder::default();
        let tail = Refiner::new(no_stop(50))
            .unwrap()
            .run(&mut arms(&specs), Some(states.as_slice()), &mut recorder)
            .unwrap();

        assert_eq!(recorder.resumed, Some(20));
        assert_eq!(recorder.rounds.first(), Some(&21));
        assert_eq!(tail.resumed_from, 20);
        assert_eq!(tail.rounds, 50);
        for (a, b) in full.estimates.iter().zip(&tail.estimates) {
            assert_eq!(a.count(), b.count());
            assert!((a.mean() - b.mean()).abs() < 1e-9);
            assert!((a.variance() - b.variance()).abs() < 1e-9);
        }
    }

    #[test]
    fn test_resume_past_cap_runs_nothing() {
        let specs = [(1.0, 0.0), (2.0, 0.0)];
        let first = Refiner::new(RefineConfig {
            n_min: 15,
            n_max: 15,
            ..Default::default()
        })
        .unwrap()
        .run(&mut arms(&specs), None, &mut NoopObserver)
        .unwrap();

        let mut recorder = Recorder::default();
        let again = Refiner::new(RefineConfig {
            n_min: 5,
            n_max: 10,
            ..Default::default()
        })
        .unwrap()
        .run(&mut arms(&specs), Some(first.states().as_slice()), &mut recorder)
        .unwrap();

        assert!(recorder.rounds.is_empty());
        assert_eq!(again.rounds, 15);
        assert_eq!(again.convergence, Convergence::Converged);
    }

    #[test]
    fn test_common_random_numbers_within_round() {
        // equal sigma and shared stream: differences are exactly the mean gaps
        let refiner = Refiner::new(RefineConfig {
            n_min: 30,
            n_max: 30,
            ..Default::default()
        })
        .unwrap();
        let mut arms = arms(&[(1.0, 0.5), (2.0, 0.5)]);

        let outcome = refiner.run(&mut arms, None, &mut NoopObserver).unwrap();
        let gap = outcome.estimates[1].mean() - outcome.estimates[0].mean();
        assert!((gap - 1.0).abs() < 1e-9);
        assert!((outcome.estimates[0].variance() - outcome.estimates[1].variance()).abs() < 1e-9);
    }

    #[test]
    fn test_zero_mean_requires_floor() {
        let config = RefineConfig {
            n_min: 3,
            n_max: 10,
            ..Default::default()
        };
        let mut zero = arms(&[(0.0, 0.0), (0.0, 0.0)]);

        let err = Refiner::new(config.clone())
            .unwrap()
            .run(&mut zero, None, &mut NoopObserver)
            .unwrap_err();
        assert!(matches!(err, RefineError::Stats(StatsError::DivisionUndefined)));

        let floored = Refiner::new(RefineConfig {
            zero_mean_floor: Some(1e-9),
            ..config
        })
        .unwrap()
        .run(&mut zero, None, &mut NoopObserver)
        .unwrap();
        assert_eq!(floored.rounds, 10);
        assert!(!floored.is_stable());
    }

    #[test]
    fn test_resume_validation() {
        let refiner = Refiner::new(RefineConfig::default()).unwrap();
        let state = |n| EstimateState {
            observation_count: n,
            running_mean: 1.0,
            running_variance: 0.1,
        };

        let err = refiner
            .run(&mut arms(&[(1.0, 0.1), (2.0, 0.1)]), Some(&[state(3)][..]), &mut NoopObserver)
            .unwrap_err();
        assert!(matches!(err, RefineError::ResumeMismatch { expected: 2, got: 1 }));

        let err = refiner
            .run(
                &mut arms(&[(1.0, 0.1), (2.0, 0.1)]),
                Some(&[state(3), state(4)][..]),
                &mut NoopObserver,
            )
            .unwrap_err();
        assert!(matches!(err, RefineError::UnevenResume { min: 3, max: 4 }));
    }

    #[test]
    fn test_no_candidates() {
        let refiner = Refiner::new(RefineConfig::default()).unwrap();
        let mut none: Vec<Gaussian> = Vec::new();
        assert!(matches!(
            refiner.run(&mut none, None, &mut NoopObserver),
            Err(RefineError::NoCandidates)
        ));
    }

    #[test]
    fn test_config_validation() {
        let bad = [
            RefineConfig {
                n_min: 0,
                ..Default::default()
            },
            // a single round leaves every interval unbounded
            RefineConfig {
                n_min: 1,
                n_max: 1,
                ..Default::default()
            },
            RefineConfig {
                n_min: 20,
                n_max: 10,
                ..Default::default()
            },
            RefineConfig {
                rtol: 0.0,
                ..Default::default()
            },
            RefineConfig {
                tail_probability: 0.6,
                ..Default::default()
            },
            RefineConfig {
                zero_mean_floor: Some(0.0),
                ..Default::default()
            },
        ];
        for config in bad {
            assert!(matches!(
                Refiner::new(config),
                Err(RefineError::InvalidConfig(_))
            ));
        }
    }

    #[test]
    fn test_observer_failure_aborts() {
        struct Failing;
        impl RefineObserver for Failing {
            fn on_round(&mut self, round: u64, _: &[OnlineEstimate]) -> Result<(), ObserverError> {
                if round == 3 {
                    return Err("disk full".into());
                }
                Ok(())
            }
        }

        let refiner = Refiner::new(RefineConfig::default()).unwrap();
        let err = refiner
            .run(&mut arms(&[(1.0, 0.1)]), None, &mut Failing)
            .unwrap_err();
        assert!(matches!(err, RefineError::Observer(_)));
    }

    #[test]
    #[should_panic(expected = "candidate exploded")]
    fn test_candidate_panic_propagates() {
        struct Exploding;
        impl Trial for Exploding {
            fn sample(&mut self, _rng: &mut RandomSource) -> f64 {
                panic!("candidate exploded");
            }
        }

        let refiner = Refiner::new(RefineConfig::default()).unwrap();
        let _ = refiner.run(&mut [Exploding], None, &mut NoopObserver);
    }
}
