//! Benchmark Orchestrator
//!
//! Wires named candidates into trial runners and submits them together to one
//! refinement session.
//!
//! ## Data Flow
//!
//! ```text
//! Benchmark::candidate(name, scratch, call)   (one per competitor)
//!        │
//!        ▼
//!   TrialRunner per candidate  ← shared repeat count (from `tune`)
//!        │
//!        ▼
//! ┌──────────────────┐
//! │     Refiner      │  rounds → precision + stability → stop
//! └────────┬─────────┘
//!          │        ↘ optional EstimateStore: resume + save per round
//!          ▼
//!  BenchmarkRecord (name → estimate, merged with metadata tags)
//! ```

use crate::record::BenchmarkRecord;
use rankbench_core::{
    Clock, MonotonicClock, ObserverError, RandomSource, RefineConfig, RefineError, RefineObserver,
    Refiner, TracingObserver, Trial, TrialRunner,
};
use rankbench_stats::OnlineEstimate;
use rankbench_store::{EstimateStore, SessionId, SessionSnapshot, StoreError};
use std::collections::{BTreeMap, HashSet};
use thiserror::Error;
use tracing::info;

/// Errors from a benchmark session
#[derive(Debug, Error)]
pub enum BenchError {
    /// No candidates were registered
    #[error("benchmark has no candidates")]
    NoCandidates,

    /// Two candidates share a name
    #[error("duplicate candidate name: {0}")]
    DuplicateCandidate(String),

    /// Resume snapshot lists a different candidate set
    #[error("snapshot candidates {found:?} do not match {expected:?}")]
    SnapshotMismatch {
        /// Candidates registered now
        expected: Vec<String>,
        /// Candidates in the snapshot
        found: Vec<String>,
    },

    /// Refinement failed
    #[error(transparent)]
    Refine(#[from] RefineError),

    /// Loading or saving estimates failed
    #[error(transparent)]
    Store(#[from] StoreError),
}

type ArmFactory<'a, C> = Box<dyn FnOnce(u64, C) -> Box<dyn Trial + 'a> + 'a>;

/// A named set of competing candidates plus session settings
pub struct Benchmark<'a, C = MonotonicClock> {
    config: RefineConfig,
    clock: C,
    metadata: BTreeMap<String, String>,
    candidates: Vec<(String, ArmFactory<'a, C>)>,
}

impl<'a> Benchmark<'a, MonotonicClock> {
    /// New benchmark timed by the monotonic wall clock
    pub fn new(config: RefineConfig) -> Self {
        Self::with_clock(config, MonotonicClock::new())
    }
}

impl<'a, C: Clock + Clone + 'a> Benchmark<'a, C> {
    /// New benchmark timed by `clock`
    pub fn with_clock(config: RefineConfig, clock: C) -> Self {
        Self {
            config,
            clock,
            metadata: BTreeMap::new(),
            candidates: Vec::new(),
        }
    }

    /// Register a candidate.
    ///
    /// `scratch` is owned by this candidate alone for the whole session and
    /// handed to every call; `call` receives the round's common random stream.
    pub fn candidate<S, F, T>(mut self, name: impl Into<String>, scratch: S, call: F) -> Self
    where
        S: 'a,
        F: FnMut(&mut RandomSource, &mut S) -> T + 'a,
    {
        let factory: ArmFactory<'a, C> = Box::new(move |repeats, clock| {
            Box::new(TrialRunner::new(scratch, call, repeats, clock)) as Box<dyn Trial + 'a>
        });
        self.candidates.push((name.into(), factory));
        self
    }

    /// Attach a static metadata tag to the result record
    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Attach several tags
    pub fn tags<K, V>(mut self, tags: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.metadata
            .extend(tags.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Registered candidate names, in registration order
    pub fn names(&self) -> Vec<&str> {
        self.candidates.iter().map(|(name, _)| name.as_str()).collect()
    }

    /// Run one session, optionally resuming from a snapshot.
    ///
    /// A repeat count of 0 (budget exhausted during tuning) runs one call per sample.
    pub fn run(
        self,
        repeat_count: u64,
        resume_from: Option<&SessionSnapshot>,
    ) -> Result<BenchmarkRecord, BenchError> {
        self.run_observed(repeat_count, resume_from, &mut TracingObserver)
    }

    /// Run one session with a caller-supplied observer
    pub fn run_observed(
        self,
        repeat_count: u64,
        resume_from: Option<&SessionSnapshot>,
        observer: &mut dyn RefineObserver,
    ) -> Result<BenchmarkRecord, BenchError> {
        let refiner = Refiner::new(self.config.clone())?;
        let repeat_count = rankbench_core::effective_repeats(repeat_count);
        let (names, mut arms, metadata) = self.build(repeat_count)?;

        let resume = match resume_from {
            Some(snapshot) => Some(snapshot.aligned_to(&names).ok_or_else(|| {
                BenchError::SnapshotMismatch {
                    expected: names.clone(),
                    found: snapshot.names.clone(),
                }
            })?),
            None => None,
        };

        info!(
            candidates = names.len(),
            repeat_count,
            resumed = resume.is_some(),
            "starting benchmark session"
        );
        let outcome = refiner.run(arms.as_mut_slice(), resume.as_deref(), observer)?;
        info!(
            rounds = outcome.rounds,
            convergence = %outcome.convergence,
            "benchmark session finished"
        );

        Ok(BenchmarkRecord::from_outcome(
            &names,
            &outcome,
            repeat_count,
            metadata,
        ))
    }

    /// Run one session persisted under `session`.
    ///
    /// Picks up from the stored snapshot when there is one, and saves the
    /// estimates after every completed round so an aborted process loses at
    /// most the round in flight.
    pub fn run_with_store<S: EstimateStore>(
        self,
        repeat_count: u64,
        store: &mut S,
        session: &SessionId,
    ) -> Result<BenchmarkRecord, BenchError> {
        let snapshot = store.load_estimates(session)?;
        let names: Vec<String> = self.names().into_iter().map(String::from).collect();

        let mut observer = PersistingObserver {
            store,
            session,
            names: &names,
            inner: TracingObserver,
        };
        let mut record = self.run_observed(repeat_count, snapshot.as_ref(), &mut observer)?;
        record.session = Some(session.to_string());
        Ok(record)
    }

    fn build(
        self,
        repeat_count: u64,
    ) -> Result<(Vec<String>, Vec<Box<dyn Trial + 'a>>, BTreeMap<String, String>), BenchError> {
        if self.candidates.is_empty() {
            return Err(BenchError::NoCandidates);
        }

        let mut seen = HashSet::new();
        for (name, _) in &self.candidates {
            if !seen.insert(name.as_str()) {
                return Err(BenchError::DuplicateCandidate(name.clone()));
            }
        }

        let mut names = Vec::with_capacity(self.candidates.len());
        let mut arms = Vec::with_capacity(self.candidates.len());
        for (name, factory) in self.candidates {
            names.push(name);
            arms.push(factory(repeat_count, self.clock.clone()));
        }
        Ok((names, arms, self.metadata))
    }
}

/// Saves a snapshot after every round, then defers to `inner`
struct PersistingObserver<'s, S> {
    store: &'s mut S,
    session: &'s SessionId,
    names: &'s [String],
    inner: TracingObserver,
}

impl<S: EstimateStore> RefineObserver for PersistingObserver<'_, S> {
    fn on_resume(&mut self, round: u64) {
        self.inner.on_resume(round);
    }

    fn on_round(&mut self, round: u64, estimates: &[OnlineEstimate]) -> Result<(), ObserverError> {
        let snapshot = SessionSnapshot::new(
            self.names.to_vec(),
            estimates.iter().map(OnlineEstimate::state).collect(),
        );
        self.store.save_estimates(self.session, &snapshot)?;
        self.inner.on_round(round, estimates)
    }

    fn on_early_stop(&mut self, round: u64) {
        self.inner.on_early_stop(round);
    }
}
