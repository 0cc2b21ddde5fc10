#![warn(missing_docs)]
//! RankBench - Adaptive Sequential Benchmarking
//!
//! Ranks competing implementations of the same function by mean cost. Every
//! candidate is sampled once per round under a shared random stream; sampling
//! stops as soon as all estimates are precise and the confidence intervals of
//! every pair of neighbours in mean order are disjoint, or when the round cap
//! is reached. Candidates that are not neighbours are never compared directly.
//!
//! # Example
//!
//! ```ignore
//! use rankbench::prelude::*;
//!
//! let config = RankConfig::discover().unwrap_or_default();
//! rankbench::init_logging(false);
//!
//! let repeats = tune(|rng| forward(rng), config.budget_nanos()?, &mut rng, &MonotonicClock::new());
//! let record = Benchmark::new(config.refiner.clone())
//!     .tags(config.metadata.clone())
//!     .candidate("forward", Vec::new(), |rng, buf| forward_into(rng, buf))
//!     .candidate("reverse", Vec::new(), |rng, buf| reverse_into(rng, buf))
//!     .run(repeats, None)?;
//!
//! println!("{}", record.to_json()?);
//! ```

mod config;
mod orchestrator;
mod record;

pub use config::{CONFIG_FILE, RankConfig, StoreCodec, StoreConfig, TuningConfig};
pub use orchestrator::{BenchError, Benchmark};
pub use record::{BenchmarkRecord, CandidateSummary};

pub use rankbench_core::{
    Clock, CommonRandom, Convergence, DEFAULT_SEED, Elapsed, ManualClock, MonotonicClock,
    NoopObserver, ObserverError, RandomSource, RefineConfig, RefineError, RefineObserver,
    RefineOutcome, Refiner, Timer, TracingObserver, Trial, TrialRunner, WARMUP_CALLS,
    effective_repeats, tune,
};
pub use rankbench_stats::{EstimateState, OnlineEstimate, Ranking, StatsError, normal_quantile};
pub use rankbench_store::{
    Backend, Cache, CacheKey, Codec, DirBackend, EstimateStore, JsonCodec, MemoryBackend,
    SessionId, SessionSnapshot, StoreError, TomlCodec,
};

/// Install a `tracing` fmt subscriber filtered to the rankbench crates.
///
/// Does nothing if a global subscriber is already set.
pub fn init_logging(verbose: bool) {
    let filter = if verbose {
        "rankbench=debug"
    } else {
        "rankbench=info"
    };
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        BenchError, Benchmark, BenchmarkRecord, Convergence, MonotonicClock, RandomSource,
        RankConfig, RefineConfig, SessionId, effective_repeats, tune,
    };
}
