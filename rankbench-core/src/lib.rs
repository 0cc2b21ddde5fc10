#![warn(missing_docs)]
//! RankBench Core - Measurement Runtime
//!
//! This crate drives the measurement side of a ranking session:
//! - `Clock` abstraction separating wall time from collector pause time
//! - `CommonRandom` for common-random-numbers seeding across candidates
//! - `TrialRunner` producing one per-call timing sample per draw
//! - `tune` to calibrate how many calls make up one sample
//! - `Refiner`, the round-based adaptive loop with precision and stability stopping

mod measure;
mod random;
mod refiner;
mod trial;
mod tune;

pub use measure::{Clock, Elapsed, ManualClock, MonotonicClock, Timer};
pub use random::CommonRandom;
pub use refiner::{
    Convergence, NoopObserver, ObserverError, RefineConfig, RefineError, RefineObserver,
    RefineOutcome, Refiner, TracingObserver,
};
pub use trial::{Trial, TrialRunner};
pub use tune::{WARMUP_CALLS, effective_repeats, tune};

/// Random source handed to every candidate call
pub type RandomSource = rand::rngs::StdRng;

/// Default base seed for the common random stream
pub const DEFAULT_SEED: u64 = 0x5eed_f00d_cafe_beef;
