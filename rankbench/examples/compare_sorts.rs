//! Rank three ways of sorting the same random input.
//!
//! Settings come from a `rankbench.toml` found above the working directory,
//! or from the defaults. Estimates are persisted per session, so running this
//! again with a larger `n_max` continues where the last run stopped.

use rand::Rng;
use rankbench::prelude::*;
use rankbench::{CommonRandom, EstimateStore};

const LEN: usize = 2_048;

fn fill(rng: &mut RandomSource, buf: &mut Vec<u32>) {
    buf.clear();
    buf.extend((0..LEN).map(|_| rng.gen_range(0..u32::MAX)));
}

fn main() -> anyhow::Result<()> {
    rankbench::init_logging(std::env::var_os("RANKBENCH_VERBOSE").is_some());

    let config = RankConfig::discover().unwrap_or_default();
    let budget = config.budget_nanos()?;

    let mut random = CommonRandom::new(config.refiner.seed);
    let mut probe = Vec::with_capacity(LEN);
    let repeats = tune(
        |rng| {
            fill(rng, &mut probe);
            probe.sort_unstable();
        },
        budget,
        random.rewind(0),
        &MonotonicClock::new(),
    );

    let session = SessionId::new("compare-sorts")?;
    let mut store = config.open_store();
    if let Some(rounds) = store.load_estimates(&session)?.and_then(|s| s.rounds()) {
        println!("resuming after {rounds} rounds");
    }

    let record = Benchmark::new(config.refiner.clone())
        .tags(config.metadata.clone())
        .tag("input_len", LEN.to_string())
        .candidate("sort", Vec::with_capacity(LEN), |rng, buf: &mut Vec<u32>| {
            fill(rng, buf);
            buf.sort();
        })
        .candidate("sort_unstable", Vec::with_capacity(LEN), |rng, buf: &mut Vec<u32>| {
            fill(rng, buf);
            buf.sort_unstable();
        })
        .candidate("binary_heap", Vec::with_capacity(LEN), |rng, buf: &mut Vec<u32>| {
            fill(rng, buf);
            std::collections::BinaryHeap::from(std::mem::take(buf)).into_sorted_vec()
        })
        .run_with_store(repeats, &mut store, &session)?;

    if record.is_low_confidence() {
        println!("ranking is not significant after {} rounds", record.rounds);
    }
    println!("{}", record.to_json()?);
    Ok(())
}
