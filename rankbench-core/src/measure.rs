//! Timing Sources
//!
//! A [`Clock`] reports two cumulative counters: monotonic wall time and the
//! part of it spent in collector pauses. Trial samples use the difference, so
//! pauses charged by an embedding runtime never count against a candidate.

use std::cell::Cell;
use std::time::Instant;

/// Monotonic clock with separate pause accounting (nanoseconds)
pub trait Clock {
    /// Cumulative wall time since an arbitrary fixed origin
    fn wall_nanos(&self) -> u64;

    /// Cumulative pause time since the same origin
    fn pause_nanos(&self) -> u64 {
        0
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn wall_nanos(&self) -> u64 {
        (**self).wall_nanos()
    }

    fn pause_nanos(&self) -> u64 {
        (**self).pause_nanos()
    }
}

/// Wall clock backed by `std::time::Instant`.
///
/// Rust code has no collector, so pause time is always zero.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    /// Start a clock at the current instant
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    #[inline(always)]
    fn wall_nanos(&self) -> u64 {
        self.origin.elapsed().as_nanos() as u64
    }
}

/// Hand-driven clock.
///
/// Useful for deterministic tests and for hosts that account time themselves.
#[derive(Debug, Default)]
pub struct ManualClock {
    wall: Cell<u64>,
    pause: Cell<u64>,
}

impl ManualClock {
    /// Clock at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance wall time
    pub fn advance(&self, nanos: u64) {
        self.wall.set(self.wall.get() + nanos);
    }

    /// Advance wall time, attributing all of it to a pause
    pub fn pause(&self, nanos: u64) {
        self.advance(nanos);
        self.pause.set(self.pause.get() + nanos);
    }
}

impl Clock for ManualClock {
    fn wall_nanos(&self) -> u64 {
        self.wall.get()
    }

    fn pause_nanos(&self) -> u64 {
        self.pause.get()
    }
}

/// Time spent over one measured span
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Elapsed {
    /// Wall time in nanoseconds
    pub wall_nanos: u64,
    /// Pause time in nanoseconds
    pub pause_nanos: u64,
}

impl Elapsed {
    /// Wall time with pauses removed
    pub fn net_nanos(&self) -> u64 {
        self.wall_nanos.saturating_sub(self.pause_nanos)
    }
}

/// Span timer over a [`Clock`]
pub struct Timer<'c, C: Clock + ?Sized> {
    clock: &'c C,
    wall_start: u64,
    pause_start: u64,
}

impl<'c, C: Clock + ?Sized> Timer<'c, C> {
    /// Start timing
    #[inline(always)]
    pub fn start(clock: &'c C) -> Self {
        let pause_start = clock.pause_nanos();
        let wall_start = clock.wall_nanos();
        Self {
            clock,
            wall_start,
            pause_start,
        }
    }

    /// Time since `start`; the timer keeps running
    #[inline(always)]
    pub fn elapsed(&self) -> Elapsed {
        let wall_nanos = self.clock.wall_nanos().saturating_sub(self.wall_start);
        let pause_nanos = self.clock.pause_nanos().saturating_sub(self.pause_start);
        Elapsed {
            wall_nanos,
            pause_nanos,
        }
    }
}
