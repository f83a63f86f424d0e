//! Randomized phase thresholds.
//!
//! Nodes never read a clock. Each phase ends when its progress counter
//! reaches a threshold drawn from one of two ranges, and every draw goes
//! through a [`TimerSource`] so a run is reproducible from its seed.

use std::ops::Range;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::config::TimerConfig;

/// Source of phase thresholds.
///
/// Implementations must be deterministic for a given construction: the
/// engine relies on identical draws to replay identical histories.
pub trait TimerSource {
    /// Threshold for a leader's heartbeat interval, nominally in `[50, 100)`.
    fn heartbeat_threshold(&mut self) -> f64;

    /// Threshold for an election timeout, nominally in `[100, 150)`.
    fn election_threshold(&mut self) -> f64;

    /// Copy of the source at its current position in the stream. The copy
    /// yields exactly the draws the original would yield next.
    fn clone_timers(&self) -> Box<dyn TimerSource>;
}

// ── Seeded ────────────────────────────────────────────────────────────

/// Uniform draws from a ChaCha8 stream seeded with a `u64`.
#[derive(Debug, Clone)]
pub struct SeededTimers {
    rng: ChaCha8Rng,
    ranges: TimerConfig,
}

impl SeededTimers {
    /// Timers with the default ranges.
    pub fn new(seed: u64) -> Self {
        Self::with_ranges(seed, TimerConfig::default())
    }

    /// Timers drawing from custom ranges.
    pub fn with_ranges(seed: u64, ranges: TimerConfig) -> Self {
        SeededTimers {
            rng: ChaCha8Rng::seed_from_u64(seed),
            ranges,
        }
    }

    fn draw(&mut self, range: Range<f64>) -> f64 {
        // An empty range would panic inside `gen_range`.
        if range.start < range.end {
            self.rng.gen_range(range)
        } else {
            range.start
        }
    }
}

impl TimerSource for SeededTimers {
    fn heartbeat_threshold(&mut self) -> f64 {
        let range = self.ranges.heartbeat.clone();
        self.draw(range)
    }

    fn election_threshold(&mut self) -> f64 {
        let range = self.ranges.election.clone();
        self.draw(range)
    }

    fn clone_timers(&self) -> Box<dyn TimerSource> {
        Box::new(self.clone())
    }
}

// ── Fixed ─────────────────────────────────────────────────────────────

/// Constant thresholds, for scenarios that must not depend on randomness.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedTimers {
    pub heartbeat: f64,
    pub election: f64,
}

impl FixedTimers {
    pub fn new(heartbeat: f64, election: f64) -> Self {
        FixedTimers { heartbeat, election }
    }
}

impl TimerSource for FixedTimers {
    fn heartbeat_threshold(&mut self) -> f64 {
        self.heartbeat
    }

    fn election_threshold(&mut self) -> f64 {
        self.election
    }

    fn clone_timers(&self) -> Box<dyn TimerSource> {
        Box::new(*self)
    }
}
