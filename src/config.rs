//! Simulation configuration.
//!
//! Every constant that shapes a run lives here so a scenario can be
//! described in one value and loaded from JSON by the outer layer.

use std::ops::Range;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{TribuneError, TribuneResult};

// ── Timer Config ──────────────────────────────────────────────────────

/// Ranges the randomized timers draw from. Both are half-open.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimerConfig {
    /// Leader heartbeat interval, also reused as the follower wait after
    /// a heartbeat arrives.
    pub heartbeat: Range<f64>,
    /// Election timeout for followers and candidates.
    pub election: Range<f64>,
}

impl Default for TimerConfig {
    fn default() -> Self {
        TimerConfig {
            heartbeat: 50.0..100.0,
            election: 100.0..150.0,
        }
    }
}

// ── Sim Config ────────────────────────────────────────────────────────

/// Configuration for a simulation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Real-time interval between ticks at speed 1, in milliseconds.
    pub base_interval_ms: u64,
    /// Speed multiplier used until the outer layer changes it.
    pub default_speed: f64,
    /// Lowest accepted speed.
    pub min_speed: f64,
    /// Highest accepted speed.
    pub max_speed: f64,
    /// Distance every in-flight packet covers per tick.
    pub packet_step: f64,
    /// Phase progress per tick for followers and candidates.
    pub base_step: f64,
    /// Phase progress per tick for leaders.
    pub heartbeat_step: f64,
    /// Threshold ranges for the randomized timers.
    pub timers: TimerConfig,
    /// Seed for the default timer source.
    pub seed: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        SimConfig {
            base_interval_ms: 100,
            default_speed: 3.0,
            min_speed: 0.5,
            max_speed: 10.0,
            packet_step: 10.0,
            base_step: 1.0,
            heartbeat_step: 2.0,
            timers: TimerConfig::default(),
            seed: 0,
        }
    }
}

impl SimConfig {
    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> TribuneResult<Self> {
        let config: SimConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Replace the seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Replace the default speed.
    pub fn with_speed(mut self, speed: f64) -> Self {
        self.default_speed = speed;
        self
    }

    /// Replace the timer ranges.
    pub fn with_timers(mut self, timers: TimerConfig) -> Self {
        self.timers = timers;
        self
    }

    /// Real-time delay between ticks at the given speed.
    pub fn tick_interval(&self, speed: f64) -> Duration {
        Duration::from_nanos((self.base_interval_ms as f64 * 1_000_000.0 / speed).round() as u64)
    }

    /// Check that every value is usable.
    pub fn validate(&self) -> TribuneResult<()> {
        if self.base_interval_ms == 0 {
            return Err(invalid("base_interval_ms must be positive"));
        }
        if !(self.min_speed.is_finite() && self.min_speed > 0.0) {
            return Err(invalid("min_speed must be a finite positive number"));
        }
        if !(self.max_speed.is_finite() && self.max_speed >= self.min_speed) {
            return Err(invalid("max_speed must be finite and at least min_speed"));
        }
        if !(self.min_speed..=self.max_speed).contains(&self.default_speed) {
            return Err(invalid("default_speed must lie within [min_speed, max_speed]"));
        }
        for (name, step) in [
            ("packet_step", self.packet_step),
            ("base_step", self.base_step),
            ("heartbeat_step", self.heartbeat_step),
        ] {
            if !(step.is_finite() && step > 0.0) {
                return Err(invalid(&format!("{} must be a finite positive number", name)));
            }
        }
        check_range("timers.heartbeat", &self.timers.heartbeat)?;
        check_range("timers.election", &self.timers.election)?;
        Ok(())
    }
}

fn check_range(name: &str, range: &Range<f64>) -> TribuneResult<()> {
    if range.start.is_finite()
        && range.end.is_finite()
        && range.start > 0.0
        && range.start < range.end
    {
        Ok(())
    } else {
        Err(invalid(&format!("{} must be a non-empty positive range", name)))
    }
}

fn invalid(msg: &str) -> TribuneError {
    TribuneError::InvalidConfig(msg.to_string())
}
