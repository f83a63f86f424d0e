/// Logical simulation clock.
///
/// A `Tick` counts completed engine steps. It has no relation to
/// wall-clock time: the controller decides how often a step runs, the
/// engine only ever moves the counter forward by one (or back to a
/// recorded tick on rewind).

use serde::{Deserialize, Serialize};

/// A discrete step index in simulation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tick(u64);

impl Tick {
    /// The tick at which every simulation starts.
    pub const ZERO: Tick = Tick(0);

    /// Create a tick from a raw step count.
    #[inline]
    pub fn new(value: u64) -> Self {
        Tick(value)
    }

    /// Return the raw step count.
    #[inline]
    pub fn value(self) -> u64 {
        self.0
    }

    /// The tick immediately after `self`.
    ///
    /// Saturates at `u64::MAX`; a simulation never gets there.
    #[inline]
    pub fn next(self) -> Tick {
        Tick(self.0.saturating_add(1))
    }
}

impl From<u64> for Tick {
    fn from(value: u64) -> Self {
        Tick(value)
    }
}

impl std::fmt::Display for Tick {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "T={}", self.0)
    }
}
