/// Tick engine.
///
/// Owns both registries, the timer source and the history, and advances
/// them one discrete step at a time. The engine is purely synchronous:
/// a step either runs all five of its phases or has not started, so
/// observers only ever see completed ticks.

use tracing::{debug, info, trace};

use crate::config::SimConfig;
use crate::error::{TribuneError, TribuneResult};
use crate::history::{History, Snapshot};
use crate::node::{MessageKind, NodeId, NodeRegistry, Outbound};
use crate::packet::{PacketId, PacketRegistry};
use crate::time::Tick;
use crate::timer::{SeededTimers, TimerSource};

/// Top-level simulation driver.
///
/// Call [`step`](Self::step) to advance by exactly one tick or
/// [`run_for`](Self::run_for) to advance several. The engine records a
/// snapshot at construction (tick 0) and after every step.
pub struct TickEngine {
    config: SimConfig,
    tick: Tick,
    nodes: NodeRegistry,
    packets: PacketRegistry,
    history: History,
    timers: Box<dyn TimerSource>,
    /// Timer stream position at every recorded tick, in tick order.
    /// Rewinding restores it so replay draws the same thresholds.
    checkpoints: Vec<(Tick, Box<dyn TimerSource>)>,
}

impl TickEngine {
    /// Create an engine whose timers are seeded from `config.seed`.
    pub fn new(nodes: NodeRegistry, config: SimConfig) -> Self {
        let timers = SeededTimers::with_ranges(config.seed, config.timers.clone());
        Self::with_timers(nodes, config, Box::new(timers))
    }

    /// Create an engine with an explicit timer source.
    pub fn with_timers(
        nodes: NodeRegistry,
        config: SimConfig,
        timers: Box<dyn TimerSource>,
    ) -> Self {
        let mut engine = TickEngine {
            config,
            tick: Tick::ZERO,
            nodes,
            packets: PacketRegistry::new(),
            history: History::new(),
            timers,
            checkpoints: Vec::new(),
        };
        engine.record();
        engine
    }

    /// Current tick.
    pub fn tick(&self) -> Tick {
        self.tick
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Live node state.
    pub fn nodes(&self) -> &NodeRegistry {
        &self.nodes
    }

    /// Live packet state.
    pub fn packets(&self) -> &PacketRegistry {
        &self.packets
    }

    /// Every recorded snapshot.
    pub fn history(&self) -> &History {
        &self.history
    }

    /// Mutable access to live nodes, for forcing a scenario before a run.
    ///
    /// Changes are not reflected in the history until the next record;
    /// call [`rerecord`](Self::rerecord) to overwrite the current snapshot.
    pub fn nodes_mut(&mut self) -> &mut NodeRegistry {
        &mut self.nodes
    }

    /// Overwrite the snapshot of the current tick with the live state.
    pub fn rerecord(&mut self) {
        self.record();
    }

    /// A copy of the live state.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            tick: self.tick,
            nodes: self.nodes.clone(),
            packets: self.packets.clone(),
        }
    }

    /// Execute one tick and return the new tick value.
    pub fn step(&mut self) -> Tick {
        // 1. Inboxes filled by the previous tick's arrivals.
        let replies = self.nodes.process_inboxes(self.timers.as_mut());
        self.admit_all(replies);

        // 2. Phase clocks.
        let broadcasts = self.nodes.advance_progress(&self.config, self.timers.as_mut());
        self.admit_all(broadcasts);

        // 3. Transit.
        self.packets.advance(self.config.packet_step);

        // 4. Arrivals feed the next tick's inboxes.
        let delivered = self.packets.drain_arrivals(&mut self.nodes);

        // 5. Record.
        self.tick = self.tick.next();
        self.record();

        trace!(
            tick = %self.tick,
            in_flight = self.packets.len(),
            delivered,
            "tick complete"
        );
        self.tick
    }

    /// Execute `n` ticks. Returns the final tick.
    pub fn run_for(&mut self, n: u64) -> Tick {
        for _ in 0..n {
            self.step();
        }
        self.tick
    }

    /// Step until `predicate` holds or `max_ticks` steps have run.
    ///
    /// Returns the tick at which the predicate first held, or `None`.
    pub fn run_until<F>(&mut self, max_ticks: u64, mut predicate: F) -> Option<Tick>
    where
        F: FnMut(&TickEngine) -> bool,
    {
        if predicate(self) {
            return Some(self.tick);
        }
        for _ in 0..max_ticks {
            self.step();
            if predicate(self) {
                return Some(self.tick);
            }
        }
        None
    }

    /// Commit the clock to a recorded tick.
    ///
    /// Restores that snapshot and the timer stream position as live
    /// state and discards everything recorded after it, so stepping
    /// forward again replays the discarded future. Leaves the engine
    /// untouched if the tick was never recorded.
    pub fn rewind(&mut self, tick: Tick) -> TribuneResult<()> {
        let snapshot = self
            .history
            .restore(tick)
            .ok_or(TribuneError::SnapshotMissing(tick))?;
        let timers = self
            .checkpoints
            .binary_search_by_key(&tick, |(t, _)| *t)
            .ok()
            .map(|i| self.checkpoints[i].1.clone_timers())
            .ok_or(TribuneError::SnapshotMissing(tick))?;
        self.tick = snapshot.tick;
        self.nodes = snapshot.nodes;
        self.packets = snapshot.packets;
        self.timers = timers;
        let keep = self.checkpoints.partition_point(|(t, _)| *t <= tick);
        self.checkpoints.truncate(keep);
        let removed = self.history.truncate_after(tick);
        info!(%tick, removed, "rewound");
        Ok(())
    }

    /// Read-only view of a recorded tick. Never changes the engine.
    pub fn preview(&self, tick: Tick) -> Option<&Snapshot> {
        self.history.preview(tick)
    }

    /// Put an externally supplied message in flight, stamped with the
    /// sender's current term.
    ///
    /// The current tick's snapshot is re-recorded so the history matches
    /// the live state. Returns `None` for self-addressed messages or
    /// unknown nodes.
    pub fn inject(&mut self, from: NodeId, to: NodeId, kind: MessageKind) -> Option<PacketId> {
        let term = self.nodes.term(from)?;
        let id = self.packets.admit(&self.nodes, Outbound { from, to, term, kind })?;
        debug!(packet = %id, %from, %to, %kind, "external message injected");
        self.rerecord();
        Some(id)
    }

    /// Snapshot the live state and timer position at the current tick,
    /// replacing any later entries.
    fn record(&mut self) {
        self.history.record(self.tick, &self.nodes, &self.packets);
        let keep = self.checkpoints.partition_point(|(t, _)| *t < self.tick);
        self.checkpoints.truncate(keep);
        self.checkpoints.push((self.tick, self.timers.clone_timers()));
    }

    fn admit_all(&mut self, outbound: Vec<Outbound>) {
        for msg in outbound {
            self.packets.admit(&self.nodes, msg);
        }
    }
}
