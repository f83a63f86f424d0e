/// Command surface for the outer layer.
///
/// The renderer, the timeline and the speed / pause widgets live
/// outside this crate. They read state through the accessors here and
/// drive the simulation with the commands here; nothing else touches
/// the engine. A host calls [`Controller::on_timer`] every
/// [`Controller::tick_interval`].

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::engine::TickEngine;
use crate::error::{TribuneError, TribuneResult};
use crate::history::{History, Snapshot};
use crate::node::{MessageKind, NodeId, NodeRegistry, Position, RaftNode, Role};
use crate::packet::{PacketId, PacketRegistry};
use crate::time::Tick;

// ── External events ───────────────────────────────────────────────────

/// Events injected from outside the simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ExternalEvent {
    /// Put a message in flight between two nodes.
    InjectMessage {
        from: NodeId,
        to: NodeId,
        kind: MessageKind,
    },
    /// Reserved: membership is static, always rejected.
    AddNode { position: Position },
    /// Reserved: membership is static, always rejected.
    RemoveNode { id: NodeId },
}

// ── Views ─────────────────────────────────────────────────────────────

/// Compact per-node summary for timeline rendering.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NodeSummary {
    pub id: NodeId,
    pub role: Role,
    pub term: u64,
    pub current_leader: Option<NodeId>,
}

impl From<&RaftNode> for NodeSummary {
    fn from(node: &RaftNode) -> Self {
        NodeSummary {
            id: node.id,
            role: node.role,
            term: node.term,
            current_leader: node.current_leader,
        }
    }
}

// ── Controller ────────────────────────────────────────────────────────

/// Owns the engine and the run / pause / preview flags.
pub struct Controller {
    engine: TickEngine,
    paused: bool,
    speed: f64,
    /// Tick being previewed and the pause flag to restore afterwards.
    preview: Option<(Tick, bool)>,
}

impl Controller {
    /// Wrap an engine. Starts running at the configured default speed.
    pub fn new(engine: TickEngine) -> Self {
        let speed = engine.config().default_speed;
        Controller {
            engine,
            paused: false,
            speed,
            preview: None,
        }
    }

    // ── Timing ────────────────────────────────────────────────

    /// Change the tick-rate multiplier. Takes effect from the next tick.
    ///
    /// Finite positive values are clamped to the configured range; the
    /// clamped value is returned.
    pub fn set_speed(&mut self, speed: f64) -> TribuneResult<f64> {
        if !(speed.is_finite() && speed > 0.0) {
            warn!(speed, "rejecting speed");
            return Err(TribuneError::InvalidSpeed(speed));
        }
        let config = self.engine.config();
        self.speed = speed.clamp(config.min_speed, config.max_speed);
        info!(speed = self.speed, "speed changed");
        Ok(self.speed)
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    /// Real-time delay the host should wait between ticks.
    pub fn tick_interval(&self) -> Duration {
        self.engine.config().tick_interval(self.speed)
    }

    // ── Run / pause ───────────────────────────────────────────

    /// Flip the run / paused flag. Returns the new paused state.
    pub fn toggle_pause(&mut self) -> bool {
        self.paused = !self.paused;
        info!(paused = self.paused, "pause toggled");
        self.paused
    }

    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn resume(&mut self) {
        self.paused = false;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Periodic timer callback: run one tick unless paused or previewing.
    pub fn on_timer(&mut self) -> Option<Tick> {
        if self.paused || self.preview.is_some() {
            return None;
        }
        Some(self.engine.step())
    }

    /// Run one tick regardless of the pause flag, ending any preview.
    pub fn step(&mut self) -> Tick {
        self.end_preview();
        self.engine.step()
    }

    // ── Scrubbing ─────────────────────────────────────────────

    /// Show a recorded tick without committing to it.
    ///
    /// Pauses while the preview is active. A tick with no snapshot is a
    /// no-op and returns `None`.
    pub fn preview_at(&mut self, tick: Tick) -> Option<&Snapshot> {
        if !self.engine.history().contains(tick) {
            debug!(%tick, "no snapshot to preview");
            return None;
        }
        let resume_paused = match self.preview {
            Some((_, was_paused)) => was_paused,
            None => self.paused,
        };
        self.preview = Some((tick, resume_paused));
        self.paused = true;
        self.engine.preview(tick)
    }

    /// Leave preview and go back to the live state.
    pub fn stop_preview(&mut self) {
        self.end_preview();
    }

    /// Tick currently previewed, if any.
    pub fn previewing(&self) -> Option<Tick> {
        self.preview.map(|(tick, _)| tick)
    }

    /// Commit the clock to a recorded tick and discard the recorded
    /// future. Returns `false`, changing nothing, if the tick was never
    /// recorded.
    pub fn jump_to(&mut self, tick: Tick) -> bool {
        match self.engine.rewind(tick) {
            Ok(()) => {
                self.end_preview();
                true
            }
            Err(err) => {
                debug!(%tick, %err, "jump ignored");
                false
            }
        }
    }

    fn end_preview(&mut self) {
        if let Some((_, was_paused)) = self.preview.take() {
            self.paused = was_paused;
        }
    }

    // ── External events ───────────────────────────────────────

    /// Apply an event from outside the simulation.
    ///
    /// Injected messages naming an unknown node, or addressed to their
    /// sender, are dropped and `Ok(None)` is returned. Membership changes
    /// are not supported and always fail with
    /// [`TribuneError::Unimplemented`].
    pub fn submit_external_event(
        &mut self,
        event: ExternalEvent,
    ) -> TribuneResult<Option<PacketId>> {
        match event {
            ExternalEvent::InjectMessage { from, to, kind } => {
                Ok(self.engine.inject(from, to, kind))
            }
            ExternalEvent::AddNode { position } => {
                warn!(x = position.x, y = position.y, "adding nodes is not supported");
                Err(TribuneError::Unimplemented("adding a node"))
            }
            ExternalEvent::RemoveNode { id } => {
                warn!(node = %id, "removing nodes is not supported");
                Err(TribuneError::Unimplemented("removing a node"))
            }
        }
    }

    // ── Read access ───────────────────────────────────────────

    /// The authoritative tick.
    pub fn current_tick(&self) -> Tick {
        self.engine.tick()
    }

    /// The tick on screen: previewed if scrubbing, else live.
    pub fn visible_tick(&self) -> Tick {
        self.previewing().unwrap_or_else(|| self.engine.tick())
    }

    /// Nodes to render: previewed if scrubbing, else live.
    pub fn nodes(&self) -> &NodeRegistry {
        match self.preview_snapshot() {
            Some(snapshot) => &snapshot.nodes,
            None => self.engine.nodes(),
        }
    }

    /// Packets to render: previewed if scrubbing, else live.
    pub fn packets(&self) -> &PacketRegistry {
        match self.preview_snapshot() {
            Some(snapshot) => &snapshot.packets,
            None => self.engine.packets(),
        }
    }

    /// Full recorded timeline.
    pub fn history(&self) -> &History {
        self.engine.history()
    }

    /// Per-tick node summaries for the timeline view.
    pub fn timeline(&self) -> BTreeMap<Tick, Vec<NodeSummary>> {
        self.engine
            .history()
            .iter()
            .map(|s| (s.tick, s.nodes.iter().map(NodeSummary::from).collect()))
            .collect()
    }

    pub fn engine(&self) -> &TickEngine {
        &self.engine
    }

    fn preview_snapshot(&self) -> Option<&Snapshot> {
        self.previewing().and_then(|tick| self.engine.preview(tick))
    }

    // ── JSON Export ───────────────────────────────────────────

    /// The visible state as a JSON string.
    pub fn state_json(&self) -> TribuneResult<String> {
        #[derive(Serialize)]
        struct ControllerState<'a> {
            tick: Tick,
            visible_tick: Tick,
            paused: bool,
            previewing: bool,
            speed: f64,
            nodes: &'a NodeRegistry,
            packets: &'a PacketRegistry,
        }

        let state = ControllerState {
            tick: self.current_tick(),
            visible_tick: self.visible_tick(),
            paused: self.paused,
            previewing: self.preview.is_some(),
            speed: self.speed,
            nodes: self.nodes(),
            packets: self.packets(),
        };
        Ok(serde_json::to_string_pretty(&state)?)
    }

    /// The timeline summary as a JSON string.
    pub fn timeline_json(&self) -> TribuneResult<String> {
        Ok(serde_json::to_string(&self.timeline())?)
    }

    /// Every recorded snapshot as a JSON string.
    pub fn history_json(&self) -> TribuneResult<String> {
        Ok(serde_json::to_string(self.engine.history())?)
    }
}
