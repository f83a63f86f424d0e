/// Fluent builder for cluster setup.
///
/// Hides the boilerplate of registering nodes, wiring neighbors and
/// picking a timer source, while keeping every run reproducible from
/// its seed.

use crate::config::SimConfig;
use crate::engine::TickEngine;
use crate::error::{TribuneError, TribuneResult};
use crate::node::{NodeId, NodeRegistry, Position, RaftNode};
use crate::timer::TimerSource;

/// Threshold every node starts with unless overridden.
pub const DEFAULT_INITIAL_THRESHOLD: f64 = 100.0;

/// Fluent builder for a [`TickEngine`].
///
/// With no explicit [`link`](Self::link) calls the cluster is fully
/// connected.
///
/// # Example
/// ```rust
/// use tribune::dsl::ClusterBuilder;
///
/// let mut engine = ClusterBuilder::new()
///     .node(1, 100.0, 100.0)
///     .node(2, 100.0, 300.0)
///     .node(3, 400.0, 150.0)
///     .seed(42)
///     .build()
///     .unwrap();
/// engine.run_for(10);
/// ```
pub struct ClusterBuilder {
    nodes: Vec<(NodeId, Position)>,
    links: Vec<(NodeId, NodeId)>,
    thresholds: Vec<(NodeId, f64)>,
    initial_term: u64,
    config: SimConfig,
    timers: Option<Box<dyn TimerSource>>,
}

impl ClusterBuilder {
    /// Create an empty builder with the default config.
    pub fn new() -> Self {
        ClusterBuilder {
            nodes: Vec::new(),
            links: Vec::new(),
            thresholds: Vec::new(),
            initial_term: 1,
            config: SimConfig::default(),
            timers: None,
        }
    }

    /// The three-node layout the simulator has always shipped with.
    pub fn classic() -> Self {
        Self::new()
            .node(1, 100.0, 100.0)
            .node(2, 100.0, 300.0)
            .node(3, 400.0, 150.0)
    }

    // ── Nodes ─────────────────────────────────────────────────

    /// Add a node at the given coordinates.
    pub fn node(mut self, id: u64, x: f64, y: f64) -> Self {
        self.nodes.push((NodeId::new(id), Position::new(x, y)));
        self
    }

    /// Connect two nodes. Once any link is given, only given links exist.
    pub fn link(mut self, a: u64, b: u64) -> Self {
        self.links.push((NodeId::new(a), NodeId::new(b)));
        self
    }

    /// Override a node's initial phase threshold.
    pub fn threshold(mut self, id: u64, threshold: f64) -> Self {
        self.thresholds.push((NodeId::new(id), threshold));
        self
    }

    /// Give every node the same initial phase threshold.
    pub fn all_thresholds(mut self, threshold: f64) -> Self {
        let overrides: Vec<(NodeId, f64)> =
            self.nodes.iter().map(|(id, _)| (*id, threshold)).collect();
        self.thresholds.extend(overrides);
        self
    }

    /// Term every node starts in.
    pub fn initial_term(mut self, term: u64) -> Self {
        self.initial_term = term;
        self
    }

    // ── Run parameters ────────────────────────────────────────

    /// Replace the whole config.
    pub fn config(mut self, config: SimConfig) -> Self {
        self.config = config;
        self
    }

    /// Seed the default timer source.
    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = seed;
        self
    }

    /// Use a custom timer source instead of the seeded one.
    pub fn timers(mut self, timers: Box<dyn TimerSource>) -> Self {
        self.timers = Some(timers);
        self
    }

    // ── Build ─────────────────────────────────────────────────

    /// Build the node registry alone.
    pub fn build_registry(&self) -> TribuneResult<NodeRegistry> {
        if self.nodes.is_empty() {
            return Err(TribuneError::InvalidScenario("cluster has no nodes".into()));
        }

        let mut registry = NodeRegistry::new();
        for &(id, position) in &self.nodes {
            let mut node = RaftNode::new(id, position, DEFAULT_INITIAL_THRESHOLD);
            node.term = self.initial_term;
            registry.insert(node)?;
        }

        if self.links.is_empty() {
            let ids = registry.ids();
            for (i, &a) in ids.iter().enumerate() {
                for &b in &ids[i + 1..] {
                    registry.link(a, b)?;
                }
            }
        } else {
            for &(a, b) in &self.links {
                registry.link(a, b)?;
            }
        }

        for &(id, threshold) in &self.thresholds {
            if !(threshold.is_finite() && threshold >= 0.0) {
                return Err(TribuneError::InvalidScenario(format!(
                    "threshold {} for {} must be a finite non-negative number",
                    threshold, id
                )));
            }
            registry
                .get_mut(id)
                .ok_or(TribuneError::NodeNotFound(id))?
                .threshold = threshold;
        }

        Ok(registry)
    }

    /// Validate and build the engine.
    pub fn build(self) -> TribuneResult<TickEngine> {
        self.config.validate()?;
        let registry = self.build_registry()?;
        let engine = match self.timers {
            Some(timers) => TickEngine::with_timers(registry, self.config, timers),
            None => TickEngine::new(registry, self.config),
        };
        Ok(engine)
    }

    /// Build, run `ticks` steps, return the engine.
    pub fn run(self, ticks: u64) -> TribuneResult<TickEngine> {
        let mut engine = self.build()?;
        engine.run_for(ticks);
        Ok(engine)
    }
}

impl Default for ClusterBuilder {
    fn default() -> Self {
        Self::new()
    }
}
