//! `NodeRegistry`: owns every node and runs the per-tick node phases.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::SimConfig;
use crate::error::{TribuneError, TribuneResult};
use crate::history::hash_combine;
use crate::timer::TimerSource;

use super::id::NodeId;
use super::message::{InboxMessage, Outbound};
use super::position::Position;
use super::state::{RaftNode, Role};

/// The set of cluster members, keyed and iterated by ascending `NodeId`.
///
/// The registry never creates packets itself: both phases return the
/// messages nodes want sent and the engine hands them to the
/// [`PacketRegistry`](crate::packet::PacketRegistry).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeRegistry {
    nodes: BTreeMap<NodeId, RaftNode>,
}

impl NodeRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        NodeRegistry {
            nodes: BTreeMap::new(),
        }
    }

    /// Register a node.
    pub fn insert(&mut self, node: RaftNode) -> TribuneResult<()> {
        if self.nodes.contains_key(&node.id) {
            return Err(TribuneError::NodeAlreadyRegistered(node.id));
        }
        self.nodes.insert(node.id, node);
        Ok(())
    }

    /// Connect two registered nodes in both directions.
    pub fn link(&mut self, a: NodeId, b: NodeId) -> TribuneResult<()> {
        for id in [a, b] {
            if !self.contains(id) {
                return Err(TribuneError::NodeNotFound(id));
            }
        }
        if a == b {
            return Err(TribuneError::InvalidScenario(format!("cannot link {} to itself", a)));
        }
        if let Some(node) = self.nodes.get_mut(&a) {
            node.neighbors.insert(b);
        }
        if let Some(node) = self.nodes.get_mut(&b) {
            node.neighbors.insert(a);
        }
        Ok(())
    }

    pub fn get(&self, id: NodeId) -> Option<&RaftNode> {
        self.nodes.get(&id)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut RaftNode> {
        self.nodes.get_mut(&id)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Position of a node, if registered.
    pub fn position(&self, id: NodeId) -> Option<Position> {
        self.nodes.get(&id).map(|n| n.position)
    }

    /// Current term of a node, if registered.
    pub fn term(&self, id: NodeId) -> Option<u64> {
        self.nodes.get(&id).map(|n| n.term)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All node IDs in ascending order.
    pub fn ids(&self) -> Vec<NodeId> {
        self.nodes.keys().copied().collect()
    }

    /// Iterate nodes in ascending ID order.
    pub fn iter(&self) -> impl Iterator<Item = &RaftNode> {
        self.nodes.values()
    }

    /// Nodes currently in the leader role.
    pub fn leaders(&self) -> impl Iterator<Item = &RaftNode> {
        self.nodes.values().filter(|n| n.role == Role::Leader)
    }

    /// Append a delivered message to a node's inbox.
    ///
    /// Returns `false`, leaving the registry untouched, if `to` is unknown.
    pub fn enqueue(&mut self, to: NodeId, msg: InboxMessage) -> bool {
        match self.nodes.get_mut(&to) {
            Some(node) => {
                node.inbox.push(msg);
                true
            }
            None => {
                warn!(node = %to, %msg, "dropping message for unknown node");
                false
            }
        }
    }

    /// Process every node's inbox in arrival order, then clear it.
    pub fn process_inboxes(&mut self, timers: &mut dyn TimerSource) -> Vec<Outbound> {
        let mut out = Vec::new();
        for node in self.nodes.values_mut() {
            let inbox = std::mem::take(&mut node.inbox);
            for msg in inbox {
                node.handle_message(msg, timers, &mut out);
            }
            node.inbox.clear();
        }
        out
    }

    /// Advance every node's phase clock by one tick.
    pub fn advance_progress(
        &mut self,
        config: &SimConfig,
        timers: &mut dyn TimerSource,
    ) -> Vec<Outbound> {
        let mut out = Vec::new();
        for node in self.nodes.values_mut() {
            node.advance(config, timers, &mut out);
        }
        out
    }

    /// Deterministic hash over all nodes.
    pub fn state_hash(&self) -> u64 {
        self.nodes
            .values()
            .fold(self.nodes.len() as u64, |h, node| hash_combine(h, node.state_hash()))
    }
}
