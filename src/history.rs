/// Snapshot history and time travel.
///
/// Every completed tick is recorded as an immutable copy of both
/// registries. The history is a branching timeline: rewinding to an
/// earlier tick and resuming discards everything recorded after it, so
/// the log is kept sorted by tick and truncation is just moving its end
/// back.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::node::NodeRegistry;
use crate::packet::PacketRegistry;
use crate::time::Tick;

// ── Hash utility ──────────────────────────────────────────────────────

/// Combine two u64 hashes deterministically.
pub fn hash_combine(a: u64, b: u64) -> u64 {
    let mut h = a;
    h = h.wrapping_mul(0x517cc1b727220a95);
    h = h.wrapping_add(b);
    h ^= h >> 32;
    h
}

/// Hash an `f64` by its bit pattern.
pub fn hash_f64(value: f64) -> u64 {
    // Fold -0.0 into 0.0 so equal values hash equally.
    let normalized = if value == 0.0 { 0.0 } else { value };
    hash_combine(0xcbf29ce484222325, normalized.to_bits())
}

// ── Snapshot ──────────────────────────────────────────────────────────

/// The full simulation state at the end of one tick.
///
/// Inboxes are part of node state, so a snapshot also captures the
/// messages that will be processed on the following tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub tick: Tick,
    pub nodes: NodeRegistry,
    pub packets: PacketRegistry,
}

impl Snapshot {
    /// Combined hash of the tick, every node and every packet.
    pub fn state_hash(&self) -> u64 {
        let h = hash_combine(self.tick.value(), self.nodes.state_hash());
        hash_combine(h, self.packets.state_hash())
    }
}

// ── History ───────────────────────────────────────────────────────────

/// Recorded snapshots, strictly ascending by tick.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct History {
    entries: Vec<Snapshot>,
}

impl History {
    /// Create an empty history.
    pub fn new() -> Self {
        History {
            entries: Vec::new(),
        }
    }

    /// Store an independent copy of the given state at `tick`.
    ///
    /// Anything already recorded at or after `tick` is replaced.
    pub fn record(&mut self, tick: Tick, nodes: &NodeRegistry, packets: &PacketRegistry) {
        let keep = self.entries.partition_point(|s| s.tick < tick);
        self.entries.truncate(keep);
        self.entries.push(Snapshot {
            tick,
            nodes: nodes.clone(),
            packets: packets.clone(),
        });
    }

    /// An owned copy of the snapshot at `tick`, for authoritative restore.
    pub fn restore(&self, tick: Tick) -> Option<Snapshot> {
        self.preview(tick).cloned()
    }

    /// Read-only access to the snapshot at `tick`.
    pub fn preview(&self, tick: Tick) -> Option<&Snapshot> {
        self.entries
            .binary_search_by_key(&tick, |s| s.tick)
            .ok()
            .map(|i| &self.entries[i])
    }

    /// Discard every snapshot recorded after `tick`.
    ///
    /// Returns the number of snapshots removed.
    pub fn truncate_after(&mut self, tick: Tick) -> usize {
        let keep = self.entries.partition_point(|s| s.tick <= tick);
        let removed = self.entries.len() - keep;
        self.entries.truncate(keep);
        if removed > 0 {
            debug!(%tick, removed, "discarded recorded future");
        }
        removed
    }

    pub fn contains(&self, tick: Tick) -> bool {
        self.preview(tick).is_some()
    }

    /// All recorded ticks in ascending order.
    pub fn ticks(&self) -> Vec<Tick> {
        self.entries.iter().map(|s| s.tick).collect()
    }

    /// The most recent snapshot.
    pub fn latest(&self) -> Option<&Snapshot> {
        self.entries.last()
    }

    /// Iterate snapshots in ascending tick order.
    pub fn iter(&self) -> impl Iterator<Item = &Snapshot> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Deterministic hash of the whole recorded timeline.
    pub fn history_hash(&self) -> u64 {
        self.entries
            .iter()
            .fold(0, |h, s| hash_combine(h, s.state_hash()))
    }
}

/// Compare two histories tick by tick; returns the first tick whose
/// snapshots differ, or `None` if they are identical.
pub fn first_divergence(a: &History, b: &History) -> Option<Tick> {
    for (sa, sb) in a.entries.iter().zip(b.entries.iter()) {
        if sa.tick != sb.tick || sa.state_hash() != sb.state_hash() {
            return Some(sa.tick.min(sb.tick));
        }
    }
    match a.len().cmp(&b.len()) {
        std::cmp::Ordering::Equal => None,
        std::cmp::Ordering::Less => Some(b.entries[a.len()].tick),
        std::cmp::Ordering::Greater => Some(a.entries[b.len()].tick),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{NodeId, Position, RaftNode};

    fn registry_with_term(term: u64) -> NodeRegistry {
        let mut nodes = NodeRegistry::new();
        let mut node = RaftNode::new(NodeId::new(1), Position::new(0.0, 0.0), 100.0);
        node.term = term;
        nodes.insert(node).unwrap();
        nodes
    }

    fn history_with(ticks: u64) -> History {
        let mut history = History::new();
        let packets = PacketRegistry::new();
        for t in 0..=ticks {
            history.record(Tick::new(t), &registry_with_term(t + 1), &packets);
        }
        history
    }

    #[test]
    fn test_hash_determinism() {
        assert_eq!(hash_combine(1, 2), hash_combine(1, 2));
        assert_ne!(hash_combine(1, 2), hash_combine(2, 1));
        assert_eq!(hash_f64(0.0), hash_f64(-0.0));
        assert_ne!(hash_f64(1.0), hash_f64(2.0));
    }

    #[test]
    fn test_record_is_independent_copy() {
        let mut history = History::new();
        let mut nodes = registry_with_term(1);
        let packets = PacketRegistry::new();

        history.record(Tick::new(0), &nodes, &packets);
        nodes.get_mut(NodeId::new(1)).unwrap().term = 9;

        let snap = history.preview(Tick::new(0)).unwrap();
        assert_eq!(snap.nodes.term(NodeId::new(1)), Some(1));
    }

    #[test]
    fn test_restore_missing_tick() {
        let history = history_with(3);
        assert!(history.restore(Tick::new(4)).is_none());
        assert!(history.preview(Tick::new(99)).is_none());
        assert_eq!(history.len(), 4);
    }

    #[test]
    fn test_truncate_after() {
        let mut history = history_with(10);
        let removed = history.truncate_after(Tick::new(6));
        assert_eq!(removed, 4);
        assert_eq!(history.ticks(), (0..=6).map(Tick::new).collect::<Vec<_>>());
        assert_eq!(history.truncate_after(Tick::new(6)), 0);
    }

    #[test]
    fn test_record_replaces_tail() {
        let mut history = history_with(5);
        let packets = PacketRegistry::new();
        history.record(Tick::new(3), &registry_with_term(42), &packets);

        assert_eq!(history.ticks(), (0..=3).map(Tick::new).collect::<Vec<_>>());
        let snap = history.latest().unwrap();
        assert_eq!(snap.nodes.term(NodeId::new(1)), Some(42));
    }

    #[test]
    fn test_preview_does_not_mutate() {
        let history = history_with(4);
        let before = history.history_hash();
        let a = history.preview(Tick::new(2)).cloned();
        let b = history.preview(Tick::new(2)).cloned();
        assert_eq!(a, b);
        assert_eq!(history.history_hash(), before);
    }

    #[test]
    fn test_first_divergence() {
        let a = history_with(5);
        let b = history_with(5);
        assert_eq!(first_divergence(&a, &b), None);

        let mut c = history_with(5);
        c.record(Tick::new(3), &registry_with_term(77), &PacketRegistry::new());
        assert_eq!(first_divergence(&a, &c), Some(Tick::new(3)));

        let d = history_with(7);
        assert_eq!(first_divergence(&a, &d), Some(Tick::new(6)));
    }
}
