/// Packets in flight between nodes.
///
/// Transit is purely geometric: a packet must cover the distance between
/// its endpoints at a fixed step per tick, then lands in the receiver's
/// inbox. There is no loss, reordering or jitter.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

use crate::history::{hash_combine, hash_f64};
use crate::node::{InboxMessage, MessageKind, NodeId, NodeRegistry, Outbound};

// ── Packet ID ─────────────────────────────────────────────────────────

/// Strictly increasing packet identifier; also the delivery order for
/// packets arriving on the same tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PacketId(u64);

impl PacketId {
    #[inline]
    pub fn new(raw: u64) -> Self {
        PacketId(raw)
    }

    #[inline]
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for PacketId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "P#{}", self.0)
    }
}

// ── Packet ────────────────────────────────────────────────────────────

/// A message in transit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Packet {
    pub id: PacketId,
    pub from: NodeId,
    pub to: NodeId,
    pub kind: MessageKind,
    /// Sender's term when the packet was created.
    pub term: u64,
    /// Distance between the endpoints at creation, frozen.
    pub required_distance: f64,
    /// Distance covered so far.
    pub progress: f64,
}

impl Packet {
    /// Whether the packet has covered its distance.
    pub fn arrived(&self) -> bool {
        self.progress >= self.required_distance
    }

    /// Fraction of the trip completed, clamped to `[0, 1]`.
    pub fn fraction(&self) -> f64 {
        if self.required_distance <= 0.0 {
            1.0
        } else {
            (self.progress / self.required_distance).min(1.0)
        }
    }
}

// ── Packet Registry ───────────────────────────────────────────────────

/// Owns every in-flight packet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PacketRegistry {
    packets: BTreeMap<PacketId, Packet>,
    next_id: u64,
}

impl PacketRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        PacketRegistry {
            packets: BTreeMap::new(),
            next_id: 0,
        }
    }

    /// Put a new packet in flight.
    ///
    /// Self-addressed messages and messages naming an unknown node are
    /// rejected and `None` is returned; nothing is created.
    pub fn admit(&mut self, nodes: &NodeRegistry, msg: Outbound) -> Option<PacketId> {
        if msg.from == msg.to {
            trace!(node = %msg.from, kind = %msg.kind, "rejecting self-addressed packet");
            return None;
        }
        let endpoints = (nodes.position(msg.from), nodes.position(msg.to));
        let (Some(origin), Some(destination)) = endpoints else {
            warn!(
                from = %msg.from,
                to = %msg.to,
                kind = %msg.kind,
                "rejecting packet for unknown node"
            );
            return None;
        };

        let id = PacketId(self.next_id);
        self.next_id += 1;
        let packet = Packet {
            id,
            from: msg.from,
            to: msg.to,
            kind: msg.kind,
            term: msg.term,
            required_distance: origin.distance_to(destination),
            progress: 0.0,
        };
        trace!(
            packet = %id,
            from = %msg.from,
            to = %msg.to,
            kind = %msg.kind,
            term = msg.term,
            "packet admitted"
        );
        self.packets.insert(id, packet);
        Some(id)
    }

    /// Move every packet `delta` closer to its destination.
    pub fn advance(&mut self, delta: f64) {
        for packet in self.packets.values_mut() {
            packet.progress += delta;
        }
    }

    /// Deliver every packet that has covered its distance.
    ///
    /// The inbox entry carries the sender's term *now*, not the term
    /// stamped on the packet. Packets whose sender or receiver is no
    /// longer registered are discarded. Returns the number delivered.
    pub fn drain_arrivals(&mut self, nodes: &mut NodeRegistry) -> usize {
        let arrived: Vec<PacketId> = self
            .packets
            .values()
            .filter(|p| p.arrived())
            .map(|p| p.id)
            .collect();

        let mut delivered = 0;
        for id in arrived {
            let Some(packet) = self.packets.remove(&id) else {
                continue;
            };
            let Some(term) = nodes.term(packet.from) else {
                warn!(packet = %id, from = %packet.from, "sender vanished, dropping packet");
                continue;
            };
            let msg = InboxMessage::new(packet.from, packet.kind, term);
            if nodes.enqueue(packet.to, msg) {
                trace!(packet = %id, to = %packet.to, %msg, "packet delivered");
                delivered += 1;
            }
        }
        delivered
    }

    pub fn get(&self, id: PacketId) -> Option<&Packet> {
        self.packets.get(&id)
    }

    /// Iterate packets in ascending ID order.
    pub fn iter(&self) -> impl Iterator<Item = &Packet> {
        self.packets.values()
    }

    pub fn len(&self) -> usize {
        self.packets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }

    /// The ID the next admitted packet will get.
    pub fn next_id(&self) -> PacketId {
        PacketId(self.next_id)
    }

    /// Deterministic hash over all packets and the ID counter.
    pub fn state_hash(&self) -> u64 {
        self.packets.values().fold(self.next_id, |mut h, p| {
            h = hash_combine(h, p.id.raw());
            h = hash_combine(h, p.from.raw());
            h = hash_combine(h, p.to.raw());
            h = hash_combine(h, p.kind.code());
            h = hash_combine(h, p.term);
            h = hash_combine(h, hash_f64(p.required_distance));
            hash_combine(h, hash_f64(p.progress))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{Position, RaftNode};

    fn two_nodes() -> NodeRegistry {
        let mut nodes = NodeRegistry::new();
        nodes
            .insert(RaftNode::new(NodeId::new(1), Position::new(100.0, 100.0), 100.0))
            .unwrap();
        nodes
            .insert(RaftNode::new(NodeId::new(2), Position::new(100.0, 300.0), 100.0))
            .unwrap();
        nodes.link(NodeId::new(1), NodeId::new(2)).unwrap();
        nodes
    }

    fn outbound(from: u64, to: u64, term: u64, kind: MessageKind) -> Outbound {
        Outbound {
            from: NodeId::new(from),
            to: NodeId::new(to),
            term,
            kind,
        }
    }

    #[test]
    fn test_admit_measures_distance() {
        let nodes = two_nodes();
        let mut packets = PacketRegistry::new();

        let id = packets
            .admit(&nodes, outbound(1, 2, 1, MessageKind::Heartbeat))
            .unwrap();

        let p = packets.get(id).unwrap();
        assert_eq!(p.required_distance, 200.0);
        assert_eq!(p.progress, 0.0);
        assert_eq!(p.term, 1);
        assert_eq!(packets.next_id(), PacketId::new(1));
    }

    #[test]
    fn test_admit_rejects_self_addressed() {
        let nodes = two_nodes();
        let mut packets = PacketRegistry::new();
        assert!(packets.admit(&nodes, outbound(1, 1, 1, MessageKind::Heartbeat)).is_none());
        assert!(packets.is_empty());
        assert_eq!(packets.next_id(), PacketId::new(0));
    }

    #[test]
    fn test_admit_rejects_unknown_endpoint() {
        let nodes = two_nodes();
        let mut packets = PacketRegistry::new();
        assert!(packets.admit(&nodes, outbound(1, 9, 1, MessageKind::VoteRequest)).is_none());
        assert!(packets.admit(&nodes, outbound(9, 1, 1, MessageKind::VoteRequest)).is_none());
        assert!(packets.is_empty());
    }

    #[test]
    fn test_not_delivered_before_distance_covered() {
        let mut nodes = two_nodes();
        let mut packets = PacketRegistry::new();
        packets.admit(&nodes, outbound(1, 2, 1, MessageKind::Heartbeat));

        for _ in 0..19 {
            packets.advance(10.0);
            assert_eq!(packets.drain_arrivals(&mut nodes), 0);
        }
        assert_eq!(packets.len(), 1);
        assert!(nodes.get(NodeId::new(2)).unwrap().inbox.is_empty());

        packets.advance(10.0);
        assert_eq!(packets.drain_arrivals(&mut nodes), 1);
        assert!(packets.is_empty());
        assert_eq!(nodes.get(NodeId::new(2)).unwrap().inbox.len(), 1);
    }

    #[test]
    fn test_delivery_stamps_senders_current_term() {
        let mut nodes = two_nodes();
        let mut packets = PacketRegistry::new();
        packets.admit(&nodes, outbound(1, 2, 1, MessageKind::VoteRequest));

        // The sender moves on while the packet is in flight.
        nodes.get_mut(NodeId::new(1)).unwrap().term = 4;

        packets.advance(500.0);
        packets.drain_arrivals(&mut nodes);

        let inbox = &nodes.get(NodeId::new(2)).unwrap().inbox;
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].term, 4);
        assert_eq!(inbox[0].from, NodeId::new(1));
        assert_eq!(inbox[0].kind, MessageKind::VoteRequest);
    }

    #[test]
    fn test_arrivals_delivered_in_id_order() {
        let mut nodes = two_nodes();
        let mut packets = PacketRegistry::new();
        packets.admit(&nodes, outbound(1, 2, 1, MessageKind::VoteRequest));
        packets.admit(&nodes, outbound(1, 2, 1, MessageKind::Heartbeat));

        packets.advance(200.0);
        assert_eq!(packets.drain_arrivals(&mut nodes), 2);

        let kinds: Vec<MessageKind> = nodes
            .get(NodeId::new(2))
            .unwrap()
            .inbox
            .iter()
            .map(|m| m.kind)
            .collect();
        assert_eq!(kinds, vec![MessageKind::VoteRequest, MessageKind::Heartbeat]);
    }

    #[test]
    fn test_fraction() {
        let nodes = two_nodes();
        let mut packets = PacketRegistry::new();
        let id = packets
            .admit(&nodes, outbound(2, 1, 1, MessageKind::Heartbeat))
            .unwrap();
        packets.advance(50.0);
        assert_eq!(packets.get(id).unwrap().fraction(), 0.25);
    }
}
