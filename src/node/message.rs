//! Message kinds and inbox entries.

use serde::{Deserialize, Serialize};

use super::id::NodeId;

// ── MessageKind ───────────────────────────────────────────────────────

/// The three message types of the election protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MessageKind {
    /// Leader liveness signal; resets the receiver's phase clock.
    Heartbeat,
    /// A candidate asking for a vote.
    VoteRequest,
    /// A granted vote. Denials are never sent.
    VoteResponse,
}

impl MessageKind {
    /// Stable small integer, used when hashing snapshots.
    pub fn code(self) -> u64 {
        match self {
            MessageKind::Heartbeat => 1,
            MessageKind::VoteRequest => 2,
            MessageKind::VoteResponse => 3,
        }
    }
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageKind::Heartbeat => write!(f, "heartbeat"),
            MessageKind::VoteRequest => write!(f, "vote-request"),
            MessageKind::VoteResponse => write!(f, "vote-response"),
        }
    }
}

// ── InboxMessage ──────────────────────────────────────────────────────

/// A delivered message waiting in a node's inbox for the next tick.
///
/// `term` is the sender's term at the moment of delivery, not the term
/// the packet carried while in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboxMessage {
    pub from: NodeId,
    pub kind: MessageKind,
    pub term: u64,
}

impl InboxMessage {
    pub fn new(from: NodeId, kind: MessageKind, term: u64) -> Self {
        InboxMessage { from, kind, term }
    }
}

impl std::fmt::Display for InboxMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}(from={}, term={})", self.kind, self.from, self.term)
    }
}

// ── Outbound ──────────────────────────────────────────────────────────

/// A message a node wants sent. The engine turns it into a packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Outbound {
    pub from: NodeId,
    pub to: NodeId,
    pub term: u64,
    pub kind: MessageKind,
}
