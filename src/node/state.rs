//! Per-node election state and its transition rules.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::SimConfig;
use crate::history::{hash_combine, hash_f64};
use crate::timer::TimerSource;

use super::id::NodeId;
use super::message::{InboxMessage, MessageKind, Outbound};
use super::position::Position;

/// Progress and threshold a fresh candidate starts with, so its first
/// election round fires on the very next advance.
const CANDIDACY_KICKOFF: f64 = 1.0;

// ── Role ──────────────────────────────────────────────────────────────

/// The three roles of the election state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    Follower,
    Candidate,
    Leader,
}

impl Role {
    fn code(self) -> u64 {
        match self {
            Role::Follower => 1,
            Role::Candidate => 2,
            Role::Leader => 3,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(match self {
            Role::Follower => "follower",
            Role::Candidate => "candidate",
            Role::Leader => "leader",
        })
    }
}

// ── RaftNode ──────────────────────────────────────────────────────────

/// One cluster member.
///
/// Fields are public so the outer layer can render them and tests can
/// force a state, but inside a run they are only mutated by the
/// registry's step functions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaftNode {
    pub id: NodeId,
    pub position: Position,
    pub neighbors: BTreeSet<NodeId>,
    pub role: Role,
    pub term: u64,
    /// Elapsed phase progress, capped at `threshold`.
    pub progress: f64,
    /// Progress at which the current phase ends.
    pub threshold: f64,
    pub voted_for: Option<NodeId>,
    pub current_leader: Option<NodeId>,
    pub votes_granted: u32,
    /// Messages delivered during the previous tick, in arrival order.
    pub inbox: Vec<InboxMessage>,
}

impl RaftNode {
    /// A follower at term 1 with no neighbors and the given phase threshold.
    pub fn new(id: NodeId, position: Position, threshold: f64) -> Self {
        RaftNode {
            id,
            position,
            neighbors: BTreeSet::new(),
            role: Role::Follower,
            term: 1,
            progress: 0.0,
            threshold,
            voted_for: None,
            current_leader: None,
            votes_granted: 0,
            inbox: Vec::new(),
        }
    }

    /// Whether the current phase has run its course.
    pub fn phase_complete(&self) -> bool {
        self.progress >= self.threshold
    }

    /// Whether `votes` is a strict majority of this node's neighbors.
    pub fn is_majority(&self, votes: u32) -> bool {
        2 * votes as usize > self.neighbors.len()
    }

    /// Drop back to follower at `term`, believing `leader` leads it.
    pub fn reset_to_follower(
        &mut self,
        term: u64,
        leader: Option<NodeId>,
        timers: &mut dyn TimerSource,
    ) {
        self.role = Role::Follower;
        self.term = term;
        self.progress = 0.0;
        self.threshold = timers.election_threshold();
        self.voted_for = None;
        self.current_leader = leader;
        self.inbox.clear();
        self.votes_granted = 0;
    }

    /// Apply one inbox message.
    pub fn handle_message(
        &mut self,
        msg: InboxMessage,
        timers: &mut dyn TimerSource,
        out: &mut Vec<Outbound>,
    ) {
        if msg.term < self.term {
            debug!(node = %self.id, term = self.term, %msg, "dropping stale message");
            return;
        }

        let was_candidate = self.role == Role::Candidate;
        if msg.term > self.term {
            debug!(
                node = %self.id,
                old_term = self.term,
                new_term = msg.term,
                "term advanced by message"
            );
            self.reset_to_follower(msg.term, None, timers);
        }

        match msg.kind {
            MessageKind::Heartbeat => self.on_heartbeat(msg, was_candidate, timers),
            MessageKind::VoteRequest => self.on_vote_request(msg, out),
            MessageKind::VoteResponse => self.on_vote_response(msg, timers),
        }
    }

    fn on_heartbeat(
        &mut self,
        msg: InboxMessage,
        was_candidate: bool,
        timers: &mut dyn TimerSource,
    ) {
        // A candidate whose term was just advanced by this heartbeat has
        // already been reset, but it still yields to the sender.
        let yielding = self.role == Role::Candidate || was_candidate;
        if yielding && self.term <= msg.term {
            info!(
                node = %self.id,
                leader = %msg.from,
                term = msg.term,
                "candidate yields to leader"
            );
            self.reset_to_follower(msg.term, Some(msg.from), timers);
        }
        if matches!(self.role, Role::Follower | Role::Candidate) {
            // The wait after a heartbeat is drawn from the heartbeat range.
            self.progress = 0.0;
            self.threshold = timers.heartbeat_threshold();
        }
    }

    fn on_vote_request(&mut self, msg: InboxMessage, out: &mut Vec<Outbound>) {
        if self.role != Role::Follower {
            return;
        }
        if self.term <= msg.term && self.voted_for.is_none() {
            self.term = msg.term;
            self.voted_for = Some(msg.from);
            debug!(node = %self.id, candidate = %msg.from, term = self.term, "vote granted");
            out.push(Outbound {
                from: self.id,
                to: msg.from,
                term: self.term,
                kind: MessageKind::VoteResponse,
            });
        } else {
            debug!(
                node = %self.id,
                candidate = %msg.from,
                voted_for = ?self.voted_for,
                "vote denied"
            );
        }
    }

    fn on_vote_response(&mut self, msg: InboxMessage, timers: &mut dyn TimerSource) {
        if self.role != Role::Candidate || msg.term != self.term {
            return;
        }
        self.votes_granted += 1;
        if self.is_majority(self.votes_granted) {
            info!(node = %self.id, term = self.term, votes = self.votes_granted, "elected leader");
            self.role = Role::Leader;
            self.current_leader = Some(self.id);
            self.progress = 0.0;
            self.threshold = timers.heartbeat_threshold();
            self.votes_granted = 0;
            self.voted_for = None;
        }
    }

    /// Move the phase clock forward by one tick, firing the phase action
    /// if the threshold was already reached.
    pub fn advance(
        &mut self,
        config: &SimConfig,
        timers: &mut dyn TimerSource,
        out: &mut Vec<Outbound>,
    ) {
        match self.role {
            Role::Leader => {
                if self.phase_complete() {
                    self.broadcast(MessageKind::Heartbeat, out);
                    self.progress = 0.0;
                    self.threshold = timers.heartbeat_threshold();
                } else {
                    self.step_progress(config.heartbeat_step);
                }
            }
            Role::Follower => {
                if self.phase_complete() {
                    self.role = Role::Candidate;
                    self.term += 1;
                    self.votes_granted = 1;
                    self.voted_for = None;
                    self.progress = CANDIDACY_KICKOFF;
                    self.threshold = CANDIDACY_KICKOFF;
                    info!(
                        node = %self.id,
                        term = self.term,
                        "election timeout, becoming candidate"
                    );
                } else {
                    self.step_progress(config.base_step);
                }
            }
            Role::Candidate => {
                if self.phase_complete() {
                    self.term += 1;
                    debug!(node = %self.id, term = self.term, "starting election round");
                    self.broadcast(MessageKind::VoteRequest, out);
                    self.progress = 0.0;
                    self.threshold = timers.election_threshold();
                    self.voted_for = Some(self.id);
                } else {
                    self.step_progress(config.base_step);
                }
            }
        }
    }

    fn step_progress(&mut self, step: f64) {
        self.progress = (self.progress + step).min(self.threshold);
    }

    fn broadcast(&self, kind: MessageKind, out: &mut Vec<Outbound>) {
        out.extend(self.neighbors.iter().map(|&to| Outbound {
            from: self.id,
            to,
            term: self.term,
            kind,
        }));
    }

    /// Deterministic hash of the node's full state.
    pub fn state_hash(&self) -> u64 {
        let mut h = hash_combine(self.id.raw(), self.role.code());
        h = hash_combine(h, hash_f64(self.position.x));
        h = hash_combine(h, hash_f64(self.position.y));
        for n in &self.neighbors {
            h = hash_combine(h, n.raw());
        }
        h = hash_combine(h, self.term);
        h = hash_combine(h, hash_f64(self.progress));
        h = hash_combine(h, hash_f64(self.threshold));
        h = hash_combine(h, self.voted_for.map_or(0, |n| n.raw() + 1));
        h = hash_combine(h, self.current_leader.map_or(0, |n| n.raw() + 1));
        h = hash_combine(h, self.votes_granted as u64);
        for msg in &self.inbox {
            h = hash_combine(h, msg.from.raw());
            h = hash_combine(h, msg.kind.code());
            h = hash_combine(h, msg.term);
        }
        h
    }
}
