//! Transition-rule tests for `RaftNode` and `NodeRegistry`.

use tracing_test::traced_test;

use crate::config::SimConfig;
use crate::error::TribuneError;
use crate::node::{
    InboxMessage, MessageKind, NodeId, NodeRegistry, Outbound, Position, RaftNode, Role,
};
use crate::timer::FixedTimers;

const HEARTBEAT: f64 = 50.0;
const ELECTION: f64 = 120.0;

fn timers() -> FixedTimers {
    FixedTimers::new(HEARTBEAT, ELECTION)
}

fn n(id: u64) -> NodeId {
    NodeId::new(id)
}

/// Node 1 with neighbors 2 and 3.
fn node_one() -> RaftNode {
    let mut node = RaftNode::new(n(1), Position::new(0.0, 0.0), 100.0);
    node.neighbors.extend([n(2), n(3)]);
    node
}

fn deliver(node: &mut RaftNode, from: u64, kind: MessageKind, term: u64) -> Vec<Outbound> {
    let mut out = Vec::new();
    node.handle_message(InboxMessage::new(n(from), kind, term), &mut timers(), &mut out);
    out
}

fn advance(node: &mut RaftNode) -> Vec<Outbound> {
    let mut out = Vec::new();
    node.advance(&SimConfig::default(), &mut timers(), &mut out);
    out
}

fn candidate_at(term: u64) -> RaftNode {
    let mut node = node_one();
    node.role = Role::Candidate;
    node.term = term;
    node.voted_for = Some(n(1));
    node.votes_granted = 1;
    node
}

// ── Message handling ──────────────────────────────────────────────────

#[test]
fn test_stale_message_dropped() {
    let mut node = node_one();
    node.term = 5;
    node.progress = 30.0;
    let before = node.clone();

    for kind in [MessageKind::Heartbeat, MessageKind::VoteRequest, MessageKind::VoteResponse] {
        assert!(deliver(&mut node, 2, kind, 4).is_empty());
    }
    assert_eq!(node, before);
}

#[traced_test]
#[test]
fn test_stale_message_is_logged() {
    let mut node = node_one();
    node.term = 3;
    deliver(&mut node, 2, MessageKind::Heartbeat, 2);
    assert!(logs_contain("dropping stale message"));
}

#[test]
fn test_higher_term_resets_follower_then_grants() {
    let mut node = node_one();
    node.term = 2;
    node.voted_for = Some(n(3));
    node.current_leader = Some(n(3));
    node.progress = 40.0;

    let out = deliver(&mut node, 2, MessageKind::VoteRequest, 4);

    assert_eq!(node.role, Role::Follower);
    assert_eq!(node.term, 4);
    assert_eq!(node.voted_for, Some(n(2)));
    assert_eq!(node.current_leader, None);
    assert_eq!(node.progress, 0.0);
    assert_eq!(node.threshold, ELECTION);
    assert_eq!(
        out,
        vec![Outbound {
            from: n(1),
            to: n(2),
            term: 4,
            kind: MessageKind::VoteResponse,
        }]
    );
}

#[test]
fn test_higher_term_demotes_leader() {
    let mut node = node_one();
    node.role = Role::Leader;
    node.term = 3;
    node.current_leader = Some(n(1));

    deliver(&mut node, 3, MessageKind::VoteResponse, 6);

    assert_eq!(node.role, Role::Follower);
    assert_eq!(node.term, 6);
    assert_eq!(node.current_leader, None);
    assert_eq!(node.votes_granted, 0);
}

#[test]
fn test_candidate_demoted_by_higher_term_heartbeat() {
    let mut node = candidate_at(3);
    node.progress = 70.0;

    let out = deliver(&mut node, 3, MessageKind::Heartbeat, 5);

    assert!(out.is_empty());
    assert_eq!(node.role, Role::Follower);
    assert_eq!(node.term, 5);
    assert_eq!(node.current_leader, Some(n(3)));
    assert_eq!(node.voted_for, None);
    assert_eq!(node.votes_granted, 0);
    assert_eq!(node.progress, 0.0);
    assert_eq!(node.threshold, HEARTBEAT);
}

#[test]
fn test_candidate_yields_to_same_term_heartbeat() {
    let mut node = candidate_at(4);
    deliver(&mut node, 2, MessageKind::Heartbeat, 4);
    assert_eq!(node.role, Role::Follower);
    assert_eq!(node.term, 4);
    assert_eq!(node.current_leader, Some(n(2)));
    assert_eq!(node.threshold, HEARTBEAT);
}

#[test]
fn test_heartbeat_restarts_follower_wait_from_heartbeat_range() {
    let mut node = node_one();
    node.term = 2;
    node.progress = 99.0;
    node.threshold = 100.0;
    node.current_leader = Some(n(2));

    deliver(&mut node, 2, MessageKind::Heartbeat, 2);

    assert_eq!(node.role, Role::Follower);
    assert_eq!(node.progress, 0.0);
    assert_eq!(node.threshold, HEARTBEAT);
    assert_eq!(node.current_leader, Some(n(2)));
}

#[test]
fn test_same_term_heartbeat_ignored_by_leader() {
    let mut node = node_one();
    node.role = Role::Leader;
    node.term = 3;
    node.progress = 10.0;
    node.threshold = 60.0;
    let before = node.clone();

    deliver(&mut node, 2, MessageKind::Heartbeat, 3);
    assert_eq!(node, before);
}

#[test]
fn test_one_vote_per_term() {
    let mut node = node_one();
    node.term = 3;

    let first = deliver(&mut node, 2, MessageKind::VoteRequest, 3);
    let second = deliver(&mut node, 3, MessageKind::VoteRequest, 3);

    assert_eq!(first.len(), 1);
    assert_eq!(first[0].to, n(2));
    assert!(second.is_empty());
    assert_eq!(node.voted_for, Some(n(2)));
}

#[test]
fn test_repeat_request_from_same_candidate_denied() {
    let mut node = node_one();
    assert_eq!(deliver(&mut node, 2, MessageKind::VoteRequest, 1).len(), 1);
    assert!(deliver(&mut node, 2, MessageKind::VoteRequest, 1).is_empty());
}

#[test]
fn test_candidate_never_grants() {
    let mut node = candidate_at(3);
    assert!(deliver(&mut node, 2, MessageKind::VoteRequest, 3).is_empty());
    assert_eq!(node.voted_for, Some(n(1)));
    assert_eq!(node.role, Role::Candidate);
}

#[test]
fn test_vote_response_majority() {
    let mut node = candidate_at(3);
    node.threshold = 130.0;
    node.progress = 20.0;

    // Self vote plus one of two neighbors: 2 * 2 > 2.
    deliver(&mut node, 2, MessageKind::VoteResponse, 3);

    assert_eq!(node.role, Role::Leader);
    assert_eq!(node.current_leader, Some(n(1)));
    assert_eq!(node.votes_granted, 0);
    assert_eq!(node.voted_for, None);
    assert_eq!(node.progress, 0.0);
    assert_eq!(node.threshold, HEARTBEAT);
}

#[test]
fn test_vote_response_needs_strict_majority() {
    let mut node = RaftNode::new(n(1), Position::new(0.0, 0.0), 100.0);
    node.neighbors.extend([n(2), n(3), n(4), n(5)]);
    node.role = Role::Candidate;
    node.term = 2;
    node.votes_granted = 1;

    deliver(&mut node, 2, MessageKind::VoteResponse, 2);
    assert_eq!(node.role, Role::Candidate);
    assert_eq!(node.votes_granted, 2);

    deliver(&mut node, 3, MessageKind::VoteResponse, 2);
    assert_eq!(node.role, Role::Leader);
}

#[test]
fn test_vote_response_counted_only_by_candidate() {
    let mut node = candidate_at(5);
    node.votes_granted = 0;
    deliver(&mut node, 2, MessageKind::VoteResponse, 5);
    assert_eq!(node.votes_granted, 1);
    assert_eq!(node.role, Role::Candidate);

    let mut follower = node_one();
    deliver(&mut follower, 2, MessageKind::VoteResponse, 1);
    assert_eq!(follower.votes_granted, 0);
    assert_eq!(follower.role, Role::Follower);
}

// ── Phase advance ─────────────────────────────────────────────────────

#[test]
fn test_follower_timeout_kicks_off_candidacy() {
    let mut node = node_one();
    node.term = 2;
    node.threshold = 3.0;

    for _ in 0..3 {
        assert!(advance(&mut node).is_empty());
    }
    assert_eq!(node.progress, 3.0);
    assert_eq!(node.role, Role::Follower);

    advance(&mut node);
    assert_eq!(node.role, Role::Candidate);
    assert_eq!(node.term, 3);
    assert_eq!(node.votes_granted, 1);
    assert_eq!(node.voted_for, None);
    assert!(node.phase_complete());

    // First round fires on the next advance, bumping the term again.
    let out = advance(&mut node);
    assert_eq!(node.term, 4);
    assert_eq!(node.voted_for, Some(n(1)));
    assert_eq!(node.progress, 0.0);
    assert_eq!(node.threshold, ELECTION);
    assert_eq!(out.len(), 2);
    assert!(out.iter().all(|o| o.kind == MessageKind::VoteRequest && o.term == 4));
}

#[test]
fn test_candidate_keeps_votes_across_rounds() {
    let mut node = candidate_at(4);
    node.votes_granted = 1;
    node.progress = ELECTION;
    node.threshold = ELECTION;

    advance(&mut node);
    assert_eq!(node.term, 5);
    assert_eq!(node.votes_granted, 1);
}

#[test]
fn test_leader_broadcasts_heartbeat() {
    let mut node = node_one();
    node.role = Role::Leader;
    node.term = 7;
    node.threshold = 4.0;

    assert!(advance(&mut node).is_empty());
    assert_eq!(node.progress, 2.0);
    assert!(advance(&mut node).is_empty());
    assert_eq!(node.progress, 4.0);

    let out = advance(&mut node);
    let targets: Vec<NodeId> = out.iter().map(|o| o.to).collect();
    assert_eq!(targets, vec![n(2), n(3)]);
    assert!(out.iter().all(|o| o.kind == MessageKind::Heartbeat && o.term == 7 && o.from == n(1)));
    assert_eq!(node.progress, 0.0);
    assert_eq!(node.threshold, HEARTBEAT);
}

#[test]
fn test_progress_capped_at_threshold() {
    let mut node = node_one();
    node.role = Role::Leader;
    node.threshold = 5.0;
    node.progress = 4.0;
    advance(&mut node);
    assert_eq!(node.progress, 5.0);
}

// ── Registry ──────────────────────────────────────────────────────────

fn registry() -> NodeRegistry {
    let mut nodes = NodeRegistry::new();
    for id in 1..=3 {
        nodes
            .insert(RaftNode::new(n(id), Position::new(id as f64 * 10.0, 0.0), 100.0))
            .unwrap();
    }
    nodes.link(n(1), n(2)).unwrap();
    nodes.link(n(1), n(3)).unwrap();
    nodes
}

#[test]
fn test_registry_rejects_duplicates_and_bad_links() {
    let mut nodes = registry();
    let dup = RaftNode::new(n(2), Position::new(0.0, 0.0), 100.0);
    assert_eq!(nodes.insert(dup), Err(TribuneError::NodeAlreadyRegistered(n(2))));
    assert_eq!(nodes.link(n(1), n(9)), Err(TribuneError::NodeNotFound(n(9))));
    assert!(matches!(nodes.link(n(2), n(2)), Err(TribuneError::InvalidScenario(_))));
}

#[test]
fn test_links_are_symmetric() {
    let nodes = registry();
    assert!(nodes.get(n(2)).unwrap().neighbors.contains(&n(1)));
    assert!(nodes.get(n(3)).unwrap().neighbors.contains(&n(1)));
    assert!(!nodes.get(n(2)).unwrap().neighbors.contains(&n(3)));
}

#[test]
fn test_enqueue_unknown_node_is_noop() {
    let mut nodes = registry();
    let before = nodes.clone();
    assert!(!nodes.enqueue(n(8), InboxMessage::new(n(1), MessageKind::Heartbeat, 1)));
    assert_eq!(nodes, before);
}

#[test]
fn test_process_inboxes_in_arrival_order_and_clears() {
    let mut nodes = registry();
    nodes.enqueue(n(1), InboxMessage::new(n(2), MessageKind::VoteRequest, 2));
    nodes.enqueue(n(1), InboxMessage::new(n(3), MessageKind::VoteRequest, 2));

    let out = nodes.process_inboxes(&mut timers());

    assert_eq!(out.len(), 1);
    assert_eq!(out[0].to, n(2));
    let n1 = nodes.get(n(1)).unwrap();
    assert!(n1.inbox.is_empty());
    assert_eq!(n1.voted_for, Some(n(2)));
    assert_eq!(n1.term, 2);
}

#[test]
fn test_advance_progress_collects_broadcasts() {
    let mut nodes = registry();
    {
        let n1 = nodes.get_mut(n(1)).unwrap();
        n1.role = Role::Candidate;
        n1.progress = 1.0;
        n1.threshold = 1.0;
    }
    let out = nodes.advance_progress(&SimConfig::default(), &mut timers());
    assert_eq!(out.len(), 2);
    assert_eq!(nodes.get(n(2)).unwrap().progress, 1.0);
    assert_eq!(nodes.leaders().count(), 0);
}

#[test]
fn test_state_hash_tracks_changes() {
    let a = registry();
    let mut b = registry();
    assert_eq!(a.state_hash(), b.state_hash());
    b.get_mut(n(3)).unwrap().progress = 1.0;
    assert_ne!(a.state_hash(), b.state_hash());
}
