/// Seed sweep and invariant checking.
///
/// Runs a cluster factory once per seed (and per combination of injected
/// messages), records the full history of each run, and checks safety
/// properties against it. Every run is reproducible from its seed and
/// its choices, so a violation report is enough to replay the failure.

use std::collections::{BTreeMap, BTreeSet};
use std::ops::Range;

use tracing::{debug, info};

use crate::engine::TickEngine;
use crate::error::TribuneResult;
use crate::history::History;
use crate::node::{MessageKind, NodeId, Role};
use crate::time::Tick;

// ── Choice ────────────────────────────────────────────────────────────

/// A message injected from outside at a given tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Injection {
    pub at: Tick,
    pub from: NodeId,
    pub to: NodeId,
    pub kind: MessageKind,
}

impl Injection {
    pub fn new(at: u64, from: u64, to: u64, kind: MessageKind) -> Self {
        Injection {
            at: Tick::new(at),
            from: NodeId::new(from),
            to: NodeId::new(to),
            kind,
        }
    }
}

/// A decision point: each option is a set of injections.
///
/// The explorer runs every option of every choice, forming the
/// Cartesian product of all choices for every seed.
#[derive(Debug, Clone)]
pub struct Choice {
    pub label: String,
    pub options: Vec<Vec<Injection>>,
}

impl Choice {
    /// Inject the message or don't. Two branches.
    pub fn binary(label: &str, injection: Injection) -> Self {
        Choice {
            label: label.to_string(),
            options: vec![vec![], vec![injection]],
        }
    }

    /// Arbitrary options.
    pub fn multi(label: &str, options: Vec<Vec<Injection>>) -> Self {
        Choice {
            label: label.to_string(),
            options,
        }
    }
}

// ── Property ──────────────────────────────────────────────────────────

/// A safety property checked against the recorded history of a run.
pub trait Property {
    fn name(&self) -> &str;

    /// `Err(message)` if the property is violated anywhere in `history`.
    fn check(&self, history: &History) -> Result<(), String>;
}

/// Closure-backed property.
pub struct NamedProperty {
    name: String,
    check_fn: Box<dyn Fn(&History) -> Result<(), String>>,
}

impl NamedProperty {
    pub fn new<F>(name: &str, f: F) -> Self
    where
        F: Fn(&History) -> Result<(), String> + 'static,
    {
        NamedProperty {
            name: name.to_string(),
            check_fn: Box::new(f),
        }
    }
}

impl Property for NamedProperty {
    fn name(&self) -> &str {
        &self.name
    }

    fn check(&self, history: &History) -> Result<(), String> {
        (self.check_fn)(history)
    }
}

// ── Built-in properties ───────────────────────────────────────────────

/// No node's term ever decreases between consecutive snapshots.
pub fn terms_monotonic() -> NamedProperty {
    NamedProperty::new("terms monotonic", |history| {
        for (prev, next) in history.iter().zip(history.iter().skip(1)) {
            for node in next.nodes.iter() {
                if let Some(before) = prev.nodes.term(node.id) {
                    if node.term < before {
                        return Err(format!(
                            "{} went from term {} to {} at {}",
                            node.id, before, node.term, next.tick
                        ));
                    }
                }
            }
        }
        Ok(())
    })
}

/// A packet seen in consecutive snapshots keeps its distance and moves
/// forward by exactly `step`.
pub fn packets_in_transit(step: f64) -> NamedProperty {
    NamedProperty::new("packets in transit", move |history| {
        for (prev, next) in history.iter().zip(history.iter().skip(1)) {
            for packet in next.packets.iter() {
                let Some(before) = prev.packets.get(packet.id) else {
                    continue;
                };
                if packet.required_distance != before.required_distance {
                    return Err(format!("{} changed distance at {}", packet.id, next.tick));
                }
                if packet.progress != before.progress + step {
                    return Err(format!(
                        "{} moved from {} to {} at {}",
                        packet.id, before.progress, packet.progress, next.tick
                    ));
                }
            }
        }
        Ok(())
    })
}

/// A follower never withdraws or reassigns its vote within a term.
pub fn stable_votes() -> NamedProperty {
    NamedProperty::new("stable votes", |history| {
        for (prev, next) in history.iter().zip(history.iter().skip(1)) {
            for node in next.nodes.iter() {
                let Some(before) = prev.nodes.get(node.id) else {
                    continue;
                };
                let same_follower_term = before.role == Role::Follower
                    && node.role == Role::Follower
                    && before.term == node.term;
                let reassigned =
                    before.voted_for.is_some() && node.voted_for != before.voted_for;
                if same_follower_term && reassigned {
                    return Err(format!(
                        "{} changed its vote in term {} from {:?} to {:?} at {}",
                        node.id, node.term, before.voted_for, node.voted_for, next.tick
                    ));
                }
            }
        }
        Ok(())
    })
}

/// A node becomes leader at most once in any given term.
///
/// Leaders present in the first snapshot count as having taken office.
pub fn leader_once_per_term() -> NamedProperty {
    NamedProperty::new("leader once per term", |history| {
        let mut elected: BTreeSet<(NodeId, u64)> = BTreeSet::new();
        if let Some(first) = history.iter().next() {
            elected.extend(first.nodes.leaders().map(|n| (n.id, n.term)));
        }
        for (prev, next) in history.iter().zip(history.iter().skip(1)) {
            for node in next.nodes.leaders() {
                let was_leader = prev
                    .nodes
                    .get(node.id)
                    .is_some_and(|before| before.role == Role::Leader);
                if !was_leader && !elected.insert((node.id, node.term)) {
                    return Err(format!(
                        "{} became leader of term {} a second time at {}",
                        node.id, node.term, next.tick
                    ));
                }
            }
        }
        Ok(())
    })
}

// ── Violation ─────────────────────────────────────────────────────────

/// A property violation found during exploration.
#[derive(Debug, Clone, PartialEq)]
pub struct Violation {
    pub property: String,
    /// Seed of the failing run.
    pub seed: u64,
    /// `(choice_label, option_index)` for every choice in the run.
    pub choices: Vec<(String, usize)>,
    pub message: String,
}

// ── ExplorationResult ─────────────────────────────────────────────────

/// Summary of a completed exploration.
#[derive(Debug, Clone)]
pub struct ExplorationResult {
    pub runs_explored: usize,
    /// Seeds times branches.
    pub total_runs: usize,
    pub violations: Vec<Violation>,
    /// Tick at which each run first had a leader, keyed by seed. Only
    /// the first branch of each seed is recorded.
    pub first_leader: BTreeMap<u64, Option<Tick>>,
}

impl ExplorationResult {
    pub fn is_safe(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn violation_count(&self) -> usize {
        self.violations.len()
    }
}

// ── Explorer ──────────────────────────────────────────────────────────

type Factory = Box<dyn Fn(u64) -> TribuneResult<TickEngine>>;

/// Runs a cluster factory over a range of seeds and checks properties.
pub struct Explorer {
    factory: Factory,
    seeds: Range<u64>,
    ticks: u64,
    choices: Vec<Choice>,
    properties: Vec<Box<dyn Property>>,
    max_runs: usize,
}

impl Explorer {
    /// `factory` builds a fresh engine for a seed; each run lasts `ticks`.
    pub fn new<F>(factory: F, ticks: u64) -> Self
    where
        F: Fn(u64) -> TribuneResult<TickEngine> + 'static,
    {
        Explorer {
            factory: Box::new(factory),
            seeds: 0..1,
            ticks,
            choices: Vec::new(),
            properties: Vec::new(),
            max_runs: 10_000,
        }
    }

    pub fn seeds(&mut self, seeds: Range<u64>) -> &mut Self {
        self.seeds = seeds;
        self
    }

    pub fn add_choice(&mut self, choice: Choice) -> &mut Self {
        self.choices.push(choice);
        self
    }

    pub fn add_property(&mut self, prop: Box<dyn Property>) -> &mut Self {
        self.properties.push(prop);
        self
    }

    /// Add a closure-based property.
    pub fn check<F>(&mut self, name: &str, f: F) -> &mut Self
    where
        F: Fn(&History) -> Result<(), String> + 'static,
    {
        self.properties.push(Box::new(NamedProperty::new(name, f)));
        self
    }

    /// Add the four built-in properties.
    pub fn with_builtin_properties(&mut self, packet_step: f64) -> &mut Self {
        self.add_property(Box::new(terms_monotonic()));
        self.add_property(Box::new(packets_in_transit(packet_step)));
        self.add_property(Box::new(stable_votes()));
        self.add_property(Box::new(leader_once_per_term()))
    }

    /// Cap on the number of runs.
    pub fn set_max_runs(&mut self, max: usize) -> &mut Self {
        self.max_runs = max;
        self
    }

    /// Branches per seed (Cartesian product of the choices).
    pub fn branches_per_seed(&self) -> usize {
        self.choices.iter().map(|c| c.options.len()).product()
    }

    pub fn total_runs(&self) -> usize {
        let span = self.seeds.end.saturating_sub(self.seeds.start);
        let seeds = usize::try_from(span).unwrap_or(usize::MAX);
        seeds.saturating_mul(self.branches_per_seed())
    }

    /// Run every seed and branch up to the cap.
    ///
    /// Fails only if the factory fails.
    pub fn explore(&self) -> TribuneResult<ExplorationResult> {
        let total = self.total_runs();
        let branches = self.branches_per_seed();
        let mut violations = Vec::new();
        let mut first_leader = BTreeMap::new();
        let mut runs = 0;

        'seeds: for seed in self.seeds.clone() {
            for branch in 0..branches {
                if runs >= self.max_runs {
                    break 'seeds;
                }
                runs += 1;

                let selections = self.decode_branch(branch);
                let (history, leader_at) = self.run_one(seed, &selections)?;
                if branch == 0 {
                    first_leader.insert(seed, leader_at);
                }

                for prop in &self.properties {
                    if let Err(message) = prop.check(&history) {
                        debug!(seed, property = prop.name(), %message, "property violated");
                        violations.push(Violation {
                            property: prop.name().to_string(),
                            seed,
                            choices: selections
                                .iter()
                                .enumerate()
                                .map(|(i, &opt)| (self.choices[i].label.clone(), opt))
                                .collect(),
                            message,
                        });
                    }
                }
            }
        }

        info!(runs, total, violations = violations.len(), "exploration complete");
        Ok(ExplorationResult {
            runs_explored: runs,
            total_runs: total,
            violations,
            first_leader,
        })
    }

    fn run_one(&self, seed: u64, selections: &[usize]) -> TribuneResult<(History, Option<Tick>)> {
        let mut engine = (self.factory)(seed)?;

        let mut injections: Vec<Injection> = selections
            .iter()
            .enumerate()
            .flat_map(|(i, &opt)| self.choices[i].options[opt].iter().copied())
            .collect();
        injections.sort_by_key(|inj| inj.at);

        let mut pending = injections.into_iter().peekable();
        let mut leader_at = None;
        for _ in 0..self.ticks {
            while let Some(inj) = pending.next_if(|inj| inj.at <= engine.tick()) {
                engine.inject(inj.from, inj.to, inj.kind);
            }
            let tick = engine.step();
            if leader_at.is_none() && engine.nodes().leaders().next().is_some() {
                leader_at = Some(tick);
            }
        }
        Ok((engine.history().clone(), leader_at))
    }

    /// Decode a branch index into per-choice option indices.
    fn decode_branch(&self, mut branch: usize) -> Vec<usize> {
        let mut selections = Vec::with_capacity(self.choices.len());
        for choice in &self.choices {
            let n = choice.options.len();
            selections.push(branch % n);
            branch /= n;
        }
        selections
    }
}
