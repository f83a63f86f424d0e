//! # Tribune — Raft leader election, one tick at a time
//!
//! A deterministic simulator of Raft leader election. Nodes sit on a 2-D
//! plane, messages travel between them as packets that cover a fixed
//! distance per tick, and every tick is recorded so the timeline can be
//! previewed, rewound and replayed.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────┐
//! │          Controller           │ ← pause / speed / preview / jump
//! │  ┌─────────────────────────┐  │
//! │  │       TickEngine        │  │ ← five-phase step
//! │  │  ┌───────────────────┐  │  │
//! │  │  │   NodeRegistry    │  │  │ ← roles, terms, votes
//! │  │  └───────────────────┘  │  │
//! │  │  ┌───────────────────┐  │  │
//! │  │  │  PacketRegistry   │  │  │ ← messages in flight
//! │  │  └───────────────────┘  │  │
//! │  │  ┌───────────────────┐  │  │
//! │  │  │   TimerSource     │  │  │ ← seeded phase thresholds
//! │  │  └───────────────────┘  │  │
//! │  │  ┌───────────────────┐  │  │
//! │  │  │     History       │  │  │ ← snapshot per tick
//! │  │  └───────────────────┘  │  │
//! │  └─────────────────────────┘  │
//! └───────────────────────────────┘
//! ```

pub mod config;
pub mod control;
pub mod dsl;
pub mod engine;
pub mod error;
pub mod explorer;
pub mod history;
pub mod node;
pub mod packet;
pub mod time;
pub mod timer;

#[cfg(feature = "wasm")]
pub mod wasm;

// Re-exports for convenience.
pub use config::{SimConfig, TimerConfig};
pub use control::{Controller, ExternalEvent, NodeSummary};
pub use dsl::ClusterBuilder;
pub use engine::TickEngine;
pub use error::{TribuneError, TribuneResult};
pub use explorer::{
    Choice, ExplorationResult, Explorer, Injection, NamedProperty, Property, Violation,
};
pub use history::{first_divergence, History, Snapshot};
pub use node::{InboxMessage, MessageKind, NodeId, NodeRegistry, Position, RaftNode, Role};
pub use packet::{Packet, PacketId, PacketRegistry};
pub use time::Tick;
pub use timer::{FixedTimers, SeededTimers, TimerSource};
