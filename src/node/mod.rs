//! Cluster members and the rules that move them between roles.
//!
//! Nodes never talk to each other directly. Each tick the registry
//! first drains every inbox, then advances every phase clock; both
//! phases hand back [`Outbound`] messages that the engine turns into
//! packets.
//!
//! # Module structure
//!
//! | Sub-module | Contents |
//! |---|---|
//! | [`id`] | [`NodeId`] newtype |
//! | [`position`] | [`Position`] and transit distance |
//! | [`message`] | [`MessageKind`], [`InboxMessage`], [`Outbound`] |
//! | [`state`] | [`RaftNode`], [`Role`], transition rules |
//! | [`registry`] | [`NodeRegistry`] |

pub mod id;
pub mod message;
pub mod position;
pub mod registry;
pub mod state;

pub use id::NodeId;
pub use message::{InboxMessage, MessageKind, Outbound};
pub use position::Position;
pub use registry::NodeRegistry;
pub use state::{RaftNode, Role};

#[cfg(test)]
mod tests;
