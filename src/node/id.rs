//! Cluster member identifiers.

use serde::{Deserialize, Serialize};

/// Identifies one cluster member.
///
/// Registries iterate nodes in ascending `NodeId` order, which fixes the
/// processing order within a tick. Serialized as the bare integer so it
/// can key JSON maps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(u64);

impl NodeId {
    #[inline]
    pub fn new(id: u64) -> Self {
        NodeId(id)
    }

    #[inline]
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl From<u64> for NodeId {
    fn from(id: u64) -> Self {
        NodeId(id)
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "N{}", self.0)
    }
}
