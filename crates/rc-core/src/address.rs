//! Claimant identity
//!
//! Defines the address value stored in the coordination store for every
//! claimed role, plus the id types used throughout the assignment model.

use serde::{Deserialize, Serialize};

/// Shard ID type, in `[0, num_shards)`
pub type ShardId = usize;

/// Replica slot index, in `[0, num_replicas)`
pub type ReplicaIndex = usize;

/// Modification index returned by the coordination store on each
/// successful compare-and-swap. Monotonically non-decreasing.
pub type Token = u64;

/// Address of a node claiming a role
///
/// The `backfilling` flag tags a claimant whose data state is not yet
/// caught up. Two addresses are equal only when both fields match, which
/// is what the claim CAS compares; load counting compares node ids alone.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Address {
    /// Stable node identifier, unique per live node
    pub node_id: String,
    /// Whether the claimant is still catching up on data
    pub backfilling: bool,
}

impl Address {
    /// Create an address in normal form
    pub fn normal(node_id: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            backfilling: false,
        }
    }

    /// Create an address in backfilling form
    pub fn backfilling(node_id: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            backfilling: true,
        }
    }

    /// Check whether this address belongs to the given node, regardless
    /// of backfilling state
    pub fn is_node(&self, node_id: &str) -> bool {
        self.node_id == node_id
    }
}
