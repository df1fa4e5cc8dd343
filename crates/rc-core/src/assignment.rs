//! Assignment snapshots and role counting
//!
//! A `ShardAssignment` is the view of the whole cluster delivered by the
//! addresser watch: which address holds each master slot and each replica
//! slot. `RoleCounts` aggregates it into per-node load for balancing.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::address::{Address, ReplicaIndex, ShardId};

/// Snapshot of the global shard-to-address mapping
///
/// A missing key means the corresponding slot is open.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardAssignment {
    /// Master slot per shard
    pub masters: HashMap<ShardId, Address>,
    /// Replica slots per shard, keyed by replica index
    pub replicas: HashMap<ShardId, HashMap<ReplicaIndex, Address>>,
}

impl ShardAssignment {
    /// Check whether a node holds any role (master or replica) for a shard
    pub fn node_has_role(&self, shard: ShardId, node_id: &str) -> bool {
        if let Some(address) = self.masters.get(&shard) {
            if address.is_node(node_id) {
                return true;
            }
        }
        if let Some(addresses) = self.replicas.get(&shard) {
            if addresses.values().any(|address| address.is_node(node_id)) {
                return true;
            }
        }
        false
    }

    /// Number of replica slots currently filled for a shard
    pub fn replica_count(&self, shard: ShardId) -> usize {
        self.replicas.get(&shard).map_or(0, HashMap::len)
    }

    /// Count master and replica claims per node id
    ///
    /// Each replica slot counts 1. Nodes holding no role are absent.
    pub fn role_counts(&self) -> RoleCounts {
        let mut counts = RoleCounts::default();
        for address in self.masters.values() {
            counts.add(&address.node_id);
        }
        for addresses in self.replicas.values() {
            for address in addresses.values() {
                counts.add(&address.node_id);
            }
        }
        counts
    }
}

/// Per-node role counts for an assignment snapshot
#[derive(Debug, Clone, Default)]
pub struct RoleCounts {
    counts: HashMap<String, usize>,
}

impl RoleCounts {
    fn add(&mut self, node_id: &str) {
        *self.counts.entry(node_id.to_string()).or_insert(0) += 1;
    }

    /// Role count for a node; 0 when the node holds nothing
    pub fn count(&self, node_id: &str) -> usize {
        self.counts.get(node_id).copied().unwrap_or(0)
    }

    /// Lowest count among nodes holding at least one role
    pub fn min_count(&self) -> Option<usize> {
        self.counts.values().copied().min()
    }

    /// Node with the highest count, and its count
    ///
    /// Ties break arbitrarily; the balancing algorithm tolerates any
    /// tie-break.
    pub fn max_entry(&self) -> Option<(&str, usize)> {
        self.counts
            .iter()
            .max_by_key(|(_, count)| **count)
            .map(|(node_id, count)| (node_id.as_str(), *count))
    }
}
