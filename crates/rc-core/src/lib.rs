//! Core data model for shard role assignment
//!
//! Provides the types shared between the roler and addresser layers:
//! - Node addresses and claim identity
//! - Assignment snapshots (shard -> master, shard -> replica slots)
//! - Role counting for load balancing

pub mod address;
pub mod assignment;

// Re-export commonly used types
pub use address::{Address, ReplicaIndex, ShardId, Token};
pub use assignment::{RoleCounts, ShardAssignment};
