//! Contracts consumed by the roler
//!
//! The addresser is the coordination store the cluster agrees through; the
//! sharder fixes the shard space; the server activates and deactivates
//! data-plane duties. All three are trait seams so the control loop can be
//! driven by a real store or an in-memory double.

use async_trait::async_trait;
use rc_core::{Address, ReplicaIndex, ShardAssignment, ShardId, Token};
use tokio::sync::watch;

use crate::error::{AddresserError, RolerError};

/// Result of a compare-and-swap claim
///
/// Losing the race is part of normal operation, so it travels on the `Ok`
/// path; only infrastructure failures are errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// The claim was written; carries the store's modification index
    Won(Token),
    /// The witness did not match the current slot holder
    Lost,
}

/// Callback invoked by the addresser watch on every assignment change
///
/// Invoked serially per node: a new snapshot is never delivered while a
/// previous `on_update` is still running.
#[async_trait]
pub trait AssignmentHandler: Send + Sync {
    /// Process one snapshot. Returns the modification index to resume the
    /// watch from when a claim was made, so the handler observes the
    /// effect of its own claim as the next snapshot.
    async fn on_update(&self, view: &ShardAssignment) -> Result<Option<Token>, RolerError>;
}

/// Coordination store facade
///
/// The store's wire format and persistence are opaque to the roler; it
/// only needs watched snapshots, CAS claims, and lease-keeping holds.
#[async_trait]
pub trait Addresser: Send + Sync {
    /// Watch the global assignment, invoking `handler` on every change
    /// until `cancel` fires. Handler errors end the watch and propagate.
    async fn watch_shard_to_address(
        &self,
        cancel: watch::Receiver<bool>,
        handler: &dyn AssignmentHandler,
    ) -> Result<(), RolerError>;

    /// Atomically claim the master slot for a shard
    ///
    /// With `prev_addr: None` the claim succeeds only when the slot is
    /// unset; with `Some(addr)` only when the current holder equals
    /// `addr` exactly (backfilling flag included).
    async fn claim_master_address(
        &self,
        shard: ShardId,
        new_addr: Address,
        prev_addr: Option<Address>,
    ) -> Result<ClaimOutcome, AddresserError>;

    /// Atomically claim a replica slot for a shard
    async fn claim_replica_address(
        &self,
        shard: ShardId,
        index: ReplicaIndex,
        new_addr: Address,
        prev_addr: Option<Address>,
    ) -> Result<ClaimOutcome, AddresserError>;

    /// Keep a master claim alive until `cancel` fires or the claim is
    /// lost to another node; returns when the address should be released
    async fn hold_master_address(
        &self,
        shard: ShardId,
        addr: Address,
        cancel: watch::Receiver<bool>,
    );

    /// Keep a replica claim alive until `cancel` fires or the claim is
    /// lost to another node
    async fn hold_replica_address(
        &self,
        shard: ShardId,
        index: ReplicaIndex,
        addr: Address,
        cancel: watch::Receiver<bool>,
    );
}

/// Shard space provider
pub trait Sharder: Send + Sync {
    /// Total shard count, constant over the process lifetime
    fn num_shards(&self) -> usize;
}

/// Sharder with a fixed shard count
#[derive(Debug, Clone)]
pub struct FixedSharder {
    num_shards: usize,
}

impl FixedSharder {
    pub fn new(num_shards: usize) -> Self {
        Self { num_shards }
    }
}

impl Sharder for FixedSharder {
    fn num_shards(&self) -> usize {
        self.num_shards
    }
}

/// Data-plane callbacks, invoked serially per shard
#[async_trait]
pub trait Server: Send + Sync {
    /// Activate master duties for a shard
    async fn master(&self, shard: ShardId) -> anyhow::Result<()>;

    /// Activate replica duties for a shard
    async fn replica(&self, shard: ShardId) -> anyhow::Result<()>;

    /// Deactivate duties for a shard; must be idempotent per shard
    async fn clear(&self, shard: ShardId);
}
