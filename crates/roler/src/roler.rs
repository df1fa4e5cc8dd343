//! The role assignment control loop
//!
//! One roler runs per node. It registers a watch on the addresser and, on
//! every snapshot, decides between claiming an open role, stealing from the
//! most loaded peer, and doing nothing. Decisions turn into CAS claims; a
//! won claim activates the server and leaves behind a hold worker that
//! keeps the claim alive until cancellation or until a peer steals it.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::seq::{IteratorRandom, SliceRandom};
use rand::SeedableRng;
use rc_core::{Address, ReplicaIndex, ShardAssignment, ShardId, Token};
use tokio::sync::watch;
use tracing::{debug, info};

use crate::config::RolerConfig;
use crate::error::RolerError;
use crate::traits::{Addresser, AssignmentHandler, ClaimOutcome, Server, Sharder};

/// Per-node role assignment loop
pub struct Roler {
    addresser: Arc<dyn Addresser>,
    sharder: Arc<dyn Sharder>,
    server: Arc<dyn Server>,
    local_address: String,
    num_replicas: usize,
    cancel_tx: watch::Sender<bool>,
    cancelled: Mutex<bool>,
}

impl Roler {
    /// Create a roler for this node
    pub fn new(
        addresser: Arc<dyn Addresser>,
        sharder: Arc<dyn Sharder>,
        server: Arc<dyn Server>,
        config: RolerConfig,
    ) -> Self {
        let (cancel_tx, _) = watch::channel(false);
        Self {
            addresser,
            sharder,
            server,
            local_address: config.local_address,
            num_replicas: config.num_replicas,
            cancel_tx,
            cancelled: Mutex::new(false),
        }
    }

    /// Run the control loop until cancellation or an unrecoverable error
    pub async fn run(&self) -> Result<(), RolerError> {
        self.addresser
            .watch_shard_to_address(self.cancel_tx.subscribe(), self)
            .await
    }

    /// Signal cancellation; idempotent and safe to call concurrently
    ///
    /// The watch loop and every live hold worker observe the signal, so
    /// `run` returns and each held role is cleared.
    pub fn cancel(&self) {
        let mut cancelled = self.cancelled.lock();
        if !*cancelled {
            *cancelled = true;
            info!("roler for {} cancelled", self.local_address);
            // send_replace updates the value even with no live receivers,
            // so cancelling before run() still takes effect
            self.cancel_tx.send_replace(true);
        }
    }

    fn local_normal_address(&self) -> Address {
        Address::normal(&self.local_address)
    }

    /// Find an open master slot on a shard where this node holds nothing
    fn open_master_role(&self, view: &ShardAssignment) -> Option<ShardId> {
        shuffled(self.sharder.num_shards()).into_iter().find(|&shard| {
            !view.masters.contains_key(&shard) && !view.node_has_role(shard, &self.local_address)
        })
    }

    /// Find an open replica slot on a shard where this node holds nothing
    fn open_replica_role(&self, view: &ShardAssignment) -> Option<(ShardId, ReplicaIndex)> {
        for shard in shuffled(self.sharder.num_shards()) {
            if view.replica_count(shard) < self.num_replicas
                && !view.node_has_role(shard, &self.local_address)
            {
                let filled = view.replicas.get(&shard);
                for index in shuffled(self.num_replicas) {
                    if filled.map_or(true, |addresses| !addresses.contains_key(&index)) {
                        return Some((shard, index));
                    }
                }
            }
        }
        None
    }

    /// Pick a random replica slot held by `victim_id` on a shard where
    /// this node holds nothing
    fn steal_replica_role(
        &self,
        victim_id: &str,
        view: &ShardAssignment,
    ) -> Option<(Address, ShardId, ReplicaIndex)> {
        view.replicas
            .iter()
            .flat_map(|(&shard, addresses)| {
                addresses
                    .iter()
                    .map(move |(&index, address)| (shard, index, address))
            })
            .filter(|(shard, _, address)| {
                address.is_node(victim_id) && !view.node_has_role(*shard, &self.local_address)
            })
            .choose(&mut StdRng::from_os_rng())
            .map(|(shard, index, address)| (address.clone(), shard, index))
    }

    /// Pick a random master slot held by `victim_id` on a shard where
    /// this node holds nothing
    fn steal_master_role(
        &self,
        victim_id: &str,
        view: &ShardAssignment,
    ) -> Option<(Address, ShardId)> {
        view.masters
            .iter()
            .filter(|(&shard, address)| {
                address.is_node(victim_id) && !view.node_has_role(shard, &self.local_address)
            })
            .choose(&mut StdRng::from_os_rng())
            .map(|(&shard, address)| (address.clone(), shard))
    }

    /// Claim the master slot for a shard and activate master duties
    ///
    /// A lost race is a no-op; the next snapshot reconsiders. On success
    /// a hold worker keeps the claim alive and clears the server when the
    /// hold ends, whether by cancellation or by losing the claim.
    async fn be_master(
        &self,
        shard: ShardId,
        prev_addr: Option<Address>,
    ) -> Result<Option<Token>, RolerError> {
        let addr = self.local_normal_address();
        let token = match self
            .addresser
            .claim_master_address(shard, addr.clone(), prev_addr)
            .await?
        {
            ClaimOutcome::Won(token) => token,
            ClaimOutcome::Lost => {
                debug!("{} lost master claim race for shard {}", self.local_address, shard);
                return Ok(None);
            }
        };
        info!("{} claimed master role for shard {}", self.local_address, shard);
        self.server
            .master(shard)
            .await
            .map_err(|cause| RolerError::Activation { shard, cause })?;
        let addresser = Arc::clone(&self.addresser);
        let server = Arc::clone(&self.server);
        let cancel = self.cancel_tx.subscribe();
        tokio::spawn(async move {
            addresser.hold_master_address(shard, addr, cancel).await;
            server.clear(shard).await;
        });
        Ok(Some(token))
    }

    /// Claim a replica slot for a shard and activate replica duties
    async fn be_replica(
        &self,
        shard: ShardId,
        index: ReplicaIndex,
        prev_addr: Option<Address>,
    ) -> Result<Option<Token>, RolerError> {
        let addr = self.local_normal_address();
        let token = match self
            .addresser
            .claim_replica_address(shard, index, addr.clone(), prev_addr)
            .await?
        {
            ClaimOutcome::Won(token) => token,
            ClaimOutcome::Lost => {
                debug!(
                    "{} lost replica claim race for shard {} index {}",
                    self.local_address, shard, index
                );
                return Ok(None);
            }
        };
        info!(
            "{} claimed replica role for shard {} index {}",
            self.local_address, shard, index
        );
        self.server
            .replica(shard)
            .await
            .map_err(|cause| RolerError::Activation { shard, cause })?;
        let addresser = Arc::clone(&self.addresser);
        let server = Arc::clone(&self.server);
        let cancel = self.cancel_tx.subscribe();
        tokio::spawn(async move {
            addresser
                .hold_replica_address(shard, index, addr, cancel)
                .await;
            server.clear(shard).await;
        });
        Ok(Some(token))
    }

    /// Decide and perform at most one claim for this snapshot
    async fn find_role(&self, view: &ShardAssignment) -> Result<Option<Token>, RolerError> {
        let counts = view.role_counts();
        let my = counts.count(&self.local_address);
        if let Some(lo) = counts.min_count() {
            if my > lo {
                // a peer with fewer roles gets first pick this round
                debug!("{} yielding, a peer holds fewer roles", self.local_address);
                return Ok(None);
            }
        }

        // Unclaimed master slots matter most to the cluster, claim those
        // first.
        if let Some(shard) = self.open_master_role(view) {
            return self.be_master(shard, None).await;
        }

        // Then unclaimed replica slots.
        if let Some((shard, index)) = self.open_replica_role(view) {
            return self.be_replica(shard, index, None).await;
        }

        // Nothing open; consider stealing from the most loaded node.
        let Some((hi_node, hi)) = counts.max_entry() else {
            return Ok(None);
        };
        if my + 1 < hi {
            // The transfer must leave us below the victim's old count, or
            // two nodes would ping-pong a single role forever.
            if let Some((prev_addr, shard, index)) = self.steal_replica_role(hi_node, view) {
                // replicas migrate with less disruption than masters
                return self.be_replica(shard, index, Some(prev_addr)).await;
            }
            if let Some((prev_addr, shard)) = self.steal_master_role(hi_node, view) {
                return self.be_master(shard, Some(prev_addr)).await;
            }
            return Err(RolerError::NoStealableRole {
                node_id: hi_node.to_string(),
            });
        }
        Ok(None)
    }
}

#[async_trait]
impl AssignmentHandler for Roler {
    async fn on_update(&self, view: &ShardAssignment) -> Result<Option<Token>, RolerError> {
        self.find_role(view).await
    }
}

/// Fresh random permutation of `[0, n)`
///
/// Scan order must be explicitly randomized so concurrent claimants spread
/// across shards instead of all contending for shard 0.
fn shuffled(n: usize) -> Vec<usize> {
    let mut order: Vec<usize> = (0..n).collect();
    order.shuffle(&mut StdRng::from_os_rng());
    order
}
