// Note: this file is in tests/mock/, a submodule shared by the
// integration test targets; each target declares `mod mock;`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use rc_core::{Address, ReplicaIndex, ShardAssignment, ShardId, Token};
use roler::{Addresser, AddresserError, AssignmentHandler, ClaimOutcome, RolerError};
use tokio::sync::watch;

/// In-memory addresser
///
/// Keeps the whole assignment behind one lock so claims linearize, and
/// drives watches and holds off a version channel that bumps on every
/// successful CAS. Holds release their claim when cancelled and return
/// silently when the claim was stolen, which is exactly the lease
/// behavior the roler expects from a real coordination store.
#[derive(Clone)]
pub struct MemAddresser {
    inner: Arc<MemAddresserInner>,
}

struct MemAddresserInner {
    state: RwLock<AddressState>,
    version_tx: watch::Sender<u64>,
    /// When set, claims fail with a backend error
    fail_claims: AtomicBool,
}

struct AddressState {
    assignment: ShardAssignment,
    modified_index: u64,
}

impl MemAddresser {
    pub fn new() -> Self {
        let (version_tx, _) = watch::channel(0);
        Self {
            inner: Arc::new(MemAddresserInner {
                state: RwLock::new(AddressState {
                    assignment: ShardAssignment::default(),
                    modified_index: 0,
                }),
                version_tx,
                fail_claims: AtomicBool::new(false),
            }),
        }
    }

    /// Current assignment snapshot
    pub fn assignment(&self) -> ShardAssignment {
        self.inner.state.read().assignment.clone()
    }

    /// Index of the last successful modification
    pub fn modified_index(&self) -> u64 {
        self.inner.state.read().modified_index
    }

    /// Receiver that observes every modification index bump
    pub fn subscribe_version(&self) -> watch::Receiver<u64> {
        self.inner.version_tx.subscribe()
    }

    /// Make subsequent claims fail with a backend error
    pub fn set_fail_claims(&self, fail: bool) {
        self.inner.fail_claims.store(fail, Ordering::SeqCst);
    }

    /// Drop a master claim outright, as a lapsed lease would
    pub fn release_master(&self, shard: ShardId) {
        let mut state = self.inner.state.write();
        if state.assignment.masters.remove(&shard).is_some() {
            Self::bump(&mut state, &self.inner.version_tx);
        }
    }

    fn bump(state: &mut AddressState, version_tx: &watch::Sender<u64>) -> Token {
        state.modified_index += 1;
        let index = state.modified_index;
        let _ = version_tx.send(index);
        index
    }

    fn check_claims_enabled(&self) -> Result<(), AddresserError> {
        if self.inner.fail_claims.load(Ordering::SeqCst) {
            return Err(AddresserError::Backend("injected claim failure".to_string()));
        }
        Ok(())
    }
}

impl Default for MemAddresser {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Addresser for MemAddresser {
    async fn watch_shard_to_address(
        &self,
        mut cancel: watch::Receiver<bool>,
        handler: &dyn AssignmentHandler,
    ) -> Result<(), RolerError> {
        let mut version = self.inner.version_tx.subscribe();
        // Index of the last snapshot delivered to the handler, and the
        // index the handler asked to resume from. Resuming at the token of
        // the handler's own claim makes the post-claim state the next
        // delivered snapshot.
        let mut delivered: Option<u64> = None;
        let mut resume: u64 = 0;
        loop {
            if *cancel.borrow() {
                return Ok(());
            }
            let (view, index) = {
                let state = self.inner.state.read();
                (state.assignment.clone(), state.modified_index)
            };
            let fresh = delivered.map_or(true, |d| index > d) && index >= resume;
            if fresh {
                delivered = Some(index);
                resume = match handler.on_update(&view).await? {
                    Some(token) => token,
                    None => 0,
                };
                continue;
            }
            tokio::select! {
                changed = version.changed() => {
                    if changed.is_err() {
                        return Ok(());
                    }
                }
                changed = cancel.changed() => {
                    // a dropped cancel sender counts as cancellation
                    if changed.is_err() {
                        return Ok(());
                    }
                }
            }
        }
    }

    async fn claim_master_address(
        &self,
        shard: ShardId,
        new_addr: Address,
        prev_addr: Option<Address>,
    ) -> Result<ClaimOutcome, AddresserError> {
        self.check_claims_enabled()?;
        let mut state = self.inner.state.write();
        if state.assignment.masters.get(&shard) != prev_addr.as_ref() {
            return Ok(ClaimOutcome::Lost);
        }
        state.assignment.masters.insert(shard, new_addr);
        let index = Self::bump(&mut state, &self.inner.version_tx);
        Ok(ClaimOutcome::Won(index))
    }

    async fn claim_replica_address(
        &self,
        shard: ShardId,
        index: ReplicaIndex,
        new_addr: Address,
        prev_addr: Option<Address>,
    ) -> Result<ClaimOutcome, AddresserError> {
        self.check_claims_enabled()?;
        let mut state = self.inner.state.write();
        let current = state
            .assignment
            .replicas
            .get(&shard)
            .and_then(|addresses| addresses.get(&index));
        if current != prev_addr.as_ref() {
            return Ok(ClaimOutcome::Lost);
        }
        state
            .assignment
            .replicas
            .entry(shard)
            .or_default()
            .insert(index, new_addr);
        let token = Self::bump(&mut state, &self.inner.version_tx);
        Ok(ClaimOutcome::Won(token))
    }

    async fn hold_master_address(
        &self,
        shard: ShardId,
        addr: Address,
        mut cancel: watch::Receiver<bool>,
    ) {
        let mut version = self.inner.version_tx.subscribe();
        loop {
            if *cancel.borrow() {
                let mut state = self.inner.state.write();
                if state.assignment.masters.get(&shard) == Some(&addr) {
                    state.assignment.masters.remove(&shard);
                    Self::bump(&mut state, &self.inner.version_tx);
                }
                return;
            }
            if self.inner.state.read().assignment.masters.get(&shard) != Some(&addr) {
                // stolen by another node, nothing left to release
                return;
            }
            tokio::select! {
                changed = version.changed() => {
                    if changed.is_err() {
                        return;
                    }
                }
                changed = cancel.changed() => {
                    if changed.is_err() {
                        return;
                    }
                }
            }
        }
    }

    async fn hold_replica_address(
        &self,
        shard: ShardId,
        index: ReplicaIndex,
        addr: Address,
        mut cancel: watch::Receiver<bool>,
    ) {
        let mut version = self.inner.version_tx.subscribe();
        loop {
            if *cancel.borrow() {
                let mut state = self.inner.state.write();
                let held = state
                    .assignment
                    .replicas
                    .get(&shard)
                    .and_then(|addresses| addresses.get(&index))
                    == Some(&addr);
                if held {
                    if let Some(addresses) = state.assignment.replicas.get_mut(&shard) {
                        addresses.remove(&index);
                        if addresses.is_empty() {
                            state.assignment.replicas.remove(&shard);
                        }
                    }
                    Self::bump(&mut state, &self.inner.version_tx);
                }
                return;
            }
            let held = self
                .inner
                .state
                .read()
                .assignment
                .replicas
                .get(&shard)
                .and_then(|addresses| addresses.get(&index))
                == Some(&addr);
            if !held {
                return;
            }
            tokio::select! {
                changed = version.changed() => {
                    if changed.is_err() {
                        return;
                    }
                }
                changed = cancel.changed() => {
                    if changed.is_err() {
                        return;
                    }
                }
            }
        }
    }
}
