//! Error taxonomy for the role assignment loop
//!
//! A lost compare-and-swap is not an error (see `ClaimOutcome`); only
//! infrastructure failures, activation failures, and snapshot
//! inconsistencies surface here.

use rc_core::ShardId;
use thiserror::Error;

/// Infrastructure failure reported by the addresser
#[derive(Debug, Error)]
pub enum AddresserError {
    #[error("addresser transport error: {0}")]
    Transport(String),
    #[error("addresser backend error: {0}")]
    Backend(String),
}

/// Errors surfaced by the roler control loop
#[derive(Debug, Error)]
pub enum RolerError {
    /// The addresser watch, claim, or hold hit an infrastructure failure
    #[error(transparent)]
    Addresser(#[from] AddresserError),

    /// The server failed to activate a freshly claimed role. The claim
    /// stays in the store without a hold worker, so it lapses once its
    /// lease expires and a peer reclaims it.
    #[error("activation failed for shard {shard}: {cause}")]
    Activation {
        shard: ShardId,
        cause: anyhow::Error,
    },

    /// The steal gap condition held but the most loaded node had no
    /// stealable role. Indicates an inconsistent snapshot or an addresser
    /// bug.
    #[error("no stealable role found on most loaded node {node_id}")]
    NoStealableRole { node_id: String },
}
