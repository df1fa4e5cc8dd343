//! Decentralized shard role assignment
//!
//! Every node in the cluster runs a roler: a control loop that watches the
//! shared coordination store (the addresser) and keeps the cluster's shard
//! roles assigned without a central coordinator. On each observed snapshot
//! a node either claims an open master slot, claims an open replica slot,
//! steals a role from the most loaded peer, or does nothing, with a
//! fairness gate ensuring the least loaded node moves first. Claims go
//! through compare-and-swap on the addresser, so races between peers
//! resolve to exactly one winner per slot.
//!
//! # Usage example
//! ```ignore
//! use roler::{Roler, RolerConfig};
//!
//! let roler = Roler::new(addresser, sharder, server, RolerConfig {
//!     local_address: "node1".to_string(),
//!     num_replicas: 2,
//! });
//! roler.run().await?;
//! ```

pub mod config;
pub mod error;
pub mod roler;
pub mod traits;

pub use config::{ConfigError, RolerConfig};
pub use error::{AddresserError, RolerError};
pub use roler::Roler;
pub use traits::{Addresser, AssignmentHandler, ClaimOutcome, FixedSharder, Server, Sharder};
