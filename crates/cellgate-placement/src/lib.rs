//! Shard placement and request routing.
//!
//! Users map to logical shards by rendezvous (highest random weight) hashing
//! over a fixed shard set. Shards map to physical `{region, cell}` locations
//! through a versioned [`PlacementService`]. The [`Router`] caches the last
//! snapshot it fetched while placement was healthy and serves it for a
//! bounded time during placement outages.
//!
//! ## Invariants
//!
//! - Shard resolution is a pure function of `(user, shard set)`.
//! - Placement versions never decrease, in the service or in a router cache.
//! - A cached snapshot older than the configured TTL is never served.
//! - Security-critical writes never queue; they fail when the home cell is down.

#![deny(unsafe_code)]

pub mod error;
pub mod rendezvous;
pub mod router;
pub mod service;

pub use error::PlacementError;
pub use rendezvous::{rendezvous_score, LoadDistribution, ShardSet};
pub use router::{
    HomePlacement, ReadRoute, Router, RouterConfig, SnapshotSource, WriteDecision, WriteRoute,
};
pub use service::{PlacementService, PlacementSnapshot};
