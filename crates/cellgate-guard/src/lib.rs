//! Admission guards run in front of every routed request.
//!
//! ## Components
//!
//! - [`tiering`]: per-operation fail-closed / fail-open decision from
//!   dependency health. Tier-2 trades availability for safety, Tier-1 trades
//!   precision for availability when only risk scoring is down.
//! - [`protection`]: per-user sliding-window rate limits. A denial never
//!   consumes a slot.
//! - [`idempotency`]: `(user, op, key)` deduplication with exactly-once
//!   response computation.
//! - [`queue`]: per-user FIFO of deferred writes with TTL and rate-limited
//!   drain.

#![deny(unsafe_code)]

pub mod idempotency;
pub mod protection;
pub mod queue;
pub mod tiering;

pub use idempotency::{payload_hash, IdempotencyConfig, IdempotencyStore, Recorded};
pub use protection::{CoarseProtections, ProtectionConfig};
pub use queue::{DrainReport, QueueConfig, WriteEvent, WriteQueue};
pub use tiering::{authorize, Clearance};
