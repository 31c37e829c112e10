//! Sensitive vault for regulated (tier 2/3) data.
//!
//! - [`policy`]: first-match policy engine for sensitive operations
//!   (dependency health, residency, owner, admin, grant + purpose).
//! - [`kms`]: region-bound key wrapping with irreversible per-object
//!   revocation (crypto-erasure).
//! - [`deletion`]: permanent tombstones and a FIFO cleanup queue.
//! - [`shares`]: owner-issued grants with one-way revocation.
//! - [`read_model`] and [`derived`]: the replicated read-safe model and the
//!   derived artifacts that erasure must purge.

#![deny(unsafe_code)]

pub mod deletion;
pub mod derived;
pub mod error;
pub mod kms;
pub mod policy;
pub mod read_model;
pub mod shares;

pub use deletion::{DeletionConfig, DeletionManager, Tombstone};
pub use derived::DerivedStore;
pub use error::{KmsError, ShareError};
pub use kms::{KmsConfig, KmsMock, WrappedKey};
pub use policy::{AccessBasis, PolicyConfig, PolicyInput, SensitivePolicy};
pub use read_model::{ReadModel, ReadModelStore, SafeReadView};
pub use shares::ShareStore;
