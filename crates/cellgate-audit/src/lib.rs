//! Tamper-evident audit ledger.
//!
//! Every sensitive decision, allow or deny, is appended as an [`AuditEvent`].
//! Each event's hash covers all of its fields plus the previous event's hash,
//! starting from the [`GENESIS`] sentinel, so mutating any stored field breaks
//! verification from that event onward.
//!
//! Hashing runs over an explicit, versioned byte encoding
//! ([`canonical`]) rather than a serializer's output, which keeps the chain
//! reproducible by any implementation that follows the same field order.
//!
//! A failed verification is a detection signal. The ledger never repairs
//! itself.

#![deny(unsafe_code)]

pub mod canonical;
pub mod error;
pub mod event;
pub mod ledger;

pub use error::LedgerError;
pub use event::{AuditDecision, AuditEvent, AuditRecord};
pub use ledger::{verify_events, AuditLedger, LedgerConfig, GENESIS};
