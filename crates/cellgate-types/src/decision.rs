//! Decision taxonomy.
//!
//! Every check in the core answers with either an allow value or a
//! [`DenyReason`]. Denials are decisions, not faults: they are returned in
//! `Result::Err` and never raised through panics. [`FailureClass`] groups them
//! for callers deciding whether a retry makes sense.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::dependencies::Dependency;
use crate::ids::CellId;
use crate::model::DataTier;
use crate::operation::{OpTier, Operation};

/// Coarse failure classes callers branch on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureClass {
    /// Auth is down; nothing is retryable until it recovers.
    AuthDenied,
    /// Fail-closed tier, residency, purpose or grant violation.
    PolicyDenied,
    /// Retry after the sliding window elapses.
    RateLimited,
    /// Key reused with a different payload (or missing). Caller bug.
    IdempotencyConflict,
    /// Retry once placement (or the home cell) recovers.
    PlacementUnavailable,
    /// Object erased. Permanent.
    Tombstoned,
}

impl FailureClass {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            FailureClass::RateLimited | FailureClass::PlacementUnavailable
        )
    }
}

impl fmt::Display for FailureClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureClass::AuthDenied => "AuthDenied",
            FailureClass::PolicyDenied => "PolicyDenied",
            FailureClass::RateLimited => "RateLimited",
            FailureClass::IdempotencyConflict => "IdempotencyConflict",
            FailureClass::PlacementUnavailable => "PlacementUnavailable",
            FailureClass::Tombstoned => "Tombstoned",
        };
        f.write_str(name)
    }
}

/// Which sliding window refused the request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RateLimitKind {
    Action,
    HighRisk,
}

impl fmt::Display for RateLimitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RateLimitKind::Action => f.write_str("coarse rate limit"),
            RateLimitKind::HighRisk => f.write_str("coarse high-risk velocity"),
        }
    }
}

/// Rule of the sensitive-operation policy engine that denied a request.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum PolicyDenial {
    #[error("missing actor")]
    MissingActor,

    #[error("missing purpose")]
    MissingPurpose,

    #[error("missing tenant")]
    MissingTenant,

    #[error("deps unavailable for {tier} (fail closed)")]
    DependenciesUnavailable { tier: DataTier },

    #[error("residency requires home-region servicing")]
    Residency,

    #[error("safe read must use read-model path")]
    SafeReadOnVaultPath,

    #[error("{op} is not served by the vault path")]
    NotVaultOperation { op: Operation },

    #[error("missing grant")]
    MissingGrant,

    #[error("grant mismatch")]
    GrantMismatch,

    #[error("grant expired or revoked")]
    GrantInactive,

    #[error("purpose mismatch")]
    PurposeMismatch,

    #[error("minimum-necessary ({op} not allowed for purpose '{purpose}')")]
    MinimumNecessary { op: Operation, purpose: String },
}

/// Why a request was refused.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum DenyReason {
    #[error("auth unavailable")]
    AuthUnavailable,

    #[error("{} unavailable{}", .dependency, fail_closed_suffix(.tier))]
    DependencyUnavailable { dependency: Dependency, tier: OpTier },

    #[error("{0}")]
    Policy(#[from] PolicyDenial),

    #[error("{0}")]
    RateLimited(RateLimitKind),

    #[error("missing idempotency key")]
    MissingIdempotencyKey,

    #[error("idempotency key reused with different payload")]
    IdempotencyConflict,

    #[error("placement unavailable and cache stale")]
    PlacementUnavailable,

    #[error("home cell down ({cell}) for {tier}")]
    HomeCellDown { cell: CellId, tier: OpTier },

    #[error("KMS gate (wrong region or crypto-erased)")]
    KmsGate,

    #[error("deleted (tombstone)")]
    Tombstoned,

    #[error("{op} is not a safe read")]
    NotSafeRead { op: Operation },

    #[error("policy down (safe reads limited to self)")]
    SafeReadSelfOnly,
}

fn fail_closed_suffix(tier: &OpTier) -> &'static str {
    match tier {
        OpTier::Tier2 => " (Tier-2 fail closed)",
        OpTier::Tier0 | OpTier::Tier1 => "",
    }
}

impl DenyReason {
    pub fn class(&self) -> FailureClass {
        match self {
            DenyReason::AuthUnavailable => FailureClass::AuthDenied,
            DenyReason::DependencyUnavailable { .. }
            | DenyReason::Policy(_)
            | DenyReason::KmsGate
            | DenyReason::NotSafeRead { .. }
            | DenyReason::SafeReadSelfOnly => FailureClass::PolicyDenied,
            DenyReason::RateLimited(_) => FailureClass::RateLimited,
            DenyReason::MissingIdempotencyKey | DenyReason::IdempotencyConflict => {
                FailureClass::IdempotencyConflict
            }
            DenyReason::PlacementUnavailable | DenyReason::HomeCellDown { .. } => {
                FailureClass::PlacementUnavailable
            }
            DenyReason::Tombstoned => FailureClass::Tombstoned,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.class().is_retryable()
    }

    /// `DENY: <reason>` as written to the audit ledger and logs.
    pub fn audit_text(&self) -> String {
        format!("DENY: {self}")
    }
}
