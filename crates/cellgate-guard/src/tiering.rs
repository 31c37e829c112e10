//! Dependency-gated tiering.
//!
//! Auth is a universal prerequisite. After that the operation tier decides
//! which outages are tolerated:
//!
//! | Tier | Required dependency down | Risk down (not required) |
//! |------|--------------------------|--------------------------|
//! | 2    | deny (fail closed)       | allow                    |
//! | 1    | deny                     | allow, degraded          |
//! | 0    | allow                    | allow                    |

use cellgate_types::{Dependencies, Dependency, DenyReason, OpTier, Operation};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Positive outcome of [`authorize`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Clearance {
    Allowed,
    /// Tier-1 op admitted while risk scoring is down. Counted against the same
    /// rate limits as a normal allow; callers log it for later reconciliation.
    Degraded { missing: Dependency },
}

impl Clearance {
    pub fn is_degraded(&self) -> bool {
        matches!(self, Clearance::Degraded { .. })
    }
}

impl fmt::Display for Clearance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Clearance::Allowed => f.write_str("ALLOW"),
            Clearance::Degraded { missing } => {
                write!(f, "ALLOW_DEGRADED: Tier-1 ({missing} down)")
            }
        }
    }
}

/// Dependencies checked in this order after auth.
const CHECK_ORDER: [Dependency; 4] = [
    Dependency::Policy,
    Dependency::Risk,
    Dependency::Audit,
    Dependency::Kms,
];

/// Decide whether `op` may proceed given `deps`.
pub fn authorize(op: Operation, deps: &Dependencies) -> Result<Clearance, DenyReason> {
    if !deps.auth_ok {
        return Err(DenyReason::AuthUnavailable);
    }

    let tier = op.tier();
    match tier {
        OpTier::Tier0 => Ok(Clearance::Allowed),
        OpTier::Tier2 => {
            if let Some(dependency) = first_missing(op, deps, &CHECK_ORDER) {
                return Err(DenyReason::DependencyUnavailable { dependency, tier });
            }
            Ok(Clearance::Allowed)
        }
        OpTier::Tier1 => {
            let blocking = [Dependency::Policy, Dependency::Audit, Dependency::Kms];
            if let Some(dependency) = first_missing(op, deps, &blocking) {
                return Err(DenyReason::DependencyUnavailable { dependency, tier });
            }
            if !deps.risk_ok {
                return Ok(Clearance::Degraded {
                    missing: Dependency::Risk,
                });
            }
            Ok(Clearance::Allowed)
        }
    }
}

fn first_missing(op: Operation, deps: &Dependencies, order: &[Dependency]) -> Option<Dependency> {
    order
        .iter()
        .copied()
        .find(|dep| op.requires(*dep) && !deps.is_up(*dep))
}
