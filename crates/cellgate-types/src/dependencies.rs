use serde::{Deserialize, Serialize};
use std::fmt;

/// External collaborators whose health gates authorization.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dependency {
    Auth,
    Policy,
    Risk,
    Audit,
    Kms,
    Placement,
}

impl Dependency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Dependency::Auth => "auth",
            Dependency::Policy => "policy",
            Dependency::Risk => "risk",
            Dependency::Audit => "audit",
            Dependency::Kms => "KMS",
            Dependency::Placement => "placement",
        }
    }
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-request dependency health. Built fresh for every call, never stored.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependencies {
    pub auth_ok: bool,
    pub policy_ok: bool,
    pub risk_ok: bool,
    pub audit_ok: bool,
    pub kms_ok: bool,
    pub placement_ok: bool,
}

impl Dependencies {
    /// Everything healthy.
    pub fn healthy() -> Self {
        Self {
            auth_ok: true,
            policy_ok: true,
            risk_ok: true,
            audit_ok: true,
            kms_ok: true,
            placement_ok: true,
        }
    }

    /// Copy of `self` with `dependency` marked down.
    pub fn without(mut self, dependency: Dependency) -> Self {
        *self.slot(dependency) = false;
        self
    }

    pub fn is_up(&self, dependency: Dependency) -> bool {
        match dependency {
            Dependency::Auth => self.auth_ok,
            Dependency::Policy => self.policy_ok,
            Dependency::Risk => self.risk_ok,
            Dependency::Audit => self.audit_ok,
            Dependency::Kms => self.kms_ok,
            Dependency::Placement => self.placement_ok,
        }
    }

    /// AND of auth, policy, risk, audit and KMS.
    pub fn healthy_for_sensitive(&self) -> bool {
        self.auth_ok && self.policy_ok && self.risk_ok && self.audit_ok && self.kms_ok
    }

    fn slot(&mut self, dependency: Dependency) -> &mut bool {
        match dependency {
            Dependency::Auth => &mut self.auth_ok,
            Dependency::Policy => &mut self.policy_ok,
            Dependency::Risk => &mut self.risk_ok,
            Dependency::Audit => &mut self.audit_ok,
            Dependency::Kms => &mut self.kms_ok,
            Dependency::Placement => &mut self.placement_ok,
        }
    }
}

impl Default for Dependencies {
    fn default() -> Self {
        Self::healthy()
    }
}
