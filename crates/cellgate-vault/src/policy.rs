//! Sensitive-operation policy engine.
//!
//! Rules are evaluated in order and the first match decides:
//!
//! 1. actor, purpose and tenant must be present
//! 2. tier 2/3 data with unhealthy dependencies is denied (fail closed)
//! 3. tier 2/3 data served outside its home region is denied (residency)
//! 4. the owner is allowed
//! 5. safe-read operations are denied (they belong on the read-model path)
//! 6. operations outside the vault set are denied
//! 7. admins are allowed
//! 8. otherwise a grant must match the object and grantee, be active, carry
//!    the request's purpose, and that purpose must allow the operation
//!
//! Anything not explicitly allowed is denied.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use cellgate_types::{
    DataObject, GrantId, Operation, PolicyDenial, RequestContext, Role, ShareGrant,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Minimum-necessary allowlist: purpose → operations it justifies.
    #[serde(default = "default_purpose_allowlist")]
    pub purpose_allowlist: BTreeMap<String, BTreeSet<Operation>>,
}

fn default_purpose_allowlist() -> BTreeMap<String, BTreeSet<Operation>> {
    use Operation::{ExportData, ViewProfileBasic, ViewTransactionHistory};

    [
        ("lending", vec![ExportData, ViewTransactionHistory]),
        ("treatment", vec![ExportData, ViewTransactionHistory]),
        ("payment", vec![ViewTransactionHistory]),
        ("operations", vec![ViewTransactionHistory]),
        ("ops", vec![ViewProfileBasic, ViewTransactionHistory]),
    ]
    .into_iter()
    .map(|(purpose, ops)| (purpose.to_string(), ops.into_iter().collect()))
    .collect()
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            purpose_allowlist: default_purpose_allowlist(),
        }
    }
}

/// Why the engine allowed a request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccessBasis {
    Owner,
    Admin,
    Grant(GrantId),
}

impl fmt::Display for AccessBasis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessBasis::Owner => f.write_str("ALLOW: owner"),
            AccessBasis::Admin => f.write_str("ALLOW: admin"),
            AccessBasis::Grant(_) => f.write_str("ALLOW: grant+purpose+window OK"),
        }
    }
}

/// Everything one evaluation looks at.
#[derive(Clone, Copy, Debug)]
pub struct PolicyInput<'a> {
    pub op: Operation,
    pub object: &'a DataObject,
    pub context: &'a RequestContext,
    pub grant: Option<&'a ShareGrant>,
    /// AND of auth, policy, risk, audit and KMS health.
    pub deps_healthy: bool,
    pub now: DateTime<Utc>,
}

#[derive(Clone, Debug, Default)]
pub struct SensitivePolicy {
    config: PolicyConfig,
}

impl SensitivePolicy {
    pub fn new(config: PolicyConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PolicyConfig {
        &self.config
    }

    /// Whether `purpose` justifies `op` under the minimum-necessary allowlist.
    pub fn purpose_allows(&self, purpose: &str, op: Operation) -> bool {
        self.config
            .purpose_allowlist
            .get(purpose)
            .is_some_and(|ops| ops.contains(&op))
    }

    pub fn evaluate(&self, input: &PolicyInput<'_>) -> Result<AccessBasis, PolicyDenial> {
        let PolicyInput {
            op,
            object,
            context,
            grant,
            deps_healthy,
            now,
        } = *input;

        if context.actor.is_empty() {
            return Err(PolicyDenial::MissingActor);
        }
        if context.purpose.is_empty() {
            return Err(PolicyDenial::MissingPurpose);
        }
        if object.tenant.is_empty() {
            return Err(PolicyDenial::MissingTenant);
        }

        if object.tier.is_fail_closed() {
            if !deps_healthy {
                return Err(PolicyDenial::DependenciesUnavailable { tier: object.tier });
            }
            if context.serving_region != object.home_region {
                return Err(PolicyDenial::Residency);
            }
        }

        if context.actor == object.owner {
            return Ok(AccessBasis::Owner);
        }

        if op.is_safe_read() {
            return Err(PolicyDenial::SafeReadOnVaultPath);
        }
        if !op.is_vault_op() {
            return Err(PolicyDenial::NotVaultOperation { op });
        }

        if context.role == Role::Admin {
            return Ok(AccessBasis::Admin);
        }

        let grant = grant.ok_or(PolicyDenial::MissingGrant)?;
        if grant.object_id != object.id || grant.grantee != context.actor {
            return Err(PolicyDenial::GrantMismatch);
        }
        if !grant.is_active_at(now) {
            return Err(PolicyDenial::GrantInactive);
        }
        if grant.purpose != context.purpose {
            return Err(PolicyDenial::PurposeMismatch);
        }
        if !self.purpose_allows(&context.purpose, op) {
            return Err(PolicyDenial::MinimumNecessary {
                op,
                purpose: context.purpose.clone(),
            });
        }

        Ok(AccessBasis::Grant(grant.id.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cellgate_types::DataTier;
    use chrono::Duration;

    fn object(tier: DataTier) -> DataObject {
        DataObject::new("doc-1", tier, "eu", "tenant-a", "owner")
    }

    fn ctx(actor: &str, role: Role, serving: &str, purpose: &str) -> RequestContext {
        RequestContext::new(actor, role, "eu", serving, purpose)
    }

    fn grant(now: DateTime<Utc>, purpose: &str) -> ShareGrant {
        ShareGrant::new(
            "g-1",
            "doc-1",
            "owner",
            "lender",
            purpose,
            now - Duration::hours(1),
            now + Duration::hours(1),
        )
    }

    fn eval(
        op: Operation,
        object: &DataObject,
        context: &RequestContext,
        grant: Option<&ShareGrant>,
        deps_healthy: bool,
        now: DateTime<Utc>,
    ) -> Result<AccessBasis, PolicyDenial> {
        SensitivePolicy::default().evaluate(&PolicyInput {
            op,
            object,
            context,
            grant,
            deps_healthy,
            now,
        })
    }

    #[test]
    fn missing_fields_are_denied_first() {
        let now = Utc::now();
        let obj = object(DataTier::Tier3);
        assert_eq!(
            eval(Operation::ExportData, &obj, &ctx("", Role::User, "eu", "lending"), None, true, now),
            Err(PolicyDenial::MissingActor)
        );
        assert_eq!(
            eval(Operation::ExportData, &obj, &ctx("owner", Role::User, "eu", ""), None, true, now),
            Err(PolicyDenial::MissingPurpose)
        );
        let no_tenant = DataObject::new("doc-1", DataTier::Tier3, "eu", "", "owner");
        assert_eq!(
            eval(Operation::ExportData, &no_tenant, &ctx("owner", Role::User, "eu", "x"), None, true, now),
            Err(PolicyDenial::MissingTenant)
        );
    }

    #[test]
    fn residency_beats_role_and_ownership() {
        let now = Utc::now();
        let obj = object(DataTier::Tier3);
        for (actor, role) in [("owner", Role::User), ("root", Role::Admin)] {
            assert_eq!(
                eval(Operation::ExportData, &obj, &ctx(actor, role, "us", "lending"), None, true, now),
                Err(PolicyDenial::Residency)
            );
        }
    }

    #[test]
    fn unhealthy_deps_fail_closed_for_regulated_tiers_only() {
        let now = Utc::now();
        let owner = ctx("owner", Role::User, "eu", "self");
        assert_eq!(
            eval(Operation::ExportData, &object(DataTier::Tier2), &owner, None, false, now),
            Err(PolicyDenial::DependenciesUnavailable {
                tier: DataTier::Tier2
            })
        );
        assert_eq!(
            eval(Operation::ExportData, &object(DataTier::Tier1), &owner, None, false, now),
            Ok(AccessBasis::Owner)
        );
    }

    #[test]
    fn owner_is_allowed_after_residency() {
        let now = Utc::now();
        let obj = object(DataTier::Tier3);
        let basis = eval(Operation::ExportData, &obj, &ctx("owner", Role::User, "eu", "self"), None, true, now);
        assert_eq!(basis, Ok(AccessBasis::Owner));
    }

    #[test]
    fn safe_reads_and_unknown_ops_are_refused() {
        let now = Utc::now();
        let obj = object(DataTier::Tier3);
        let admin = ctx("root", Role::Admin, "eu", "ops");
        assert_eq!(
            eval(Operation::ViewBalance, &obj, &admin, None, true, now),
            Err(PolicyDenial::SafeReadOnVaultPath)
        );
        assert_eq!(
            eval(Operation::LowValueAction, &obj, &admin, None, true, now),
            Err(PolicyDenial::NotVaultOperation {
                op: Operation::LowValueAction
            })
        );
        assert_eq!(
            eval(Operation::ChangePermissions, &obj, &admin, None, true, now),
            Ok(AccessBasis::Admin)
        );
    }

    #[test]
    fn tier_two_ops_outside_the_vault_set_are_refused() {
        let now = Utc::now();
        let obj = object(DataTier::Tier3);
        let admin = ctx("root", Role::Admin, "eu", "ops");
        for op in [Operation::ViewPii, Operation::IssueToken, Operation::RotateKeys] {
            assert_eq!(
                eval(op, &obj, &admin, None, true, now),
                Err(PolicyDenial::NotVaultOperation { op })
            );
        }
        // The owner rule runs first.
        assert_eq!(
            eval(Operation::ViewPii, &obj, &ctx("owner", Role::User, "eu", "self"), None, true, now),
            Ok(AccessBasis::Owner)
        );
    }

    #[test]
    fn grant_rules_in_order() {
        let now = Utc::now();
        let obj = object(DataTier::Tier3);
        let lender = ctx("lender", Role::Lender, "eu", "lending");

        assert_eq!(
            eval(Operation::ExportData, &obj, &lender, None, true, now),
            Err(PolicyDenial::MissingGrant)
        );

        let mut other_object = grant(now, "lending");
        other_object.object_id = "doc-2".into();
        assert_eq!(
            eval(Operation::ExportData, &obj, &lender, Some(&other_object), true, now),
            Err(PolicyDenial::GrantMismatch)
        );

        let mut revoked = grant(now, "lending");
        revoked.revoke();
        assert_eq!(
            eval(Operation::ExportData, &obj, &lender, Some(&revoked), true, now),
            Err(PolicyDenial::GrantInactive)
        );

        let expired = grant(now, "lending");
        assert_eq!(
            eval(Operation::ExportData, &obj, &lender, Some(&expired), true, now + Duration::hours(2)),
            Err(PolicyDenial::GrantInactive)
        );

        let wrong_purpose = grant(now, "payment");
        assert_eq!(
            eval(Operation::ExportData, &obj, &lender, Some(&wrong_purpose), true, now),
            Err(PolicyDenial::PurposeMismatch)
        );

        let ok = grant(now, "lending");
        assert_eq!(
            eval(Operation::ExportData, &obj, &lender, Some(&ok), true, now),
            Ok(AccessBasis::Grant(GrantId::from("g-1")))
        );
        assert!(matches!(
            eval(Operation::TransferMoney, &obj, &lender, Some(&ok), true, now),
            Err(PolicyDenial::MinimumNecessary { .. })
        ));
    }

    #[test]
    fn default_allowlist_matches_purposes() {
        let policy = SensitivePolicy::default();
        assert!(policy.purpose_allows("lending", Operation::ExportData));
        assert!(policy.purpose_allows("ops", Operation::ViewProfileBasic));
        assert!(!policy.purpose_allows("payment", Operation::ExportData));
        assert!(!policy.purpose_allows("marketing", Operation::ViewTransactionHistory));
    }
}
