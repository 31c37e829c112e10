//! Enforcement gateway: the single compliance choke point.
//!
//! - Safe reads (tier 0/1) are served from the read-safe model. They need only
//!   auth, are limited to self-access while policy is down, and never touch
//!   the policy engine or the audit ledger.
//! - Sensitive operations go through tombstone check, placement, the policy
//!   engine and the KMS gate. Exactly one audit event is appended per call,
//!   whatever the outcome.
//! - Erasure tombstones the object, purges derived artifacts, revokes its key
//!   and drops the owner's read model under an exclusive barrier, so no
//!   reader observes a half-deleted object.

use std::collections::HashMap;
use std::sync::Arc;

use cellgate_audit::{AuditDecision, AuditLedger, AuditRecord};
use cellgate_placement::{HomePlacement, Router};
use cellgate_types::{
    Clock, DataObject, Dependencies, DenyReason, GrantId, ObjectId, Operation, RequestContext,
    ShareGrant, TenantId, UserId,
};
use cellgate_vault::{
    AccessBasis, DeletionManager, DerivedStore, KmsMock, PolicyInput, ReadModelStore,
    SafeReadView, SensitivePolicy, ShareStore, Tombstone, WrappedKey,
};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::CellgateConfig;
use crate::error::GatewayError;

const ERASURE_REASON: &str = "erasure";

/// An allowed sensitive operation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensitiveGrant {
    pub basis: AccessBasis,
    pub home: HomePlacement,
    /// Sequence of the audit event recording this decision.
    pub audit_sequence: u64,
}

/// Placement and grant facts gathered during evaluation, recorded in the audit
/// event whether or not evaluation got far enough to use them.
#[derive(Default)]
struct Trail {
    home: Option<HomePlacement>,
    grant_id: Option<GrantId>,
}

pub struct EnforcementGateway {
    router: Arc<Router>,
    policy: SensitivePolicy,
    ledger: AuditLedger,
    kms: KmsMock,
    shares: ShareStore,
    deletions: DeletionManager,
    read_models: ReadModelStore,
    derived: DerivedStore,
    wrapped_keys: RwLock<HashMap<ObjectId, WrappedKey>>,
    barrier: RwLock<()>,
    clock: Arc<dyn Clock>,
}

impl EnforcementGateway {
    pub fn new(router: Arc<Router>, config: &CellgateConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            router,
            policy: SensitivePolicy::new(config.policy.clone()),
            ledger: AuditLedger::new(config.ledger.clone()).with_clock(clock.clone()),
            kms: KmsMock::new(config.kms.clone()),
            shares: ShareStore::new(),
            deletions: DeletionManager::new(config.deletion.clone()).with_clock(clock.clone()),
            read_models: ReadModelStore::new(),
            derived: DerivedStore::new(),
            wrapped_keys: RwLock::new(HashMap::new()),
            barrier: RwLock::new(()),
            clock,
        }
    }

    // ── Accessors ───────────────────────────────────────────────────────

    pub fn ledger(&self) -> &AuditLedger {
        &self.ledger
    }

    pub fn kms(&self) -> &KmsMock {
        &self.kms
    }

    pub fn deletions(&self) -> &DeletionManager {
        &self.deletions
    }

    pub fn read_models(&self) -> &ReadModelStore {
        &self.read_models
    }

    pub fn derived(&self) -> &DerivedStore {
        &self.derived
    }

    pub fn shares(&self) -> &ShareStore {
        &self.shares
    }

    pub fn wrapped_key(&self, object: &ObjectId) -> Option<WrappedKey> {
        self.wrapped_keys.read().get(object).cloned()
    }

    // ── Object lifecycle ────────────────────────────────────────────────

    /// Provision a data key wrapped for the object's home region.
    pub fn create_object(&self, object: &DataObject) -> Result<WrappedKey, GatewayError> {
        let _barrier = self.barrier.read();
        if self.deletions.is_deleted(&object.id) {
            return Err(GatewayError::Tombstoned(object.id.clone()));
        }
        let wrapped = self.kms.provision(&object.id, &object.home_region)?;
        self.wrapped_keys
            .write()
            .insert(object.id.clone(), wrapped.clone());
        info!(object = %object.id, tier = %object.tier, home = %object.home_region, "object created");
        Ok(wrapped)
    }

    pub fn share(&self, grant: ShareGrant) -> Result<(), GatewayError> {
        self.shares.put(grant)?;
        Ok(())
    }

    pub fn revoke(&self, grant: &GrantId) -> Result<(), GatewayError> {
        self.shares.revoke(grant)?;
        Ok(())
    }

    /// Erase `object`: tombstone, purge derived data, crypto-erase, drop the
    /// owner's read model.
    pub fn gdpr_delete(&self, object: &DataObject) -> Tombstone {
        let _barrier = self.barrier.write();
        let tombstone = self.deletions.request_delete(&object.id, ERASURE_REASON);
        let purged = self.derived.delete_object(&object.id);
        self.kms.revoke_object(&object.id);
        self.read_models.delete_user(&object.owner);
        info!(
            object = %object.id,
            owner = %object.owner,
            purged_artifacts = purged,
            "object erased"
        );
        tombstone
    }

    /// Drain up to `max` cleanup tasks, re-purging derived artifacts for each.
    pub fn run_cleanup_batch(&self, max: usize) -> Vec<ObjectId> {
        let batch = self.deletions.run_cleanup_batch(max);
        for object in &batch {
            self.derived.delete_object(object);
        }
        if !batch.is_empty() {
            info!(count = batch.len(), "cleanup batch processed");
        }
        batch
    }

    // ── Safe reads ──────────────────────────────────────────────────────

    pub fn handle_safe_read(
        &self,
        op: Operation,
        subject: &UserId,
        tenant: &TenantId,
        context: &RequestContext,
        deps: &Dependencies,
    ) -> Result<SafeReadView, DenyReason> {
        let outcome = self.safe_read(op, subject, context, deps);
        match &outcome {
            Ok(_) => debug!(
                actor = %context.actor,
                subject = %subject,
                tenant = %tenant,
                op = %op,
                "safe read served from read model"
            ),
            Err(reason) => warn!(
                actor = %context.actor,
                subject = %subject,
                tenant = %tenant,
                op = %op,
                reason = %reason,
                "safe read denied"
            ),
        }
        outcome
    }

    fn safe_read(
        &self,
        op: Operation,
        subject: &UserId,
        context: &RequestContext,
        deps: &Dependencies,
    ) -> Result<SafeReadView, DenyReason> {
        if !op.is_safe_read() {
            return Err(DenyReason::NotSafeRead { op });
        }
        if !deps.auth_ok {
            return Err(DenyReason::AuthUnavailable);
        }
        if !deps.policy_ok && context.actor != *subject {
            return Err(DenyReason::SafeReadSelfOnly);
        }

        let _barrier = self.barrier.read();
        self.read_models
            .view(op, subject)
            .ok_or(DenyReason::NotSafeRead { op })
    }

    // ── Sensitive operations ────────────────────────────────────────────

    pub fn handle_sensitive(
        &self,
        op: Operation,
        object: &DataObject,
        context: &RequestContext,
        deps: &Dependencies,
    ) -> Result<SensitiveGrant, DenyReason> {
        let _barrier = self.barrier.read();
        let now = self.clock.now();

        let mut trail = Trail::default();
        let outcome = self.evaluate_sensitive(op, object, context, deps, now, &mut trail);

        let (decision, reason) = match &outcome {
            Ok((basis, _)) => (AuditDecision::Allow, basis.to_string()),
            Err(denial) => (AuditDecision::Deny, denial.audit_text()),
        };
        let event = self.ledger.append(AuditRecord {
            actor: context.actor.clone(),
            role: context.role,
            op,
            object_id: object.id.clone(),
            data_tier: object.tier,
            op_tier: op.tier(),
            residency: context.residency.clone(),
            serving_region: context.serving_region.clone(),
            home_region: object.home_region.clone(),
            shard: trail.home.as_ref().map(|h| h.shard.clone()),
            placement_version: trail.home.as_ref().map(|h| h.version),
            purpose: context.purpose.clone(),
            grant_id: trail.grant_id.clone(),
            decision,
            reason,
        });

        match outcome {
            Ok((basis, home)) => {
                debug!(
                    actor = %context.actor,
                    object = %object.id,
                    op = %op,
                    basis = %basis,
                    audit_sequence = event.sequence,
                    "sensitive operation allowed"
                );
                Ok(SensitiveGrant {
                    basis,
                    home,
                    audit_sequence: event.sequence,
                })
            }
            Err(denial) => {
                warn!(
                    actor = %context.actor,
                    object = %object.id,
                    op = %op,
                    reason = %denial,
                    class = %denial.class(),
                    audit_sequence = event.sequence,
                    "sensitive operation denied"
                );
                Err(denial)
            }
        }
    }

    fn evaluate_sensitive(
        &self,
        op: Operation,
        object: &DataObject,
        context: &RequestContext,
        deps: &Dependencies,
        now: DateTime<Utc>,
        trail: &mut Trail,
    ) -> Result<(AccessBasis, HomePlacement), DenyReason> {
        if self.deletions.is_deleted(&object.id) {
            return Err(DenyReason::Tombstoned);
        }

        let home = self.router.resolve_home(&object.owner, deps)?;
        trail.home = Some(home.clone());

        let grant = if context.actor != object.owner {
            self.shares.find(&object.id, &context.actor, now)
        } else {
            None
        };
        trail.grant_id = grant.as_ref().map(|g| g.id.clone());

        let basis = self.policy.evaluate(&PolicyInput {
            op,
            object,
            context,
            grant: grant.as_ref(),
            deps_healthy: deps.healthy_for_sensitive(),
            now,
        })?;

        if object.tier.is_fail_closed() {
            let decryptable = self
                .wrapped_key(&object.id)
                .is_some_and(|key| self.kms.can_decrypt(&object.id, &key, &context.serving_region));
            if !decryptable {
                return Err(DenyReason::KmsGate);
            }
        }

        Ok((basis, home))
    }
}

impl std::fmt::Debug for EnforcementGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnforcementGateway")
            .field("router", &self.router)
            .field("ledger", &self.ledger)
            .field("deletions", &self.deletions)
            .finish()
    }
}
