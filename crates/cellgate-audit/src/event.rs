use cellgate_types::{
    DataTier, GrantId, ObjectId, OpTier, Operation, Region, Role, ShardId, UserId,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::canonical::CanonicalWriter;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditDecision {
    Allow,
    Deny,
}

impl AuditDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditDecision::Allow => "ALLOW",
            AuditDecision::Deny => "DENY",
        }
    }
}

impl fmt::Display for AuditDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Caller-supplied content of an audit event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub actor: UserId,
    pub role: Role,
    pub op: Operation,
    pub object_id: ObjectId,
    pub data_tier: DataTier,
    pub op_tier: OpTier,
    pub residency: Region,
    pub serving_region: Region,
    pub home_region: Region,
    /// Absent when placement could not be resolved.
    pub shard: Option<ShardId>,
    pub placement_version: Option<u64>,
    pub purpose: String,
    pub grant_id: Option<GrantId>,
    pub decision: AuditDecision,
    pub reason: String,
}

/// Immutable, chained audit entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub event_id: Uuid,
    pub sequence: u64,
    pub recorded_at: DateTime<Utc>,
    pub policy_version: u32,
    pub record: AuditRecord,
    pub prev_hash: String,
    pub hash: String,
}

impl AuditEvent {
    /// Hash over every field except `hash` itself.
    pub fn compute_hash(&self) -> String {
        let r = &self.record;
        let mut w = CanonicalWriter::new();
        w.str(&self.event_id.to_string())
            .u64(self.sequence)
            .time(self.recorded_at)
            .u32(self.policy_version)
            .str(r.actor.as_str())
            .str(r.role.as_str())
            .str(r.op.as_str())
            .str(r.object_id.as_str())
            .str(r.data_tier.as_str())
            .str(&r.op_tier.to_string())
            .str(r.residency.as_str())
            .str(r.serving_region.as_str())
            .str(r.home_region.as_str())
            .opt_str(r.shard.as_ref().map(|s| s.as_str()))
            .opt_u64(r.placement_version)
            .str(&r.purpose)
            .opt_str(r.grant_id.as_ref().map(|g| g.as_str()))
            .str(r.decision.as_str())
            .str(&r.reason)
            .str(&self.prev_hash);
        w.digest_hex()
    }

    pub fn is_allow(&self) -> bool {
        self.record.decision == AuditDecision::Allow
    }
}
