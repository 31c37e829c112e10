//! Data model shared by routing, the vault and the gateway.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::ids::{CellId, GrantId, ObjectId, Region, TenantId, UserId};

/// A user with an immutable residency region.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub residency: Region,
}

impl User {
    pub fn new(id: impl Into<UserId>, residency: impl Into<Region>) -> Self {
        Self {
            id: id.into(),
            residency: residency.into(),
        }
    }
}

/// Physical location of a shard.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    pub region: Region,
    pub cell: CellId,
}

impl Location {
    pub fn new(region: impl Into<Region>, cell: impl Into<CellId>) -> Self {
        Self {
            region: region.into(),
            cell: cell.into(),
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.region, self.cell)
    }
}

/// Data classification of a stored object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DataTier {
    Tier0,
    Tier1,
    Tier2,
    Tier3,
}

impl DataTier {
    /// Regulated tiers: fail closed on dependency loss and pinned to the home region.
    pub fn is_fail_closed(&self) -> bool {
        matches!(self, DataTier::Tier2 | DataTier::Tier3)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DataTier::Tier0 => "DATA_TIER_0",
            DataTier::Tier1 => "DATA_TIER_1",
            DataTier::Tier2 => "DATA_TIER_2",
            DataTier::Tier3 => "DATA_TIER_3",
        }
    }
}

impl fmt::Display for DataTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable description of a regulated object.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataObject {
    pub id: ObjectId,
    pub tier: DataTier,
    pub home_region: Region,
    pub tenant: TenantId,
    pub owner: UserId,
}

impl DataObject {
    pub fn new(
        id: impl Into<ObjectId>,
        tier: DataTier,
        home_region: impl Into<Region>,
        tenant: impl Into<TenantId>,
        owner: impl Into<UserId>,
    ) -> Self {
        Self {
            id: id.into(),
            tier,
            home_region: home_region.into(),
            tenant: tenant.into(),
            owner: owner.into(),
        }
    }
}

/// Requester role.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    User,
    Lender,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
            Role::Lender => "lender",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who is asking, from where, and why.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestContext {
    pub actor: UserId,
    pub role: Role,
    pub residency: Region,
    pub serving_region: Region,
    pub purpose: String,
}

impl RequestContext {
    pub fn new(
        actor: impl Into<UserId>,
        role: Role,
        residency: impl Into<Region>,
        serving_region: impl Into<Region>,
        purpose: impl Into<String>,
    ) -> Self {
        Self {
            actor: actor.into(),
            role,
            residency: residency.into(),
            serving_region: serving_region.into(),
            purpose: purpose.into(),
        }
    }
}

/// Owner-issued permission for a grantee to access one object for one purpose.
///
/// Revocation is one-way: there is no API that clears the flag.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareGrant {
    pub id: GrantId,
    pub object_id: ObjectId,
    pub owner: UserId,
    pub grantee: UserId,
    pub purpose: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    revoked: bool,
}

impl ShareGrant {
    pub fn new(
        id: impl Into<GrantId>,
        object_id: impl Into<ObjectId>,
        owner: impl Into<UserId>,
        grantee: impl Into<UserId>,
        purpose: impl Into<String>,
        starts_at: DateTime<Utc>,
        ends_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            object_id: object_id.into(),
            owner: owner.into(),
            grantee: grantee.into(),
            purpose: purpose.into(),
            starts_at,
            ends_at,
            revoked: false,
        }
    }

    pub fn is_revoked(&self) -> bool {
        self.revoked
    }

    pub fn revoke(&mut self) {
        self.revoked = true;
    }

    /// Unrevoked and inside `[starts_at, ends_at]`.
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        !self.revoked && self.starts_at <= now && now <= self.ends_at
    }
}

/// Externally driven cell up/down map. Unknown cells are presumed up.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CellHealth {
    cells: HashMap<CellId, bool>,
}

impl CellHealth {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_up(&self, cell: &CellId) -> bool {
        self.cells.get(cell).copied().unwrap_or(true)
    }

    pub fn mark_down(&mut self, cell: impl Into<CellId>) {
        self.cells.insert(cell.into(), false);
    }

    pub fn mark_up(&mut self, cell: impl Into<CellId>) {
        self.cells.insert(cell.into(), true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn grant_activity_respects_window_and_revocation() {
        let now = Utc::now();
        let mut grant = ShareGrant::new(
            "g-1",
            "doc-1",
            "owner",
            "lender",
            "lending",
            now - Duration::hours(1),
            now + Duration::hours(1),
        );
        assert!(grant.is_active_at(now));
        assert!(!grant.is_active_at(now + Duration::hours(2)));
        assert!(!grant.is_active_at(now - Duration::hours(2)));

        grant.revoke();
        assert!(grant.is_revoked());
        assert!(!grant.is_active_at(now));
    }

    #[test]
    fn unknown_cells_are_presumed_up() {
        let mut health = CellHealth::new();
        let cell = CellId::from("eu-cell-1");
        assert!(health.is_up(&cell));
        health.mark_down("eu-cell-1");
        assert!(!health.is_up(&cell));
        health.mark_up("eu-cell-1");
        assert!(health.is_up(&cell));
    }

    #[test]
    fn only_tiers_two_and_three_fail_closed() {
        assert!(!DataTier::Tier0.is_fail_closed());
        assert!(!DataTier::Tier1.is_fail_closed());
        assert!(DataTier::Tier2.is_fail_closed());
        assert!(DataTier::Tier3.is_fail_closed());
    }
}
