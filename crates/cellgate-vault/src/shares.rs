use std::collections::BTreeMap;

use cellgate_types::{GrantId, ObjectId, ShareGrant, UserId};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tracing::info;

use crate::error::ShareError;

/// Grants keyed by id. Revocation is one-way: a revoked id can never be
/// reissued.
#[derive(Debug, Default)]
pub struct ShareStore {
    grants: RwLock<BTreeMap<GrantId, ShareGrant>>,
}

impl ShareStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, grant: ShareGrant) -> Result<(), ShareError> {
        let mut grants = self.grants.write();
        if grants.get(&grant.id).is_some_and(|g| g.is_revoked()) {
            return Err(ShareError::Revoked(grant.id));
        }
        info!(
            grant = %grant.id,
            object = %grant.object_id,
            grantee = %grant.grantee,
            purpose = %grant.purpose,
            "grant issued"
        );
        grants.insert(grant.id.clone(), grant);
        Ok(())
    }

    pub fn revoke(&self, id: &GrantId) -> Result<(), ShareError> {
        let mut grants = self.grants.write();
        let grant = grants
            .get_mut(id)
            .ok_or_else(|| ShareError::UnknownGrant(id.clone()))?;
        grant.revoke();
        info!(grant = %id, "grant revoked");
        Ok(())
    }

    pub fn get(&self, id: &GrantId) -> Option<ShareGrant> {
        self.grants.read().get(id).cloned()
    }

    /// Grant for `grantee` on `object`, preferring one active at `now`.
    ///
    /// Falls back to any matching grant so the caller can report why it is
    /// unusable.
    pub fn find(&self, object: &ObjectId, grantee: &UserId, now: DateTime<Utc>) -> Option<ShareGrant> {
        let grants = self.grants.read();
        let mut fallback = None;
        for grant in grants
            .values()
            .filter(|g| g.object_id == *object && g.grantee == *grantee)
        {
            if grant.is_active_at(now) {
                return Some(grant.clone());
            }
            if fallback.is_none() {
                fallback = Some(grant);
            }
        }
        fallback.cloned()
    }

    pub fn len(&self) -> usize {
        self.grants.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.grants.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn grant(id: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> ShareGrant {
        ShareGrant::new(id, "doc-1", "owner", "lender", "lending", start, end)
    }

    #[test]
    fn find_prefers_active_grant() {
        let store = ShareStore::new();
        let now = Utc::now();
        store
            .put(grant("g-1", now - Duration::days(2), now - Duration::days(1)))
            .unwrap();
        store
            .put(grant("g-2", now - Duration::hours(1), now + Duration::hours(1)))
            .unwrap();

        let found = store
            .find(&ObjectId::from("doc-1"), &UserId::from("lender"), now)
            .unwrap();
        assert_eq!(found.id, GrantId::from("g-2"));
    }

    #[test]
    fn find_falls_back_to_inactive_match() {
        let store = ShareStore::new();
        let now = Utc::now();
        store
            .put(grant("g-1", now - Duration::days(2), now - Duration::days(1)))
            .unwrap();
        let found = store
            .find(&ObjectId::from("doc-1"), &UserId::from("lender"), now)
            .unwrap();
        assert!(!found.is_active_at(now));
        assert!(store
            .find(&ObjectId::from("doc-1"), &UserId::from("stranger"), now)
            .is_none());
    }

    #[test]
    fn revocation_is_monotonic() {
        let store = ShareStore::new();
        let now = Utc::now();
        let g = grant("g-1", now - Duration::hours(1), now + Duration::hours(1));
        store.put(g.clone()).unwrap();
        store.revoke(&GrantId::from("g-1")).unwrap();
        assert!(store.get(&GrantId::from("g-1")).unwrap().is_revoked());

        assert_eq!(store.put(g), Err(ShareError::Revoked(GrantId::from("g-1"))));
        assert!(store.get(&GrantId::from("g-1")).unwrap().is_revoked());
    }

    #[test]
    fn revoking_unknown_grant_fails() {
        let store = ShareStore::new();
        assert_eq!(
            store.revoke(&GrantId::from("nope")),
            Err(ShareError::UnknownGrant(GrantId::from("nope")))
        );
    }
}
