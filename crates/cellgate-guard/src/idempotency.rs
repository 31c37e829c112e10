//! Idempotency store.
//!
//! Records are keyed by `(user, op, idempotency key)` and hold the payload
//! fingerprint plus the response computed on first sight. A record is never
//! overwritten: replaying the same payload returns the stored response, a
//! different payload under the same key is refused. Records expire after the
//! configured TTL; expiry is applied lazily before each lookup.

use cellgate_types::{span_secs, DenyReason, Operation, UserId};
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdempotencyConfig {
    /// How long a recorded response is replayed for its key.
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
}

fn default_ttl_secs() -> u64 {
    24 * 3600
}

impl Default for IdempotencyConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl_secs(),
        }
    }
}

/// Hex fingerprint of a request payload.
pub fn payload_hash(payload: &str) -> String {
    blake3::hash(payload.as_bytes()).to_hex().to_string()
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct RecordKey {
    user: UserId,
    op: Operation,
    key: String,
}

#[derive(Clone, Debug)]
struct Record<R> {
    payload_hash: String,
    response: R,
    recorded_at: DateTime<Utc>,
}

/// Outcome of [`IdempotencyStore::get_or_record`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Recorded<R> {
    pub response: R,
    /// `true` when the response came from an earlier call.
    pub replayed: bool,
}

/// Keyed deduplication store, generic over the stored response.
#[derive(Debug)]
pub struct IdempotencyStore<R> {
    config: IdempotencyConfig,
    records: DashMap<RecordKey, Record<R>>,
}

impl<R: Clone> IdempotencyStore<R> {
    pub fn new(config: IdempotencyConfig) -> Self {
        Self {
            config,
            records: DashMap::new(),
        }
    }

    /// Return the stored response for `(user, op, key)` or compute and record it.
    ///
    /// `compute` runs at most once per novel key. It runs while the key's map
    /// shard is locked, so it must not call back into this store.
    pub fn get_or_record<F>(
        &self,
        user: &UserId,
        op: Operation,
        key: &str,
        payload_hash: &str,
        compute: F,
        now: DateTime<Utc>,
    ) -> Result<Recorded<R>, DenyReason>
    where
        F: FnOnce() -> R,
    {
        self.evict_expired(now);

        if key.is_empty() {
            warn!(user = %user, op = %op, "request without idempotency key");
            return Err(DenyReason::MissingIdempotencyKey);
        }

        let record_key = RecordKey {
            user: user.clone(),
            op,
            key: key.to_string(),
        };

        match self.records.entry(record_key) {
            Entry::Occupied(existing) => {
                let record = existing.get();
                if record.payload_hash != payload_hash {
                    warn!(user = %user, op = %op, key, "idempotency key reused with different payload");
                    return Err(DenyReason::IdempotencyConflict);
                }
                debug!(user = %user, op = %op, key, "idempotent replay");
                Ok(Recorded {
                    response: record.response.clone(),
                    replayed: true,
                })
            }
            Entry::Vacant(slot) => {
                let response = compute();
                slot.insert(Record {
                    payload_hash: payload_hash.to_string(),
                    response: response.clone(),
                    recorded_at: now,
                });
                debug!(user = %user, op = %op, key, "recorded idempotency");
                Ok(Recorded {
                    response,
                    replayed: false,
                })
            }
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn evict_expired(&self, now: DateTime<Utc>) {
        let ttl = span_secs(self.config.ttl_secs);
        self.records.retain(|_, record| now - record.recorded_at <= ttl);
    }
}

impl<R: Clone> Default for IdempotencyStore<R> {
    fn default() -> Self {
        Self::new(IdempotencyConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::cell::Cell;

    fn user() -> UserId {
        UserId::from("u-1")
    }

    #[test]
    fn replay_returns_stored_response_without_recompute() {
        let store = IdempotencyStore::<String>::default();
        let calls = Cell::new(0);
        let now = Utc::now();
        let hash = payload_hash("amount=10");

        let compute = || {
            calls.set(calls.get() + 1);
            format!("response-{}", calls.get())
        };

        let first = store
            .get_or_record(&user(), Operation::LowValueAction, "k1", &hash, compute, now)
            .unwrap();
        let second = store
            .get_or_record(&user(), Operation::LowValueAction, "k1", &hash, compute, now)
            .unwrap();

        assert_eq!(first.response, "response-1");
        assert_eq!(second.response, first.response);
        assert!(!first.replayed);
        assert!(second.replayed);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn different_payload_under_same_key_conflicts() {
        let store = IdempotencyStore::<u32>::default();
        let now = Utc::now();
        store
            .get_or_record(&user(), Operation::Transfer, "k1", &payload_hash("a"), || 1, now)
            .unwrap();
        let err = store
            .get_or_record(&user(), Operation::Transfer, "k1", &payload_hash("b"), || 2, now)
            .unwrap_err();
        assert_eq!(err, DenyReason::IdempotencyConflict);
        assert!(!err.is_retryable());
    }

    #[test]
    fn empty_key_is_denied_and_nothing_is_computed() {
        let store = IdempotencyStore::<u32>::default();
        let err = store
            .get_or_record(
                &user(),
                Operation::Transfer,
                "",
                &payload_hash("a"),
                || panic!("must not compute"),
                Utc::now(),
            )
            .unwrap_err();
        assert_eq!(err, DenyReason::MissingIdempotencyKey);
        assert!(store.is_empty());
    }

    #[test]
    fn keys_are_scoped_by_user_and_op() {
        let store = IdempotencyStore::<u32>::default();
        let now = Utc::now();
        let hash = payload_hash("a");
        store
            .get_or_record(&user(), Operation::Transfer, "k", &hash, || 1, now)
            .unwrap();
        let other_op = store
            .get_or_record(&user(), Operation::AddBeneficiary, "k", &hash, || 2, now)
            .unwrap();
        let other_user = store
            .get_or_record(&UserId::from("u-2"), Operation::Transfer, "k", &hash, || 3, now)
            .unwrap();
        assert_eq!(other_op.response, 2);
        assert_eq!(other_user.response, 3);
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn expired_records_are_evicted_before_lookup() {
        let store = IdempotencyStore::<u32>::default();
        let start = Utc::now();
        store
            .get_or_record(&user(), Operation::Transfer, "k", &payload_hash("a"), || 1, start)
            .unwrap();

        // After the TTL the key is free again, even for a different payload.
        let later = start + Duration::hours(24) + Duration::seconds(1);
        let fresh = store
            .get_or_record(&user(), Operation::Transfer, "k", &payload_hash("b"), || 2, later)
            .unwrap();
        assert_eq!(fresh.response, 2);
        assert!(!fresh.replayed);
    }

    #[test]
    fn payload_hash_is_stable_hex() {
        let h = payload_hash("amount=10");
        assert_eq!(h, payload_hash("amount=10"));
        assert_ne!(h, payload_hash("amount=11"));
        assert_eq!(h.len(), 64);
    }
}
