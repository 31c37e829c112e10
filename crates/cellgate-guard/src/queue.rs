//! Deferred write queue.
//!
//! Writes accepted while their home cell is down wait here, one FIFO per user.
//! Each event remembers the shard and placement version it was routed with so
//! the drainer can spot placement drift. Ordering is strict within a user and
//! undefined across users.

use std::collections::VecDeque;

use cellgate_types::{span_secs, Location, Operation, ShardId, UserId};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Age after which a queued write is dropped instead of executed.
    #[serde(default = "default_item_ttl_secs")]
    pub item_ttl_secs: u64,
    /// Most writes executed per user in one drain pass.
    #[serde(default = "default_drain_rate_per_user")]
    pub drain_rate_per_user: usize,
}

fn default_item_ttl_secs() -> u64 {
    24 * 3600
}

fn default_drain_rate_per_user() -> usize {
    5
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            item_ttl_secs: default_item_ttl_secs(),
            drain_rate_per_user: default_drain_rate_per_user(),
        }
    }
}

/// A write deferred for later execution at its home cell.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteEvent {
    pub user: UserId,
    pub op: Operation,
    pub payload: String,
    pub idempotency_key: String,
    pub created_at: DateTime<Utc>,
    pub target_shard: ShardId,
    /// Where `target_shard` lived when the write was deferred.
    pub target_location: Location,
    pub placement_version: u64,
}

/// Result of one drain call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrainReport {
    pub processed: usize,
    pub dropped: usize,
}

#[derive(Debug, Default)]
pub struct WriteQueue {
    config: QueueConfig,
    queues: DashMap<UserId, VecDeque<WriteEvent>>,
}

impl WriteQueue {
    pub fn new(config: QueueConfig) -> Self {
        Self {
            config,
            queues: DashMap::new(),
        }
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    pub fn enqueue(&self, event: WriteEvent) {
        debug!(
            user = %event.user,
            op = %event.op,
            shard = %event.target_shard,
            placement_version = event.placement_version,
            "write queued"
        );
        self.queues
            .entry(event.user.clone())
            .or_default()
            .push_back(event);
    }

    /// Drain up to the configured rate of `user`'s pending writes.
    ///
    /// Expired entries at the head are dropped first, then live entries are
    /// taken in order; an entry found expired mid-drain is dropped without
    /// counting against the rate. `executor` runs after the queue lock is
    /// released.
    pub fn drain<F>(&self, user: &UserId, now: DateTime<Utc>, executor: F) -> DrainReport
    where
        F: FnMut(&WriteEvent),
    {
        self.drain_with_rate(user, now, self.config.drain_rate_per_user, executor)
    }

    pub fn drain_with_rate<F>(
        &self,
        user: &UserId,
        now: DateTime<Utc>,
        rate: usize,
        mut executor: F,
    ) -> DrainReport
    where
        F: FnMut(&WriteEvent),
    {
        let ttl = span_secs(self.config.item_ttl_secs);
        let expired = |event: &WriteEvent| now - event.created_at > ttl;

        let mut report = DrainReport::default();
        let mut batch = Vec::new();

        if let Some(mut queue) = self.queues.get_mut(user) {
            while queue.front().is_some_and(|event| expired(event)) {
                queue.pop_front();
                report.dropped += 1;
            }
            while batch.len() < rate {
                let Some(event) = queue.pop_front() else {
                    break;
                };
                if expired(&event) {
                    report.dropped += 1;
                    continue;
                }
                batch.push(event);
            }
        } else {
            return report;
        }
        self.queues.remove_if(user, |_, queue| queue.is_empty());

        for event in &batch {
            executor(event);
        }
        report.processed = batch.len();

        info!(
            user = %user,
            processed = report.processed,
            dropped = report.dropped,
            "write queue drained"
        );
        report
    }

    /// Pending writes for `user`.
    pub fn pending(&self, user: &UserId) -> usize {
        self.queues.get(user).map(|q| q.len()).unwrap_or(0)
    }

    /// Oldest pending write for `user`.
    pub fn peek(&self, user: &UserId) -> Option<WriteEvent> {
        self.queues.get(user).and_then(|q| q.front().cloned())
    }

    /// Users with at least one pending write.
    pub fn users(&self) -> Vec<UserId> {
        self.queues.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.queues.is_empty()
    }
}
