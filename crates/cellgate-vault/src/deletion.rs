//! Tombstones and deferred cleanup.
//!
//! A tombstone is permanent. Cleanup tasks queue in request order and are
//! drained in bounded batches.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use cellgate_types::{Clock, ObjectId, SystemClock};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletionConfig {
    /// Derived-store entries purged per cleanup batch.
    #[serde(default = "default_cleanup_batch_size")]
    pub cleanup_batch_size: usize,
}

fn default_cleanup_batch_size() -> usize {
    25
}

impl Default for DeletionConfig {
    fn default() -> Self {
        Self {
            cleanup_batch_size: default_cleanup_batch_size(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tombstone {
    pub object_id: ObjectId,
    pub deleted_at: DateTime<Utc>,
    pub reason: String,
}

#[derive(Debug, Default)]
struct DeletionState {
    tombstones: HashMap<ObjectId, Tombstone>,
    cleanup: VecDeque<ObjectId>,
}

pub struct DeletionManager {
    config: DeletionConfig,
    state: Mutex<DeletionState>,
    clock: Arc<dyn Clock>,
}

impl DeletionManager {
    pub fn new(config: DeletionConfig) -> Self {
        Self {
            config,
            state: Mutex::new(DeletionState::default()),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Tombstone `object` and queue its cleanup.
    ///
    /// Repeated requests keep the first tombstone and queue nothing new.
    pub fn request_delete(&self, object: &ObjectId, reason: &str) -> Tombstone {
        let mut state = self.state.lock();
        if let Some(existing) = state.tombstones.get(object) {
            debug!(object = %object, "delete already requested");
            return existing.clone();
        }
        let tombstone = Tombstone {
            object_id: object.clone(),
            deleted_at: self.clock.now(),
            reason: reason.to_string(),
        };
        state.tombstones.insert(object.clone(), tombstone.clone());
        state.cleanup.push_back(object.clone());
        info!(object = %object, reason, "object tombstoned");
        tombstone
    }

    pub fn is_deleted(&self, object: &ObjectId) -> bool {
        self.state.lock().tombstones.contains_key(object)
    }

    pub fn tombstone(&self, object: &ObjectId) -> Option<Tombstone> {
        self.state.lock().tombstones.get(object).cloned()
    }

    /// Pop up to `max` cleanup tasks in FIFO order.
    pub fn run_cleanup_batch(&self, max: usize) -> Vec<ObjectId> {
        let mut state = self.state.lock();
        let take = max.min(state.cleanup.len());
        let batch: Vec<ObjectId> = state.cleanup.drain(..take).collect();
        if !batch.is_empty() {
            debug!(count = batch.len(), remaining = state.cleanup.len(), "cleanup batch");
        }
        batch
    }

    /// [`run_cleanup_batch`](Self::run_cleanup_batch) with the configured size.
    pub fn run_default_cleanup_batch(&self) -> Vec<ObjectId> {
        self.run_cleanup_batch(self.config.cleanup_batch_size)
    }

    pub fn pending_cleanup(&self) -> usize {
        self.state.lock().cleanup.len()
    }
}

impl Default for DeletionManager {
    fn default() -> Self {
        Self::new(DeletionConfig::default())
    }
}

impl std::fmt::Debug for DeletionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeletionManager")
            .field("config", &self.config)
            .field("pending_cleanup", &self.pending_cleanup())
            .finish()
    }
}
