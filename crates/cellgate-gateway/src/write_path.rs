//! Degraded-mode write path.
//!
//! A write passes coarse protections, is routed to its home cell, and is
//! deduplicated by idempotency key before it either executes at home or is
//! deferred to the user's write queue. A replay returns the stored response
//! and disposition of the first request, whatever the cell health is now, and
//! is never deferred twice.

use std::sync::Arc;

use cellgate_guard::{
    payload_hash, Clearance, CoarseProtections, DrainReport, IdempotencyStore, WriteEvent,
    WriteQueue,
};
use cellgate_placement::{HomePlacement, PlacementSnapshot, Router, WriteDecision};
use cellgate_types::{CellHealth, Clock, Dependencies, DenyReason, Operation, User, UserId};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::config::CellgateConfig;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteRequest {
    pub user: User,
    pub op: Operation,
    pub payload: String,
    pub idempotency_key: String,
}

impl WriteRequest {
    pub fn new(
        user: User,
        op: Operation,
        payload: impl Into<String>,
        idempotency_key: impl Into<String>,
    ) -> Self {
        Self {
            user,
            op,
            payload: payload.into(),
            idempotency_key: idempotency_key.into(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteDisposition {
    /// Accepted at the home cell.
    Executed,
    /// Deferred until the home cell recovers.
    Queued,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct WriteReceipt {
    pub disposition: WriteDisposition,
    pub response: Value,
    /// The response was recorded by an earlier request with the same key.
    pub replayed: bool,
    pub home: HomePlacement,
    pub clearance: Clearance,
}

/// What the idempotency store keeps for a write key.
#[derive(Clone, Debug)]
struct RecordedWrite {
    disposition: WriteDisposition,
    response: Value,
}

pub struct WritePath {
    router: Arc<Router>,
    protections: CoarseProtections,
    idempotency: IdempotencyStore<RecordedWrite>,
    queue: WriteQueue,
    clock: Arc<dyn Clock>,
}

impl WritePath {
    pub fn new(router: Arc<Router>, config: &CellgateConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            router,
            protections: CoarseProtections::new(config.protection.clone()),
            idempotency: IdempotencyStore::new(config.idempotency.clone()),
            queue: WriteQueue::new(config.queue.clone()),
            clock,
        }
    }

    pub fn protections(&self) -> &CoarseProtections {
        &self.protections
    }

    pub fn queue(&self) -> &WriteQueue {
        &self.queue
    }

    pub fn submit(
        &self,
        request: &WriteRequest,
        deps: &Dependencies,
        health: &CellHealth,
    ) -> Result<WriteReceipt, DenyReason> {
        let now = self.clock.now();
        let user = &request.user;
        let op = request.op;

        self.protections.check(&user.id, op, now)?;
        let route = self.router.route_write(user, op, deps, health)?;

        let fingerprint = payload_hash(&request.payload);
        let recorded = self.idempotency.get_or_record(
            &user.id,
            op,
            &request.idempotency_key,
            &fingerprint,
            || RecordedWrite {
                disposition: match route.decision {
                    WriteDecision::WriteHome => WriteDisposition::Executed,
                    WriteDecision::Queue => WriteDisposition::Queued,
                },
                response: json!({
                    "status": "ok",
                    "op": op.as_str(),
                    "home_shard": route.home.shard.as_str(),
                }),
            },
            now,
        )?;

        let RecordedWrite {
            disposition,
            response,
        } = recorded.response;
        if disposition == WriteDisposition::Queued && !recorded.replayed {
            self.queue.enqueue(WriteEvent {
                user: user.id.clone(),
                op,
                payload: request.payload.clone(),
                idempotency_key: request.idempotency_key.clone(),
                created_at: now,
                target_shard: route.home.shard.clone(),
                target_location: route.home.location.clone(),
                placement_version: route.home.version,
            });
        }

        if route.clearance.is_degraded() {
            warn!(
                user = %user.id,
                op = %op,
                clearance = %route.clearance,
                "degraded write admitted; reconcile once risk recovers"
            );
        } else {
            debug!(
                user = %user.id,
                op = %op,
                disposition = ?disposition,
                replayed = recorded.replayed,
                "write accepted"
            );
        }

        Ok(WriteReceipt {
            disposition,
            response,
            replayed: recorded.replayed,
            home: route.home,
            clearance: route.clearance,
        })
    }

    /// Drain `user`'s deferred writes through `executor` at the configured rate.
    ///
    /// Events whose shard has moved since they were queued are still handed
    /// to `executor` but logged as drifted. Drift is judged against the
    /// router's cached placement, which only advances through health-gated
    /// fetches.
    pub fn drain<F>(&self, user: &UserId, mut executor: F) -> DrainReport
    where
        F: FnMut(&WriteEvent),
    {
        let placement = self.router.cached_snapshot();
        let report = self.queue.drain(user, self.clock.now(), |event| {
            if let Some(current) = placement.as_deref().filter(|p| has_drifted(event, p)) {
                warn!(
                    user = %event.user,
                    shard = %event.target_shard,
                    queued_at = %event.target_location,
                    queued_version = event.placement_version,
                    current_version = current.version,
                    "shard moved while write was queued"
                );
            }
            executor(event);
        });
        if report.dropped > 0 {
            info!(user = %user, dropped = report.dropped, "expired queued writes dropped");
        }
        report
    }

    pub fn pending(&self, user: &UserId) -> usize {
        self.queue.pending(user)
    }
}

/// The event's shard no longer lives where it did at enqueue.
pub(crate) fn has_drifted(event: &WriteEvent, placement: &PlacementSnapshot) -> bool {
    placement.location(&event.target_shard) != Some(&event.target_location)
}

impl std::fmt::Debug for WritePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WritePath")
            .field("router", &self.router)
            .field("queued_users", &self.queue.users().len())
            .finish()
    }
}
