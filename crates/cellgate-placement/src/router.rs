//! Placement-caching router.
//!
//! Read path: authorize, then serve locally unless the operation must be
//! served in the user's residency region and the request arrived elsewhere.
//!
//! Write path state machine:
//!
//! ```text
//! authorize ──deny──► FAIL
//!     │
//! resolve home ──placement unavailable──► FAIL
//!     │
//! home cell up? ──yes──► WRITE_HOME
//!     │ no
//! security-critical? ──yes──► FAIL
//!     │ no
//!   QUEUE
//! ```

use std::fmt;
use std::sync::Arc;

use cellgate_guard::{authorize, Clearance};
use cellgate_types::{
    span_secs, CellHealth, Clock, Dependencies, DenyReason, Location, Operation, Region,
    ShardId, SystemClock, User, UserId,
};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::service::{PlacementService, PlacementSnapshot};

// ── Configuration ───────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouterConfig {
    /// Longest a cached snapshot may be served while placement is down.
    #[serde(default = "default_placement_cache_ttl_secs")]
    pub placement_cache_ttl_secs: u64,
    /// Size of the numbered shard set.
    #[serde(default = "default_shard_count")]
    pub shard_count: usize,
}

fn default_placement_cache_ttl_secs() -> u64 {
    30
}

fn default_shard_count() -> usize {
    64
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            placement_cache_ttl_secs: default_placement_cache_ttl_secs(),
            shard_count: default_shard_count(),
        }
    }
}

// ── Route types ─────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SnapshotSource {
    Fresh,
    Cached,
}

/// Where a user's data lives, according to the snapshot used.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HomePlacement {
    pub shard: ShardId,
    pub location: Location,
    pub version: u64,
    pub source: SnapshotSource,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReadRoute {
    Local {
        region: Region,
        clearance: Clearance,
    },
    /// Residency forces the read to the user's home location.
    HomeRedirect {
        home: HomePlacement,
        clearance: Clearance,
    },
}

impl ReadRoute {
    pub fn clearance(&self) -> Clearance {
        match self {
            ReadRoute::Local { clearance, .. } | ReadRoute::HomeRedirect { clearance, .. } => {
                *clearance
            }
        }
    }
}

impl fmt::Display for ReadRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadRoute::Local { region, .. } => write!(f, "ALLOW: read-local in {region}"),
            ReadRoute::HomeRedirect { home, .. } => {
                write!(f, "ALLOW: residency forces home-read via {}", home.location)
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum WriteDecision {
    WriteHome,
    /// Deferred acceptance; not a failure.
    Queue,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WriteRoute {
    pub decision: WriteDecision,
    pub home: HomePlacement,
    pub clearance: Clearance,
}

impl fmt::Display for WriteRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.decision {
            WriteDecision::WriteHome => write!(
                f,
                "WRITE_HOME: {} via {}",
                self.home.shard, self.home.location
            ),
            WriteDecision::Queue => write!(
                f,
                "QUEUE: home cell down ({}) for Tier-1",
                self.home.location.cell
            ),
        }
    }
}

// ── Router ──────────────────────────────────────────────────────────────

pub struct Router {
    config: RouterConfig,
    service: Arc<PlacementService>,
    cache: RwLock<Option<Arc<PlacementSnapshot>>>,
    clock: Arc<dyn Clock>,
}

impl Router {
    pub fn new(service: Arc<PlacementService>, config: RouterConfig) -> Self {
        Self {
            config,
            service,
            cache: RwLock::new(None),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    pub fn service(&self) -> &Arc<PlacementService> {
        &self.service
    }

    /// Last snapshot admitted through [`Router::snapshot`]. Never contacts the
    /// placement service.
    pub fn cached_snapshot(&self) -> Option<Arc<PlacementSnapshot>> {
        self.cache.read().clone()
    }

    /// Version of the cached snapshot, if any.
    pub fn cached_version(&self) -> Option<u64> {
        self.cache.read().as_ref().map(|s| s.version)
    }

    /// Current snapshot: fresh when placement is healthy, otherwise the cache
    /// while it is young enough.
    pub fn snapshot(
        &self,
        deps: &Dependencies,
    ) -> Result<(Arc<PlacementSnapshot>, SnapshotSource), DenyReason> {
        if deps.placement_ok {
            let fresh = Arc::new(self.service.snapshot());
            let mut cache = self.cache.write();
            match cache.as_ref() {
                Some(cached) if cached.version > fresh.version => {
                    warn!(
                        cached = cached.version,
                        fetched = fresh.version,
                        "placement returned an older version; keeping cache"
                    );
                    return Ok((cached.clone(), SnapshotSource::Cached));
                }
                _ => *cache = Some(fresh.clone()),
            }
            return Ok((fresh, SnapshotSource::Fresh));
        }

        let ttl = span_secs(self.config.placement_cache_ttl_secs);
        let now = self.clock.now();
        match self.cache.read().as_ref() {
            Some(cached) if cached.age(now) <= ttl => {
                debug!(version = cached.version, "serving cached placement");
                Ok((cached.clone(), SnapshotSource::Cached))
            }
            _ => {
                warn!("placement unavailable and cache stale");
                Err(DenyReason::PlacementUnavailable)
            }
        }
    }

    /// Home shard and location of `user`.
    pub fn resolve_home(
        &self,
        user: &UserId,
        deps: &Dependencies,
    ) -> Result<HomePlacement, DenyReason> {
        let (snapshot, source) = self.snapshot(deps)?;
        let shard = self.service.shards().resolve(user);
        let Some(location) = snapshot.location(shard) else {
            warn!(shard = %shard, version = snapshot.version, "snapshot has no location for shard");
            return Err(DenyReason::PlacementUnavailable);
        };
        Ok(HomePlacement {
            shard: shard.clone(),
            location: location.clone(),
            version: snapshot.version,
            source,
        })
    }

    pub fn route_read(
        &self,
        user: &User,
        op: Operation,
        serving_region: &Region,
        deps: &Dependencies,
    ) -> Result<ReadRoute, DenyReason> {
        let clearance = authorize(op, deps)?;

        if op.requires_home_residency() && user.residency != *serving_region {
            let home = self.resolve_home(&user.id, deps)?;
            debug!(user = %user.id, op = %op, home = %home.location, "residency redirect");
            return Ok(ReadRoute::HomeRedirect { home, clearance });
        }

        Ok(ReadRoute::Local {
            region: serving_region.clone(),
            clearance,
        })
    }

    pub fn route_write(
        &self,
        user: &User,
        op: Operation,
        deps: &Dependencies,
        health: &CellHealth,
    ) -> Result<WriteRoute, DenyReason> {
        let clearance = authorize(op, deps)?;
        let home = self.resolve_home(&user.id, deps)?;

        if health.is_up(&home.location.cell) {
            return Ok(WriteRoute {
                decision: WriteDecision::WriteHome,
                home,
                clearance,
            });
        }

        if op.is_security_critical() {
            warn!(user = %user.id, op = %op, cell = %home.location.cell, "home cell down for security-critical write");
            return Err(DenyReason::HomeCellDown {
                cell: home.location.cell,
                tier: op.tier(),
            });
        }

        debug!(user = %user.id, op = %op, cell = %home.location.cell, "home cell down; queueing");
        Ok(WriteRoute {
            decision: WriteDecision::Queue,
            home,
            clearance,
        })
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("config", &self.config)
            .field("cached_version", &self.cached_version())
            .finish()
    }
}
