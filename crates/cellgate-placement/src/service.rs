//! Authoritative shard → location map.

use std::collections::BTreeMap;
use std::sync::Arc;

use cellgate_types::{Clock, Location, ShardId, SystemClock};
use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::PlacementError;
use crate::rendezvous::ShardSet;

/// Immutable, deep-copied view of placement at one version.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacementSnapshot {
    pub placement: BTreeMap<ShardId, Location>,
    pub version: u64,
    pub fetched_at: DateTime<Utc>,
}

impl PlacementSnapshot {
    pub fn location(&self, shard: &ShardId) -> Option<&Location> {
        self.placement.get(shard)
    }

    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now - self.fetched_at
    }
}

#[derive(Debug)]
struct PlacementState {
    placement: BTreeMap<ShardId, Location>,
    version: u64,
}

/// Versioned placement store. Every move bumps the version by one.
pub struct PlacementService {
    shards: ShardSet,
    state: RwLock<PlacementState>,
    clock: Arc<dyn Clock>,
}

impl PlacementService {
    /// Start at version 1. Every shard in `shards` must have a location.
    pub fn new(
        shards: ShardSet,
        placement: BTreeMap<ShardId, Location>,
    ) -> Result<Self, PlacementError> {
        for shard in shards.shards() {
            if !placement.contains_key(shard) {
                return Err(PlacementError::MissingLocation(shard.clone()));
            }
        }
        Ok(Self {
            shards,
            state: RwLock::new(PlacementState {
                placement,
                version: 1,
            }),
            clock: Arc::new(SystemClock),
        })
    }

    /// Round-robin the shards over `locations`.
    pub fn striped(shards: ShardSet, locations: &[Location]) -> Result<Self, PlacementError> {
        if locations.is_empty() {
            return Err(PlacementError::NoLocations);
        }
        let placement = shards
            .shards()
            .iter()
            .zip(locations.iter().cycle())
            .map(|(shard, location)| (shard.clone(), location.clone()))
            .collect();
        Self::new(shards, placement)
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn shards(&self) -> &ShardSet {
        &self.shards
    }

    pub fn version(&self) -> u64 {
        self.state.read().version
    }

    pub fn snapshot(&self) -> PlacementSnapshot {
        let state = self.state.read();
        PlacementSnapshot {
            placement: state.placement.clone(),
            version: state.version,
            fetched_at: self.clock.now(),
        }
    }

    /// Relocate `shard`, returning the new version.
    pub fn move_shard(&self, shard: &ShardId, to: Location) -> Result<u64, PlacementError> {
        if !self.shards.contains(shard) {
            return Err(PlacementError::UnknownShard(shard.clone()));
        }
        let mut state = self.state.write();
        state.placement.insert(shard.clone(), to.clone());
        state.version += 1;
        info!(shard = %shard, location = %to, version = state.version, "shard moved");
        Ok(state.version)
    }
}

impl std::fmt::Debug for PlacementService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlacementService")
            .field("shards", &self.shards.len())
            .field("version", &self.version())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cellgate_types::ManualClock;

    fn locations() -> Vec<Location> {
        vec![
            Location::new("us", "us-cell-1"),
            Location::new("eu", "eu-cell-1"),
            Location::new("apac", "apac-cell-1"),
        ]
    }

    #[test]
    fn striped_places_every_shard() {
        let service = PlacementService::striped(ShardSet::numbered(64).unwrap(), &locations()).unwrap();
        let snapshot = service.snapshot();
        assert_eq!(snapshot.placement.len(), 64);
        assert_eq!(snapshot.version, 1);
        assert_eq!(
            snapshot.location(&ShardId::from("shard-001")),
            Some(&Location::new("us", "us-cell-1"))
        );
        assert_eq!(
            snapshot.location(&ShardId::from("shard-002")),
            Some(&Location::new("eu", "eu-cell-1"))
        );
    }

    #[test]
    fn missing_location_is_rejected() {
        let shards = ShardSet::numbered(2).unwrap();
        let mut placement = BTreeMap::new();
        placement.insert(ShardId::from("shard-001"), Location::new("us", "us-cell-1"));
        assert_eq!(
            PlacementService::new(shards, placement).unwrap_err(),
            PlacementError::MissingLocation(ShardId::from("shard-002"))
        );
        assert_eq!(
            PlacementService::striped(ShardSet::numbered(2).unwrap(), &[]).unwrap_err(),
            PlacementError::NoLocations
        );
    }

    #[test]
    fn moves_bump_version_and_snapshots_are_copies() {
        let service = PlacementService::striped(ShardSet::numbered(4).unwrap(), &locations()).unwrap();
        let before = service.snapshot();
        let shard = ShardId::from("shard-001");

        let version = service
            .move_shard(&shard, Location::new("eu", "eu-cell-2"))
            .unwrap();
        assert_eq!(version, 2);

        assert_eq!(before.location(&shard), Some(&Location::new("us", "us-cell-1")));
        assert_eq!(
            service.snapshot().location(&shard),
            Some(&Location::new("eu", "eu-cell-2"))
        );
    }

    #[test]
    fn unknown_shard_cannot_move() {
        let service = PlacementService::striped(ShardSet::numbered(4).unwrap(), &locations()).unwrap();
        let err = service
            .move_shard(&ShardId::from("shard-999"), Location::new("us", "us-cell-1"))
            .unwrap_err();
        assert_eq!(err, PlacementError::UnknownShard(ShardId::from("shard-999")));
        assert_eq!(service.version(), 1);
    }

    #[test]
    fn snapshot_is_stamped_with_clock() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let service = PlacementService::striped(ShardSet::numbered(4).unwrap(), &locations())
            .unwrap()
            .with_clock(clock.clone());
        let snapshot = service.snapshot();
        clock.advance(Duration::seconds(10));
        assert_eq!(snapshot.age(clock.now()), Duration::seconds(10));
    }
}
