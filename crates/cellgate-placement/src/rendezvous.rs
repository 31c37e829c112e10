//! Rendezvous (HRW) shard assignment.
//!
//! Each `(user, shard)` pair scores `blake3("{user}:{shard}")`, read as a
//! 256-bit big-endian integer. The highest score wins; equal scores go to the
//! lexicographically smallest shard id. Removing a shard only remaps the users
//! that were assigned to it.

use std::collections::{BTreeMap, BTreeSet};

use cellgate_types::{ShardId, UserId};
use serde::{Deserialize, Serialize};

use crate::error::PlacementError;

/// Score of `shard` for `user`. Byte-wise comparison of the digest equals
/// big-endian integer comparison.
pub fn rendezvous_score(user: &UserId, shard: &ShardId) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new();
    hasher.update(user.as_str().as_bytes());
    hasher.update(b":");
    hasher.update(shard.as_str().as_bytes());
    *hasher.finalize().as_bytes()
}

/// Non-empty, ordered set of active shards. Deserialization goes through
/// [`ShardSet::new`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<ShardId>", into = "Vec<ShardId>")]
pub struct ShardSet {
    shards: Vec<ShardId>,
}

impl TryFrom<Vec<ShardId>> for ShardSet {
    type Error = PlacementError;

    fn try_from(shards: Vec<ShardId>) -> Result<Self, Self::Error> {
        Self::new(shards)
    }
}

impl From<ShardSet> for Vec<ShardId> {
    fn from(set: ShardSet) -> Self {
        set.shards
    }
}

impl ShardSet {
    pub fn new(shards: Vec<ShardId>) -> Result<Self, PlacementError> {
        if shards.is_empty() {
            return Err(PlacementError::EmptyShardSet);
        }
        let mut seen = BTreeSet::new();
        for shard in &shards {
            if !seen.insert(shard) {
                return Err(PlacementError::DuplicateShard(shard.clone()));
            }
        }
        Ok(Self { shards })
    }

    /// `shard-001` through `shard-{count:03}`.
    pub fn numbered(count: usize) -> Result<Self, PlacementError> {
        Self::new(
            (1..=count)
                .map(|i| ShardId::new(format!("shard-{i:03}")))
                .collect(),
        )
    }

    pub fn shards(&self) -> &[ShardId] {
        &self.shards
    }

    pub fn len(&self) -> usize {
        self.shards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shards.is_empty()
    }

    pub fn contains(&self, shard: &ShardId) -> bool {
        self.shards.contains(shard)
    }

    /// Copy of the set without `shard`.
    pub fn without(&self, shard: &ShardId) -> Result<Self, PlacementError> {
        Self::new(self.shards.iter().filter(|s| *s != shard).cloned().collect())
    }

    /// Home shard of `user`.
    pub fn resolve(&self, user: &UserId) -> &ShardId {
        let mut best = &self.shards[0];
        let mut best_score = rendezvous_score(user, best);
        for shard in &self.shards[1..] {
            let score = rendezvous_score(user, shard);
            if score > best_score || (score == best_score && shard < best) {
                best = shard;
                best_score = score;
            }
        }
        best
    }

    /// Per-shard user counts, including empty shards.
    pub fn load_distribution<'a, I>(&self, users: I) -> LoadDistribution
    where
        I: IntoIterator<Item = &'a UserId>,
    {
        let mut counts: BTreeMap<ShardId, usize> =
            self.shards.iter().map(|s| (s.clone(), 0)).collect();
        for user in users {
            if let Some(count) = counts.get_mut(self.resolve(user)) {
                *count += 1;
            }
        }
        LoadDistribution::from_counts(counts)
    }
}

/// Fairness summary of a user population across shards.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LoadDistribution {
    pub counts: BTreeMap<ShardId, usize>,
    pub total: usize,
    pub min: usize,
    pub max: usize,
    pub mean: f64,
    /// `max / mean`; 1.0 is perfectly even, 0.0 for an empty population.
    pub skew: f64,
}

impl LoadDistribution {
    fn from_counts(counts: BTreeMap<ShardId, usize>) -> Self {
        let total: usize = counts.values().sum();
        let min = counts.values().copied().min().unwrap_or(0);
        let max = counts.values().copied().max().unwrap_or(0);
        let mean = if counts.is_empty() {
            0.0
        } else {
            total as f64 / counts.len() as f64
        };
        let skew = if mean > 0.0 { max as f64 / mean } else { 0.0 };
        Self {
            counts,
            total,
            min,
            max,
            mean,
            skew,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn users(n: usize) -> Vec<UserId> {
        (0..n).map(|i| UserId::new(format!("user-{i}"))).collect()
    }

    #[test]
    fn deserialization_enforces_set_invariants() {
        let err = serde_json::from_str::<ShardSet>("[]").unwrap_err();
        assert!(err.to_string().contains("shard set is empty"), "{err}");

        let err = serde_json::from_str::<ShardSet>(r#"["shard-001","shard-001"]"#).unwrap_err();
        assert!(err.to_string().contains("duplicate shard"), "{err}");

        let set: ShardSet = serde_json::from_str(r#"["shard-001","shard-002"]"#).unwrap();
        assert_eq!(set, ShardSet::numbered(2).unwrap());
        assert_eq!(serde_json::to_string(&set).unwrap(), r#"["shard-001","shard-002"]"#);
        set.resolve(&UserId::new("u-1"));
    }

    #[test]
    fn numbered_set_has_padded_ids() {
        let set = ShardSet::numbered(64).unwrap();
        assert_eq!(set.len(), 64);
        assert_eq!(set.shards()[0].as_str(), "shard-001");
        assert_eq!(set.shards()[63].as_str(), "shard-064");
    }

    #[test]
    fn empty_and_duplicate_sets_are_rejected() {
        assert_eq!(ShardSet::new(vec![]), Err(PlacementError::EmptyShardSet));
        assert_eq!(
            ShardSet::new(vec![ShardId::from("a"), ShardId::from("a")]),
            Err(PlacementError::DuplicateShard(ShardId::from("a")))
        );
    }

    #[test]
    fn resolve_picks_highest_score() {
        let set = ShardSet::numbered(8).unwrap();
        let user = UserId::from("alice");
        let chosen = set.resolve(&user);
        let best = set
            .shards()
            .iter()
            .max_by_key(|s| rendezvous_score(&user, s))
            .unwrap();
        assert_eq!(chosen, best);
    }

    #[test]
    fn order_of_shard_set_does_not_matter() {
        let set = ShardSet::numbered(16).unwrap();
        let mut reversed = set.shards().to_vec();
        reversed.reverse();
        let reversed = ShardSet::new(reversed).unwrap();
        for user in users(200) {
            assert_eq!(set.resolve(&user), reversed.resolve(&user));
        }
    }

    #[test]
    fn load_distribution_counts_every_user() {
        let set = ShardSet::numbered(64).unwrap();
        let population = users(6400);
        let dist = set.load_distribution(&population);
        assert_eq!(dist.counts.len(), 64);
        assert_eq!(dist.total, 6400);
        assert!((dist.mean - 100.0).abs() < f64::EPSILON);
        assert!(dist.min <= dist.max);
        assert!(dist.skew >= 1.0);
        // A uniform hash keeps the fullest shard well under twice the mean.
        assert!(dist.skew < 1.5, "skew {}", dist.skew);
    }

    #[test]
    fn empty_population_has_zero_skew() {
        let set = ShardSet::numbered(4).unwrap();
        let dist = set.load_distribution(std::iter::empty());
        assert_eq!(dist.total, 0);
        assert_eq!(dist.skew, 0.0);
    }

    proptest! {
        #[test]
        fn resolve_is_deterministic(user in "[a-z0-9_-]{1,24}") {
            let set = ShardSet::numbered(64).unwrap();
            let user = UserId::new(user);
            prop_assert_eq!(set.resolve(&user), set.resolve(&user));
        }

        #[test]
        fn removing_a_shard_only_moves_its_users(
            user in "[a-z0-9_-]{1,24}",
            removed in 1usize..=64,
        ) {
            let set = ShardSet::numbered(64).unwrap();
            let removed = ShardId::new(format!("shard-{removed:03}"));
            let smaller = set.without(&removed).unwrap();
            let user = UserId::new(user);

            let before = set.resolve(&user).clone();
            let after = smaller.resolve(&user).clone();
            if before != removed {
                prop_assert_eq!(before, after);
            } else {
                prop_assert_ne!(after, removed);
            }
        }
    }
}
