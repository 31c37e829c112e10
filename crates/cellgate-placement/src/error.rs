use cellgate_types::ShardId;
use thiserror::Error;

/// Placement configuration and mutation faults.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlacementError {
    #[error("shard set is empty")]
    EmptyShardSet,

    #[error("duplicate shard in set: {0}")]
    DuplicateShard(ShardId),

    #[error("unknown shard: {0}")]
    UnknownShard(ShardId),

    #[error("no location for shard: {0}")]
    MissingLocation(ShardId),

    #[error("no locations to place shards on")]
    NoLocations,
}
