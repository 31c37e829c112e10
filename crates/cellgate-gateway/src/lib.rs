//! Cellgate enforcement gateway.
//!
//! Assembles the placement, guard, vault and audit crates into the two
//! entry points a serving cell exposes:
//!
//! - [`EnforcementGateway`]: safe reads from the read-safe model, sensitive
//!   operations through policy, KMS and the audit ledger, and the object
//!   lifecycle (creation, sharing, erasure).
//! - [`WritePath`]: rate-limited, idempotent writes that execute at the home
//!   cell or are deferred while it is down.
//!
//! Both share one [`Router`] so reads and writes see the same placement cache.
//!
//! ```no_run
//! use std::sync::Arc;
//! use cellgate_gateway::{Cellgate, CellgateConfig};
//! use cellgate_types::SystemClock;
//!
//! let config = CellgateConfig::load(Some("cellgate.toml"))?;
//! cellgate_gateway::telemetry::init_tracing(&config.logging)?;
//! let cellgate = Cellgate::build(&config, Arc::new(SystemClock))?;
//! # Ok::<(), cellgate_gateway::GatewayError>(())
//! ```

#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod gateway;
pub mod telemetry;
pub mod write_path;

use std::sync::Arc;

use cellgate_placement::{PlacementService, Router, ShardSet};
use cellgate_types::Clock;

pub use config::{CellgateConfig, LoggingConfig, PlacementConfig};
pub use error::{GatewayError, GatewayResult};
pub use gateway::{EnforcementGateway, SensitiveGrant};
pub use write_path::{WriteDisposition, WritePath, WriteReceipt, WriteRequest};

/// A fully wired serving cell.
#[derive(Debug)]
pub struct Cellgate {
    pub router: Arc<Router>,
    pub gateway: EnforcementGateway,
    pub writes: WritePath,
}

impl Cellgate {
    /// Build a cell from `config`: `router.shard_count` numbered shards striped
    /// over `placement.locations`.
    pub fn build(config: &CellgateConfig, clock: Arc<dyn Clock>) -> GatewayResult<Self> {
        let shards = ShardSet::numbered(config.router.shard_count)?;
        let service = Arc::new(
            PlacementService::striped(shards, &config.placement.locations)?
                .with_clock(clock.clone()),
        );
        let router = Arc::new(
            Router::new(service, config.router.clone()).with_clock(clock.clone()),
        );

        tracing::info!(
            shards = config.router.shard_count,
            locations = config.placement.locations.len(),
            "cellgate assembled"
        );

        Ok(Self {
            gateway: EnforcementGateway::new(router.clone(), config, clock.clone()),
            writes: WritePath::new(router.clone(), config, clock),
            router,
        })
    }
}
