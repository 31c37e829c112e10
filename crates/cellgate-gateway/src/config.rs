//! Layered configuration: defaults, then an optional file, then `CELLGATE_*`
//! environment variables (`__` separates nested keys, e.g.
//! `CELLGATE_ROUTER__PLACEMENT_CACHE_TTL_SECS=10`).

use cellgate_audit::LedgerConfig;
use cellgate_guard::{IdempotencyConfig, ProtectionConfig, QueueConfig};
use cellgate_placement::RouterConfig;
use cellgate_types::{try_span_secs, Location};
use cellgate_vault::{DeletionConfig, KmsConfig, PolicyConfig};
use serde::{Deserialize, Serialize};

use crate::error::GatewayError;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CellgateConfig {
    /// Initial shard-to-location layout
    #[serde(default)]
    pub placement: PlacementConfig,

    /// Shard count and placement cache staleness bound
    #[serde(default)]
    pub router: RouterConfig,

    /// Per-user rate limits
    #[serde(default)]
    pub protection: ProtectionConfig,

    /// Idempotency record retention
    #[serde(default)]
    pub idempotency: IdempotencyConfig,

    /// Deferred write queue TTL and drain rate
    #[serde(default)]
    pub queue: QueueConfig,

    /// Audit ledger settings
    #[serde(default)]
    pub ledger: LedgerConfig,

    /// Sensitive-operation purpose allowlist
    #[serde(default)]
    pub policy: PolicyConfig,

    /// Region-bound KMS key ids
    #[serde(default)]
    pub kms: KmsConfig,

    /// Erasure cleanup batching
    #[serde(default)]
    pub deletion: DeletionConfig,

    /// Tracing output
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Initial shard layout; shards are striped over `locations` in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacementConfig {
    /// Locations shards are striped over, in order
    #[serde(default = "default_locations")]
    pub locations: Vec<Location>,
}

fn default_locations() -> Vec<Location> {
    vec![
        Location::new("us", "us-cell-1"),
        Location::new("eu", "eu-cell-1"),
        Location::new("apac", "apac-cell-1"),
    ]
}

impl Default for PlacementConfig {
    fn default() -> Self {
        Self {
            locations: default_locations(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl CellgateConfig {
    /// Load and validate: defaults, then `path` if given, then `CELLGATE_*`.
    pub fn load(path: Option<&str>) -> Result<Self, GatewayError> {
        let mut builder = config::Config::builder();

        builder = builder.add_source(config::Config::try_from(&CellgateConfig::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("CELLGATE")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: Self = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the components cannot represent.
    pub fn validate(&self) -> Result<(), GatewayError> {
        let spans = [
            ("router.placement_cache_ttl_secs", self.router.placement_cache_ttl_secs),
            ("protection.action_window_secs", self.protection.action_window_secs),
            ("protection.high_risk_window_secs", self.protection.high_risk_window_secs),
            ("idempotency.ttl_secs", self.idempotency.ttl_secs),
            ("queue.item_ttl_secs", self.queue.item_ttl_secs),
        ];
        if let Some((name, secs)) = spans.iter().find(|(_, secs)| try_span_secs(*secs).is_none()) {
            return Err(GatewayError::InvalidConfig(format!(
                "{name} = {secs} is out of range"
            )));
        }
        if self.router.shard_count == 0 {
            return Err(GatewayError::InvalidConfig(
                "router.shard_count must be at least 1".to_string(),
            ));
        }
        if self.placement.locations.is_empty() {
            return Err(GatewayError::InvalidConfig(
                "placement.locations must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
