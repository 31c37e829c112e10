use cellgate_placement::PlacementError;
use cellgate_types::ObjectId;
use cellgate_vault::{KmsError, ShareError};
use thiserror::Error;

/// Faults raised while assembling or operating the gateway. Access decisions
/// are never reported through this type; they use `DenyReason`.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("placement error: {0}")]
    Placement(#[from] PlacementError),

    #[error("KMS error: {0}")]
    Kms(#[from] KmsError),

    #[error("share error: {0}")]
    Share(#[from] ShareError),

    #[error("object {0} is tombstoned")]
    Tombstoned(ObjectId),

    #[error("tracing already initialised: {0}")]
    Telemetry(String),
}

pub type GatewayResult<T> = Result<T, GatewayError>;
