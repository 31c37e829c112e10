use cellgate_types::{GrantId, Region};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KmsError {
    #[error("no KMS key configured for region {0}")]
    UnknownRegion(Region),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ShareError {
    #[error("unknown grant: {0}")]
    UnknownGrant(GrantId),

    #[error("grant {0} was revoked and cannot be reissued")]
    Revoked(GrantId),
}
