//! Policy-faithful KMS stand-in.
//!
//! Keys are derived with blake3 rather than real envelope encryption; what
//! matters here is the decrypt gate. A wrapped key only decrypts in the region
//! it was wrapped for, and never again once its object is revoked.

use std::collections::{BTreeMap, HashSet};

use cellgate_types::{ObjectId, Region};
use parking_lot::RwLock;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::KmsError;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KmsConfig {
    /// Region → master key id.
    #[serde(default = "default_region_keys")]
    pub region_keys: BTreeMap<Region, String>,
}

fn default_region_keys() -> BTreeMap<Region, String> {
    [
        ("us", "kms-us-001"),
        ("eu", "kms-eu-001"),
        ("apac", "kms-apac-001"),
    ]
    .into_iter()
    .map(|(region, key)| (Region::from(region), key.to_string()))
    .collect()
}

impl Default for KmsConfig {
    fn default() -> Self {
        Self {
            region_keys: default_region_keys(),
        }
    }
}

/// Data key wrapped under a regional master key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WrappedKey {
    pub region: Region,
    pub key_id: String,
    pub wrapped_data_key: String,
}

#[derive(Debug, Default)]
pub struct KmsMock {
    config: KmsConfig,
    revoked: RwLock<HashSet<ObjectId>>,
}

impl KmsMock {
    pub fn new(config: KmsConfig) -> Self {
        Self {
            config,
            revoked: RwLock::new(HashSet::new()),
        }
    }

    /// Fresh random data key, hex encoded.
    pub fn generate_data_key(&self) -> String {
        let mut material = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut material);
        blake3::hash(&material).to_hex().to_string()
    }

    pub fn wrap(&self, region: &Region, data_key: &str) -> Result<WrappedKey, KmsError> {
        let key_id = self
            .config
            .region_keys
            .get(region)
            .ok_or_else(|| KmsError::UnknownRegion(region.clone()))?;
        let wrapped = blake3::hash(format!("{key_id}:{data_key}").as_bytes());
        Ok(WrappedKey {
            region: region.clone(),
            key_id: key_id.clone(),
            wrapped_data_key: wrapped.to_hex().to_string(),
        })
    }

    /// Generate and wrap a data key for `object` homed in `region`.
    pub fn provision(&self, object: &ObjectId, region: &Region) -> Result<WrappedKey, KmsError> {
        let wrapped = self.wrap(region, &self.generate_data_key())?;
        info!(object = %object, region = %region, key_id = %wrapped.key_id, "data key provisioned");
        Ok(wrapped)
    }

    /// Crypto-erase `object`. Irreversible.
    pub fn revoke_object(&self, object: &ObjectId) {
        if self.revoked.write().insert(object.clone()) {
            info!(object = %object, "object key revoked");
        }
    }

    pub fn is_revoked(&self, object: &ObjectId) -> bool {
        self.revoked.read().contains(object)
    }

    pub fn can_decrypt(&self, object: &ObjectId, wrapped: &WrappedKey, serving_region: &Region) -> bool {
        if self.is_revoked(object) {
            warn!(object = %object, "decrypt refused: object revoked");
            return false;
        }
        if wrapped.region != *serving_region {
            warn!(
                object = %object,
                key_region = %wrapped.region,
                serving_region = %serving_region,
                "decrypt refused: region mismatch"
            );
            return false;
        }
        true
    }
}
