use std::collections::{BTreeMap, HashMap};

use cellgate_types::ObjectId;
use parking_lot::RwLock;
use tracing::debug;

/// Artifacts derived from an object (OCR text, embeddings, index entries).
/// Erasure must purge them together with the object.
#[derive(Debug, Default)]
pub struct DerivedStore {
    artifacts: RwLock<HashMap<ObjectId, BTreeMap<String, String>>>,
}

impl DerivedStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, object: &ObjectId, kind: impl Into<String>, value: impl Into<String>) {
        self.artifacts
            .write()
            .entry(object.clone())
            .or_default()
            .insert(kind.into(), value.into());
    }

    /// All artifacts for `object`, keyed by kind.
    pub fn get(&self, object: &ObjectId) -> BTreeMap<String, String> {
        self.artifacts
            .read()
            .get(object)
            .cloned()
            .unwrap_or_default()
    }

    /// Purge `object`'s artifacts, returning how many were removed.
    pub fn delete_object(&self, object: &ObjectId) -> usize {
        let removed = self
            .artifacts
            .write()
            .remove(object)
            .map(|a| a.len())
            .unwrap_or(0);
        if removed > 0 {
            debug!(object = %object, removed, "derived artifacts purged");
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn purge_removes_every_artifact() {
        let store = DerivedStore::new();
        let doc = ObjectId::from("doc-1");
        store.put(&doc, "ocr_text", "PATIENT: ...");
        store.put(&doc, "embedding", "[0.1, 0.2]");
        store.put(&ObjectId::from("doc-2"), "ocr_text", "other");

        assert_eq!(store.get(&doc).len(), 2);
        assert_eq!(store.delete_object(&doc), 2);
        assert!(store.get(&doc).is_empty());
        assert_eq!(store.get(&ObjectId::from("doc-2")).len(), 1);
        assert_eq!(store.delete_object(&doc), 0);
    }
}
