//! Object metadata shared by specs and attachments.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metadata carried by every stored object.
///
/// Deletion is a two-phase protocol: `delete` stamps `deletion_timestamp`, and
/// the store removes the object only once `finalizers` is empty. The resource
/// version increments on every write and backs optimistic-concurrency checks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMeta {
    #[serde(default)]
    pub labels: BTreeMap<String, String>,

    #[serde(default)]
    pub finalizers: Vec<String>,

    #[serde(default)]
    pub deletion_timestamp: Option<DateTime<Utc>>,

    #[serde(default)]
    pub resource_version: u64,
}

impl ObjectMeta {
    /// True once a delete has been requested for the object.
    pub fn is_being_deleted(&self) -> bool {
        self.deletion_timestamp.is_some()
    }

    pub fn has_finalizer(&self, finalizer: &str) -> bool {
        self.finalizers.iter().any(|f| f == finalizer)
    }

    /// Add a finalizer if absent. Returns true if the set changed.
    pub fn add_finalizer(&mut self, finalizer: &str) -> bool {
        if self.has_finalizer(finalizer) {
            return false;
        }
        self.finalizers.push(finalizer.to_string());
        true
    }

    /// Remove a finalizer if present. Returns true if the set changed.
    pub fn remove_finalizer(&mut self, finalizer: &str) -> bool {
        let before = self.finalizers.len();
        self.finalizers.retain(|f| f != finalizer);
        self.finalizers.len() != before
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finalizer_add_remove_is_idempotent() {
        let mut meta = ObjectMeta::default();
        assert!(meta.add_finalizer("fleetd.io/operator"));
        assert!(!meta.add_finalizer("fleetd.io/operator"));
        assert!(meta.has_finalizer("fleetd.io/operator"));

        assert!(meta.remove_finalizer("fleetd.io/operator"));
        assert!(!meta.remove_finalizer("fleetd.io/operator"));
        assert!(meta.finalizers.is_empty());
    }

    #[test]
    fn deletion_is_signalled_by_timestamp() {
        let mut meta = ObjectMeta::default();
        assert!(!meta.is_being_deleted());
        meta.deletion_timestamp = Some(Utc::now());
        assert!(meta.is_being_deleted());
    }
}
