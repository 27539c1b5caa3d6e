//! Per-node, per-attach-point outcome records.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::condition::{AttachmentConditionType, Condition};
use crate::kind::ProgramKind;
use crate::meta::ObjectMeta;
use crate::{agent_finalizer, LABEL_NODE, LABEL_OWNER};

/// Derive the deterministic name of the outcome record for one
/// (spec, node, attach point) tuple.
///
/// Repeated reconciliation must recompute the same identity, so the name is a
/// pure function of its inputs. Attach points may contain separators that are
/// not name-safe (`syscalls/sys_enter_openat`); those are folded to dashes.
pub fn attachment_name(spec_name: &str, node_name: &str, attach_point: &str) -> String {
    let point: String = attach_point
        .chars()
        .map(|c| match c {
            '/' | '_' | '.' | ':' => '-',
            c => c.to_ascii_lowercase(),
        })
        .collect();
    format!("{spec_name}-{node_name}-{point}")
}

/// The outcome record for one attachment instance.
///
/// Created by the node agent the first time a spec expands for a node,
/// mutated on every reconcile, and physically deleted by the store only after
/// the agent's finalizer is gone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub name: String,
    pub owner_spec: String,
    pub node: String,
    pub attach_point: String,

    /// Stable identifier correlating this record with the loader's state.
    /// Generated once at creation, passed through `Load` metadata, and
    /// returned unchanged by `List`.
    pub correlation_id: Uuid,

    /// Loader handle, present once the program has been loaded.
    #[serde(default)]
    pub handle: Option<u32>,

    #[serde(default)]
    pub meta: ObjectMeta,

    #[serde(default)]
    pub conditions: Vec<Condition>,
}

impl Attachment {
    /// Build a fresh record with the agent finalizer and owner/node labels
    /// set, ready to be created in the store.
    pub fn new(kind: ProgramKind, spec_name: &str, node_name: &str, attach_point: &str) -> Self {
        let mut meta = ObjectMeta::default();
        meta.labels
            .insert(LABEL_OWNER.to_string(), spec_name.to_string());
        meta.labels
            .insert(LABEL_NODE.to_string(), node_name.to_string());
        meta.add_finalizer(&agent_finalizer(kind));

        Self {
            name: attachment_name(spec_name, node_name, attach_point),
            owner_spec: spec_name.to_string(),
            node: node_name.to_string(),
            attach_point: attach_point.to_string(),
            correlation_id: Uuid::new_v4(),
            handle: None,
            meta,
            conditions: Vec::new(),
        }
    }

    pub fn latest_condition(&self) -> Option<&Condition> {
        self.conditions.last()
    }

    /// True if the latest condition is a failed load or unload.
    pub fn is_failed(&self) -> bool {
        self.latest_condition().is_some_and(|c| {
            AttachmentConditionType::LoadFailed.matches(c)
                || AttachmentConditionType::UnloadFailed.matches(c)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::push_transition;

    #[test]
    fn name_derivation_is_deterministic() {
        let a = attachment_name("filter", "node-a", "eth0");
        let b = attachment_name("filter", "node-a", "eth0");
        assert_eq!(a, b);
        assert_eq!(a, "filter-node-a-eth0");
    }

    #[test]
    fn name_derivation_folds_separators() {
        assert_eq!(
            attachment_name("tracer", "node-a", "syscalls/sys_enter_openat"),
            "tracer-node-a-syscalls-sys-enter-openat"
        );
    }

    #[test]
    fn new_attachment_carries_finalizer_and_labels() {
        let att = Attachment::new(ProgramKind::IngressFilter, "filter", "node-a", "eth0");
        assert!(att
            .meta
            .has_finalizer(&agent_finalizer(ProgramKind::IngressFilter)));
        assert_eq!(att.meta.labels.get(LABEL_OWNER).unwrap(), "filter");
        assert_eq!(att.meta.labels.get(LABEL_NODE).unwrap(), "node-a");
        assert!(att.handle.is_none());
        assert!(att.conditions.is_empty());
    }

    #[test]
    fn correlation_ids_are_unique_per_record() {
        let a = Attachment::new(ProgramKind::TraceHook, "tracer", "node-a", "hook");
        let b = Attachment::new(ProgramKind::TraceHook, "tracer", "node-b", "hook");
        assert_ne!(a.correlation_id, b.correlation_id);
    }

    #[test]
    fn failure_detection_uses_latest_condition() {
        let mut att = Attachment::new(ProgramKind::IngressFilter, "filter", "node-a", "eth0");
        push_transition(
            &mut att.conditions,
            AttachmentConditionType::LoadFailed.condition(None),
        );
        assert!(att.is_failed());

        push_transition(
            &mut att.conditions,
            AttachmentConditionType::Loaded.condition(None),
        );
        assert!(!att.is_failed());
    }
}
