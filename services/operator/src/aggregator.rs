//! Cluster-level aggregation of per-node attachment outcomes.
//!
//! The operator never talks to a loader. It owns the spec-level condition and
//! the deletion protocol: it holds a finalizer on every spec and releases it
//! only after every per-node outcome record has been torn down by its agent.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info, instrument};

use fleetd_api::condition::push_transition;
use fleetd_api::{Attachment, ProgramSpec, SpecConditionType, OPERATOR_FINALIZER};
use fleetd_store::Store;

/// What aggregating one spec did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregation {
    /// Nothing to write.
    Unchanged,

    /// Conditions or finalizers were updated.
    Updated,

    /// The operator finalizer was released and the spec is gone.
    Released,
}

pub struct Aggregator {
    store: Arc<dyn Store>,
}

impl Aggregator {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Converge the cluster-level view of one spec.
    #[instrument(skip(self, spec), fields(spec = %spec.name))]
    pub async fn aggregate(&self, mut spec: ProgramSpec) -> fleetd_store::Result<Aggregation> {
        // A spec is guarded before anything else happens to it, so deletion
        // can never outrun the agents.
        if !spec.meta.is_being_deleted() && spec.meta.add_finalizer(OPERATOR_FINALIZER) {
            debug!("Guarding spec with operator finalizer");
            self.store.update_spec(spec).await?;
            return Ok(Aggregation::Updated);
        }

        let attachments = self.store.list_attachments_by_owner(&spec.name).await?;

        if spec.meta.is_being_deleted() {
            return self.aggregate_deletion(spec, &attachments).await;
        }

        let condition = self.cluster_condition(&attachments).await?;
        if push_transition(&mut spec.conditions, condition) {
            self.store.update_spec(spec).await?;
            return Ok(Aggregation::Updated);
        }
        Ok(Aggregation::Unchanged)
    }

    /// Deletion path: wait for the agents, then release the spec.
    async fn aggregate_deletion(
        &self,
        mut spec: ProgramSpec,
        attachments: &[Attachment],
    ) -> fleetd_store::Result<Aggregation> {
        if attachments.is_empty() {
            info!(spec = %spec.name, "All outcome records gone, releasing spec");
            spec.meta.remove_finalizer(OPERATOR_FINALIZER);
            self.store.update_spec(spec).await?;
            return Ok(Aggregation::Released);
        }

        // Agents are still tearing down. Everything that survives here still
        // holds its agent finalizer.
        let blockers: Vec<&str> = attachments.iter().map(|a| a.name.as_str()).collect();
        let condition = SpecConditionType::DeleteError
            .condition(Some(format!("deletion blocked by: {blockers:?}")));
        if push_transition(&mut spec.conditions, condition) {
            self.store.update_spec(spec).await?;
            return Ok(Aggregation::Updated);
        }
        Ok(Aggregation::Unchanged)
    }

    /// The spec-level condition implied by the current outcome records.
    ///
    /// Only once every registered node has produced its records does the
    /// cluster verdict flip from `NotYetLoaded` to success or error; a
    /// partial rollout never reports either.
    async fn cluster_condition(
        &self,
        attachments: &[Attachment],
    ) -> fleetd_store::Result<fleetd_api::Condition> {
        let nodes = self.store.list_nodes().await?;
        let covered: HashSet<&str> = attachments.iter().map(|a| a.node.as_str()).collect();

        if nodes.is_empty() || nodes.iter().any(|n| !covered.contains(n.name.as_str())) {
            return Ok(SpecConditionType::NotYetLoaded.condition(None));
        }

        // Records with no condition yet are agents mid-flight.
        if attachments.iter().any(|a| a.latest_condition().is_none()) {
            return Ok(SpecConditionType::NotYetLoaded.condition(None));
        }

        if let Some(failed) = attachments.iter().find(|a| a.is_failed()) {
            return Ok(SpecConditionType::ReconcileError.condition(Some(format!(
                "attachment {} failed on node {}",
                failed.name, failed.node
            ))));
        }

        Ok(SpecConditionType::ReconcileSuccess.condition(None))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use fleetd_api::{
        agent_finalizer, AttachSpec, AttachmentConditionType, BytecodeRef, InterfaceSelector,
        Node, NodeInterface, ObjectMeta, ProgramKind,
    };
    use fleetd_store::MemoryStore;

    fn node(name: &str) -> Node {
        Node {
            name: name.to_string(),
            labels: BTreeMap::new(),
            interfaces: vec![NodeInterface {
                name: "eth0".to_string(),
                primary: true,
            }],
        }
    }

    fn spec(name: &str) -> ProgramSpec {
        ProgramSpec {
            name: name.to_string(),
            kind: ProgramKind::IngressFilter,
            bytecode: BytecodeRef::Path("/opt/progs/filter.o".to_string()),
            entry_point: "accept_all".to_string(),
            node_selector: BTreeMap::new(),
            attach: AttachSpec::Interfaces {
                selector: InterfaceSelector::Primary,
                priority: 50,
                proceed_on: vec![],
            },
            global_data: BTreeMap::new(),
            map_owner: None,
            meta: ObjectMeta::default(),
            conditions: Vec::new(),
        }
    }

    fn attachment_with(
        spec_name: &str,
        node_name: &str,
        state: AttachmentConditionType,
    ) -> Attachment {
        let mut att = Attachment::new(ProgramKind::IngressFilter, spec_name, node_name, "eth0");
        push_transition(&mut att.conditions, state.condition(None));
        att
    }

    async fn harness() -> (Arc<MemoryStore>, Aggregator) {
        let store = Arc::new(MemoryStore::new());
        let aggregator = Aggregator::new(store.clone());
        (store, aggregator)
    }

    #[tokio::test]
    async fn new_spec_is_guarded_then_not_yet_loaded() {
        let (store, aggregator) = harness().await;
        store.put_node(node("node-a")).await.unwrap();
        store.create_spec(spec("filter")).await.unwrap();

        let spec1 = store.get_spec("filter").await.unwrap().unwrap();
        assert_eq!(aggregator.aggregate(spec1).await.unwrap(), Aggregation::Updated);
        let guarded = store.get_spec("filter").await.unwrap().unwrap();
        assert!(guarded.meta.has_finalizer(OPERATOR_FINALIZER));

        assert_eq!(
            aggregator.aggregate(guarded).await.unwrap(),
            Aggregation::Updated
        );
        let seen = store.get_spec("filter").await.unwrap().unwrap();
        assert!(SpecConditionType::NotYetLoaded.matches(seen.conditions.last().unwrap()));
    }

    #[tokio::test]
    async fn verdict_waits_for_every_node() {
        let (store, aggregator) = harness().await;
        store.put_node(node("node-a")).await.unwrap();
        store.put_node(node("node-b")).await.unwrap();
        store.create_spec(spec("filter")).await.unwrap();

        store
            .create_attachment(attachment_with(
                "filter",
                "node-a",
                AttachmentConditionType::Loaded,
            ))
            .await
            .unwrap();

        let s = store.get_spec("filter").await.unwrap().unwrap();
        aggregator.aggregate(s).await.unwrap();
        let s = store.get_spec("filter").await.unwrap().unwrap();
        aggregator.aggregate(s).await.unwrap();
        let s = store.get_spec("filter").await.unwrap().unwrap();
        assert!(SpecConditionType::NotYetLoaded.matches(s.conditions.last().unwrap()));

        // Second node reports in; the verdict flips to success.
        store
            .create_attachment(attachment_with(
                "filter",
                "node-b",
                AttachmentConditionType::Loaded,
            ))
            .await
            .unwrap();
        aggregator.aggregate(s).await.unwrap();
        let s = store.get_spec("filter").await.unwrap().unwrap();
        assert!(SpecConditionType::ReconcileSuccess.matches(s.conditions.last().unwrap()));
    }

    #[tokio::test]
    async fn one_failed_attachment_means_reconcile_error() {
        let (store, aggregator) = harness().await;
        store.put_node(node("node-a")).await.unwrap();
        store.put_node(node("node-b")).await.unwrap();
        store.create_spec(spec("filter")).await.unwrap();

        store
            .create_attachment(attachment_with(
                "filter",
                "node-a",
                AttachmentConditionType::Loaded,
            ))
            .await
            .unwrap();
        store
            .create_attachment(attachment_with(
                "filter",
                "node-b",
                AttachmentConditionType::LoadFailed,
            ))
            .await
            .unwrap();

        let s = store.get_spec("filter").await.unwrap().unwrap();
        aggregator.aggregate(s).await.unwrap();
        let s = store.get_spec("filter").await.unwrap().unwrap();
        aggregator.aggregate(s).await.unwrap();

        let s = store.get_spec("filter").await.unwrap().unwrap();
        let latest = s.conditions.last().unwrap();
        assert!(SpecConditionType::ReconcileError.matches(latest));
        assert!(latest.message.contains("node-b"));
    }

    #[tokio::test]
    async fn config_class_states_still_count_as_success() {
        let (store, aggregator) = harness().await;
        store.put_node(node("node-a")).await.unwrap();
        store.put_node(node("node-b")).await.unwrap();
        store.create_spec(spec("filter")).await.unwrap();

        store
            .create_attachment(attachment_with(
                "filter",
                "node-a",
                AttachmentConditionType::NotSelected,
            ))
            .await
            .unwrap();
        store
            .create_attachment(attachment_with(
                "filter",
                "node-b",
                AttachmentConditionType::BytecodeError,
            ))
            .await
            .unwrap();

        let s = store.get_spec("filter").await.unwrap().unwrap();
        aggregator.aggregate(s).await.unwrap();
        let s = store.get_spec("filter").await.unwrap().unwrap();
        aggregator.aggregate(s).await.unwrap();

        let s = store.get_spec("filter").await.unwrap().unwrap();
        assert!(SpecConditionType::ReconcileSuccess.matches(s.conditions.last().unwrap()));
    }

    #[tokio::test]
    async fn deletion_waits_for_records_then_releases() {
        let (store, aggregator) = harness().await;
        store.put_node(node("node-a")).await.unwrap();
        store.create_spec(spec("filter")).await.unwrap();

        let s = store.get_spec("filter").await.unwrap().unwrap();
        aggregator.aggregate(s).await.unwrap();

        let att = attachment_with("filter", "node-a", AttachmentConditionType::Loaded);
        let att = store.create_attachment(att).await.unwrap();

        store.delete_spec("filter").await.unwrap();

        // A record still exists: the spec must not be released.
        let s = store.get_spec("filter").await.unwrap().unwrap();
        assert_eq!(aggregator.aggregate(s).await.unwrap(), Aggregation::Updated);
        let s = store.get_spec("filter").await.unwrap().unwrap();
        assert!(SpecConditionType::DeleteError.matches(s.conditions.last().unwrap()));

        // Agent finishes teardown and releases its finalizer; the record is
        // pruned and the next aggregation releases the spec.
        let mut att = att;
        push_transition(
            &mut att.conditions,
            AttachmentConditionType::Unloaded.condition(None),
        );
        att.meta
            .remove_finalizer(&agent_finalizer(ProgramKind::IngressFilter));
        store.update_attachment(att).await.unwrap();

        let s = store.get_spec("filter").await.unwrap().unwrap();
        assert_eq!(
            aggregator.aggregate(s).await.unwrap(),
            Aggregation::Released
        );
        assert!(store.get_spec("filter").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn blocked_deletion_reports_delete_error() {
        let (store, aggregator) = harness().await;
        store.put_node(node("node-a")).await.unwrap();
        store.create_spec(spec("filter")).await.unwrap();

        let s = store.get_spec("filter").await.unwrap().unwrap();
        aggregator.aggregate(s).await.unwrap();

        store
            .create_attachment(attachment_with(
                "filter",
                "node-a",
                AttachmentConditionType::UnloadFailed,
            ))
            .await
            .unwrap();
        store.delete_spec("filter").await.unwrap();

        let s = store.get_spec("filter").await.unwrap().unwrap();
        assert_eq!(aggregator.aggregate(s).await.unwrap(), Aggregation::Updated);

        let s = store.get_spec("filter").await.unwrap().unwrap();
        let latest = s.conditions.last().unwrap();
        assert!(SpecConditionType::DeleteError.matches(latest));
        assert!(latest.message.contains("filter-node-a-eth0"));
    }
}
