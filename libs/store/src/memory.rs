//! In-process store implementation.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::debug;

use fleetd_api::{Attachment, Node, ProgramKind, ProgramSpec, LABEL_NODE, LABEL_OWNER};

use crate::{Result, Store, StoreError};

#[derive(Default)]
struct Inner {
    specs: HashMap<String, ProgramSpec>,
    attachments: HashMap<String, Attachment>,
    nodes: HashMap<String, Node>,
}

/// An in-memory [`Store`] with the same write semantics as the external API
/// server: versioned updates and finalizer-gated deletion.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Physically remove a spec and cascade-remove its surviving attachments.
/// Attachments reaching this point have already dropped their finalizers.
fn prune_spec(inner: &mut Inner, name: &str) {
    inner.specs.remove(name);
    let owned: Vec<String> = inner
        .attachments
        .values()
        .filter(|a| a.owner_spec == name)
        .map(|a| a.name.clone())
        .collect();
    for att in owned {
        debug!(spec = %name, attachment = %att, "Pruning attachment with deleted owner");
        inner.attachments.remove(&att);
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_spec(&self, mut spec: ProgramSpec) -> Result<ProgramSpec> {
        let mut inner = self.inner.write().await;
        if inner.specs.contains_key(&spec.name) {
            return Err(StoreError::AlreadyExists {
                kind: "spec",
                name: spec.name,
            });
        }
        spec.meta.resource_version = 1;
        inner.specs.insert(spec.name.clone(), spec.clone());
        Ok(spec)
    }

    async fn get_spec(&self, name: &str) -> Result<Option<ProgramSpec>> {
        let inner = self.inner.read().await;
        Ok(inner.specs.get(name).cloned())
    }

    async fn list_specs(&self, kind: Option<ProgramKind>) -> Result<Vec<ProgramSpec>> {
        let inner = self.inner.read().await;
        let mut specs: Vec<ProgramSpec> = inner
            .specs
            .values()
            .filter(|s| kind.is_none_or(|k| s.kind == k))
            .cloned()
            .collect();
        specs.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(specs)
    }

    async fn update_spec(&self, mut spec: ProgramSpec) -> Result<ProgramSpec> {
        let mut inner = self.inner.write().await;
        let current = inner
            .specs
            .get(&spec.name)
            .ok_or_else(|| StoreError::NotFound {
                kind: "spec",
                name: spec.name.clone(),
            })?;

        if current.meta.resource_version != spec.meta.resource_version {
            return Err(StoreError::Conflict {
                name: spec.name.clone(),
            });
        }

        // Deletion is sticky: an update cannot clear the timestamp.
        spec.meta.deletion_timestamp = spec
            .meta
            .deletion_timestamp
            .or(current.meta.deletion_timestamp);
        spec.meta.resource_version += 1;

        if spec.meta.is_being_deleted() && spec.meta.finalizers.is_empty() {
            debug!(spec = %spec.name, "Last finalizer removed, deleting spec");
            prune_spec(&mut inner, &spec.name.clone());
            return Ok(spec);
        }

        inner.specs.insert(spec.name.clone(), spec.clone());
        Ok(spec)
    }

    async fn delete_spec(&self, name: &str) -> Result<()> {
        let mut inner = self.inner.write().await;
        let spec = inner.specs.get_mut(name).ok_or(StoreError::NotFound {
            kind: "spec",
            name: name.to_string(),
        })?;

        if spec.meta.deletion_timestamp.is_none() {
            spec.meta.deletion_timestamp = Some(Utc::now());
            spec.meta.resource_version += 1;
        }

        if spec.meta.finalizers.is_empty() {
            prune_spec(&mut inner, name);
        }
        Ok(())
    }

    async fn create_attachment(&self, mut attachment: Attachment) -> Result<Attachment> {
        let mut inner = self.inner.write().await;
        if inner.attachments.contains_key(&attachment.name) {
            return Err(StoreError::AlreadyExists {
                kind: "attachment",
                name: attachment.name,
            });
        }
        attachment.meta.resource_version = 1;
        inner
            .attachments
            .insert(attachment.name.clone(), attachment.clone());
        Ok(attachment)
    }

    async fn get_attachment(&self, name: &str) -> Result<Option<Attachment>> {
        let inner = self.inner.read().await;
        Ok(inner.attachments.get(name).cloned())
    }

    async fn list_attachments_by_owner(&self, spec_name: &str) -> Result<Vec<Attachment>> {
        let inner = self.inner.read().await;
        let mut atts: Vec<Attachment> = inner
            .attachments
            .values()
            .filter(|a| a.meta.labels.get(LABEL_OWNER).map(String::as_str) == Some(spec_name))
            .cloned()
            .collect();
        atts.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(atts)
    }

    async fn list_attachments_by_node(&self, node_name: &str) -> Result<Vec<Attachment>> {
        let inner = self.inner.read().await;
        let mut atts: Vec<Attachment> = inner
            .attachments
            .values()
            .filter(|a| a.meta.labels.get(LABEL_NODE).map(String::as_str) == Some(node_name))
            .cloned()
            .collect();
        atts.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(atts)
    }

    async fn update_attachment(&self, mut attachment: Attachment) -> Result<Attachment> {
        let mut inner = self.inner.write().await;
        let current = inner
            .attachments
            .get(&attachment.name)
            .ok_or_else(|| StoreError::NotFound {
                kind: "attachment",
                name: attachment.name.clone(),
            })?;

        if current.meta.resource_version != attachment.meta.resource_version {
            return Err(StoreError::Conflict {
                name: attachment.name.clone(),
            });
        }

        attachment.meta.deletion_timestamp = attachment
            .meta
            .deletion_timestamp
            .or(current.meta.deletion_timestamp);
        attachment.meta.resource_version += 1;

        // Once the agent drops its finalizer while the owning spec is going
        // away, the record is garbage: remove it instead of storing it.
        if attachment.meta.finalizers.is_empty() {
            let owner_going = inner
                .specs
                .get(&attachment.owner_spec)
                .map_or(true, |s| s.meta.is_being_deleted());
            if attachment.meta.is_being_deleted() || owner_going {
                debug!(attachment = %attachment.name, "Finalizers cleared, deleting attachment");
                inner.attachments.remove(&attachment.name);
                return Ok(attachment);
            }
        }

        inner
            .attachments
            .insert(attachment.name.clone(), attachment.clone());
        Ok(attachment)
    }

    async fn delete_attachment(&self, name: &str) -> Result<()> {
        let mut inner = self.inner.write().await;
        let att = inner.attachments.get_mut(name).ok_or(StoreError::NotFound {
            kind: "attachment",
            name: name.to_string(),
        })?;

        if att.meta.deletion_timestamp.is_none() {
            att.meta.deletion_timestamp = Some(Utc::now());
            att.meta.resource_version += 1;
        }

        if att.meta.finalizers.is_empty() {
            inner.attachments.remove(name);
        }
        Ok(())
    }

    async fn put_node(&self, node: Node) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner.nodes.insert(node.name.clone(), node);
        Ok(())
    }

    async fn get_node(&self, name: &str) -> Result<Option<Node>> {
        let inner = self.inner.read().await;
        Ok(inner.nodes.get(name).cloned())
    }

    async fn list_nodes(&self) -> Result<Vec<Node>> {
        let inner = self.inner.read().await;
        let mut nodes: Vec<Node> = inner.nodes.values().cloned().collect();
        nodes.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(nodes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use fleetd_api::{
        agent_finalizer, AttachSpec, BytecodeRef, InterfaceSelector, ObjectMeta,
        OPERATOR_FINALIZER,
    };

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

    #[tokio::test]
    async fn create_then_get_spec() {
        let store = MemoryStore::new();
        let created = store.create_spec(spec("filter")).await.unwrap();
        assert_eq!(created.meta.resource_version, 1);

        let fetched = store.get_spec("filter").await.unwrap().unwrap();
        assert_eq!(fetched.name, "filter");

        assert!(store.create_spec(spec("filter")).await.is_err());
    }

    #[tokio::test]
    async fn stale_update_conflicts() {
        let store = MemoryStore::new();
        let created = store.create_spec(spec("filter")).await.unwrap();

        let fresh = store.update_spec(created.clone()).await.unwrap();
        assert_eq!(fresh.meta.resource_version, 2);

        // A second writer holding the old version must fail.
        let err = store.update_spec(created).await.unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn delete_without_finalizers_is_immediate() {
        let store = MemoryStore::new();
        store.create_spec(spec("filter")).await.unwrap();
        store.delete_spec("filter").await.unwrap();
        assert!(store.get_spec("filter").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_with_finalizer_is_deferred() {
        let store = MemoryStore::new();
        let mut s = spec("filter");
        s.meta.add_finalizer(OPERATOR_FINALIZER);
        let mut s = store.create_spec(s).await.unwrap();

        store.delete_spec("filter").await.unwrap();
        let live = store.get_spec("filter").await.unwrap().unwrap();
        assert!(live.meta.is_being_deleted());

        // Removing the finalizer through an update releases the object.
        s.meta = live.meta;
        s.meta.remove_finalizer(OPERATOR_FINALIZER);
        store.update_spec(s).await.unwrap();
        assert!(store.get_spec("filter").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn attachment_lists_are_label_indexed() {
        let store = MemoryStore::new();
        store.create_spec(spec("filter")).await.unwrap();
        store.create_spec(spec("other")).await.unwrap();

        for (owner, node, point) in [
            ("filter", "node-a", "eth0"),
            ("filter", "node-b", "eth0"),
            ("other", "node-a", "eth1"),
        ] {
            store
                .create_attachment(Attachment::new(
                    ProgramKind::IngressFilter,
                    owner,
                    node,
                    point,
                ))
                .await
                .unwrap();
        }

        let by_owner = store.list_attachments_by_owner("filter").await.unwrap();
        assert_eq!(by_owner.len(), 2);

        let by_node = store.list_attachments_by_node("node-a").await.unwrap();
        assert_eq!(by_node.len(), 2);
    }

    #[tokio::test]
    async fn attachment_is_pruned_once_finalizer_drops_during_owner_deletion() {
        let store = MemoryStore::new();
        let mut s = spec("filter");
        s.meta.add_finalizer(OPERATOR_FINALIZER);
        store.create_spec(s).await.unwrap();

        let att = Attachment::new(ProgramKind::IngressFilter, "filter", "node-a", "eth0");
        let mut att = store.create_attachment(att).await.unwrap();

        store.delete_spec("filter").await.unwrap();

        // Owner is going away; dropping the agent finalizer deletes the record.
        att.meta
            .remove_finalizer(&agent_finalizer(ProgramKind::IngressFilter));
        store.update_attachment(att).await.unwrap();
        assert!(store
            .get_attachment("filter-node-a-eth0")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn attachment_survives_finalizer_drop_while_owner_lives() {
        let store = MemoryStore::new();
        store.create_spec(spec("filter")).await.unwrap();

        let att = Attachment::new(ProgramKind::IngressFilter, "filter", "node-a", "eth0");
        let mut att = store.create_attachment(att).await.unwrap();
        att.meta
            .remove_finalizer(&agent_finalizer(ProgramKind::IngressFilter));
        store.update_attachment(att).await.unwrap();

        assert!(store
            .get_attachment("filter-node-a-eth0")
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn attachment_delete_is_finalizer_gated() {
        let store = MemoryStore::new();
        store.create_spec(spec("filter")).await.unwrap();

        let att = Attachment::new(ProgramKind::IngressFilter, "filter", "node-a", "eth0");
        store.create_attachment(att).await.unwrap();

        store.delete_attachment("filter-node-a-eth0").await.unwrap();
        let mut live = store
            .get_attachment("filter-node-a-eth0")
            .await
            .unwrap()
            .unwrap();
        assert!(live.meta.is_being_deleted());

        live.meta
            .remove_finalizer(&agent_finalizer(ProgramKind::IngressFilter));
        store.update_attachment(live).await.unwrap();
        assert!(store
            .get_attachment("filter-node-a-eth0")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn spec_prune_cascades_to_attachments() {
        let store = MemoryStore::new();
        let mut s = spec("filter");
        s.meta.add_finalizer(OPERATOR_FINALIZER);
        let created = store.create_spec(s).await.unwrap();

        let mut att = Attachment::new(ProgramKind::IngressFilter, "filter", "node-a", "eth0");
        // Simulate an attachment whose finalizer was already released.
        att.meta.finalizers.clear();
        store.create_attachment(att).await.unwrap();

        store.delete_spec("filter").await.unwrap();
        let mut live = store.get_spec("filter").await.unwrap().unwrap();
        assert_eq!(live.meta.resource_version, created.meta.resource_version + 1);
        live.meta.remove_finalizer(OPERATOR_FINALIZER);
        store.update_spec(live).await.unwrap();

        assert!(store.get_spec("filter").await.unwrap().is_none());
        assert!(store
            .get_attachment("filter-node-a-eth0")
            .await
            .unwrap()
            .is_none());
    }
}
