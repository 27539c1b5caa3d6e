//! The per-kind agent reconcile loop.
//!
//! One reconciler instance runs per program kind. A pass lists every spec of
//! its kind, expands each into per-attach-point outcome records, and drives
//! the loader until the live state matches: load what is missing, replace
//! what drifted, unload what must not run. The loader's `list` is the only
//! source of truth for what is running; nothing live is cached between
//! passes.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use fleetd_api::condition::push_transition;
use fleetd_api::{
    agent_finalizer, attachment_name, Attachment, AttachmentConditionType, BytecodeRef, LoadSpec,
    Node, ObservedProgram, ProgramKind, ProgramSpec,
};
use fleetd_store::{Store, StoreError};

use crate::diff;
use crate::expander::expand;
use crate::loader::Loader;

/// Delay before retrying a pass that hit a transient failure.
pub const RETRY_INTERVAL: Duration = Duration::from_secs(5);

/// What one reconcile pass did.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassStats {
    pub specs: usize,
    pub attachments: usize,
    pub loads: usize,
    pub unloads: usize,
    pub failures: usize,

    /// A transient failure or a freshly created record wants a prompt retry.
    pub requeue: bool,
}

/// Resolution of a spec's declared map owner on this node.
#[derive(Debug, Default, Clone, Copy)]
struct MapOwnerStatus {
    required: bool,
    found: bool,

    /// Loader handle of the owner's program on this node, once loaded.
    handle: Option<u32>,
}

pub struct AgentReconciler {
    store: Arc<dyn Store>,
    loader: Arc<dyn Loader>,
    node_name: String,
    kind: ProgramKind,
    interval: Duration,
}

impl AgentReconciler {
    pub fn new(
        store: Arc<dyn Store>,
        loader: Arc<dyn Loader>,
        node_name: impl Into<String>,
        kind: ProgramKind,
        interval: Duration,
    ) -> Self {
        Self {
            store,
            loader,
            node_name: node_name.into(),
            kind,
            interval,
        }
    }

    /// Run passes until `shutdown` flips to true.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(kind = %self.kind, node = %self.node_name, "Agent reconciler started");
        let mut delay = Duration::ZERO;
        loop {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {
                    delay = match self.reconcile_pass().await {
                        Ok(stats) => {
                            debug!(kind = %self.kind, ?stats, "Pass complete");
                            if stats.requeue { RETRY_INTERVAL } else { self.interval }
                        }
                        Err(err) => {
                            warn!(kind = %self.kind, error = %err, "Pass failed");
                            RETRY_INTERVAL
                        }
                    };
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!(kind = %self.kind, "Agent reconciler stopping");
                        return;
                    }
                }
            }
        }
    }

    /// Reconcile every spec of this reconciler's kind once.
    #[instrument(skip(self), fields(kind = %self.kind, node = %self.node_name))]
    pub async fn reconcile_pass(&self) -> anyhow::Result<PassStats> {
        let node = self
            .store
            .get_node(&self.node_name)
            .await?
            .ok_or_else(|| anyhow::anyhow!("node {:?} is not registered", self.node_name))?;

        let specs = self.store.list_specs(Some(self.kind)).await?;
        let mut stats = PassStats {
            specs: specs.len(),
            ..PassStats::default()
        };
        if specs.is_empty() {
            return Ok(stats);
        }

        let observed: HashMap<Uuid, ObservedProgram> = self
            .loader
            .list(self.kind)
            .await
            .map_err(|e| anyhow::anyhow!("listing live programs: {e}"))?
            .into_iter()
            .map(|p| (p.correlation_id, p))
            .collect();

        for spec in specs {
            match self.reconcile_spec(&spec, &node, &observed, &mut stats).await {
                Ok(()) => {}
                Err(err) if err.is_conflict() => {
                    debug!(spec = %spec.name, "Write conflict, retrying next pass");
                    stats.requeue = true;
                }
                Err(err) => return Err(err.into()),
            }
        }
        Ok(stats)
    }

    async fn reconcile_spec(
        &self,
        spec: &ProgramSpec,
        node: &Node,
        observed: &HashMap<Uuid, ObservedProgram>,
        stats: &mut PassStats,
    ) -> fleetd_store::Result<()> {
        let expected = match expand(spec, node) {
            Ok(expected) => expected,
            Err(err) => {
                warn!(spec = %spec.name, error = %err, "Spec does not expand, skipping");
                return Ok(());
            }
        };

        let selected = spec.selects_node(node);
        let finalizer = agent_finalizer(self.kind);

        // First sight of a spec on this node: create the outcome records and
        // stop. Acting on them waits for the next pass, once their identities
        // and correlation ids are durable.
        let mut created = false;
        for exp in &expected {
            let name = attachment_name(&spec.name, &self.node_name, &exp.attach_point);
            if self.store.get_attachment(&name).await?.is_some() {
                continue;
            }
            if spec.meta.is_being_deleted() {
                continue;
            }
            let record =
                Attachment::new(self.kind, &spec.name, &self.node_name, &exp.attach_point);
            match self.store.create_attachment(record).await {
                Ok(_) => created = true,
                Err(StoreError::AlreadyExists { .. }) => {}
                Err(err) => return Err(err),
            }
        }
        if created {
            debug!(spec = %spec.name, "Created outcome records, acting next pass");
            stats.requeue = true;
            return Ok(());
        }

        let map_owner = self.resolve_map_owner(spec).await?;

        let mut expected_names = HashSet::new();
        for exp in &expected {
            let name = attachment_name(&spec.name, &self.node_name, &exp.attach_point);
            expected_names.insert(name.clone());

            let Some(mut record) = self.store.get_attachment(&name).await? else {
                continue;
            };
            stats.attachments += 1;

            let mut load = exp.load.clone();
            load.map_owner_handle = map_owner.handle;
            let live = observed.get(&record.correlation_id);
            let prev_handle = record.handle;

            let (state, message) = match self.absent_target(spec, &record, selected, &map_owner) {
                Some(target) => self.teardown(&mut record, target, live, stats).await,
                None => self.apply(spec, &mut record, &load, live, stats).await,
            };
            self.record_outcome(
                record,
                prev_handle,
                state,
                message,
                spec.meta.is_being_deleted(),
                &finalizer,
                stats,
            )
            .await?;
        }

        // Records whose attach point the expansion no longer produces, e.g.
        // after an interface selector narrowed. Torn down and deleted.
        let owned = self.store.list_attachments_by_owner(&spec.name).await?;
        for stale in owned {
            if stale.node != self.node_name || expected_names.contains(&stale.name) {
                continue;
            }
            if !stale.meta.is_being_deleted() {
                debug!(attachment = %stale.name, "Attach point no longer expected, deleting record");
                self.store.delete_attachment(&stale.name).await?;
            }
            let Some(mut record) = self.store.get_attachment(&stale.name).await? else {
                continue;
            };
            stats.attachments += 1;

            let live = observed.get(&record.correlation_id);
            let prev_handle = record.handle;
            let (state, message) = self
                .teardown(&mut record, AttachmentConditionType::Unloaded, live, stats)
                .await;
            self.record_outcome(
                record,
                prev_handle,
                state,
                message,
                spec.meta.is_being_deleted(),
                &finalizer,
                stats,
            )
            .await?;
        }

        Ok(())
    }

    /// The state this record must converge to when no program may run,
    /// or `None` when a live program is desired.
    fn absent_target(
        &self,
        spec: &ProgramSpec,
        record: &Attachment,
        selected: bool,
        map_owner: &MapOwnerStatus,
    ) -> Option<AttachmentConditionType> {
        if spec.meta.is_being_deleted() || record.meta.is_being_deleted() {
            Some(AttachmentConditionType::Unloaded)
        } else if !selected {
            Some(AttachmentConditionType::NotSelected)
        } else if map_owner.required && !map_owner.found {
            Some(AttachmentConditionType::MapOwnerNotFound)
        } else if map_owner.required && map_owner.handle.is_none() {
            Some(AttachmentConditionType::MapOwnerNotLoaded)
        } else {
            None
        }
    }

    /// Drive a record to an absent state, unloading the live program first
    /// if one exists.
    async fn teardown(
        &self,
        record: &mut Attachment,
        target: AttachmentConditionType,
        live: Option<&ObservedProgram>,
        stats: &mut PassStats,
    ) -> (AttachmentConditionType, Option<String>) {
        let Some(live) = live else {
            record.handle = None;
            return (target, None);
        };
        match self.loader.unload(live.handle).await {
            Ok(()) => {
                stats.unloads += 1;
                info!(attachment = %record.name, handle = live.handle, "Unloaded program");
                record.handle = None;
                (target, None)
            }
            Err(err) => {
                warn!(attachment = %record.name, handle = live.handle, error = %err, "Unload failed");
                (AttachmentConditionType::UnloadFailed, Some(err.to_string()))
            }
        }
    }

    /// Ensure the live program matches `load`, loading or replacing as
    /// needed.
    async fn apply(
        &self,
        spec: &ProgramSpec,
        record: &mut Attachment,
        load: &LoadSpec,
        live: Option<&ObservedProgram>,
        stats: &mut PassStats,
    ) -> (AttachmentConditionType, Option<String>) {
        if let Err(reason) = check_bytecode(&spec.bytecode) {
            return (AttachmentConditionType::BytecodeError, Some(reason));
        }

        let Some(live) = live else {
            record.handle = None;
            return self.load_program(record, load, &spec.name, stats).await;
        };

        let outcome = diff::compare(load, live);
        if outcome.matches {
            record.handle = Some(live.handle);
            return (AttachmentConditionType::Loaded, None);
        }

        debug!(
            attachment = %record.name,
            reasons = ?outcome.reasons,
            "Live program drifted, replacing"
        );
        match self.loader.unload(live.handle).await {
            Ok(()) => {
                stats.unloads += 1;
                record.handle = None;
            }
            Err(err) => {
                warn!(attachment = %record.name, error = %err, "Unload failed");
                return (AttachmentConditionType::UnloadFailed, Some(err.to_string()));
            }
        }
        self.load_program(record, load, &spec.name, stats).await
    }

    async fn load_program(
        &self,
        record: &mut Attachment,
        load: &LoadSpec,
        spec_name: &str,
        stats: &mut PassStats,
    ) -> (AttachmentConditionType, Option<String>) {
        match self
            .loader
            .load(load, record.correlation_id, spec_name)
            .await
        {
            Ok(handle) => {
                stats.loads += 1;
                info!(attachment = %record.name, handle, "Loaded program");
                record.handle = Some(handle);
                (AttachmentConditionType::Loaded, None)
            }
            Err(err) => {
                warn!(attachment = %record.name, error = %err, "Load failed");
                (AttachmentConditionType::LoadFailed, Some(err.to_string()))
            }
        }
    }

    /// Write the pass outcome back: condition transition, handle change,
    /// and finalizer release once teardown is confirmed complete.
    #[allow(clippy::too_many_arguments)]
    async fn record_outcome(
        &self,
        mut record: Attachment,
        prev_handle: Option<u32>,
        state: AttachmentConditionType,
        message: Option<String>,
        owner_deleted: bool,
        finalizer: &str,
        stats: &mut PassStats,
    ) -> fleetd_store::Result<()> {
        if state.is_failure() {
            stats.failures += 1;
            stats.requeue = true;
        }

        let mut changed = record.handle != prev_handle;
        changed |= push_transition(&mut record.conditions, state.condition(message));

        if (owner_deleted || record.meta.is_being_deleted())
            && state.is_absent()
            && record.meta.has_finalizer(finalizer)
        {
            record.meta.remove_finalizer(finalizer);
            changed = true;
        }

        if changed {
            self.store.update_attachment(record).await?;
        }
        Ok(())
    }

    /// Resolve the spec's declared map owner to a loader handle on this
    /// node, if it is loaded here.
    async fn resolve_map_owner(&self, spec: &ProgramSpec) -> fleetd_store::Result<MapOwnerStatus> {
        let Some(owner_name) = &spec.map_owner else {
            return Ok(MapOwnerStatus::default());
        };

        let mut status = MapOwnerStatus {
            required: true,
            ..MapOwnerStatus::default()
        };
        let Some(owner) = self.store.get_spec(owner_name).await? else {
            return Ok(status);
        };
        if owner.meta.is_being_deleted() {
            return Ok(status);
        }
        status.found = true;

        let owned = self.store.list_attachments_by_owner(owner_name).await?;
        status.handle = owned
            .iter()
            .filter(|a| a.node == self.node_name)
            .find_map(|a| {
                let loaded = a
                    .latest_condition()
                    .is_some_and(|c| AttachmentConditionType::Loaded.matches(c));
                if loaded {
                    a.handle
                } else {
                    None
                }
            });
        Ok(status)
    }
}

fn check_bytecode(bytecode: &BytecodeRef) -> Result<(), String> {
    match bytecode {
        BytecodeRef::Path(path) if path.is_empty() => Err("bytecode path is empty".to_string()),
        BytecodeRef::Path(path) if !path.starts_with('/') => {
            Err(format!("bytecode path {path:?} is not absolute"))
        }
        BytecodeRef::Image(image) if image.is_empty() => {
            Err("bytecode image reference is empty".to_string())
        }
        _ => Ok(()),
    }
}
