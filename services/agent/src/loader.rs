//! Client-side abstraction over the node-local loader.
//!
//! The loader daemon is stateful and authoritative: whatever `list` returns
//! is what is actually running. The reconciler only ever talks to it through
//! this trait, so tests swap in [`MockLoader`] and production wires up the
//! gRPC client from [`crate::grpc`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use fleetd_api::{LoadSpec, ObservedProgram, ProgramKind};

#[derive(Debug, Error)]
pub enum LoaderError {
    /// The loader could not be reached or the call timed out.
    #[error("loader transport error: {0}")]
    Transport(String),

    /// The loader answered and refused the operation.
    #[error("loader rejected the call: {0}")]
    Rejected(String),

    /// The loader returned a record this client cannot interpret.
    #[error("malformed loader record: {0}")]
    Malformed(String),
}

/// Load, unload, and enumerate programs on this node.
#[async_trait]
pub trait Loader: Send + Sync {
    /// Load one attachment instance. `correlation_id` and `spec_name` travel
    /// in the request metadata and come back unchanged from [`Loader::list`].
    async fn load(
        &self,
        spec: &LoadSpec,
        correlation_id: Uuid,
        spec_name: &str,
    ) -> Result<u32, LoaderError>;

    async fn unload(&self, handle: u32) -> Result<(), LoaderError>;

    /// Every live program of the given kind.
    async fn list(&self, kind: ProgramKind) -> Result<Vec<ObservedProgram>, LoaderError>;
}

/// In-process loader with the same load/list/unload semantics as the daemon.
/// Hands out sequential handles and counts calls so tests can assert that
/// reconciliation converges without redundant loader traffic.
#[derive(Default)]
pub struct MockLoader {
    programs: Mutex<HashMap<u32, ObservedProgram>>,
    next_handle: AtomicU32,
    load_calls: AtomicUsize,
    unload_calls: AtomicUsize,
    fail_loads: AtomicBool,
    fail_unloads: AtomicBool,
    fail_loads_at: Mutex<Option<String>>,
}

impl MockLoader {
    pub fn new() -> Self {
        Self {
            next_handle: AtomicU32::new(1000),
            ..Self::default()
        }
    }

    pub fn failing_loads() -> Self {
        let loader = Self::new();
        loader.fail_loads.store(true, Ordering::SeqCst);
        loader
    }

    pub fn set_fail_loads(&self, fail: bool) {
        self.fail_loads.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_unloads(&self, fail: bool) {
        self.fail_unloads.store(fail, Ordering::SeqCst);
    }

    /// Fail only loads targeting the given attach point; other loads
    /// succeed. Pass `None` to clear.
    pub fn set_fail_loads_at(&self, attach_point: Option<&str>) {
        if let Ok(mut at) = self.fail_loads_at.lock() {
            *at = attach_point.map(str::to_string);
        }
    }

    pub fn load_calls(&self) -> usize {
        self.load_calls.load(Ordering::SeqCst)
    }

    pub fn unload_calls(&self) -> usize {
        self.unload_calls.load(Ordering::SeqCst)
    }

    pub fn live_count(&self) -> usize {
        self.programs.lock().map(|p| p.len()).unwrap_or(0)
    }

    pub fn live_program(&self, handle: u32) -> Option<ObservedProgram> {
        self.programs.lock().ok().and_then(|p| p.get(&handle).cloned())
    }
}

#[async_trait]
impl Loader for MockLoader {
    async fn load(
        &self,
        spec: &LoadSpec,
        correlation_id: Uuid,
        _spec_name: &str,
    ) -> Result<u32, LoaderError> {
        self.load_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_loads.load(Ordering::SeqCst) {
            return Err(LoaderError::Rejected("injected load failure".to_string()));
        }
        let failing_point = self
            .fail_loads_at
            .lock()
            .map_err(|_| LoaderError::Rejected("poisoned".to_string()))?
            .clone();
        if failing_point.as_deref() == Some(spec.attach.attach_point()) {
            return Err(LoaderError::Rejected(format!(
                "injected load failure at {}",
                spec.attach.attach_point()
            )));
        }
        let handle = self.next_handle.fetch_add(1, Ordering::SeqCst);
        let mut programs = self
            .programs
            .lock()
            .map_err(|_| LoaderError::Rejected("poisoned".to_string()))?;
        programs.insert(
            handle,
            ObservedProgram {
                handle,
                correlation_id,
                spec: spec.clone(),
                position: None,
            },
        );
        Ok(handle)
    }

    async fn unload(&self, handle: u32) -> Result<(), LoaderError> {
        self.unload_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_unloads.load(Ordering::SeqCst) {
            return Err(LoaderError::Rejected("injected unload failure".to_string()));
        }
        let mut programs = self
            .programs
            .lock()
            .map_err(|_| LoaderError::Rejected("poisoned".to_string()))?;
        if programs.remove(&handle).is_none() {
            return Err(LoaderError::Rejected(format!(
                "no program with handle {handle}"
            )));
        }
        Ok(())
    }

    async fn list(&self, kind: ProgramKind) -> Result<Vec<ObservedProgram>, LoaderError> {
        let programs = self
            .programs
            .lock()
            .map_err(|_| LoaderError::Rejected("poisoned".to_string()))?;
        let mut live: Vec<ObservedProgram> = programs
            .values()
            .filter(|p| p.spec.kind == kind)
            .cloned()
            .collect();
        live.sort_by_key(|p| p.handle);
        Ok(live)
    }
}
