//! Declarative store interface.
//!
//! The store holds the three object kinds the reconcilers exchange: program
//! specs, attachments (per-node outcome records), and node descriptions. The
//! real deployment backs this with an external API server; [`MemoryStore`]
//! is the in-process implementation used by tests and single-binary setups.
//!
//! Semantics the reconcilers rely on:
//!
//! - Updates are optimistic-concurrency checked: the caller's resource
//!   version must match the stored one or the write fails with
//!   [`StoreError::Conflict`] and must be retried with fresh state.
//! - Deletion is finalizer-gated: `delete_*` stamps the deletion timestamp,
//!   and the object is physically removed only once its finalizer list is
//!   empty.

mod memory;

use async_trait::async_trait;
use thiserror::Error;

use fleetd_api::{Attachment, Node, ProgramKind, ProgramSpec};

pub use memory::MemoryStore;

/// Store errors. `Conflict` is transient and always retriable.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{kind} {name:?} not found")]
    NotFound { kind: &'static str, name: String },

    #[error("{kind} {name:?} already exists")]
    AlreadyExists { kind: &'static str, name: String },

    #[error("conflict writing {name:?}: resource version is stale")]
    Conflict { name: String },
}

impl StoreError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict { .. })
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// CRUD + indexed list over the declarative objects.
#[async_trait]
pub trait Store: Send + Sync {
    // Program specs
    async fn create_spec(&self, spec: ProgramSpec) -> Result<ProgramSpec>;
    async fn get_spec(&self, name: &str) -> Result<Option<ProgramSpec>>;
    async fn list_specs(&self, kind: Option<ProgramKind>) -> Result<Vec<ProgramSpec>>;
    async fn update_spec(&self, spec: ProgramSpec) -> Result<ProgramSpec>;

    /// Request deletion. The spec survives, timestamped, until every
    /// finalizer has been removed.
    async fn delete_spec(&self, name: &str) -> Result<()>;

    // Attachments
    async fn create_attachment(&self, attachment: Attachment) -> Result<Attachment>;
    async fn get_attachment(&self, name: &str) -> Result<Option<Attachment>>;
    async fn list_attachments_by_owner(&self, spec_name: &str) -> Result<Vec<Attachment>>;
    async fn list_attachments_by_node(&self, node_name: &str) -> Result<Vec<Attachment>>;
    async fn update_attachment(&self, attachment: Attachment) -> Result<Attachment>;

    /// Request deletion of an outcome record. The record survives,
    /// timestamped, until the agent releases its finalizer.
    async fn delete_attachment(&self, name: &str) -> Result<()>;

    // Nodes
    async fn put_node(&self, node: Node) -> Result<()>;
    async fn get_node(&self, name: &str) -> Result<Option<Node>>;
    async fn list_nodes(&self) -> Result<Vec<Node>>;
}
