//! The user-authored program spec.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::condition::Condition;
use crate::kind::{ProceedOn, ProgramKind};
use crate::meta::ObjectMeta;
use crate::node::Node;

/// Where the program bytecode comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BytecodeRef {
    /// Absolute path on the node's filesystem.
    Path(String),

    /// OCI image reference resolved by the loader.
    Image(String),
}

impl std::fmt::Display for BytecodeRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BytecodeRef::Path(p) => write!(f, "file://{p}"),
            BytecodeRef::Image(i) => write!(f, "image://{i}"),
        }
    }
}

/// Which of a node's interfaces a filter spec attaches to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterfaceSelector {
    /// The node's primary interface only.
    Primary,

    /// Named interfaces; names absent on a node are skipped, not errors.
    Names(Vec<String>),
}

/// Kind-specific attachment parameters declared on the spec.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttachSpec {
    /// Filter kinds: attach to interfaces, ordered by priority in the
    /// loader's chain. Priority is a relative signal only; the resulting
    /// position is owned by the loader and never persisted here.
    Interfaces {
        selector: InterfaceSelector,
        priority: i32,
        #[serde(default)]
        proceed_on: Vec<ProceedOn>,
    },

    /// Trace hooks: one attachment per named hook point.
    Hooks { hooks: Vec<String> },
}

/// A user-declared description of a program to attach across the fleet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramSpec {
    pub name: String,
    pub kind: ProgramKind,
    pub bytecode: BytecodeRef,

    /// Entry-point function name inside the bytecode.
    pub entry_point: String,

    /// Label predicate selecting nodes. Empty selects every node.
    #[serde(default)]
    pub node_selector: BTreeMap<String, String>,

    pub attach: AttachSpec,

    /// Global configuration data handed to the loader verbatim.
    #[serde(default)]
    pub global_data: BTreeMap<String, Vec<u8>>,

    /// Name of another spec whose shared maps this program must reuse.
    /// Resolved to a loader handle at reconcile time.
    #[serde(default)]
    pub map_owner: Option<String>,

    #[serde(default)]
    pub meta: ObjectMeta,

    #[serde(default)]
    pub conditions: Vec<Condition>,
}

impl ProgramSpec {
    /// Whether this spec's node selector matches the given node.
    pub fn selects_node(&self, node: &Node) -> bool {
        self.node_selector
            .iter()
            .all(|(k, v)| node.labels.get(k) == Some(v))
    }
}
