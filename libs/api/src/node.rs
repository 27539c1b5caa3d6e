//! Node descriptions as observed through the declarative store.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A network interface present on a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInterface {
    pub name: String,

    /// At most one interface per node is primary.
    #[serde(default)]
    pub primary: bool,
}

/// A machine participating in the fleet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub name: String,

    #[serde(default)]
    pub labels: BTreeMap<String, String>,

    #[serde(default)]
    pub interfaces: Vec<NodeInterface>,
}

impl Node {
    pub fn primary_interface(&self) -> Option<&NodeInterface> {
        self.interfaces.iter().find(|i| i.primary)
    }

    pub fn has_interface(&self, name: &str) -> bool {
        self.interfaces.iter().any(|i| i.name == name)
    }
}
