//! Condition types recorded on specs and attachments.
//!
//! A condition summarizes the most recent reconciliation outcome. Only the
//! latest entry is externally meaningful; clients polling slowly are not
//! guaranteed to observe intermediate transitions, and the history keeps only
//! the most recent [`MAX_HISTORY`] transitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single condition entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    #[serde(rename = "type")]
    pub condition_type: String,
    pub reason: String,
    pub message: String,
    pub last_transition: DateTime<Utc>,
}

/// Most recent transitions retained per object. A flapping attachment stays
/// bounded instead of growing its record on every flip.
pub const MAX_HISTORY: usize = 16;

/// Append `condition` to `history` only if its type differs from the latest
/// entry, dropping the oldest entries beyond [`MAX_HISTORY`]. Returns true if
/// the history changed.
pub fn push_transition(history: &mut Vec<Condition>, condition: Condition) -> bool {
    if history
        .last()
        .is_some_and(|latest| latest.condition_type == condition.condition_type)
    {
        return false;
    }
    history.push(condition);
    if history.len() > MAX_HISTORY {
        let excess = history.len() - MAX_HISTORY;
        history.drain(..excess);
    }
    true
}

/// Per-attachment conditions written by the node agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttachmentConditionType {
    /// The loader confirmed the program is loaded and attached.
    Loaded,

    /// The loader rejected or failed the load call.
    LoadFailed,

    /// The loader failed the unload call; the program may still be live.
    UnloadFailed,

    /// The program is confirmed absent after a requested teardown.
    Unloaded,

    /// The node does not match the spec's node selector.
    NotSelected,

    /// The declared map owner spec does not exist.
    MapOwnerNotFound,

    /// The declared map owner exists but its program is not loaded here.
    MapOwnerNotLoaded,

    /// The bytecode reference could not be resolved.
    BytecodeError,
}

impl AttachmentConditionType {
    /// Failure states the aggregator surfaces as `ReconcileError`.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            AttachmentConditionType::LoadFailed | AttachmentConditionType::UnloadFailed
        )
    }

    /// States in which no loader record exists for the attachment.
    pub fn is_absent(&self) -> bool {
        matches!(
            self,
            AttachmentConditionType::Unloaded
                | AttachmentConditionType::NotSelected
                | AttachmentConditionType::MapOwnerNotFound
                | AttachmentConditionType::MapOwnerNotLoaded
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AttachmentConditionType::Loaded => "Loaded",
            AttachmentConditionType::LoadFailed => "LoadFailed",
            AttachmentConditionType::UnloadFailed => "UnloadFailed",
            AttachmentConditionType::Unloaded => "Unloaded",
            AttachmentConditionType::NotSelected => "NotSelected",
            AttachmentConditionType::MapOwnerNotFound => "MapOwnerNotFound",
            AttachmentConditionType::MapOwnerNotLoaded => "MapOwnerNotLoaded",
            AttachmentConditionType::BytecodeError => "BytecodeError",
        }
    }

    /// Build a condition entry, with a default message when none is supplied.
    pub fn condition(&self, message: impl Into<Option<String>>) -> Condition {
        let message = message.into().unwrap_or_else(|| {
            match self {
                AttachmentConditionType::Loaded => "program loaded and attached",
                AttachmentConditionType::LoadFailed => "loader failed to load the program",
                AttachmentConditionType::UnloadFailed => "loader failed to unload the program",
                AttachmentConditionType::Unloaded => "program unloaded",
                AttachmentConditionType::NotSelected => "node not selected by the spec",
                AttachmentConditionType::MapOwnerNotFound => "map owner spec not found",
                AttachmentConditionType::MapOwnerNotLoaded => "map owner program not loaded",
                AttachmentConditionType::BytecodeError => "failed to resolve bytecode reference",
            }
            .to_string()
        });

        Condition {
            condition_type: self.as_str().to_string(),
            reason: self.as_str().to_string(),
            message,
            last_transition: Utc::now(),
        }
    }

    pub fn matches(&self, condition: &Condition) -> bool {
        condition.condition_type == self.as_str()
    }
}

/// Cluster-level conditions written on the spec by the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpecConditionType {
    /// Not every node has produced its attachment record yet.
    NotYetLoaded,

    /// At least one attachment is in a failed state.
    ReconcileError,

    /// Every attachment reconciled cleanly.
    ReconcileSuccess,

    /// Deletion requested but some attachments still hold their finalizer.
    DeleteError,
}

impl SpecConditionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SpecConditionType::NotYetLoaded => "NotYetLoaded",
            SpecConditionType::ReconcileError => "ReconcileError",
            SpecConditionType::ReconcileSuccess => "ReconcileSuccess",
            SpecConditionType::DeleteError => "DeleteError",
        }
    }

    /// Build a condition entry, with a default message when none is supplied.
    pub fn condition(&self, message: impl Into<Option<String>>) -> Condition {
        let message = message.into().unwrap_or_else(|| {
            match self {
                SpecConditionType::NotYetLoaded => {
                    "waiting for the spec to be reconciled on all nodes"
                }
                SpecConditionType::ReconcileError => "attachment reconciliation failed",
                SpecConditionType::ReconcileSuccess => {
                    "attachment reconciliation succeeded on all nodes"
                }
                SpecConditionType::DeleteError => "spec deletion blocked by attachments",
            }
            .to_string()
        });

        Condition {
            condition_type: self.as_str().to_string(),
            reason: self.as_str().to_string(),
            message,
            last_transition: Utc::now(),
        }
    }

    pub fn matches(&self, condition: &Condition) -> bool {
        condition.condition_type == self.as_str()
    }
}
