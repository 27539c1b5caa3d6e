//! Domain model for the fleetd reconciliation protocol.
//!
//! Two object kinds flow through the system:
//!
//! - [`ProgramSpec`]: a user-declared description of a program to attach
//!   somewhere in the fleet.
//! - [`Attachment`]: the per-node, per-attach-point outcome record written by
//!   the node agent and aggregated by the operator.
//!
//! Both carry [`ObjectMeta`] (labels, finalizers, deletion timestamp, resource
//! version) and a condition history. The loader-facing load parameters live in
//! [`load`], shared by the expander, the diff engine, and the loader clients.

pub mod attachment;
pub mod condition;
pub mod kind;
pub mod load;
pub mod meta;
pub mod node;
pub mod spec;

pub use attachment::{attachment_name, Attachment};
pub use condition::{AttachmentConditionType, Condition, SpecConditionType};
pub use kind::{Direction, KindParseError, ProceedOn, ProgramKind};
pub use load::{AttachParams, LoadSpec, ObservedProgram};
pub use meta::ObjectMeta;
pub use node::{Node, NodeInterface};
pub use spec::{AttachSpec, BytecodeRef, InterfaceSelector, ProgramSpec};

/// Label key carrying the owning spec's name on an attachment.
pub const LABEL_OWNER: &str = "fleetd.io/owner";

/// Label key carrying the node name on an attachment.
pub const LABEL_NODE: &str = "fleetd.io/node";

/// Finalizer the operator holds on every spec.
pub const OPERATOR_FINALIZER: &str = "fleetd.io/operator";

/// Finalizer the node agent holds on attachments for a given program kind.
pub fn agent_finalizer(kind: ProgramKind) -> String {
    format!("fleetd.io/agent-{kind}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn agent_finalizer_is_kind_scoped() {
        assert_eq!(
            agent_finalizer(ProgramKind::IngressFilter),
            "fleetd.io/agent-ingress-filter"
        );
        assert_ne!(
            agent_finalizer(ProgramKind::TraceHook),
            agent_finalizer(ProgramKind::EgressFilter)
        );
    }
}
