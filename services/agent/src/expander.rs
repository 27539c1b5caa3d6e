//! Expansion of a program spec into concrete attachment instances.
//!
//! Expansion is a pure function of the spec and the node description: the
//! same inputs always produce the same instances in the same order, so the
//! derived record names are stable across passes. Whether the node is
//! label-selected is deliberately not consulted here; unselected nodes still
//! get outcome records, they just never load anything.

use thiserror::Error;

use fleetd_api::{
    AttachParams, AttachSpec, InterfaceSelector, LoadSpec, Node, ProgramKind, ProgramSpec,
};

/// The spec's attach parameters do not fit its kind (a trace hook declaring
/// interfaces, or a filter declaring hooks). Admission should have rejected
/// the object; the reconciler skips it.
#[derive(Debug, Error)]
#[error("spec {spec:?}: attach parameters do not fit kind {kind}")]
pub struct ExpandError {
    pub spec: String,
    pub kind: ProgramKind,
}

/// One attachment instance a spec expands to on a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpectedAttachment {
    pub attach_point: String,

    /// Desired load parameters, with the map owner handle still unresolved.
    pub load: LoadSpec,
}

/// Expand `spec` into its attachment instances on `node`.
///
/// Interface names absent from the node are skipped, not errors; a node with
/// no matching interface expands to an empty list.
pub fn expand(spec: &ProgramSpec, node: &Node) -> Result<Vec<ExpectedAttachment>, ExpandError> {
    let instance = |attach_point: &str, attach: AttachParams| ExpectedAttachment {
        attach_point: attach_point.to_string(),
        load: LoadSpec {
            bytecode: spec.bytecode.clone(),
            entry_point: spec.entry_point.clone(),
            kind: spec.kind,
            attach,
            global_data: spec.global_data.clone(),
            map_owner_handle: None,
        },
    };

    match (&spec.attach, spec.kind.direction()) {
        (
            AttachSpec::Interfaces {
                selector,
                priority,
                proceed_on,
            },
            Some(direction),
        ) => {
            let ifaces: Vec<&str> = match selector {
                InterfaceSelector::Primary => node
                    .primary_interface()
                    .map(|i| i.name.as_str())
                    .into_iter()
                    .collect(),
                InterfaceSelector::Names(names) => names
                    .iter()
                    .filter(|name| node.has_interface(name))
                    .map(String::as_str)
                    .collect(),
            };
            Ok(ifaces
                .into_iter()
                .map(|iface| {
                    instance(
                        iface,
                        AttachParams::Filter {
                            iface: iface.to_string(),
                            direction,
                            priority: *priority,
                            proceed_on: proceed_on.clone(),
                        },
                    )
                })
                .collect())
        }
        (AttachSpec::Hooks { hooks }, None) => Ok(hooks
            .iter()
            .map(|hook| instance(hook, AttachParams::Hook { hook: hook.clone() }))
            .collect()),
        _ => Err(ExpandError {
            spec: spec.name.clone(),
            kind: spec.kind,
        }),
    }
}
