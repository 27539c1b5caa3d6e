//! Exact-match comparison of desired load parameters against a live program.
//!
//! Any behavioral difference means the program must be replaced; there is no
//! in-place mutation. The correlation id and the loader-reported chain
//! position never participate in the comparison.

use fleetd_api::{AttachParams, LoadSpec, ObservedProgram};

/// Result of comparing one expected instance against its live counterpart.
#[derive(Debug, Clone)]
pub struct DiffOutcome {
    pub matches: bool,

    /// Human-readable mismatch descriptions, for logs.
    pub reasons: Vec<String>,
}

/// Compare field for field.
pub fn compare(expected: &LoadSpec, observed: &ObservedProgram) -> DiffOutcome {
    let live = &observed.spec;
    let mut reasons = Vec::new();

    if expected.bytecode != live.bytecode {
        reasons.push(format!(
            "bytecode: want {}, have {}",
            expected.bytecode, live.bytecode
        ));
    }
    if expected.entry_point != live.entry_point {
        reasons.push(format!(
            "entry point: want {:?}, have {:?}",
            expected.entry_point, live.entry_point
        ));
    }
    if expected.kind != live.kind {
        reasons.push(format!("kind: want {}, have {}", expected.kind, live.kind));
    }
    compare_attach(&expected.attach, &live.attach, &mut reasons);
    if expected.global_data != live.global_data {
        reasons.push("global data differs".to_string());
    }
    if expected.map_owner_handle != live.map_owner_handle {
        reasons.push(format!(
            "map owner handle: want {:?}, have {:?}",
            expected.map_owner_handle, live.map_owner_handle
        ));
    }

    DiffOutcome {
        matches: reasons.is_empty(),
        reasons,
    }
}

fn compare_attach(expected: &AttachParams, live: &AttachParams, reasons: &mut Vec<String>) {
    match (expected, live) {
        (
            AttachParams::Filter {
                iface,
                direction,
                priority,
                proceed_on,
            },
            AttachParams::Filter {
                iface: live_iface,
                direction: live_direction,
                priority: live_priority,
                proceed_on: live_proceed_on,
            },
        ) => {
            if iface != live_iface {
                reasons.push(format!("iface: want {iface:?}, have {live_iface:?}"));
            }
            if direction != live_direction {
                reasons.push(format!(
                    "direction: want {direction}, have {live_direction}"
                ));
            }
            if priority != live_priority {
                reasons.push(format!(
                    "priority: want {priority}, have {live_priority}"
                ));
            }
            if proceed_on != live_proceed_on {
                reasons.push("proceed-on list differs".to_string());
            }
        }
        (AttachParams::Hook { hook }, AttachParams::Hook { hook: live_hook }) => {
            if hook != live_hook {
                reasons.push(format!("hook: want {hook:?}, have {live_hook:?}"));
            }
        }
        _ => reasons.push("attach parameter shape differs".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use rstest::rstest;
    use uuid::Uuid;

    use fleetd_api::{BytecodeRef, Direction, ProceedOn, ProgramKind};

    fn load_spec() -> LoadSpec {
        LoadSpec {
            bytecode: BytecodeRef::Path("/opt/progs/filter.o".to_string()),
            entry_point: "accept_all".to_string(),
            kind: ProgramKind::IngressFilter,
            attach: AttachParams::Filter {
                iface: "eth0".to_string(),
                direction: Direction::Ingress,
                priority: 50,
                proceed_on: vec![ProceedOn::Pipe],
            },
            global_data: BTreeMap::new(),
            map_owner_handle: None,
        }
    }

    fn observed(spec: LoadSpec) -> ObservedProgram {
        ObservedProgram {
            handle: 7,
            correlation_id: Uuid::new_v4(),
            spec,
            position: Some(3),
        }
    }

    #[test]
    fn identical_parameters_match() {
        let outcome = compare(&load_spec(), &observed(load_spec()));
        assert!(outcome.matches);
        assert!(outcome.reasons.is_empty());
    }

    #[test]
    fn correlation_id_and_position_never_matter() {
        let mut live = observed(load_spec());
        live.correlation_id = Uuid::new_v4();
        live.position = None;
        assert!(compare(&load_spec(), &live).matches);
    }

    fn tweak_bytecode(s: &mut LoadSpec) {
        s.bytecode = BytecodeRef::Image("quay.io/fleet/filter:v2".to_string());
    }
    fn tweak_entry_point(s: &mut LoadSpec) {
        s.entry_point = "drop_all".to_string();
    }
    fn tweak_priority(s: &mut LoadSpec) {
        if let AttachParams::Filter { priority, .. } = &mut s.attach {
            *priority += 10;
        }
    }
    fn tweak_proceed_on(s: &mut LoadSpec) {
        if let AttachParams::Filter { proceed_on, .. } = &mut s.attach {
            proceed_on.push(ProceedOn::Redirect);
        }
    }
    fn tweak_global_data(s: &mut LoadSpec) {
        s.global_data.insert("flag".to_string(), vec![1]);
    }
    fn tweak_map_owner(s: &mut LoadSpec) {
        s.map_owner_handle = Some(42);
    }

    #[rstest]
    #[case::bytecode(tweak_bytecode)]
    #[case::entry_point(tweak_entry_point)]
    #[case::priority(tweak_priority)]
    #[case::proceed_on(tweak_proceed_on)]
    #[case::global_data(tweak_global_data)]
    #[case::map_owner(tweak_map_owner)]
    fn any_field_mismatch_forces_replacement(#[case] tweak: fn(&mut LoadSpec)) {
        let mut live_spec = load_spec();
        tweak(&mut live_spec);
        let outcome = compare(&load_spec(), &observed(live_spec));
        assert!(!outcome.matches);
        assert!(!outcome.reasons.is_empty());
    }

    #[test]
    fn shape_mismatch_is_reported() {
        let mut live_spec = load_spec();
        live_spec.attach = AttachParams::Hook {
            hook: "syscalls/sys_enter_openat".to_string(),
        };
        let outcome = compare(&load_spec(), &observed(live_spec));
        assert!(!outcome.matches);
        assert_eq!(outcome.reasons, vec!["attach parameter shape differs"]);
    }
}
