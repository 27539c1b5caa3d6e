//! Loader-facing load parameters.
//!
//! [`LoadSpec`] is everything that affects runtime behavior of a loaded
//! program; the diff engine compares these field for field. Bookkeeping that
//! must never influence a diff (the correlation id) travels separately.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::kind::{Direction, ProceedOn, ProgramKind};
use crate::spec::BytecodeRef;

/// Kind-specific attach parameters for one concrete attachment instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttachParams {
    Filter {
        iface: String,
        direction: Direction,
        priority: i32,
        proceed_on: Vec<ProceedOn>,
    },
    Hook {
        hook: String,
    },
}

impl AttachParams {
    /// The attach point identity this instance binds to (interface or hook).
    pub fn attach_point(&self) -> &str {
        match self {
            AttachParams::Filter { iface, .. } => iface,
            AttachParams::Hook { hook } => hook,
        }
    }
}

/// Full load parameters for one attachment instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadSpec {
    pub bytecode: BytecodeRef,
    pub entry_point: String,
    pub kind: ProgramKind,
    pub attach: AttachParams,
    pub global_data: BTreeMap<String, Vec<u8>>,

    /// Loader handle of the program whose maps this one reuses.
    pub map_owner_handle: Option<u32>,
}

/// One record from the loader's `List`, the authoritative live state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservedProgram {
    pub handle: u32,

    /// Correlation id supplied at load time, returned unchanged.
    pub correlation_id: Uuid,

    /// The parameters the loader resolved for this program.
    pub spec: LoadSpec,

    /// Chain position as reported by the loader, for display only.
    /// Never compared, computed, or cached by this subsystem.
    pub position: Option<u32>,
}
