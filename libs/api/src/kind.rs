//! Program kinds and the attach-time enums that travel with them.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from parsing kind, direction, or proceed-on strings.
#[derive(Debug, Error)]
pub enum KindParseError {
    #[error("{0} is not a valid program kind")]
    InvalidProgramKind(String),

    #[error("{0} is not a valid proceed-on value")]
    InvalidProceedOn(String),

    #[error("{0} is not a valid direction")]
    InvalidDirection(String),
}

/// The closed set of program kinds the fleet knows how to attach.
///
/// Each kind gets its own agent reconciler; the numeric value is the wire
/// identifier used by the loader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProgramKind {
    IngressFilter,
    EgressFilter,
    TraceHook,
}

impl ProgramKind {
    pub const ALL: [ProgramKind; 3] = [
        ProgramKind::IngressFilter,
        ProgramKind::EgressFilter,
        ProgramKind::TraceHook,
    ];

    /// Wire identifier understood by the loader.
    pub fn wire_id(&self) -> u32 {
        match self {
            ProgramKind::IngressFilter => 1,
            ProgramKind::EgressFilter => 2,
            ProgramKind::TraceHook => 3,
        }
    }

    pub fn from_wire_id(id: u32) -> Result<Self, KindParseError> {
        match id {
            1 => Ok(ProgramKind::IngressFilter),
            2 => Ok(ProgramKind::EgressFilter),
            3 => Ok(ProgramKind::TraceHook),
            other => Err(KindParseError::InvalidProgramKind(other.to_string())),
        }
    }

    /// Traffic direction implied by the kind, for filter kinds.
    pub fn direction(&self) -> Option<Direction> {
        match self {
            ProgramKind::IngressFilter => Some(Direction::Ingress),
            ProgramKind::EgressFilter => Some(Direction::Egress),
            ProgramKind::TraceHook => None,
        }
    }

}

impl std::fmt::Display for ProgramKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ProgramKind::IngressFilter => "ingress-filter",
            ProgramKind::EgressFilter => "egress-filter",
            ProgramKind::TraceHook => "trace-hook",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for ProgramKind {
    type Err = KindParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ingress-filter" => Ok(ProgramKind::IngressFilter),
            "egress-filter" => Ok(ProgramKind::EgressFilter),
            "trace-hook" => Ok(ProgramKind::TraceHook),
            other => Err(KindParseError::InvalidProgramKind(other.to_string())),
        }
    }
}

/// Traffic direction for filter attachments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Ingress,
    Egress,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Ingress => write!(f, "ingress"),
            Direction::Egress => write!(f, "egress"),
        }
    }
}

impl std::str::FromStr for Direction {
    type Err = KindParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ingress" => Ok(Direction::Ingress),
            "egress" => Ok(Direction::Egress),
            other => Err(KindParseError::InvalidDirection(other.to_string())),
        }
    }
}

/// Filter exit codes that permit proceeding to the next program in the chain.
///
/// The numeric values must match the loader's internal mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProceedOn {
    Unspec,
    Ok,
    Reclassify,
    Shot,
    Pipe,
    Stolen,
    Queued,
    Repeat,
    Redirect,
    Trap,
    DispatcherReturn,
}

impl ProceedOn {
    /// Wire code understood by the loader.
    pub fn code(&self) -> i32 {
        match self {
            ProceedOn::Unspec => -1,
            ProceedOn::Ok => 0,
            ProceedOn::Reclassify => 1,
            ProceedOn::Shot => 2,
            ProceedOn::Pipe => 3,
            ProceedOn::Stolen => 4,
            ProceedOn::Queued => 5,
            ProceedOn::Repeat => 6,
            ProceedOn::Redirect => 7,
            ProceedOn::Trap => 8,
            ProceedOn::DispatcherReturn => 30,
        }
    }

    pub fn from_code(code: i32) -> Result<Self, KindParseError> {
        match code {
            -1 => Ok(ProceedOn::Unspec),
            0 => Ok(ProceedOn::Ok),
            1 => Ok(ProceedOn::Reclassify),
            2 => Ok(ProceedOn::Shot),
            3 => Ok(ProceedOn::Pipe),
            4 => Ok(ProceedOn::Stolen),
            5 => Ok(ProceedOn::Queued),
            6 => Ok(ProceedOn::Repeat),
            7 => Ok(ProceedOn::Redirect),
            8 => Ok(ProceedOn::Trap),
            30 => Ok(ProceedOn::DispatcherReturn),
            other => Err(KindParseError::InvalidProceedOn(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_round_trips_through_strings() {
        for kind in ProgramKind::ALL {
            let parsed: ProgramKind = kind.to_string().parse().unwrap();
            assert_eq!(parsed, kind);
        }
        assert!("socket-filter".parse::<ProgramKind>().is_err());
    }

    #[test]
    fn kind_round_trips_through_wire_ids() {
        for kind in ProgramKind::ALL {
            assert_eq!(ProgramKind::from_wire_id(kind.wire_id()).unwrap(), kind);
        }
        assert!(ProgramKind::from_wire_id(0).is_err());
    }

    #[test]
    fn filter_kinds_imply_direction() {
        assert_eq!(
            ProgramKind::IngressFilter.direction(),
            Some(Direction::Ingress)
        );
        assert_eq!(ProgramKind::EgressFilter.direction(), Some(Direction::Egress));
        assert_eq!(ProgramKind::TraceHook.direction(), None);
    }

    #[test]
    fn proceed_on_codes_round_trip() {
        for p in [
            ProceedOn::Unspec,
            ProceedOn::Ok,
            ProceedOn::Pipe,
            ProceedOn::DispatcherReturn,
        ] {
            assert_eq!(ProceedOn::from_code(p.code()).unwrap(), p);
        }
        assert!(ProceedOn::from_code(31).is_err());
    }
}
