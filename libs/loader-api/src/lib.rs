//! Wire surface of the external program loader.
//!
//! Stubs are generated from `proto/loader.v1.proto` and committed, so the
//! crate builds without protoc. Regenerate with `prost-build`/`tonic-build`
//! when the proto changes.

#[path = "loader.v1.rs"]
#[rustfmt::skip]
#[allow(clippy::all)]
pub mod v1;

/// Metadata key carrying the caller's correlation id through `Load`/`List`.
pub const CORRELATION_ID_KEY: &str = "fleetd.io/correlation-id";

/// Metadata key carrying the owning spec's name, for operator debugging.
pub const SPEC_NAME_KEY: &str = "fleetd.io/spec";
