//! fleetd node agent
//!
//! The agent runs on every node and converges the node-local loader to match
//! the declarative program specs in the store. One reconciler runs per
//! program kind:
//!
//! - **Expander**: turns a spec plus the node description into concrete
//!   per-attach-point instances
//! - **Diff engine**: exact-match comparison of desired load parameters
//!   against what the loader reports live
//! - **Loader**: gRPC client for the node-local loader daemon, mocked in
//!   tests
//! - **Reconciler**: the level-triggered loop writing per-attachment outcome
//!   records the operator aggregates

pub mod config;
pub mod diff;
pub mod expander;
pub mod grpc;
pub mod loader;
pub mod reconciler;
