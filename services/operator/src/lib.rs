//! fleetd operator
//!
//! The operator is the cluster half of the reconciliation protocol. It never
//! talks to a loader; it reads the per-node outcome records the agents write
//! and folds them into a single cluster-level condition on each program
//! spec. It also guards every spec with a finalizer so deletion cannot
//! complete before each node has confirmed teardown.

pub mod aggregator;
pub mod config;
pub mod worker;
