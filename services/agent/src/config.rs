//! Configuration for the node agent.

use std::collections::BTreeMap;

use anyhow::{bail, Context, Result};

use fleetd_api::NodeInterface;

/// Node agent configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Name this node is registered under in the store.
    pub node_name: String,

    /// gRPC endpoint of the node-local loader daemon.
    pub loader_endpoint: String,

    /// Labels advertised for node selection.
    pub node_labels: BTreeMap<String, String>,

    /// Network interfaces advertised for filter attachment.
    pub interfaces: Vec<NodeInterface>,

    /// Seconds between full reconcile passes.
    pub reconcile_interval_secs: u64,

    /// Per-call deadline for loader RPCs, in seconds.
    pub loader_timeout_secs: u64,

    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables. The node name and
    /// loader endpoint have no sensible defaults and are required.
    pub fn from_env() -> Result<Self> {
        let node_name =
            std::env::var("FLEETD_NODE_NAME").context("FLEETD_NODE_NAME must be set")?;

        let loader_endpoint = std::env::var("FLEETD_LOADER_ENDPOINT")
            .context("FLEETD_LOADER_ENDPOINT must be set")?;

        let node_labels = parse_labels(
            &std::env::var("FLEETD_NODE_LABELS").unwrap_or_default(),
        )?;

        let interfaces = parse_interfaces(
            &std::env::var("FLEETD_INTERFACES").unwrap_or_default(),
        )?;

        let reconcile_interval_secs = std::env::var("FLEETD_RECONCILE_INTERVAL")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(30);

        let loader_timeout_secs = std::env::var("FLEETD_LOADER_TIMEOUT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(15);

        let log_level = std::env::var("FLEETD_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            node_name,
            loader_endpoint,
            node_labels,
            interfaces,
            reconcile_interval_secs,
            loader_timeout_secs,
            log_level,
        })
    }
}

/// Parse `key=value,key2=value2` into a label map.
fn parse_labels(raw: &str) -> Result<BTreeMap<String, String>> {
    let mut labels = BTreeMap::new();
    for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let Some((key, value)) = entry.split_once('=') else {
            bail!("label {entry:?} is not key=value");
        };
        labels.insert(key.trim().to_string(), value.trim().to_string());
    }
    Ok(labels)
}

/// Parse `eth0:primary,eth1` into interface descriptions.
fn parse_interfaces(raw: &str) -> Result<Vec<NodeInterface>> {
    let mut interfaces = Vec::new();
    for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let (name, primary) = match entry.split_once(':') {
            Some((name, "primary")) => (name, true),
            Some((_, other)) => bail!("unknown interface flag {other:?} on {entry:?}"),
            None => (entry, false),
        };
        interfaces.push(NodeInterface {
            name: name.trim().to_string(),
            primary,
        });
    }
    if interfaces.iter().filter(|i| i.primary).count() > 1 {
        bail!("more than one interface is flagged primary");
    }
    Ok(interfaces)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_parse_and_reject_garbage() {
        let labels = parse_labels("zone=edge, tier=gateway").unwrap();
        assert_eq!(labels.get("zone").unwrap(), "edge");
        assert_eq!(labels.get("tier").unwrap(), "gateway");
        assert!(parse_labels("").unwrap().is_empty());
        assert!(parse_labels("no-equals").is_err());
    }

    #[test]
    fn interfaces_parse_with_one_primary() {
        let ifaces = parse_interfaces("eth0:primary,eth1").unwrap();
        assert_eq!(ifaces.len(), 2);
        assert!(ifaces[0].primary);
        assert!(!ifaces[1].primary);

        assert!(parse_interfaces("eth0:primary,eth1:primary").is_err());
        assert!(parse_interfaces("eth0:fast").is_err());
    }
}
