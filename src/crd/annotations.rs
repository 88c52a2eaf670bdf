//! Typed node annotations and labels
//!
//! Annotation values are opaque strings on the transport; this module is
//! the single place they are parsed into records and serialized back.
//! Serialization is canonical - compact JSON with fields in declaration
//! order - so that identical inputs always produce byte-identical
//! annotation values and the reconciler's no-op detection can compare
//! strings.

use k8s_openapi::api::core::v1::Node;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Annotation naming the networks a node should join (input, never written)
pub const NODE_NETWORK_ANNOTATION: &str = "networking.gke.io/node-networks";

/// Annotation listing the node's secondary ("north") interfaces
pub const NORTH_INTERFACES_ANNOTATION: &str = "networking.gke.io/north-interfaces";

/// Annotation listing per-network CIDRs available on the node
pub const MULTI_NETWORK_ANNOTATION: &str = "networking.gke.io/multinetwork";

/// Node label naming the node pool's subnet
pub const NODEPOOL_SUBNET_LABEL: &str = "cloud.google.com/gke-nodepool-subnet";

/// Node label naming the secondary range the node pool draws pod IPs from
pub const NODEPOOL_POD_RANGE_LABEL: &str = "cloud.google.com/gke-nodepool-pod-range";

/// Scope marker for node-local CIDRs in the multinetwork annotation
pub const HOST_LOCAL_SCOPE: &str = "host-local";

/// One entry of the node-networks annotation
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct NodeNetworkRef {
    /// Name of the Network the node should join
    pub name: String,
}

/// One entry of the north-interfaces annotation
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NorthInterface {
    /// Name of the attached Network
    pub network: String,
    /// Primary IP of the matching VM interface
    pub ip_address: String,
}

/// One entry of the multinetwork annotation
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct NetworkCidrs {
    /// Name of the attached Network
    pub name: String,
    /// CIDRs available to pods on this network
    pub cidrs: Vec<String>,
    /// Scope of the CIDRs, always [`HOST_LOCAL_SCOPE`]
    pub scope: String,
}

impl NetworkCidrs {
    /// Build a host-local entry for the given network and CIDR
    pub fn host_local(name: impl Into<String>, cidr: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cidrs: vec![cidr.into()],
            scope: HOST_LOCAL_SCOPE.to_string(),
        }
    }
}

/// Parse the node-networks annotation into its entries.
///
/// A missing annotation means the node requests no additional networks and
/// yields an empty list; a present but malformed annotation is an error.
pub fn parse_node_networks(node: &Node) -> Result<Vec<NodeNetworkRef>> {
    let Some(raw) = node
        .metadata
        .annotations
        .as_ref()
        .and_then(|a| a.get(NODE_NETWORK_ANNOTATION))
    else {
        return Ok(Vec::new());
    };
    serde_json::from_str(raw).map_err(|e| {
        Error::annotation(format!(
            "{NODE_NETWORK_ANNOTATION} on node {}: {e}",
            node.metadata.name.as_deref().unwrap_or_default()
        ))
    })
}

/// Serialize north-interface entries to the canonical annotation value
pub fn encode_north_interfaces(interfaces: &[NorthInterface]) -> Result<String> {
    serde_json::to_string(interfaces).map_err(|e| Error::serialization(e.to_string()))
}

/// Serialize multinetwork entries to the canonical annotation value
pub fn encode_multi_network(cidrs: &[NetworkCidrs]) -> Result<String> {
    serde_json::to_string(cidrs).map_err(|e| Error::serialization(e.to_string()))
}

/// Extended resource name carrying a network's IP capacity on the node
pub fn ip_capacity_resource(network: &str) -> String {
    format!("networking.gke.io.networks/{network}.IP")
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use std::collections::BTreeMap;

    fn node_with_annotation(value: &str) -> Node {
        Node {
            metadata: ObjectMeta {
                name: Some("test".to_string()),
                annotations: Some(BTreeMap::from([(
                    NODE_NETWORK_ANNOTATION.to_string(),
                    value.to_string(),
                )])),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn node_networks_missing_annotation_is_empty() {
        let node = Node::default();
        assert!(parse_node_networks(&node).unwrap().is_empty());
    }

    #[test]
    fn node_networks_parse() {
        let node = node_with_annotation(r#"[{"name":"default"},{"name":"Red-Network"}]"#);
        let refs = parse_node_networks(&node).unwrap();
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].name, "default");
        assert_eq!(refs[1].name, "Red-Network");
    }

    #[test]
    fn node_networks_malformed_is_an_error() {
        let node = node_with_annotation("{not json");
        let err = parse_node_networks(&node).unwrap_err();
        assert!(err.to_string().contains("invalid node annotation"));
    }

    #[test]
    fn north_interfaces_encode_is_canonical() {
        let entries = vec![
            NorthInterface {
                network: "Red-Network".to_string(),
                ip_address: "10.1.1.1".to_string(),
            },
            NorthInterface {
                network: "Blue-Network".to_string(),
                ip_address: "84.1.2.1".to_string(),
            },
        ];
        let encoded = encode_north_interfaces(&entries).unwrap();
        assert_eq!(
            encoded,
            r#"[{"network":"Red-Network","ipAddress":"10.1.1.1"},{"network":"Blue-Network","ipAddress":"84.1.2.1"}]"#
        );
        // byte-identical across runs
        assert_eq!(encoded, encode_north_interfaces(&entries).unwrap());
    }

    #[test]
    fn multi_network_encode_is_canonical() {
        let entries = vec![NetworkCidrs::host_local("Red-Network", "172.11.1.0/24")];
        assert_eq!(
            encode_multi_network(&entries).unwrap(),
            r#"[{"name":"Red-Network","cidrs":["172.11.1.0/24"],"scope":"host-local"}]"#
        );
    }

    #[test]
    fn empty_lists_encode_as_empty_arrays() {
        assert_eq!(encode_north_interfaces(&[]).unwrap(), "[]");
        assert_eq!(encode_multi_network(&[]).unwrap(), "[]");
    }

    #[test]
    fn capacity_resource_name() {
        assert_eq!(
            ip_capacity_resource("Red-Network"),
            "networking.gke.io.networks/Red-Network.IP"
        );
    }
}
