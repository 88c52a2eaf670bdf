//! Shared fixtures for allocator tests
//!
//! Builders mirror the shapes the allocator sees in production: node
//! objects, VM records, and the two custom resources, plus in-memory
//! fakes for the node view and the network registry.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Node, NodeSpec, ObjectReference};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::runtime::events::EventType;
use kube::ResourceExt;

use crate::cloud::{AliasIpRange, VmInstance, VmNetworkInterface};
use crate::crd::{
    GKENetworkParamSet, GKENetworkParamSetSpec, Network, NetworkCondition, NetworkParametersRef,
    NetworkSpec, NetworkStatus, NetworkType, SecondaryRanges, NODEPOOL_POD_RANGE_LABEL,
    NODEPOOL_SUBNET_LABEL, NODE_NETWORK_ANNOTATION,
};
use crate::events::EventPublisher;
use crate::Result;

use super::{NetworkRegistry, NodeView, RegistrySnapshot};

/// Bare node with only a name
pub(crate) fn node(name: &str) -> Node {
    Node {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            ..Default::default()
        },
        ..Default::default()
    }
}

/// Node with a provider ID
pub(crate) fn node_with_provider(name: &str, provider_id: &str) -> Node {
    let mut n = node(name);
    n.spec = Some(NodeSpec {
        provider_id: Some(provider_id.to_string()),
        ..Default::default()
    });
    n
}

/// Node carrying the node-pool subnet and pod-range labels
pub(crate) fn labeled_node(name: &str, subnet: &str, pod_range: &str) -> Node {
    let mut n = node(name);
    n.metadata.labels = Some(BTreeMap::from([
        (NODEPOOL_SUBNET_LABEL.to_string(), subnet.to_string()),
        (NODEPOOL_POD_RANGE_LABEL.to_string(), pod_range.to_string()),
    ]));
    n
}

/// Node carrying a node-networks annotation
pub(crate) fn annotated_node(name: &str, node_networks: &str) -> Node {
    let mut n = node(name);
    n.metadata.annotations = Some(BTreeMap::from([(
        NODE_NETWORK_ANNOTATION.to_string(),
        node_networks.to_string(),
    )]));
    n
}

/// VM record with the given interfaces
pub(crate) fn vm_instance(name: &str, interfaces: Vec<VmNetworkInterface>) -> VmInstance {
    VmInstance {
        name: name.to_string(),
        network_interfaces: interfaces,
    }
}

/// One VM interface
pub(crate) fn interface(
    network: &str,
    subnetwork: &str,
    network_ip: &str,
    ipv6_address: Option<&str>,
    alias_ip_ranges: Vec<AliasIpRange>,
) -> VmNetworkInterface {
    VmNetworkInterface {
        network: network.to_string(),
        subnetwork: subnetwork.to_string(),
        network_ip: network_ip.to_string(),
        ipv6_address: ipv6_address.map(String::from),
        alias_ip_ranges,
    }
}

/// One alias IP range
pub(crate) fn alias(cidr: &str, range_name: &str) -> AliasIpRange {
    AliasIpRange {
        ip_cidr_range: cidr.to_string(),
        subnetwork_range_name: range_name.to_string(),
    }
}

/// L3 Network with a Ready condition
pub(crate) fn network(name: &str, params: &str, ready: bool) -> Network {
    network_of_type(name, params, NetworkType::L3, ready)
}

/// Network of the given type with a Ready condition
pub(crate) fn network_of_type(
    name: &str,
    params: &str,
    type_: NetworkType,
    ready: bool,
) -> Network {
    let mut nw = Network::new(
        name,
        NetworkSpec {
            type_,
            parameters_ref: Some(NetworkParametersRef {
                name: params.to_string(),
                kind: None,
            }),
        },
    );
    nw.status = Some(NetworkStatus {
        conditions: vec![NetworkCondition {
            type_: "Ready".to_string(),
            status: if ready { "True" } else { "False" }.to_string(),
            reason: None,
        }],
    });
    nw
}

/// GKENetworkParamSet; an empty range list leaves `podIPv4Ranges` unset
pub(crate) fn gke_network_params(
    name: &str,
    vpc: &str,
    subnet: &str,
    range_names: &[&str],
) -> GKENetworkParamSet {
    GKENetworkParamSet::new(
        name,
        GKENetworkParamSetSpec {
            vpc: vpc.to_string(),
            vpc_subnet: subnet.to_string(),
            pod_ipv4_ranges: if range_names.is_empty() {
                None
            } else {
                Some(SecondaryRanges {
                    range_names: range_names.iter().map(|s| s.to_string()).collect(),
                })
            },
        },
    )
}

/// In-memory node view recording every update
#[derive(Default)]
pub(crate) struct FakeNodeView {
    nodes: Mutex<HashMap<String, Arc<Node>>>,
    updates: Mutex<Vec<Node>>,
}

impl FakeNodeView {
    pub(crate) fn with_nodes(nodes: Vec<Node>) -> Self {
        let map = nodes
            .into_iter()
            .map(|n| (n.name_any(), Arc::new(n)))
            .collect();
        Self {
            nodes: Mutex::new(map),
            updates: Mutex::new(Vec::new()),
        }
    }

    /// Updates submitted so far, oldest first
    pub(crate) fn updates(&self) -> Vec<Node> {
        self.updates.lock().unwrap().clone()
    }
}

#[async_trait]
impl NodeView for FakeNodeView {
    fn get(&self, name: &str) -> Option<Arc<Node>> {
        self.nodes.lock().unwrap().get(name).cloned()
    }

    async fn update(&self, node: Node) -> Result<()> {
        self.nodes
            .lock()
            .unwrap()
            .insert(node.name_any(), Arc::new(node.clone()));
        self.updates.lock().unwrap().push(node);
        Ok(())
    }

    async fn wait_synced(&self) {}
}

/// Event publisher that records what was emitted
#[derive(Default)]
pub(crate) struct CapturingEvents {
    records: Mutex<Vec<RecordedEvent>>,
}

/// One captured event
#[derive(Clone)]
pub(crate) struct RecordedEvent {
    pub(crate) warning: bool,
    pub(crate) reason: String,
    pub(crate) note: Option<String>,
}

impl CapturingEvents {
    pub(crate) fn recorded(&self) -> Vec<RecordedEvent> {
        self.records.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventPublisher for CapturingEvents {
    async fn publish(
        &self,
        _resource_ref: &ObjectReference,
        type_: EventType,
        reason: &str,
        _action: &str,
        note: Option<String>,
    ) {
        self.records.lock().unwrap().push(RecordedEvent {
            warning: matches!(type_, EventType::Warning),
            reason: reason.to_string(),
            note,
        });
    }
}

/// In-memory network registry
#[derive(Default)]
pub(crate) struct FakeRegistry {
    networks: Vec<Arc<Network>>,
    param_sets: Vec<Arc<GKENetworkParamSet>>,
}

impl FakeRegistry {
    pub(crate) fn with_networks(
        networks: Vec<Network>,
        param_sets: Vec<GKENetworkParamSet>,
    ) -> Self {
        Self {
            networks: networks.into_iter().map(Arc::new).collect(),
            param_sets: param_sets.into_iter().map(Arc::new).collect(),
        }
    }
}

impl NetworkRegistry for FakeRegistry {
    fn snapshot(&self) -> RegistrySnapshot {
        RegistrySnapshot::new(self.networks.clone(), self.param_sets.clone())
    }
}
