//! Custom Resource Definitions consumed by the allocator
//!
//! This module contains the `Network` and `GKENetworkParamSet` custom
//! resources plus the typed records behind the node annotations the
//! allocator reads and writes.

mod annotations;
mod network;
mod paramset;

pub use annotations::{
    encode_multi_network, encode_north_interfaces, ip_capacity_resource, parse_node_networks,
    NetworkCidrs, NodeNetworkRef, NorthInterface, HOST_LOCAL_SCOPE, MULTI_NETWORK_ANNOTATION,
    NODEPOOL_POD_RANGE_LABEL, NODEPOOL_SUBNET_LABEL, NODE_NETWORK_ANNOTATION,
    NORTH_INTERFACES_ANNOTATION,
};
pub use network::{
    Network, NetworkCondition, NetworkParametersRef, NetworkSpec, NetworkStatus, NetworkType,
    DEFAULT_POD_NETWORK,
};
pub use paramset::{
    GKENetworkParamSet, GKENetworkParamSetSpec, SecondaryRanges,
};
