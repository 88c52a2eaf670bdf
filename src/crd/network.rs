//! Network Custom Resource Definition
//!
//! A `Network` names a logical network nodes may join. The default pod
//! network carries the node's primary pod CIDR; every other network is an
//! additional ("multi-network") attachment projected into node annotations.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Name of the default pod network.
///
/// The default network is the source of `Spec.PodCIDR` and is never listed
/// in the multi-network annotations.
pub const DEFAULT_POD_NETWORK: &str = "default";

/// Specification for a Network
#[derive(CustomResource, Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "networking.gke.io",
    version = "v1",
    kind = "Network",
    plural = "networks",
    status = "NetworkStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct NetworkSpec {
    /// How workloads attach to this network
    #[serde(rename = "type", default)]
    pub type_: NetworkType,

    /// Reference to the GKENetworkParamSet carrying VPC/subnet parameters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters_ref: Option<NetworkParametersRef>,
}

/// Network attachment type
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum NetworkType {
    /// Routed attachment backed by a secondary (alias) IP range
    #[default]
    L3,
    /// Passthrough device attachment; the interface's primary IP is the
    /// only address on the network
    Device,
}

/// Reference from a Network to its parameter object
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NetworkParametersRef {
    /// Name of the referenced GKENetworkParamSet
    pub name: String,

    /// Kind of the referenced object (informational)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

/// Status for a Network
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NetworkStatus {
    /// Conditions representing the network state
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<NetworkCondition>,
}

/// A single condition on a Network
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NetworkCondition {
    /// Condition type, e.g. `Ready`
    #[serde(rename = "type")]
    pub type_: String,

    /// `True`, `False`, or `Unknown`
    pub status: String,

    /// Machine-readable reason for the condition
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl Network {
    /// True when the network carries a `Ready=True` condition.
    ///
    /// Unready networks are skipped entirely during multi-network
    /// projection.
    pub fn is_ready(&self) -> bool {
        self.status
            .as_ref()
            .map(|s| {
                s.conditions
                    .iter()
                    .any(|c| c.type_ == "Ready" && c.status == "True")
            })
            .unwrap_or(false)
    }

    /// Name of the referenced GKENetworkParamSet, if any
    pub fn params_name(&self) -> Option<&str> {
        self.spec.parameters_ref.as_ref().map(|r| r.name.as_str())
    }

    /// True for the cluster's default pod network
    pub fn is_default(&self) -> bool {
        self.metadata.name.as_deref() == Some(DEFAULT_POD_NETWORK)
    }
}
