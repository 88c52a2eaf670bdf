//! Multi-network projection
//!
//! Computes the north-interfaces and multinetwork annotations plus the
//! per-network IP capacity for a node, from the node-networks annotation,
//! the network registry snapshot, and the VM's interfaces.
//!
//! The projection is total: a network that cannot be attached (unready,
//! no matching interface, unusable ranges) is skipped and reported, and the
//! remaining networks still progress. Output order follows the
//! node-networks annotation.

use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;

use ipnet::IpNet;
use k8s_openapi::api::core::v1::Node;

use crate::cloud::VmInstance;
use crate::crd::{
    ip_capacity_resource, parse_node_networks, NetworkCidrs, NetworkType, NorthInterface,
    DEFAULT_POD_NETWORK,
};
use crate::{Error, Result};

use super::RegistrySnapshot;

/// Why a requested network was left out of the projection
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipReason {
    /// No Network object of that name exists
    NotFound,
    /// The Network exists but is not Ready
    NotReady,
    /// The Network has no (resolvable) parameter reference
    ParamsMissing,
    /// No VM interface sits on the ParamSet's VPC
    NoMatchingInterface,
    /// L3 network whose ParamSet allows no usable secondary range.
    ///
    /// This is a misconfiguration (a Device network would be the correct
    /// type) and is surfaced to the user via a Warning event.
    NoUsableRange,
}

/// Result of projecting a node's requested networks
#[derive(Clone, Debug, Default)]
pub struct MultiNetworkProjection {
    /// north-interfaces annotation entries, in annotation order
    pub north_interfaces: Vec<NorthInterface>,
    /// multinetwork annotation entries, in annotation order
    pub multi_network: Vec<NetworkCidrs>,
    /// IP capacity per extended resource name
    pub capacities: BTreeMap<String, i64>,
    /// Names of the networks that attached
    pub attached: BTreeSet<String>,
    /// Requested networks that were skipped, with the reason
    pub skipped: Vec<(String, SkipReason)>,
}

/// Pod IP capacity of a CIDR: half the address block, floored at one.
///
/// `/24 -> 128`, `/26 -> 32`, `/32 -> 1`.
pub fn ip_capacity(net: &IpNet) -> i64 {
    let host_bits = u32::from(net.max_prefix_len() - net.prefix_len());
    if host_bits == 0 {
        return 1;
    }
    if host_bits >= 63 {
        return i64::MAX;
    }
    std::cmp::max(1, (1i64 << host_bits) / 2)
}

/// Project the node's requested additional networks against the registry
/// and the VM's interfaces.
///
/// The default pod network is never part of the projection; its range is
/// the node's primary pod CIDR.
pub fn project_multi_networks(
    node: &Node,
    instance: &VmInstance,
    registry: &RegistrySnapshot,
) -> Result<MultiNetworkProjection> {
    let mut projection = MultiNetworkProjection::default();

    for requested in parse_node_networks(node)? {
        let name = requested.name;
        if name == DEFAULT_POD_NETWORK {
            continue;
        }

        let Some(network) = registry.network(&name) else {
            projection.skipped.push((name, SkipReason::NotFound));
            continue;
        };
        if !network.is_ready() {
            projection.skipped.push((name, SkipReason::NotReady));
            continue;
        }
        let Some(param_set) = network.params_name().and_then(|p| registry.param_set(p)) else {
            projection.skipped.push((name, SkipReason::ParamsMissing));
            continue;
        };
        let Some(iface) = instance
            .network_interfaces
            .iter()
            .find(|i| i.network == param_set.spec.vpc)
        else {
            projection
                .skipped
                .push((name, SkipReason::NoMatchingInterface));
            continue;
        };

        let (cidr, capacity) = match network.spec.type_ {
            NetworkType::Device => (format!("{}/32", iface.network_ip), 1),
            NetworkType::L3 => {
                let allowed = param_set.allowed_range_names();
                let Some(alias) = iface
                    .alias_ip_ranges
                    .iter()
                    .find(|a| allowed.contains(&a.subnetwork_range_name))
                else {
                    projection.skipped.push((name, SkipReason::NoUsableRange));
                    continue;
                };
                let net = IpNet::from_str(&alias.ip_cidr_range)
                    .map_err(|_| Error::invalid_cidr(&alias.ip_cidr_range))?;
                (alias.ip_cidr_range.clone(), ip_capacity(&net))
            }
        };

        projection.north_interfaces.push(NorthInterface {
            network: name.clone(),
            ip_address: iface.network_ip.clone(),
        });
        projection
            .multi_network
            .push(NetworkCidrs::host_local(name.clone(), cidr));
        projection
            .capacities
            .insert(ip_capacity_resource(&name), capacity);
        projection.attached.insert(name);
    }

    Ok(projection)
}
