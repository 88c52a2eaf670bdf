//! CIDR candidate derivation and stack selection
//!
//! Candidates come from the VM record: every alias IP range (in interface
//! order) plus a `/112` block for every interface IPv6 address. The cluster
//! stack type then picks the primary pod CIDRs from the candidate lists.

use std::net::IpAddr;
use std::str::FromStr;

use ipnet::{IpNet, Ipv6Net};
use k8s_openapi::api::core::v1::Node;

use crate::cloud::{resource_name, VmInstance};
use crate::config::StackType;
use crate::crd::{NODEPOOL_POD_RANGE_LABEL, NODEPOOL_SUBNET_LABEL};
use crate::{Error, Result};

/// Prefix length of the pod block carved from an interface IPv6 address
pub const IPV6_BLOCK_PREFIX: u8 = 112;

/// Candidate pod CIDRs derived from a VM record, split by family
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NodeRanges {
    /// IPv4 candidates, in interface order
    pub v4: Vec<IpNet>,
    /// IPv6 candidates, in interface order
    pub v6: Vec<IpNet>,
}

impl NodeRanges {
    /// True when the VM exposes nothing to allocate from
    pub fn is_empty(&self) -> bool {
        self.v4.is_empty() && self.v6.is_empty()
    }
}

/// True for an IPv4 network
pub fn is_ipv4(net: &IpNet) -> bool {
    matches!(net, IpNet::V4(_))
}

/// True for an IPv6 network
pub fn is_ipv6(net: &IpNet) -> bool {
    matches!(net, IpNet::V6(_))
}

/// Derive the candidate CIDR lists for a node from its VM record.
///
/// When the node carries both node-pool labels, IPv4 candidates are
/// restricted to alias ranges drawn from the labeled subnet and secondary
/// range; if nothing matches, the unrestricted list is used instead.
pub fn derive_node_ranges(node: &Node, instance: &VmInstance) -> Result<NodeRanges> {
    let labels = node.metadata.labels.as_ref();
    let subnet_label = labels.and_then(|l| l.get(NODEPOOL_SUBNET_LABEL));
    let range_label = labels.and_then(|l| l.get(NODEPOOL_POD_RANGE_LABEL));

    let mut v4 = Vec::new();
    let mut v6 = Vec::new();
    let mut labeled_v4 = Vec::new();

    for iface in &instance.network_interfaces {
        let subnet_matches = subnet_label
            .map(|label| resource_name(&iface.subnetwork) == label.as_str())
            .unwrap_or(false);

        for alias in &iface.alias_ip_ranges {
            let net = IpNet::from_str(&alias.ip_cidr_range)
                .map_err(|_| Error::invalid_cidr(&alias.ip_cidr_range))?;
            match net {
                IpNet::V4(_) => {
                    if subnet_matches
                        && range_label.is_some_and(|label| *label == alias.subnetwork_range_name)
                    {
                        labeled_v4.push(net);
                    }
                    v4.push(net);
                }
                IpNet::V6(_) => v6.push(net),
            }
        }

        if let Some(addr) = iface.ipv6_address.as_deref().filter(|a| !a.is_empty()) {
            match IpAddr::from_str(addr) {
                Ok(IpAddr::V6(v6_addr)) => {
                    let block = Ipv6Net::new(v6_addr, IPV6_BLOCK_PREFIX)
                        .expect("/112 is a valid IPv6 prefix length")
                        .trunc();
                    v6.push(IpNet::V6(block));
                }
                Ok(IpAddr::V4(_)) => return Err(Error::NotDualStack(addr.to_string())),
                Err(_) => return Err(Error::AddressParse(addr.to_string())),
            }
        }
    }

    if subnet_label.is_some() && range_label.is_some() && !labeled_v4.is_empty() {
        v4 = labeled_v4;
    }
    Ok(NodeRanges { v4, v6 })
}

/// Select the node's pod CIDRs from the candidates per the cluster stack.
///
/// The returned list is ordered to match the stack type; dual stacks
/// require one CIDR of each family.
pub fn select_node_cidrs(name: &str, ranges: &NodeRanges, stack: StackType) -> Result<Vec<IpNet>> {
    if ranges.is_empty() {
        return Err(Error::NoRanges(name.to_string()));
    }

    let first_v4 = ranges.v4.first().copied();
    let first_v6 = ranges.v6.first().copied();

    match stack {
        StackType::IPv4 => first_v4
            .map(|c| vec![c])
            .ok_or_else(|| Error::NoRanges(name.to_string())),
        StackType::IPv6 => first_v6
            .map(|c| vec![c])
            .ok_or_else(|| Error::NoRanges(name.to_string())),
        StackType::IPv4IPv6 => match (first_v4, first_v6) {
            (Some(v4), Some(v6)) => Ok(vec![v4, v6]),
            _ => Err(Error::NotDualStack(name.to_string())),
        },
        StackType::IPv6IPv4 => match (first_v4, first_v6) {
            (Some(v4), Some(v6)) => Ok(vec![v6, v4]),
            _ => Err(Error::NotDualStack(name.to_string())),
        },
    }
}
