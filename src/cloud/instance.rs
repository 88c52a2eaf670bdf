//! Cloud VM records
//!
//! Thin mirrors of the compute API's instance shape, restricted to the
//! fields the allocator reads. Field names follow the compute wire format
//! so records deserialize straight off the API response.

use serde::{Deserialize, Serialize};

/// A virtual machine record with its ordered network interfaces
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VmInstance {
    /// Instance name (matches the node name)
    pub name: String,

    /// Interfaces in cloud order; the first is the default-VPC interface
    #[serde(default, rename = "networkInterfaces")]
    pub network_interfaces: Vec<VmNetworkInterface>,
}

/// One network interface on a VM
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VmNetworkInterface {
    /// URI of the VPC the interface is attached to
    #[serde(default)]
    pub network: String,

    /// URI of the subnet within the VPC
    #[serde(default)]
    pub subnetwork: String,

    /// Primary IPv4 address of the interface
    #[serde(default, rename = "networkIP")]
    pub network_ip: String,

    /// IPv6 address, when the subnet is dual-stack
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipv6_address: Option<String>,

    /// Secondary (alias) IP ranges, in cloud order
    #[serde(default)]
    pub alias_ip_ranges: Vec<AliasIpRange>,
}

/// A secondary CIDR block assigned to an interface
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AliasIpRange {
    /// The CIDR, e.g. `192.168.1.0/24`
    pub ip_cidr_range: String,

    /// Name of the subnet secondary range the alias is drawn from
    #[serde(default)]
    pub subnetwork_range_name: String,
}

/// Trailing resource name of a cloud URI.
///
/// `projects/p/regions/r/subnetworks/default` yields `default`; a bare
/// name passes through unchanged.
pub fn resource_name(uri: &str) -> &str {
    uri.rsplit('/').next().unwrap_or(uri)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_name_takes_last_segment() {
        assert_eq!(
            resource_name("projects/p/regions/us-central1/subnetworks/default"),
            "default"
        );
        assert_eq!(resource_name("default"), "default");
        assert_eq!(resource_name(""), "");
    }

    #[test]
    fn instance_deserializes_from_compute_shape() {
        let inst: VmInstance = serde_json::from_str(
            r#"{
                "name": "test",
                "networkInterfaces": [{
                    "network": "projects/p/global/networks/default",
                    "subnetwork": "projects/p/regions/us-central1/subnetworks/default",
                    "networkIP": "80.1.172.1",
                    "ipv6Address": "2001:db9::110",
                    "aliasIpRanges": [
                        {"ipCidrRange": "192.168.1.0/24", "subnetworkRangeName": "RangeA"}
                    ]
                }]
            }"#,
        )
        .unwrap();
        assert_eq!(inst.name, "test");
        let iface = &inst.network_interfaces[0];
        assert_eq!(iface.network_ip, "80.1.172.1");
        assert_eq!(iface.ipv6_address.as_deref(), Some("2001:db9::110"));
        assert_eq!(iface.alias_ip_ranges[0].ip_cidr_range, "192.168.1.0/24");
        assert_eq!(iface.alias_ip_ranges[0].subnetwork_range_name, "RangeA");
    }

    #[test]
    fn interface_defaults_tolerate_sparse_records() {
        let iface: VmNetworkInterface = serde_json::from_str("{}").unwrap();
        assert!(iface.network.is_empty());
        assert!(iface.ipv6_address.is_none());
        assert!(iface.alias_ip_ranges.is_empty());
    }
}
