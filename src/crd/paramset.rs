//! GKENetworkParamSet Custom Resource Definition
//!
//! A `GKENetworkParamSet` binds a logical network name to a VPC, a subnet,
//! and the secondary range names pods may draw addresses from.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Specification for a GKENetworkParamSet
#[derive(CustomResource, Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "networking.gke.io",
    version = "v1",
    kind = "GKENetworkParamSet",
    plural = "gkenetworkparamsets"
)]
#[serde(rename_all = "camelCase")]
pub struct GKENetworkParamSetSpec {
    /// Full URI of the VPC backing this network, e.g.
    /// `projects/p/global/networks/red`
    #[serde(rename = "vpc")]
    pub vpc: String,

    /// Full URI of the subnet within the VPC
    #[serde(rename = "vpcSubnet")]
    pub vpc_subnet: String,

    /// Secondary range names pods may be allocated from.
    ///
    /// Required for L3 networks; absence on an L3 network is a
    /// misconfiguration and the network is skipped during projection.
    #[serde(
        rename = "podIPv4Ranges",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub pod_ipv4_ranges: Option<SecondaryRanges>,
}

/// A set of secondary range names on a subnet
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SecondaryRanges {
    /// Names of the allowed secondary ranges
    #[serde(default)]
    pub range_names: Vec<String>,
}

impl GKENetworkParamSet {
    /// Allowed secondary range names, empty when none are configured
    pub fn allowed_range_names(&self) -> &[String] {
        self.spec
            .pod_ipv4_ranges
            .as_ref()
            .map(|r| r.range_names.as_slice())
            .unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paramset(ranges: Option<Vec<&str>>) -> GKENetworkParamSet {
        GKENetworkParamSet::new(
            "red-params",
            GKENetworkParamSetSpec {
                vpc: "projects/p/global/networks/red".to_string(),
                vpc_subnet: "projects/p/regions/us-central1/subnetworks/red".to_string(),
                pod_ipv4_ranges: ranges.map(|names| SecondaryRanges {
                    range_names: names.into_iter().map(String::from).collect(),
                }),
            },
        )
    }

    #[test]
    fn allowed_ranges_default_to_empty() {
        assert!(paramset(None).allowed_range_names().is_empty());
        assert_eq!(
            paramset(Some(vec!["RangeA", "RangeB"])).allowed_range_names(),
            &["RangeA".to_string(), "RangeB".to_string()]
        );
    }

    #[test]
    fn spec_uses_upstream_field_names() {
        let json = serde_json::to_value(&paramset(Some(vec!["RangeA"])).spec).unwrap();
        assert_eq!(json["vpc"], "projects/p/global/networks/red");
        assert_eq!(
            json["vpcSubnet"],
            "projects/p/regions/us-central1/subnetworks/red"
        );
        assert_eq!(json["podIPv4Ranges"]["rangeNames"][0], "RangeA");
    }
}
