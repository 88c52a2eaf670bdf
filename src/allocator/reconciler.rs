//! Node reconciliation
//!
//! One reconcile is a pure function over the three read views plus at most
//! one node write at the end: resolve the node, resolve its VM, derive and
//! select pod CIDRs, project multi-network membership, then diff against
//! the live object and update only when something changed.

use std::collections::{BTreeMap, BTreeSet};

use chrono::Utc;
use k8s_openapi::api::core::v1::{Node, NodeCondition};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use kube::runtime::events::EventType;
use tracing::{debug, error, info, instrument, warn};

use crate::cloud::ProviderId;
use crate::crd::{
    encode_multi_network, encode_north_interfaces, MULTI_NETWORK_ANNOTATION,
    NORTH_INTERFACES_ANNOTATION,
};
use crate::events::{actions, node_reference, reasons};
use crate::{Error, Result};

use super::{
    derive_node_ranges, project_multi_networks, select_node_cidrs, CloudCidrAllocator, SkipReason,
};

const NETWORK_UNAVAILABLE: &str = "NetworkUnavailable";
const ROUTE_CREATED_REASON: &str = "RouteCreated";
const ROUTE_CREATED_MESSAGE: &str = "NodeController create implicit route";

/// Prefix of the extended resources owned by the allocator
const CAPACITY_PREFIX: &str = "networking.gke.io.networks/";

impl CloudCidrAllocator {
    /// Reconcile a single node by name.
    ///
    /// A missing node is terminal success. Every other failure is returned
    /// to the caller for rate-limited requeueing; the node object is never
    /// partially updated.
    #[instrument(skip(self))]
    pub async fn update_cidr_allocation(&self, name: &str) -> Result<()> {
        let Some(current) = self.nodes.get(name) else {
            debug!(node = %name, "node no longer exists, nothing to do");
            self.track_attachments(name, &BTreeSet::new());
            return Ok(());
        };

        let provider_id = current
            .spec
            .as_ref()
            .and_then(|s| s.provider_id.as_deref())
            .unwrap_or_default();
        if provider_id.is_empty() {
            return Err(Error::ProviderIdMissing(name.to_string()));
        }
        let provider_id: ProviderId = provider_id
            .parse()
            .map_err(|e: Error| Error::cloud_lookup(e.to_string()))?;

        let instance = self
            .cloud
            .get_instance(&provider_id.zone, &provider_id.instance)
            .await
            .map_err(|e| Error::cloud_lookup(e.to_string()))?;

        let ranges = derive_node_ranges(&current, &instance)?;
        let selected = select_node_cidrs(name, &ranges, self.config.stack_type)?;
        let cidr_strings: Vec<String> = selected.iter().map(ToString::to_string).collect();

        let mut desired = (*current).clone();
        apply_pod_cidrs(name, &mut desired, &cidr_strings);
        set_route_created_condition(&mut desired);

        let registry = self.registry.snapshot();
        let mut attached = BTreeSet::new();
        if registry.is_multi_network() {
            let projection = project_multi_networks(&current, &instance, &registry)?;
            for (network, reason) in &projection.skipped {
                debug!(node = %name, %network, ?reason, "skipping additional network");
                if *reason == SkipReason::NoUsableRange {
                    warn!(node = %name, %network, "L3 network allows no usable secondary range");
                    self.events
                        .publish(
                            &node_reference(name),
                            EventType::Warning,
                            reasons::NETWORK_RANGES_MISSING,
                            actions::RECONCILE,
                            Some(format!(
                                "network {network} allows no usable secondary range on node {name}; \
                                 check its GKENetworkParamSet"
                            )),
                        )
                        .await;
                }
            }

            let annotations = desired.metadata.annotations.get_or_insert_with(Default::default);
            annotations.insert(
                NORTH_INTERFACES_ANNOTATION.to_string(),
                encode_north_interfaces(&projection.north_interfaces)?,
            );
            annotations.insert(
                MULTI_NETWORK_ANNOTATION.to_string(),
                encode_multi_network(&projection.multi_network)?,
            );
            apply_capacities(&mut desired, &projection.capacities);
            attached = projection.attached;
        }

        if semantically_equal(&current, &desired) {
            debug!(node = %name, "node already up to date");
            self.track_attachments(name, &attached);
            return Ok(());
        }

        info!(node = %name, pod_cidrs = ?cidr_strings, "updating node allocation");
        self.nodes.update(desired).await?;
        self.track_attachments(name, &attached);
        self.events
            .publish(
                &node_reference(name),
                EventType::Normal,
                reasons::CIDR_ASSIGNED,
                actions::RECONCILE,
                Some(format!("assigned pod CIDRs {}", cidr_strings.join(","))),
            )
            .await;
        Ok(())
    }
}

/// Write the selected pod CIDRs into the node spec.
///
/// An allocated node's CIDRs are ground truth: a conflicting selection is
/// logged and the existing allocation kept, so the rest of the node still
/// converges.
fn apply_pod_cidrs(name: &str, node: &mut Node, cidrs: &[String]) {
    let spec = node.spec.get_or_insert_with(Default::default);
    match spec.pod_cidr.clone().filter(|c| !c.is_empty()) {
        None => {
            spec.pod_cidr = Some(cidrs[0].clone());
            spec.pod_cidrs = Some(cidrs.to_vec());
        }
        Some(existing) => {
            let existing_list = spec
                .pod_cidrs
                .clone()
                .filter(|l| !l.is_empty())
                .unwrap_or_else(|| vec![existing]);
            if existing_list == cidrs {
                spec.pod_cidrs = Some(existing_list);
            } else {
                error!(
                    node = %name,
                    current = ?existing_list,
                    computed = ?cidrs,
                    "pod CIDRs cannot be reassigned, keeping the existing allocation"
                );
            }
        }
    }
}

/// Assert `NetworkUnavailable=False` with the route-created reason.
fn set_route_created_condition(node: &mut Node) {
    let now = Time(Utc::now());
    let condition = NodeCondition {
        type_: NETWORK_UNAVAILABLE.to_string(),
        status: "False".to_string(),
        reason: Some(ROUTE_CREATED_REASON.to_string()),
        message: Some(ROUTE_CREATED_MESSAGE.to_string()),
        last_heartbeat_time: Some(now.clone()),
        last_transition_time: Some(now),
    };
    let status = node.status.get_or_insert_with(Default::default);
    let conditions = status.conditions.get_or_insert_with(Vec::new);
    match conditions
        .iter_mut()
        .find(|c| c.type_ == NETWORK_UNAVAILABLE)
    {
        Some(existing) => *existing = condition,
        None => conditions.push(condition),
    }
}

/// Replace the allocator-owned capacity resources with the projected set.
///
/// Other capacity entries (cpu, memory, ...) belong to the kubelet and are
/// left alone.
fn apply_capacities(node: &mut Node, capacities: &BTreeMap<String, i64>) {
    let status = node.status.get_or_insert_with(Default::default);
    if status.capacity.is_none() && capacities.is_empty() {
        return;
    }
    let capacity = status.capacity.get_or_insert_with(Default::default);
    capacity.retain(|k, _| !k.starts_with(CAPACITY_PREFIX));
    for (resource, value) in capacities {
        capacity.insert(resource.clone(), Quantity(value.to_string()));
    }
}

/// Node equality modulo condition timestamps.
///
/// Timestamps are refreshed on every write, so comparing them would defeat
/// the no-op detection.
fn semantically_equal(current: &Node, desired: &Node) -> bool {
    sanitized(current) == sanitized(desired)
}

fn sanitized(node: &Node) -> Node {
    let mut node = node.clone();
    if let Some(conditions) = node.status.as_mut().and_then(|s| s.conditions.as_mut()) {
        for condition in conditions.iter_mut() {
            condition.last_heartbeat_time = None;
            condition.last_transition_time = None;
        }
    }
    node
}
