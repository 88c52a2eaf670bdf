//! Reflector wiring for the allocator
//!
//! Builds cache-backed views over nodes, Networks, and GKENetworkParamSets
//! and pumps watch events into the allocator's queue: a node event enqueues
//! that node, a network-shaped event re-enqueues every known node so
//! membership changes converge cluster-wide.
//!
//! Leader election and process lifecycle belong to the hosting binary.

use std::sync::Arc;

use async_trait::async_trait;
use futures::{pin_mut, TryStreamExt};
use k8s_openapi::api::core::v1::Node;
use kube::api::{Api, PostParams};
use kube::runtime::reflector::{ObjectRef, Store};
use kube::runtime::{reflector, watcher, WatchStreamExt};
use kube::{Client, ResourceExt};
use tracing::{debug, info};

use crate::allocator::{CloudCidrAllocator, NetworkRegistry, NodeView, RegistrySnapshot};
use crate::cloud::CloudInstances;
use crate::config::AllocatorConfig;
use crate::crd::{GKENetworkParamSet, Network};
use crate::events::{EventPublisher, KubeEventPublisher};
use crate::{Error, Result};

/// Controller name reported on Events and patches
pub const CONTROLLER_NAME: &str = "cloud-cidr-allocator";

/// Cache-backed [`NodeView`] over a reflector store plus the node API
pub struct KubeNodeView {
    store: Store<Node>,
    api: Api<Node>,
}

impl KubeNodeView {
    /// Create a view over the given store and API
    pub fn new(store: Store<Node>, api: Api<Node>) -> Self {
        Self { store, api }
    }
}

#[async_trait]
impl NodeView for KubeNodeView {
    fn get(&self, name: &str) -> Option<Arc<Node>> {
        self.store.get(&ObjectRef::new(name))
    }

    async fn update(&self, node: Node) -> Result<()> {
        let name = node.name_any();
        let pp = PostParams::default();
        // spec and status are separate subresources; the reconciler's single
        // logical write lands as one replace of each
        self.api.replace(&name, &pp, &node).await?;
        let data = serde_json::to_vec(&node).map_err(|e| Error::serialization(e.to_string()))?;
        self.api.replace_status(&name, &pp, data).await?;
        Ok(())
    }

    async fn wait_synced(&self) {
        if self.store.wait_until_ready().await.is_err() {
            // writer dropped: the watch stream ended and the runner is
            // already tearing down
            debug!("node store writer dropped before first sync");
        }
    }
}

/// Cache-backed [`NetworkRegistry`] over the two CRD reflector stores
pub struct KubeNetworkRegistry {
    networks: Store<Network>,
    param_sets: Store<GKENetworkParamSet>,
}

impl KubeNetworkRegistry {
    /// Create a registry over the given stores
    pub fn new(networks: Store<Network>, param_sets: Store<GKENetworkParamSet>) -> Self {
        Self {
            networks,
            param_sets,
        }
    }
}

impl NetworkRegistry for KubeNetworkRegistry {
    fn snapshot(&self) -> RegistrySnapshot {
        RegistrySnapshot::new(self.networks.state(), self.param_sets.state())
    }
}

/// Run the allocator against the cluster until a watch stream ends.
///
/// Spawns the reflectors, the event pumps, and the worker pool; returns the
/// first watch error, shutting the queue down so in-flight reconciles
/// drain.
pub async fn run(
    client: Client,
    cloud: Arc<dyn CloudInstances>,
    config: AllocatorConfig,
) -> Result<()> {
    let nodes_api: Api<Node> = Api::all(client.clone());
    let networks_api: Api<Network> = Api::all(client.clone());
    let params_api: Api<GKENetworkParamSet> = Api::all(client.clone());

    let (node_reader, node_writer) = reflector::store();
    let (network_reader, network_writer) = reflector::store();
    let (params_reader, params_writer) = reflector::store();

    let events: Arc<dyn EventPublisher> =
        Arc::new(KubeEventPublisher::new(client.clone(), CONTROLLER_NAME));
    let node_view = Arc::new(KubeNodeView::new(node_reader.clone(), nodes_api.clone()));
    let registry = Arc::new(KubeNetworkRegistry::new(network_reader, params_reader));
    let allocator = Arc::new(CloudCidrAllocator::new(
        node_view, registry, cloud, events, config,
    ));

    info!(stack_type = %allocator.config.stack_type, "starting cloud CIDR allocator");

    let node_events =
        reflector(node_writer, watcher(nodes_api, watcher::Config::default())).touched_objects();
    let network_events = reflector(
        network_writer,
        watcher(networks_api, watcher::Config::default()),
    )
    .touched_objects()
    .map_ok(|_| ());
    let params_events = reflector(
        params_writer,
        watcher(params_api, watcher::Config::default()),
    )
    .touched_objects()
    .map_ok(|_| ());

    let node_pump = {
        let allocator = Arc::clone(&allocator);
        async move {
            pin_mut!(node_events);
            while let Some(node) = node_events
                .try_next()
                .await
                .map_err(|e| Error::Watch(e.to_string()))?
            {
                allocator.enqueue_node(node.name_any());
            }
            Ok(())
        }
    };

    let registry_pump = {
        let allocator = Arc::clone(&allocator);
        let registry_events = futures::stream::select(network_events, params_events);
        async move {
            pin_mut!(registry_events);
            while registry_events
                .try_next()
                .await
                .map_err(|e| Error::Watch(e.to_string()))?
                .is_some()
            {
                // network shape changed: re-evaluate every node's membership
                for node in node_reader.state() {
                    allocator.enqueue_node(node.name_any());
                }
            }
            Ok(())
        }
    };

    let workers = Arc::clone(&allocator).run();

    let result = tokio::select! {
        r = node_pump => r,
        r = registry_pump => r,
        _ = workers => Ok(()),
    };
    allocator.shutdown();
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_registry_is_not_multi_network() {
        let (networks, _nw_writer) = reflector::store::<Network>();
        let (params, _ps_writer) = reflector::store::<GKENetworkParamSet>();
        let registry = KubeNetworkRegistry::new(networks, params);
        assert!(!registry.snapshot().is_multi_network());
    }
}
