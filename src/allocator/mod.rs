//! The cloud CIDR allocator
//!
//! This module houses the reconciliation engine: the work queue, the CIDR
//! derivation/selection policy, the multi-network projection, and the
//! worker pool that drives reconciles off the queue.
//!
//! The allocator observes three read views - cluster nodes, the network
//! registry, and the cloud's VM records - computes the desired node, and
//! issues at most one write per reconcile. The queue guarantees at most one
//! in-flight reconcile per node name.

mod multinet;
mod queue;
mod ranges;
mod reconciler;

#[cfg(test)]
pub(crate) mod testutil;

pub use multinet::{ip_capacity, project_multi_networks, MultiNetworkProjection, SkipReason};
pub use queue::WorkQueue;
pub use ranges::{derive_node_ranges, is_ipv4, is_ipv6, select_node_cidrs, NodeRanges};

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Node;
use kube::runtime::events::EventType;
use tracing::{error, info, warn};

use crate::cloud::CloudInstances;
use crate::config::AllocatorConfig;
use crate::crd::{GKENetworkParamSet, Network};
use crate::events::{actions, node_reference, reasons, EventPublisher};
use crate::metrics::MULTINETWORK_NODES;
use crate::Result;

/// Read/write access to cluster nodes.
///
/// Reads come from an informer-style cache; the single write per reconcile
/// goes to the API server.
#[async_trait]
pub trait NodeView: Send + Sync {
    /// Snapshot of the node by name, `None` when the node is gone
    fn get(&self, name: &str) -> Option<Arc<Node>>;

    /// Replace the node's spec and status with the given object
    async fn update(&self, node: Node) -> Result<()>;

    /// Resolve once the backing cache has completed its first fill
    async fn wait_synced(&self);
}

/// Read-only view over Network and GKENetworkParamSet objects.
///
/// Each reconcile takes one [`snapshot`](NetworkRegistry::snapshot) so the
/// registry cannot shift underneath a single pass.
pub trait NetworkRegistry: Send + Sync {
    /// Atomic snapshot of both collections
    fn snapshot(&self) -> RegistrySnapshot;
}

/// A point-in-time copy of the network registry
#[derive(Clone, Default)]
pub struct RegistrySnapshot {
    networks: Vec<Arc<Network>>,
    param_sets: Vec<Arc<GKENetworkParamSet>>,
}

impl RegistrySnapshot {
    /// Build a snapshot from the given collections
    pub fn new(networks: Vec<Arc<Network>>, param_sets: Vec<Arc<GKENetworkParamSet>>) -> Self {
        Self {
            networks,
            param_sets,
        }
    }

    /// True when the cluster declares any Network at all.
    ///
    /// Clusters without Network objects predate multi-networking; their
    /// nodes never receive the projection annotations.
    pub fn is_multi_network(&self) -> bool {
        !self.networks.is_empty()
    }

    /// Look up a Network by name
    pub fn network(&self, name: &str) -> Option<&Network> {
        self.networks
            .iter()
            .map(Arc::as_ref)
            .find(|n| n.metadata.name.as_deref() == Some(name))
    }

    /// Look up a GKENetworkParamSet by name
    pub fn param_set(&self, name: &str) -> Option<&GKENetworkParamSet> {
        self.param_sets
            .iter()
            .map(Arc::as_ref)
            .find(|p| p.metadata.name.as_deref() == Some(name))
    }
}

/// The cloud CIDR allocator.
///
/// One instance serves the whole cluster; workers share it behind an `Arc`.
pub struct CloudCidrAllocator {
    pub(crate) nodes: Arc<dyn NodeView>,
    pub(crate) registry: Arc<dyn NetworkRegistry>,
    pub(crate) cloud: Arc<dyn CloudInstances>,
    pub(crate) events: Arc<dyn EventPublisher>,
    pub(crate) config: AllocatorConfig,
    queue: WorkQueue,
    /// Additional networks currently attached per node, kept so the
    /// multi-network gauge can be maintained incrementally.
    attachments: Mutex<HashMap<String, BTreeSet<String>>>,
}

impl CloudCidrAllocator {
    /// Create an allocator over the given views
    pub fn new(
        nodes: Arc<dyn NodeView>,
        registry: Arc<dyn NetworkRegistry>,
        cloud: Arc<dyn CloudInstances>,
        events: Arc<dyn EventPublisher>,
        config: AllocatorConfig,
    ) -> Self {
        Self {
            nodes,
            registry,
            cloud,
            events,
            config,
            queue: WorkQueue::new(),
            attachments: Mutex::new(HashMap::new()),
        }
    }

    /// The allocator's work queue
    pub fn queue(&self) -> &WorkQueue {
        &self.queue
    }

    /// Enqueue a node for reconciliation
    pub fn enqueue_node(&self, name: impl Into<String>) {
        self.queue.add(name);
    }

    /// Stop dequeuing new work; in-flight reconciles drain and workers exit
    pub fn shutdown(&self) {
        self.queue.shut_down();
    }

    /// Run the worker pool until the queue shuts down.
    ///
    /// Blocks on the node cache's first fill before processing anything.
    pub async fn run(self: Arc<Self>) {
        self.nodes.wait_synced().await;
        info!(workers = self.config.workers, "starting allocator workers");

        let mut handles = Vec::with_capacity(self.config.workers);
        for _ in 0..self.config.workers {
            let allocator = Arc::clone(&self);
            handles.push(tokio::spawn(async move {
                allocator.run_worker().await;
            }));
        }
        for handle in handles {
            let _ = handle.await;
        }
        info!("allocator workers stopped");
    }

    async fn run_worker(&self) {
        while let Some(name) = self.queue.get().await {
            self.process(&name).await;
            self.queue.done(&name);
        }
    }

    /// One dequeue-reconcile-requeue round for a node name.
    ///
    /// Failures are requeued with backoff until the retry ceiling; success
    /// resets the item's backoff.
    pub(crate) async fn process(&self, name: &str) {
        match self.update_cidr_allocation(name).await {
            Ok(()) => {
                self.queue.forget(name);
            }
            Err(err) => {
                if err.is_user_visible() {
                    self.events
                        .publish(
                            &node_reference(name),
                            EventType::Warning,
                            reasons::CIDR_ALLOCATION_FAILED,
                            actions::RECONCILE,
                            Some(err.to_string()),
                        )
                        .await;
                }
                if self.queue.num_requeues(name) < self.config.max_retries {
                    warn!(node = %name, error = %err, "reconcile failed, requeuing with backoff");
                    self.queue.add_rate_limited(name);
                } else {
                    error!(
                        node = %name,
                        error = %err,
                        retries = self.config.max_retries,
                        "reconcile failed, retry limit reached, dropping from queue"
                    );
                    self.queue.forget(name);
                }
            }
        }
    }

    /// Reconcile the attachment bookkeeping and gauge with the set of
    /// additional networks now attached to `node`.
    pub(crate) fn track_attachments(&self, node: &str, attached: &BTreeSet<String>) {
        let mut map = self
            .attachments
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let previous = map.get(node).cloned().unwrap_or_default();
        for network in attached.difference(&previous) {
            MULTINETWORK_NODES.with_label_values(&[network]).inc();
        }
        for network in previous.difference(attached) {
            MULTINETWORK_NODES.with_label_values(&[network]).dec();
        }
        if attached.is_empty() {
            map.remove(node);
        } else {
            map.insert(node.to_string(), attached.clone());
        }
    }
}
