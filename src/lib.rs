//! nodecidr - cloud-backed pod CIDR allocation for Kubernetes nodes
//!
//! nodecidr reconciles cluster `Node` objects against the cloud provider's
//! view of each node's virtual machine, assigning the primary pod CIDR
//! (single or dual stack) from the VM's alias IP ranges and projecting
//! multi-network membership into node annotations and IP capacity
//! resources.
//!
//! The allocator joins three independently moving sources of truth:
//! - the cluster's desired per-node network membership (`Network` /
//!   `GKENetworkParamSet` custom resources plus the node-networks
//!   annotation),
//! - the cloud's interface assignments on each VM,
//! - the current `Node` object.
//!
//! Reconciliation is driven by a deduplicating, rate-limited work queue of
//! node names; each reconcile reads all three views, computes the desired
//! node, and issues at most one write.
//!
//! # Modules
//!
//! - [`crd`] - Custom Resource Definitions (Network, GKENetworkParamSet)
//!   and the typed node annotations they project into
//! - [`cloud`] - Cloud instance records, the instance lookup trait, and
//!   provider ID parsing
//! - [`allocator`] - Work queue, CIDR selection, multi-network projection,
//!   and the reconciler itself
//! - [`runner`] - Reflector wiring that feeds node and network events into
//!   the allocator
//! - [`events`] - Kubernetes Event publishing
//! - [`metrics`] - Prometheus metrics surface
//! - [`config`] - Allocator configuration
//! - [`error`] - Error types for the allocator

#![deny(missing_docs)]

pub mod allocator;
pub mod cloud;
pub mod config;
pub mod crd;
pub mod error;
pub mod events;
pub mod metrics;
pub mod runner;

pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Default number of reconcile workers
pub const DEFAULT_WORKERS: usize = 4;

/// Maximum rate-limited requeues of a node before the queue gives up on it.
///
/// A successful reconcile resets the count.
pub const UPDATE_MAX_RETRIES: u32 = 10;
