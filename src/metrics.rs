//! Prometheus metrics for the allocator
//!
//! Gauges live in process-wide statics registered against a crate-local
//! registry; the hosting binary exposes [`gather`] on its metrics endpoint.
//! Updates are per-label atomic. Tests isolate themselves with
//! [`reset_multinetwork_nodes`].

use once_cell::sync::Lazy;
use prometheus::{Encoder, IntGaugeVec, Opts, Registry, TextEncoder};

/// Registry holding every allocator metric
pub static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

/// Gauge of nodes with a successfully attached additional network.
///
/// Labels:
/// - `network_name`: name of the Network custom resource
pub static MULTINETWORK_NODES: Lazy<IntGaugeVec> = Lazy::new(|| {
    let gauge = IntGaugeVec::new(
        Opts::new(
            "multinetwork_nodes",
            "Number of nodes with an attached additional network",
        ),
        &["network_name"],
    )
    .expect("multinetwork_nodes gauge options are static");
    REGISTRY
        .register(Box::new(gauge.clone()))
        .expect("multinetwork_nodes registers once");
    gauge
});

/// Gather all metrics in Prometheus text format
pub fn gather() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = vec![];
    // encoding static gauge families into a Vec cannot fail
    encoder
        .encode(&metric_families, &mut buffer)
        .expect("text encoding into memory");
    String::from_utf8(buffer).expect("prometheus text format is utf-8")
}

/// Reset the multi-network gauge vector, removing every label child.
///
/// Test isolation only; production code maintains the gauge incrementally.
pub fn reset_multinetwork_nodes() {
    MULTINETWORK_NODES.reset();
}

/// Serializes tests that reset or assert on the process-wide gauges.
#[cfg(test)]
pub(crate) static TEST_GAUGE_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());
