//! Cloud instance lookup trait
//!
//! This trait is the allocator's only window into the cloud. The real
//! implementation wraps the provider's compute API; tests use the
//! generated mock.

use async_trait::async_trait;
use thiserror::Error;

#[cfg(test)]
use mockall::automock;

use super::VmInstance;

/// Failures from a cloud instance lookup
#[derive(Debug, Error)]
pub enum CloudError {
    /// The VM does not exist in the given zone
    #[error("instance {zone}/{name} not found")]
    NotFound {
        /// Zone the lookup ran against
        zone: String,
        /// Instance name looked up
        name: String,
    },

    /// The API could not be reached or answered with a server error
    #[error("transport error: {0}")]
    Transport(String),
}

/// Read access to cloud VM records.
///
/// Implementations must be safe to call concurrently; the allocator issues
/// one lookup per in-flight reconcile.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait CloudInstances: Send + Sync {
    /// Fetch the VM record for `name` in `zone`.
    ///
    /// `NotFound` is retryable from the allocator's point of view: the VM
    /// may still be provisioning, and the node will be requeued.
    async fn get_instance(&self, zone: &str, name: &str) -> Result<VmInstance, CloudError>;
}
