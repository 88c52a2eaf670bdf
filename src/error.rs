//! Error types for the nodecidr allocator
//!
//! Every failure mode carries a stable message substring so callers (and
//! tests) can classify errors without matching on exact strings.

use thiserror::Error;

/// Main error type for allocator operations
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Kubernetes API error
    #[error("kubernetes error: {0}")]
    Kube(#[from] kube::Error),

    /// Node has no provider ID, so the cloud VM cannot be resolved
    #[error("node {0} doesn't have providerID")]
    ProviderIdMissing(String),

    /// Provider ID string does not match `gce://<project>/<zone>/<instance>`
    #[error("unparseable providerID {0:?}: expected gce://<project>/<zone>/<instance>")]
    ProviderIdFormat(String),

    /// Cloud instance lookup failed (not found or transport error)
    #[error("failed to get instance from provider: {0}")]
    CloudLookup(String),

    /// The VM exposes no alias ranges or IPv6 addresses to allocate from
    #[error("failed to allocate cidrs: Node {0} has no ranges from which CIDRs can be allocated")]
    NoRanges(String),

    /// An alias IP range string is not a valid CIDR
    #[error("invalid CIDR address: {0}")]
    InvalidCidr(String),

    /// An interface IPv6 address string is not a bare IP address
    #[error("failed to parse strings: {0}")]
    AddressParse(String),

    /// The derived CIDR families cannot satisfy the cluster stack type
    #[error("failed to validate node CIDRs, err: IPs are not dual stack: {0}")]
    NotDualStack(String),

    /// A node annotation could not be parsed
    #[error("invalid node annotation: {0}")]
    Annotation(String),

    /// Serialization/deserialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A watch stream feeding the allocator terminated with an error
    #[error("watch error: {0}")]
    Watch(String),
}

impl Error {
    /// Create a cloud lookup error with the given message
    pub fn cloud_lookup(msg: impl Into<String>) -> Self {
        Self::CloudLookup(msg.into())
    }

    /// Create an invalid CIDR error for the given range string
    pub fn invalid_cidr(cidr: impl Into<String>) -> Self {
        Self::InvalidCidr(cidr.into())
    }

    /// Create an annotation error with the given message
    pub fn annotation(msg: impl Into<String>) -> Self {
        Self::Annotation(msg.into())
    }

    /// Create a serialization error with the given message
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }

    /// True for failures caused by data the user can correct (missing
    /// provider ID, malformed cloud ranges), which warrant a Warning event.
    pub fn is_user_visible(&self) -> bool {
        matches!(
            self,
            Self::ProviderIdMissing(_)
                | Self::InvalidCidr(_)
                | Self::AddressParse(_)
                | Self::NotDualStack(_)
                | Self::Annotation(_)
        )
    }
}
