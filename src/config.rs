//! Allocator configuration
//!
//! The hosting binary decides where these values come from (flags,
//! environment, config file); the allocator only consumes the resolved
//! configuration.

use serde::{Deserialize, Serialize};

use crate::{DEFAULT_WORKERS, UPDATE_MAX_RETRIES};

/// Cluster IP stack type governing the number and order of pod CIDRs
/// assigned to each node.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub enum StackType {
    /// Single-stack IPv4: one IPv4 pod CIDR per node
    #[default]
    IPv4,
    /// Single-stack IPv6: one IPv6 pod CIDR per node
    IPv6,
    /// Dual-stack, IPv4 primary: `[v4, v6]`
    IPv4IPv6,
    /// Dual-stack, IPv6 primary: `[v6, v4]`
    IPv6IPv4,
}

impl StackType {
    /// True when the stack requires an IPv4 CIDR
    pub fn wants_ipv4(&self) -> bool {
        !matches!(self, Self::IPv6)
    }

    /// True when the stack requires an IPv6 CIDR
    pub fn wants_ipv6(&self) -> bool {
        !matches!(self, Self::IPv4)
    }
}

impl std::str::FromStr for StackType {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ipv4" => Ok(Self::IPv4),
            "ipv6" => Ok(Self::IPv6),
            "ipv4ipv6" | "ipv4-ipv6" => Ok(Self::IPv4IPv6),
            "ipv6ipv4" | "ipv6-ipv4" => Ok(Self::IPv6IPv4),
            _ => Err(crate::Error::serialization(format!(
                "invalid stack type: {s}, expected one of: IPv4, IPv6, IPv4IPv6, IPv6IPv4"
            ))),
        }
    }
}

impl std::fmt::Display for StackType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::IPv4 => write!(f, "IPv4"),
            Self::IPv6 => write!(f, "IPv6"),
            Self::IPv4IPv6 => write!(f, "IPv4IPv6"),
            Self::IPv6IPv4 => write!(f, "IPv6IPv4"),
        }
    }
}

/// Configuration for the cloud CIDR allocator
#[derive(Clone, Debug)]
pub struct AllocatorConfig {
    /// Cluster stack type
    pub stack_type: StackType,
    /// Number of concurrent reconcile workers
    pub workers: usize,
    /// Rate-limited requeue ceiling per node
    pub max_retries: u32,
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        Self {
            stack_type: StackType::IPv4,
            workers: DEFAULT_WORKERS,
            max_retries: UPDATE_MAX_RETRIES,
        }
    }
}

impl AllocatorConfig {
    /// Create a config for the given stack type, defaults elsewhere
    pub fn with_stack_type(stack_type: StackType) -> Self {
        Self {
            stack_type,
            ..Default::default()
        }
    }
}
