//! Resource quantities shared by nodes, namespaces, and pods
//!
//! CPU is measured in millicores, memory and storage in bytes, pods as a
//! plain count. All arithmetic saturates: allocation never overflows and
//! release clamps at zero.

use serde::{Deserialize, Serialize};

/// The four resource axes a node exposes and a namespace accounts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NodeResources {
    /// CPU in millicores
    #[serde(default)]
    pub cpu: u64,

    /// Memory in bytes
    #[serde(default)]
    pub memory: u64,

    /// Pod slots
    #[serde(default)]
    pub pods: u64,

    /// Storage in bytes
    #[serde(default)]
    pub storage: u64,
}

impl NodeResources {
    /// Component-wise `self <= other`
    pub fn fits_within(&self, other: &NodeResources) -> bool {
        self.cpu <= other.cpu
            && self.memory <= other.memory
            && self.pods <= other.pods
            && self.storage <= other.storage
    }

    /// Component-wise saturating subtraction (`self - other`, clamped at zero)
    pub fn saturating_sub(&self, other: &NodeResources) -> NodeResources {
        NodeResources {
            cpu: self.cpu.saturating_sub(other.cpu),
            memory: self.memory.saturating_sub(other.memory),
            pods: self.pods.saturating_sub(other.pods),
            storage: self.storage.saturating_sub(other.storage),
        }
    }

    /// Component-wise saturating addition
    pub fn saturating_add(&self, other: &NodeResources) -> NodeResources {
        NodeResources {
            cpu: self.cpu.saturating_add(other.cpu),
            memory: self.memory.saturating_add(other.memory),
            pods: self.pods.saturating_add(other.pods),
            storage: self.storage.saturating_add(other.storage),
        }
    }
}

/// CPU and memory requested by (or limiting) a pod
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PodResources {
    /// CPU in millicores
    #[serde(default)]
    pub cpu: u64,

    /// Memory in bytes
    #[serde(default)]
    pub memory: u64,
}

impl PodResources {
    pub fn new(cpu: u64, memory: u64) -> Self {
        Self { cpu, memory }
    }

    /// The node-resource footprint of one pod with these requests
    pub fn as_node_footprint(&self) -> NodeResources {
        NodeResources {
            cpu: self.cpu,
            memory: self.memory,
            pods: 1,
            storage: 0,
        }
    }
}
