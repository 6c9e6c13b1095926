//! Node resources - worker machines registered with the control plane
//!
//! A Node registers with a runtime type and an allocatable resource vector,
//! then sends heartbeats to stay alive. The control plane tracks allocated
//! resources, labels, taints, and schedulability, and marks nodes unhealthy
//! when heartbeats stop.

pub mod manager;
pub mod monitor;

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::resources::NodeResources;

pub use manager::{NodeManager, NodeManagerConfig, RegisterNodeInput, UnhealthyHook};
pub use monitor::HeartbeatMonitor;

/// Runtime a worker provides
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeType {
    Node,
    Browser,
}

/// Lifecycle status of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    /// Healthy and heartbeating
    Online,
    /// Reachable but degraded
    Suspect,
    /// Being emptied of pods; unschedulable
    Draining,
    /// Operator-initiated downtime; unschedulable
    Maintenance,
    /// Missed heartbeats past the timeout
    Unhealthy,
    /// Disconnected from the control plane
    Offline,
}

/// Effect a taint has on pods that do not tolerate it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaintEffect {
    /// Hard filter: intolerant pods are never placed here
    NoSchedule,
    /// Soft repellent: intolerant pods are penalized in scoring
    PreferNoSchedule,
    /// Hard filter, and running intolerant pods are evicted
    NoExecute,
}

/// A node-side repellent matched against pod tolerations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Taint {
    pub key: String,
    pub value: String,
    pub effect: TaintEffect,
}

/// A worker machine in the cluster
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    /// Opaque unique id
    pub id: String,

    /// Cluster-unique name
    pub name: String,

    /// Runtime this worker provides
    pub runtime_type: RuntimeType,

    /// Current lifecycle status
    pub status: NodeStatus,

    /// Last heartbeat observed by the control plane
    pub last_heartbeat: DateTime<Utc>,

    /// Transport connection id; cleared on disconnect
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection_id: Option<String>,

    /// Free-form capability advertisements
    #[serde(default)]
    pub capabilities: HashMap<String, String>,

    /// Total resources this node offers
    pub allocatable: NodeResources,

    /// Resources currently reserved by pods
    pub allocated: NodeResources,

    /// Labels for selector/affinity matching
    #[serde(default)]
    pub labels: HashMap<String, String>,

    /// Annotations for non-identifying metadata
    #[serde(default)]
    pub annotations: HashMap<String, String>,

    /// Taints repelling intolerant pods
    #[serde(default)]
    pub taints: Vec<Taint>,

    /// Cordon flag; set by drain/maintenance as well
    #[serde(default)]
    pub unschedulable: bool,

    /// User that registered this node; only they may deregister it
    pub registered_by: String,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Node {
    /// Whether the scheduler may place new pods here
    pub fn is_schedulable(&self) -> bool {
        self.status == NodeStatus::Online && !self.unschedulable
    }

    /// Resources still available for new pods
    pub fn available(&self) -> NodeResources {
        self.allocatable.saturating_sub(&self.allocated)
    }

    /// Whether the heartbeat is older than the timeout (strictly)
    pub fn is_stale(&self, now: DateTime<Utc>, timeout_ms: i64) -> bool {
        (now - self.last_heartbeat).num_milliseconds() > timeout_ms
    }
}

/// Heartbeat message consumed from a worker
///
/// `timestamp` is the server-observed receive time; `status` and `allocated`
/// are partial overrides applied on top of the stored node.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Heartbeat {
    pub node_id: String,

    pub timestamp: DateTime<Utc>,

    /// Optional status override reported by the worker
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<NodeStatus>,

    /// Optional allocated-resources override reported by the worker
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allocated: Option<NodeResources>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_node() -> Node {
        let now = Utc::now();
        Node {
            id: "n-1".to_string(),
            name: "worker-1".to_string(),
            runtime_type: RuntimeType::Node,
            status: NodeStatus::Online,
            last_heartbeat: now,
            connection_id: Some("conn-1".to_string()),
            capabilities: HashMap::new(),
            allocatable: NodeResources {
                cpu: 1000,
                memory: 2048,
                pods: 10,
                storage: 0,
            },
            allocated: NodeResources::default(),
            labels: HashMap::new(),
            annotations: HashMap::new(),
            taints: vec![],
            unschedulable: false,
            registered_by: "admin".to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_schedulable() {
        let mut node = sample_node();
        assert!(node.is_schedulable());

        node.unschedulable = true;
        assert!(!node.is_schedulable());

        node.unschedulable = false;
        node.status = NodeStatus::Unhealthy;
        assert!(!node.is_schedulable());
    }

    #[test]
    fn test_available_resources() {
        let mut node = sample_node();
        node.allocated = NodeResources {
            cpu: 400,
            memory: 1024,
            pods: 3,
            storage: 0,
        };

        let avail = node.available();
        assert_eq!(avail.cpu, 600);
        assert_eq!(avail.memory, 1024);
        assert_eq!(avail.pods, 7);
    }

    #[test]
    fn test_staleness_is_strict() {
        let mut node = sample_node();
        let now = Utc::now();
        node.last_heartbeat = now - chrono::Duration::milliseconds(100);

        // Exactly at the threshold is NOT stale
        assert!(!node.is_stale(now, 100));
        assert!(node.is_stale(now, 99));
    }
}
