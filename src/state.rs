//! Shared cluster state - the single source of truth for all managers
//!
//! Every entity map lives here; managers hold an `Arc<ClusterState>` and
//! mutate entities through their own serialized operations. Read-then-mutate
//! sequences that must be atomic execute while holding the one relevant map
//! entry, under the single-controller ownership assumption.
//!
//! Secrets are deliberately absent: the secret store lives inside
//! `SecretManager` so encrypted material can never ride along when cluster
//! state is serialized.

use std::collections::HashMap;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::namespace::Namespace;
use crate::node::{Node, NodeStatus};
use crate::pack::Pack;
use crate::pod::{Pod, PodHistoryEntry, PodStatus};

/// A named priority value consulted at pod creation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriorityClass {
    pub name: String,

    /// Priority resolved onto pods referencing this class
    pub value: i64,

    /// Whether pods of this class may preempt lower-priority pods
    #[serde(default)]
    pub preemption_policy: PreemptionPolicy,
}

/// Preemption behavior of a priority class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PreemptionPolicy {
    /// May evict lower-priority pods to make room (the default)
    #[default]
    PreemptLowerPriority,
    /// Never preempts
    Never,
}

/// The in-memory cluster state shared by all managers
pub struct ClusterState {
    /// Nodes indexed by id
    pub nodes: DashMap<String, Node>,

    /// Pods indexed by id
    pub pods: DashMap<String, Pod>,

    /// Packs indexed by id
    pub packs: DashMap<String, Pack>,

    /// Namespaces indexed by name
    pub namespaces: DashMap<String, Namespace>,

    /// Priority classes indexed by name
    pub priority_classes: DashMap<String, PriorityClass>,

    /// Append-only per-pod audit log, indexed by pod id
    pub pod_history: DashMap<String, Vec<PodHistoryEntry>>,
}

impl ClusterState {
    pub fn new() -> Self {
        Self {
            nodes: DashMap::new(),
            pods: DashMap::new(),
            packs: DashMap::new(),
            namespaces: DashMap::new(),
            priority_classes: DashMap::new(),
            pod_history: DashMap::new(),
        }
    }

    /// Register or replace a priority class
    pub fn put_priority_class(&self, class: PriorityClass) {
        self.priority_classes.insert(class.name.clone(), class);
    }

    /// Look up a priority class by name
    pub fn get_priority_class(&self, name: &str) -> Option<PriorityClass> {
        self.priority_classes.get(name).map(|c| c.clone())
    }

    /// Append an entry to a pod's audit log
    pub fn append_pod_history(&self, pod_id: &str, entry: PodHistoryEntry) {
        self.pod_history
            .entry(pod_id.to_string())
            .or_default()
            .push(entry);
    }

    /// A pod's full audit log, oldest first
    pub fn pod_history(&self, pod_id: &str) -> Vec<PodHistoryEntry> {
        self.pod_history
            .get(pod_id)
            .map(|h| h.clone())
            .unwrap_or_default()
    }

    /// Pods currently assigned to a node
    pub fn pods_on_node(&self, node_id: &str) -> Vec<Pod> {
        self.pods
            .iter()
            .filter(|p| p.node_id.as_deref() == Some(node_id))
            .map(|p| p.clone())
            .collect()
    }

    /// Non-terminal pods in a namespace
    pub fn active_pods_in_namespace(&self, namespace: &str) -> Vec<Pod> {
        self.pods
            .iter()
            .filter(|p| p.namespace == namespace && !p.status.is_terminal())
            .map(|p| p.clone())
            .collect()
    }

    /// A consistent aggregate snapshot of the current state
    pub fn stats(&self) -> ClusterStats {
        let mut nodes_by_status: HashMap<NodeStatus, usize> = HashMap::new();
        for node in self.nodes.iter() {
            *nodes_by_status.entry(node.status).or_insert(0) += 1;
        }

        let mut pods_by_status: HashMap<PodStatus, usize> = HashMap::new();
        for pod in self.pods.iter() {
            *pods_by_status.entry(pod.status).or_insert(0) += 1;
        }

        ClusterStats {
            total_nodes: self.nodes.len(),
            online_nodes: nodes_by_status
                .get(&NodeStatus::Online)
                .copied()
                .unwrap_or(0),
            nodes_by_status,
            total_pods: self.pods.len(),
            running_pods: pods_by_status
                .get(&PodStatus::Running)
                .copied()
                .unwrap_or(0),
            pods_by_status,
            total_packs: self.packs.len(),
            total_namespaces: self.namespaces.len(),
        }
    }
}

impl Default for ClusterState {
    fn default() -> Self {
        Self::new()
    }
}

/// Aggregate counters computed from the current state snapshot
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterStats {
    pub total_nodes: usize,
    pub online_nodes: usize,
    pub nodes_by_status: HashMap<NodeStatus, usize>,
    pub total_pods: usize,
    pub running_pods: usize,
    pub pods_by_status: HashMap<PodStatus, usize>,
    pub total_packs: usize,
    pub total_namespaces: usize,
}
