//! Node manager - registration, heartbeats, liveness, and resource accounting
//!
//! The manager owns every node mutation: registration and reconnect,
//! heartbeat processing with partial overrides, the status machine
//! (cordon/drain/maintenance/disconnect), label and taint edits, and the
//! atomic allocate/release bookkeeping the scheduler relies on.
//!
//! The periodic liveness sweep lives in [`super::monitor`]; it calls
//! [`NodeManager::sweep_stale_nodes`] on the configured interval.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::{ErrorCode, OpError, OpResult};
use crate::resources::{NodeResources, PodResources};
use crate::state::ClusterState;

use super::{Heartbeat, Node, NodeStatus, RuntimeType, Taint};

/// Callback fired when the sweep transitions a node to unhealthy
///
/// Receives `(node_id, node_name)`. A failing hook is logged and the sweep
/// continues with the remaining nodes.
pub type UnhealthyHook = Arc<dyn Fn(&str, &str) -> OpResult<()> + Send + Sync>;

/// Node manager configuration
#[derive(Debug, Clone)]
pub struct NodeManagerConfig {
    /// Heartbeat age after which a node is considered dead (default 30s)
    pub heartbeat_timeout_ms: i64,

    /// Liveness sweep interval (default 10s)
    pub heartbeat_check_interval_ms: u64,

    /// Whether `Core::start` spawns the liveness monitor
    pub enable_heartbeat_monitoring: bool,
}

impl Default for NodeManagerConfig {
    fn default() -> Self {
        Self {
            heartbeat_timeout_ms: 30_000,
            heartbeat_check_interval_ms: 10_000,
            enable_heartbeat_monitoring: true,
        }
    }
}

/// Input for registering a node
#[derive(Debug, Clone, Default)]
pub struct RegisterNodeInput {
    pub name: String,
    pub runtime_type: Option<RuntimeType>,
    pub allocatable: NodeResources,
    pub capabilities: HashMap<String, String>,
    pub labels: HashMap<String, String>,
    pub connection_id: Option<String>,
}

/// Manages the node inventory over the shared cluster state
pub struct NodeManager {
    state: Arc<ClusterState>,
    config: NodeManagerConfig,
    unhealthy_hook: RwLock<Option<UnhealthyHook>>,
}

impl NodeManager {
    pub fn new(state: Arc<ClusterState>, config: NodeManagerConfig) -> Self {
        Self {
            state,
            config,
            unhealthy_hook: RwLock::new(None),
        }
    }

    pub fn config(&self) -> &NodeManagerConfig {
        &self.config
    }

    /// Install the callback fired when a node turns unhealthy
    ///
    /// Wired by the composition root after the scheduler exists.
    pub fn set_unhealthy_hook(&self, hook: UnhealthyHook) {
        *self.unhealthy_hook.write().expect("hook lock poisoned") = Some(hook);
    }

    // =========================================================================
    // Registration
    // =========================================================================

    /// Register a new node
    ///
    /// Names are cluster-unique; registering an existing name fails with
    /// `NODE_EXISTS` (reconnects go through [`NodeManager::reconnect`]).
    pub fn register(&self, input: RegisterNodeInput, registered_by: &str) -> OpResult<Node> {
        if input.name.trim().is_empty() {
            return Err(OpError::validation("node name must not be empty"));
        }
        let runtime_type = input
            .runtime_type
            .ok_or_else(|| OpError::validation("a valid runtimeType is required"))?;

        if self.find_by_name(&input.name).is_some() {
            return Err(OpError::new(
                ErrorCode::NodeExists,
                format!("node '{}' already registered", input.name),
            ));
        }

        let now = Utc::now();
        let node = Node {
            id: Uuid::new_v4().to_string(),
            name: input.name,
            runtime_type,
            status: NodeStatus::Online,
            last_heartbeat: now,
            connection_id: input.connection_id,
            capabilities: input.capabilities,
            allocatable: input.allocatable,
            allocated: NodeResources::default(),
            labels: input.labels,
            annotations: HashMap::new(),
            taints: vec![],
            unschedulable: false,
            registered_by: registered_by.to_string(),
            created_at: now,
            updated_at: now,
        };

        info!(node = %node.name, runtime = ?node.runtime_type, "node registered");
        self.state.nodes.insert(node.id.clone(), node.clone());
        Ok(node)
    }

    /// Re-admit a known node after a transport reconnect
    ///
    /// Resets the node to online and refreshes its connection id and
    /// heartbeat; allocation and labels are preserved.
    pub fn reconnect(&self, node_id: &str, connection_id: Option<String>) -> OpResult<Node> {
        let mut node = self.get_mut(node_id)?;
        node.status = NodeStatus::Online;
        node.connection_id = connection_id;
        node.last_heartbeat = Utc::now();
        node.updated_at = node.last_heartbeat;
        info!(node = %node.name, "node reconnected");
        Ok(node.clone())
    }

    /// Deregister a node; only the registering user may do this
    pub fn deregister(&self, node_id: &str, requester: &str) -> OpResult<Node> {
        {
            let node = self.get_mut(node_id)?;
            if node.registered_by != requester {
                return Err(OpError::new(
                    ErrorCode::Forbidden,
                    format!("only '{}' may deregister this node", node.registered_by),
                ));
            }
        }
        let (_, node) = self
            .state
            .nodes
            .remove(node_id)
            .ok_or_else(|| not_found(node_id))?;
        info!(node = %node.name, "node deregistered");
        Ok(node)
    }

    // =========================================================================
    // Heartbeats and liveness
    // =========================================================================

    /// Process one heartbeat message
    ///
    /// Refreshes `lastHeartbeat` and applies any partial status/allocated
    /// overrides the worker reported.
    pub fn heartbeat(&self, hb: &Heartbeat) -> OpResult<Node> {
        let mut node = self.get_mut(&hb.node_id)?;

        node.last_heartbeat = hb.timestamp;
        if let Some(status) = hb.status {
            node.status = status;
        }
        if let Some(allocated) = hb.allocated {
            node.allocated = allocated;
        }
        node.updated_at = Utc::now();

        debug!(node = %node.name, "heartbeat processed");
        Ok(node.clone())
    }

    /// One liveness sweep over all nodes
    ///
    /// Every node whose heartbeat is older than the timeout, and that is not
    /// already offline or unhealthy, transitions to unhealthy; the unhealthy
    /// hook fires exactly once per transition. Returns the ids of the nodes
    /// that transitioned.
    pub fn sweep_stale_nodes(&self, now: DateTime<Utc>) -> Vec<String> {
        let mut transitioned: Vec<(String, String)> = Vec::new();

        for mut node in self.state.nodes.iter_mut() {
            if matches!(node.status, NodeStatus::Offline | NodeStatus::Unhealthy) {
                continue;
            }
            if node.is_stale(now, self.config.heartbeat_timeout_ms) {
                node.status = NodeStatus::Unhealthy;
                node.updated_at = now;
                warn!(node = %node.name, "node missed heartbeat timeout, marked unhealthy");
                transitioned.push((node.id.clone(), node.name.clone()));
            }
        }

        // Hook invocations happen after the map guards are dropped
        let hook = self
            .unhealthy_hook
            .read()
            .expect("hook lock poisoned")
            .clone();
        if let Some(hook) = hook {
            for (id, name) in &transitioned {
                if let Err(e) = hook(id, name) {
                    error!(node = %name, error = %e, "onNodeUnhealthy hook failed");
                }
            }
        }

        transitioned.into_iter().map(|(id, _)| id).collect()
    }

    // =========================================================================
    // Status machine
    // =========================================================================

    /// Mark a node suspect (reachable but degraded)
    pub fn mark_suspect(&self, node_id: &str) -> OpResult<Node> {
        self.transition(node_id, NodeStatus::Suspect)
    }

    /// Cordon: keep the node online but stop scheduling onto it
    pub fn cordon(&self, node_id: &str) -> OpResult<Node> {
        let mut node = self.get_mut(node_id)?;
        node.unschedulable = true;
        node.updated_at = Utc::now();
        Ok(node.clone())
    }

    /// Uncordon: return the node to online and schedulable
    pub fn uncordon(&self, node_id: &str) -> OpResult<Node> {
        let mut node = self.get_mut(node_id)?;
        node.status = NodeStatus::Online;
        node.unschedulable = false;
        node.updated_at = Utc::now();
        info!(node = %node.name, "node uncordoned");
        Ok(node.clone())
    }

    /// Begin draining: unschedulable, and reports the pods needing failover
    ///
    /// The eviction itself belongs to the scheduler, which owns the pod
    /// lifecycle; this returns the ids of pods still assigned here.
    pub fn drain(&self, node_id: &str) -> OpResult<Vec<String>> {
        {
            let mut node = self.get_mut(node_id)?;
            node.status = NodeStatus::Draining;
            node.unschedulable = true;
            node.updated_at = Utc::now();
            info!(node = %node.name, "node draining");
        }
        Ok(self
            .state
            .pods_on_node(node_id)
            .into_iter()
            .filter(|p| !p.status.is_terminal())
            .map(|p| p.id)
            .collect())
    }

    /// Put the node into operator maintenance (unschedulable)
    pub fn maintenance(&self, node_id: &str) -> OpResult<Node> {
        let mut node = self.get_mut(node_id)?;
        node.status = NodeStatus::Maintenance;
        node.unschedulable = true;
        node.updated_at = Utc::now();
        info!(node = %node.name, "node entering maintenance");
        Ok(node.clone())
    }

    /// Record a transport disconnect: offline, connection cleared
    pub fn disconnect(&self, node_id: &str) -> OpResult<Node> {
        let mut node = self.get_mut(node_id)?;
        node.status = NodeStatus::Offline;
        node.connection_id = None;
        node.updated_at = Utc::now();
        info!(node = %node.name, "node disconnected");
        Ok(node.clone())
    }

    fn transition(&self, node_id: &str, status: NodeStatus) -> OpResult<Node> {
        let mut node = self.get_mut(node_id)?;
        node.status = status;
        node.updated_at = Utc::now();
        Ok(node.clone())
    }

    // =========================================================================
    // Resource accounting
    // =========================================================================

    /// Atomically check and reserve cpu/memory and one pod slot
    pub fn allocate_resources(&self, node_id: &str, requests: &PodResources) -> OpResult<()> {
        let mut node = self.get_mut(node_id)?;
        let footprint = requests.as_node_footprint();
        let available = node.available();

        if !footprint.fits_within(&available) {
            return Err(OpError::validation(format!(
                "node '{}' has insufficient resources (cpu {} / memory {} available)",
                node.name, available.cpu, available.memory
            )));
        }

        node.allocated = node.allocated.saturating_add(&footprint);
        node.updated_at = Utc::now();
        Ok(())
    }

    /// Release previously reserved cpu/memory and one pod slot, clamped at zero
    pub fn release_resources(&self, node_id: &str, requests: &PodResources) -> OpResult<()> {
        let mut node = self.get_mut(node_id)?;
        node.allocated = node.allocated.saturating_sub(&requests.as_node_footprint());
        node.updated_at = Utc::now();
        Ok(())
    }

    // =========================================================================
    // Labels and taints
    // =========================================================================

    /// Set a label; overwrites an existing value for the key
    pub fn add_label(&self, node_id: &str, key: &str, value: &str) -> OpResult<Node> {
        let mut node = self.get_mut(node_id)?;
        node.labels.insert(key.to_string(), value.to_string());
        node.updated_at = Utc::now();
        Ok(node.clone())
    }

    /// Remove a label; removing an absent key is a no-op
    pub fn remove_label(&self, node_id: &str, key: &str) -> OpResult<Node> {
        let mut node = self.get_mut(node_id)?;
        node.labels.remove(key);
        node.updated_at = Utc::now();
        Ok(node.clone())
    }

    /// Set an annotation; overwrites an existing value for the key
    pub fn add_annotation(&self, node_id: &str, key: &str, value: &str) -> OpResult<Node> {
        let mut node = self.get_mut(node_id)?;
        node.annotations.insert(key.to_string(), value.to_string());
        node.updated_at = Utc::now();
        Ok(node.clone())
    }

    /// Remove an annotation; removing an absent key is a no-op
    pub fn remove_annotation(&self, node_id: &str, key: &str) -> OpResult<Node> {
        let mut node = self.get_mut(node_id)?;
        node.annotations.remove(key);
        node.updated_at = Utc::now();
        Ok(node.clone())
    }

    /// Add a taint; idempotent on `(key, value, effect)`
    pub fn add_taint(&self, node_id: &str, taint: Taint) -> OpResult<Node> {
        let mut node = self.get_mut(node_id)?;
        if !node.taints.contains(&taint) {
            node.taints.push(taint);
            node.updated_at = Utc::now();
        }
        Ok(node.clone())
    }

    /// Remove a taint; idempotent on `(key, value, effect)`
    pub fn remove_taint(&self, node_id: &str, taint: &Taint) -> OpResult<Node> {
        let mut node = self.get_mut(node_id)?;
        node.taints.retain(|t| t != taint);
        node.updated_at = Utc::now();
        Ok(node.clone())
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn get(&self, node_id: &str) -> Option<Node> {
        self.state.nodes.get(node_id).map(|n| n.clone())
    }

    pub fn find_by_name(&self, name: &str) -> Option<Node> {
        self.state
            .nodes
            .iter()
            .find(|n| n.name == name)
            .map(|n| n.clone())
    }

    pub fn list(&self) -> Vec<Node> {
        self.state.nodes.iter().map(|n| n.clone()).collect()
    }

    /// Nodes the scheduler may currently place pods on
    pub fn schedulable_nodes(&self) -> Vec<Node> {
        self.state
            .nodes
            .iter()
            .filter(|n| n.is_schedulable())
            .map(|n| n.clone())
            .collect()
    }

    pub fn count_by_status(&self, status: NodeStatus) -> usize {
        self.state.nodes.iter().filter(|n| n.status == status).count()
    }

    fn get_mut(&self, node_id: &str) -> OpResult<dashmap::mapref::one::RefMut<'_, String, Node>> {
        self.state
            .nodes
            .get_mut(node_id)
            .ok_or_else(|| not_found(node_id))
    }
}

fn not_found(node_id: &str) -> OpError {
    OpError::new(
        ErrorCode::NodeNotFound,
        format!("node '{}' not found", node_id),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::TaintEffect;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn manager() -> NodeManager {
        NodeManager::new(Arc::new(ClusterState::new()), NodeManagerConfig::default())
    }

    fn register_input(name: &str) -> RegisterNodeInput {
        RegisterNodeInput {
            name: name.to_string(),
            runtime_type: Some(RuntimeType::Node),
            allocatable: NodeResources {
                cpu: 1000,
                memory: 2048,
                pods: 10,
                storage: 0,
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_register_initial_state() {
        let mgr = manager();
        let node = mgr.register(register_input("worker-1"), "admin").unwrap();

        assert_eq!(node.status, NodeStatus::Online);
        assert_eq!(node.allocated, NodeResources::default());
        assert!(!node.unschedulable);
        assert_eq!(node.registered_by, "admin");
    }

    #[test]
    fn test_register_duplicate_name_fails() {
        let mgr = manager();
        mgr.register(register_input("worker-1"), "admin").unwrap();

        let err = mgr
            .register(register_input("worker-1"), "admin")
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::NodeExists);
    }

    #[test]
    fn test_register_requires_runtime() {
        let mgr = manager();
        let mut input = register_input("worker-1");
        input.runtime_type = None;

        let err = mgr.register(input, "admin").unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);
    }

    #[test]
    fn test_reconnect_resets_online() {
        let mgr = manager();
        let node = mgr.register(register_input("worker-1"), "admin").unwrap();
        mgr.disconnect(&node.id).unwrap();

        let node = mgr
            .reconnect(&node.id, Some("conn-2".to_string()))
            .unwrap();
        assert_eq!(node.status, NodeStatus::Online);
        assert_eq!(node.connection_id.as_deref(), Some("conn-2"));
    }

    #[test]
    fn test_heartbeat_overrides() {
        let mgr = manager();
        let node = mgr.register(register_input("worker-1"), "admin").unwrap();

        let allocated = NodeResources {
            cpu: 300,
            memory: 512,
            pods: 2,
            storage: 0,
        };
        let updated = mgr
            .heartbeat(&Heartbeat {
                node_id: node.id.clone(),
                timestamp: Utc::now(),
                status: Some(NodeStatus::Suspect),
                allocated: Some(allocated),
            })
            .unwrap();

        assert_eq!(updated.status, NodeStatus::Suspect);
        assert_eq!(updated.allocated, allocated);
    }

    #[test]
    fn test_heartbeat_unknown_node() {
        let mgr = manager();
        let err = mgr
            .heartbeat(&Heartbeat {
                node_id: "missing".to_string(),
                timestamp: Utc::now(),
                status: None,
                allocated: None,
            })
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::NodeNotFound);
    }

    #[test]
    fn test_sweep_marks_stale_unhealthy_once() {
        let mgr = manager();
        let node = mgr.register(register_input("worker-1"), "admin").unwrap();

        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();
        mgr.set_unhealthy_hook(Arc::new(move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }));

        let later = Utc::now() + chrono::Duration::milliseconds(60_000);
        let transitioned = mgr.sweep_stale_nodes(later);
        assert_eq!(transitioned, vec![node.id.clone()]);
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        // Already unhealthy: second sweep is a no-op
        let transitioned = mgr.sweep_stale_nodes(later);
        assert!(transitioned.is_empty());
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_sweep_exact_threshold_not_unhealthy() {
        let mgr = manager();
        let node = mgr.register(register_input("worker-1"), "admin").unwrap();
        let registered = mgr.get(&node.id).unwrap().last_heartbeat;

        let at_threshold = registered + chrono::Duration::milliseconds(30_000);
        assert!(mgr.sweep_stale_nodes(at_threshold).is_empty());

        let past_threshold = at_threshold + chrono::Duration::milliseconds(1);
        assert_eq!(mgr.sweep_stale_nodes(past_threshold).len(), 1);
    }

    #[test]
    fn test_sweep_continues_past_hook_failure() {
        let mgr = manager();
        mgr.register(register_input("worker-1"), "admin").unwrap();
        mgr.register(register_input("worker-2"), "admin").unwrap();

        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();
        mgr.set_unhealthy_hook(Arc::new(move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(OpError::validation("hook exploded"))
        }));

        let later = Utc::now() + chrono::Duration::milliseconds(60_000);
        let transitioned = mgr.sweep_stale_nodes(later);
        assert_eq!(transitioned.len(), 2);
        assert_eq!(fired.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_drain_and_uncordon() {
        let mgr = manager();
        let node = mgr.register(register_input("worker-1"), "admin").unwrap();

        mgr.drain(&node.id).unwrap();
        let drained = mgr.get(&node.id).unwrap();
        assert_eq!(drained.status, NodeStatus::Draining);
        assert!(drained.unschedulable);
        assert!(!drained.is_schedulable());

        mgr.uncordon(&node.id).unwrap();
        let restored = mgr.get(&node.id).unwrap();
        assert_eq!(restored.status, NodeStatus::Online);
        assert!(restored.is_schedulable());
    }

    #[test]
    fn test_allocate_release_roundtrip() {
        let mgr = manager();
        let node = mgr.register(register_input("worker-1"), "admin").unwrap();
        let requests = PodResources::new(400, 1024);

        mgr.allocate_resources(&node.id, &requests).unwrap();
        let allocated = mgr.get(&node.id).unwrap().allocated;
        assert_eq!(allocated.cpu, 400);
        assert_eq!(allocated.pods, 1);

        mgr.release_resources(&node.id, &requests).unwrap();
        assert_eq!(mgr.get(&node.id).unwrap().allocated, NodeResources::default());
    }

    #[test]
    fn test_allocate_insufficient_fails() {
        let mgr = manager();
        let node = mgr.register(register_input("worker-1"), "admin").unwrap();

        let err = mgr
            .allocate_resources(&node.id, &PodResources::new(2000, 0))
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);
        // Nothing was reserved
        assert_eq!(mgr.get(&node.id).unwrap().allocated, NodeResources::default());
    }

    #[test]
    fn test_release_clamps_at_zero() {
        let mgr = manager();
        let node = mgr.register(register_input("worker-1"), "admin").unwrap();

        mgr.release_resources(&node.id, &PodResources::new(500, 500))
            .unwrap();
        assert_eq!(mgr.get(&node.id).unwrap().allocated, NodeResources::default());
    }

    #[test]
    fn test_taint_idempotence() {
        let mgr = manager();
        let node = mgr.register(register_input("worker-1"), "admin").unwrap();
        let taint = Taint {
            key: "dedicated".to_string(),
            value: "gpu".to_string(),
            effect: TaintEffect::NoSchedule,
        };

        mgr.add_taint(&node.id, taint.clone()).unwrap();
        mgr.add_taint(&node.id, taint.clone()).unwrap();
        assert_eq!(mgr.get(&node.id).unwrap().taints.len(), 1);

        mgr.remove_taint(&node.id, &taint).unwrap();
        mgr.remove_taint(&node.id, &taint).unwrap();
        assert!(mgr.get(&node.id).unwrap().taints.is_empty());
    }

    #[test]
    fn test_annotations_roundtrip() {
        let mgr = manager();
        let node = mgr.register(register_input("worker-1"), "admin").unwrap();

        mgr.add_annotation(&node.id, "topology/rack", "r12").unwrap();
        assert_eq!(
            mgr.get(&node.id).unwrap().annotations.get("topology/rack"),
            Some(&"r12".to_string())
        );

        mgr.remove_annotation(&node.id, "topology/rack").unwrap();
        mgr.remove_annotation(&node.id, "topology/rack").unwrap();
        assert!(mgr.get(&node.id).unwrap().annotations.is_empty());
    }

    #[test]
    fn test_deregister_requires_owner() {
        let mgr = manager();
        let node = mgr.register(register_input("worker-1"), "admin").unwrap();

        let err = mgr.deregister(&node.id, "intruder").unwrap_err();
        assert_eq!(err.code, ErrorCode::Forbidden);

        mgr.deregister(&node.id, "admin").unwrap();
        assert!(mgr.get(&node.id).is_none());
    }
}
