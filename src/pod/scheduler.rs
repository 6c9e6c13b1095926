//! Pod scheduler - creation, placement, lifecycle, preemption, rollback
//!
//! The scheduler sits at the root of the manager dependency tree: it
//! resolves packs through the registry, enforces namespace quota at pod
//! creation, places pending pods against the node manager's view with the
//! filter/score pipeline, walks pods through the status machine, and
//! releases node and namespace resources exactly once on every terminal
//! transition.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{ErrorCode, OpError, OpResult};
use crate::namespace::{LimitRangeBounds, NamespaceManager, NamespacePhase};
use crate::node::{Node, NodeManager, RuntimeType};
use crate::pack::semver::compare_versions;
use crate::pack::{PackRegistry, RuntimeTag};
use crate::resources::{NodeResources, PodResources};
use crate::state::{ClusterState, PreemptionPolicy};

use super::filter::{passes_filters, passes_non_resource_filters};
use super::score::{score_node, SchedulingPolicy};
use super::{
    Pod, PodHistoryAction, PodHistoryEntry, PodStatus, SchedulingConfig, Toleration,
};

/// Scheduler configuration
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Binding attempts before a placement gives up (default 3)
    pub max_retries: u32,

    /// Priority used when a pod names no (or an unknown) priority class
    pub default_priority: i64,

    /// Whether placement may evict lower-priority pods (default false)
    pub enable_preemption: bool,

    /// Score shaping policy (default spread)
    pub scheduling_policy: SchedulingPolicy,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            default_priority: 0,
            enable_preemption: false,
            scheduling_policy: SchedulingPolicy::Spread,
        }
    }
}

/// Input for creating a pod
#[derive(Debug, Clone, Default)]
pub struct CreatePodInput {
    pub pack_id: String,

    /// Overrides the pack's current version when set
    pub pack_version: Option<String>,

    /// Defaults to `default`
    pub namespace: Option<String>,

    pub labels: HashMap<String, String>,
    pub annotations: HashMap<String, String>,
    pub priority_class_name: Option<String>,
    pub tolerations: Vec<Toleration>,

    /// Partial requests; unset axes are filled from the namespace limit range
    pub resource_requests: LimitRangeBounds,

    /// Partial limits; unset axes are filled from the namespace limit range
    pub resource_limits: LimitRangeBounds,

    pub scheduling: SchedulingConfig,
    pub metadata: HashMap<String, String>,
}

/// Outcome of failing over every pod on a dead node
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailoverReport {
    pub failed: usize,
    pub pod_ids: Vec<String>,
}

/// Outcome of one pending-pod placement sweep
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleSweep {
    /// Pods placed during this sweep
    pub scheduled: Vec<String>,
    /// Pods still pending afterwards
    pub remaining: usize,
}

/// Patch applied by [`PodScheduler::update`]; mutable metadata only
#[derive(Debug, Clone, Default)]
pub struct UpdatePodInput {
    pub labels: Option<HashMap<String, String>>,
    pub annotations: Option<HashMap<String, String>>,
    pub metadata: Option<HashMap<String, String>>,
}

/// Places pods onto nodes and owns the pod lifecycle
pub struct PodScheduler {
    state: Arc<ClusterState>,
    nodes: Arc<NodeManager>,
    namespaces: Arc<NamespaceManager>,
    packs: Arc<PackRegistry>,
    config: SchedulerConfig,
}

impl PodScheduler {
    pub fn new(
        state: Arc<ClusterState>,
        nodes: Arc<NodeManager>,
        namespaces: Arc<NamespaceManager>,
        packs: Arc<PackRegistry>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            state,
            nodes,
            namespaces,
            packs,
            config,
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    // =========================================================================
    // Creation
    // =========================================================================

    /// Create a pod in `pending`, reserving namespace quota immediately
    ///
    /// A pod with no compatible node stays pending; that is not a failure.
    pub fn create(&self, input: CreatePodInput, created_by: &str) -> OpResult<Pod> {
        let pack = self.packs.get(&input.pack_id).ok_or_else(|| {
            OpError::new(
                ErrorCode::PackNotFound,
                format!("pack '{}' not found", input.pack_id),
            )
        })?;
        let pack_version = input.pack_version.unwrap_or_else(|| pack.version.clone());

        let namespace = input
            .namespace
            .unwrap_or_else(|| crate::namespace::NAMESPACE_DEFAULT.to_string());
        let ns = self.namespaces.get(&namespace).ok_or_else(|| {
            OpError::new(
                ErrorCode::NamespaceNotFound,
                format!("namespace '{}' not found", namespace),
            )
        })?;
        if ns.phase == NamespacePhase::Terminating {
            return Err(OpError::new(
                ErrorCode::NamespaceTerminating,
                format!("namespace '{}' is terminating and accepts no new pods", namespace),
            ));
        }

        let priority = input
            .priority_class_name
            .as_deref()
            .and_then(|name| self.state.get_priority_class(name))
            .map(|class| class.value)
            .unwrap_or(self.config.default_priority);

        // Limit-range defaulting and validation precede the quota check
        let (requests, limits) = self.namespaces.apply_defaults(
            &namespace,
            input.resource_requests,
            input.resource_limits,
        )?;
        self.namespaces
            .validate_resources(&namespace, &requests, &limits)?;

        let resource_requests = PodResources {
            cpu: requests.cpu.unwrap_or(0),
            memory: requests.memory.unwrap_or(0),
        };
        let resource_limits = PodResources {
            cpu: limits.cpu.unwrap_or(0),
            memory: limits.memory.unwrap_or(0),
        };

        // Quota is reserved from creation; node allocation happens at schedule
        self.namespaces
            .allocate_resources(&namespace, &resource_requests.as_node_footprint())
            .map_err(|err| OpError {
                code: ErrorCode::NamespaceQuotaExceeded,
                ..err
            })?;

        let now = Utc::now();
        let pod = Pod {
            id: Uuid::new_v4().to_string(),
            pack_id: pack.id,
            pack_version,
            node_id: None,
            status: PodStatus::Pending,
            status_message: None,
            namespace,
            labels: input.labels,
            annotations: input.annotations,
            priority_class_name: input.priority_class_name,
            priority,
            tolerations: input.tolerations,
            resource_requests,
            resource_limits,
            scheduling: input.scheduling,
            created_by: created_by.to_string(),
            metadata: input.metadata,
            scheduled_at: None,
            started_at: None,
            stopped_at: None,
            created_at: now,
            updated_at: now,
            resources_released: false,
        };

        self.state.append_pod_history(
            &pod.id,
            PodHistoryEntry::new(PodHistoryAction::Created)
                .with_status(None, PodStatus::Pending)
                .with_actor(Some(created_by)),
        );
        info!(pod = %pod.id, namespace = %pod.namespace, pack = %pod.pack_id, "pod created");
        self.state.pods.insert(pod.id.clone(), pod.clone());
        Ok(pod)
    }

    // =========================================================================
    // Placement
    // =========================================================================

    /// Place a pending pod onto the best-scoring compatible node
    pub fn schedule(&self, pod_id: &str) -> OpResult<Pod> {
        let pod = self.get(pod_id).ok_or_else(|| pod_not_found(pod_id))?;
        if pod.status != PodStatus::Pending {
            return Err(OpError::new(
                ErrorCode::InvalidStatusTransition,
                format!("pod '{}' is {:?}, only pending pods can be scheduled", pod_id, pod.status),
            ));
        }

        let pack = self.packs.get(&pod.pack_id).ok_or_else(|| {
            OpError::new(
                ErrorCode::PackNotFound,
                format!("pack '{}' not found", pod.pack_id),
            )
        })?;
        let runtime = self.preferred_runtime(pack.runtime_tag);

        let candidates: Vec<Node> = self
            .nodes
            .list()
            .into_iter()
            .filter(|node| passes_filters(node, &pod, runtime))
            .collect();

        if candidates.is_empty() {
            if self.config.enable_preemption && self.may_preempt(&pod) {
                return self.schedule_with_preemption(&pod, runtime);
            }
            return Err(OpError::new(
                ErrorCode::NoCompatibleNodes,
                format!("no compatible nodes for pod '{}'", pod_id),
            ));
        }

        // Score each candidate once; a stable sort keeps the first candidate
        // encountered ahead on ties
        let mut scored: Vec<(Node, f64)> = candidates
            .into_iter()
            .map(|node| {
                let score = self.score(&node, &pod);
                debug!(pod = pod_id, node = %node.name, score, "candidate scored");
                (node, score)
            })
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        let mut last_err = None;
        for (node, _) in scored.iter().take(self.config.max_retries.max(1) as usize) {
            match self.bind(pod_id, &node.id, &pod.resource_requests) {
                Ok(pod) => return Ok(pod),
                Err(err) => {
                    debug!(pod = pod_id, node = %node.name, error = %err, "binding attempt failed");
                    last_err = Some(err);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| {
            OpError::new(
                ErrorCode::NoCompatibleNodes,
                format!("no compatible nodes for pod '{}'", pod_id),
            )
        }))
    }

    /// Attempt to place every pending pod
    ///
    /// Pods with no compatible node simply stay pending; genuine errors are
    /// logged and skipped so one broken pod cannot stall the sweep.
    pub fn schedule_pending(&self) -> ScheduleSweep {
        let pending = self.list_by_status(PodStatus::Pending);
        let mut scheduled = Vec::new();
        let mut remaining = 0usize;

        for pod in pending {
            match self.schedule(&pod.id) {
                Ok(_) => scheduled.push(pod.id),
                Err(err)
                    if matches!(
                        err.code,
                        ErrorCode::NoCompatibleNodes | ErrorCode::PreemptionFailed
                    ) =>
                {
                    remaining += 1;
                }
                Err(err) => {
                    warn!(pod = %pod.id, error = %err, "pending pod could not be scheduled");
                    remaining += 1;
                }
            }
        }

        if !scheduled.is_empty() {
            debug!(placed = scheduled.len(), remaining, "pending sweep complete");
        }
        ScheduleSweep {
            scheduled,
            remaining,
        }
    }

    /// The runtime candidates must provide for this pack
    ///
    /// Universal packs prefer `node` workers when any schedulable one
    /// exists, falling back to `browser`.
    fn preferred_runtime(&self, tag: RuntimeTag) -> RuntimeType {
        match tag {
            RuntimeTag::Node => RuntimeType::Node,
            RuntimeTag::Browser => RuntimeType::Browser,
            RuntimeTag::Universal => {
                let has_node_runtime = self
                    .nodes
                    .schedulable_nodes()
                    .iter()
                    .any(|n| n.runtime_type == RuntimeType::Node);
                if has_node_runtime {
                    RuntimeType::Node
                } else {
                    RuntimeType::Browser
                }
            }
        }
    }

    fn score(&self, node: &Node, pod: &Pod) -> f64 {
        let resident: Vec<Pod> = self
            .state
            .pods_on_node(&node.id)
            .into_iter()
            .filter(|p| p.status.holds_resources())
            .collect();
        score_node(node, pod, &resident, self.config.scheduling_policy)
    }

    /// Reserve node resources and flip the pod to scheduled
    fn bind(&self, pod_id: &str, node_id: &str, requests: &PodResources) -> OpResult<Pod> {
        self.nodes.allocate_resources(node_id, requests)?;

        let updated = {
            let mut pod = match self.state.pods.get_mut(pod_id) {
                Some(pod) => pod,
                None => {
                    // Pod vanished between planning and binding; undo
                    self.nodes.release_resources(node_id, requests)?;
                    return Err(pod_not_found(pod_id));
                }
            };
            let now = Utc::now();
            pod.node_id = Some(node_id.to_string());
            pod.status = PodStatus::Scheduled;
            pod.scheduled_at = Some(now);
            pod.updated_at = now;
            pod.clone()
        };

        self.state.append_pod_history(
            pod_id,
            PodHistoryEntry::new(PodHistoryAction::Scheduled)
                .with_status(Some(PodStatus::Pending), PodStatus::Scheduled)
                .with_node(node_id),
        );
        info!(pod = pod_id, node = node_id, "pod scheduled");
        Ok(updated)
    }

    // =========================================================================
    // Preemption
    // =========================================================================

    /// Whether this pod's priority class permits preemption
    ///
    /// Pods with no class, or an unknown class, may preempt.
    fn may_preempt(&self, pod: &Pod) -> bool {
        pod.priority_class_name
            .as_deref()
            .and_then(|name| self.state.get_priority_class(name))
            .map(|class| class.preemption_policy != PreemptionPolicy::Never)
            .unwrap_or(true)
    }

    /// Clear room on the first feasible node by evicting lower-priority pods
    fn schedule_with_preemption(&self, pod: &Pod, runtime: RuntimeType) -> OpResult<Pod> {
        let needed = pod.resource_requests.as_node_footprint();

        for node in self.nodes.list() {
            if !passes_non_resource_filters(&node, pod, runtime) {
                continue;
            }

            // Victims by ascending priority; only strictly lower priorities
            let mut residents: Vec<Pod> = self
                .state
                .pods_on_node(&node.id)
                .into_iter()
                .filter(|p| {
                    matches!(
                        p.status,
                        PodStatus::Scheduled | PodStatus::Starting | PodStatus::Running
                    )
                })
                .collect();
            residents.sort_by_key(|p| p.priority);

            let mut freed = NodeResources::default();
            let mut victims: Vec<Pod> = Vec::new();
            for victim in residents {
                if needed.fits_within(&node.available().saturating_add(&freed)) {
                    break;
                }
                if victim.priority >= pod.priority {
                    break;
                }
                freed = freed.saturating_add(&victim.resource_requests.as_node_footprint());
                victims.push(victim);
            }

            if !needed.fits_within(&node.available().saturating_add(&freed)) {
                continue;
            }

            let reason = format!("Preempted by pod {} with higher priority", pod.id);
            for victim in &victims {
                warn!(victim = %victim.id, node = %node.name, preemptor = %pod.id, "evicting pod for preemption");
                self.evict(&victim.id, &reason)?;
            }
            return self.bind(&pod.id, &node.id, &pod.resource_requests);
        }

        Err(OpError::new(
            ErrorCode::PreemptionFailed,
            format!("no node could be cleared for pod '{}'", pod.id),
        ))
    }

    // =========================================================================
    // Status machine
    // =========================================================================

    /// Mark a scheduled pod as starting on its node
    pub fn start(&self, pod_id: &str) -> OpResult<Pod> {
        self.update_status(pod_id, PodStatus::Starting, None, None)
    }

    /// Mark a starting pod as running; stamps `startedAt`
    pub fn mark_running(&self, pod_id: &str) -> OpResult<Pod> {
        self.update_status(pod_id, PodStatus::Running, None, None)
    }

    /// Begin stopping a placed pod
    pub fn stop(&self, pod_id: &str) -> OpResult<Pod> {
        self.update_status(pod_id, PodStatus::Stopping, None, None)
    }

    /// Finish stopping; terminal, releases resources
    pub fn mark_stopped(&self, pod_id: &str) -> OpResult<Pod> {
        self.update_status(pod_id, PodStatus::Stopped, None, None)
    }

    /// Fail a pod with a reason; terminal, releases resources
    pub fn fail(&self, pod_id: &str, reason: &str) -> OpResult<Pod> {
        self.update_status(pod_id, PodStatus::Failed, Some(reason), None)
    }

    /// Evict a pod with a reason; terminal, releases resources
    pub fn evict(&self, pod_id: &str, reason: &str) -> OpResult<Pod> {
        self.update_status(pod_id, PodStatus::Evicted, Some(reason), None)
    }

    /// Transition a pod, deriving the history action from the target status
    pub fn update_status(
        &self,
        pod_id: &str,
        target: PodStatus,
        reason: Option<&str>,
        actor: Option<&str>,
    ) -> OpResult<Pod> {
        let (updated, release) = {
            let mut pod = self
                .state
                .pods
                .get_mut(pod_id)
                .ok_or_else(|| pod_not_found(pod_id))?;

            if !pod.status.can_transition_to(target) {
                return Err(OpError::new(
                    ErrorCode::InvalidStatusTransition,
                    format!("pod '{}' cannot go {:?} -> {:?}", pod_id, pod.status, target),
                ));
            }

            let previous = pod.status;
            let now = Utc::now();
            pod.status = target;
            pod.status_message = reason.map(|r| r.to_string());
            pod.updated_at = now;

            if target == PodStatus::Running {
                pod.started_at = Some(now);
            }

            // Terminal transitions release exactly once; the flag is flipped
            // under the same entry guard as the transition itself
            let mut release = None;
            if target.is_terminal() {
                pod.stopped_at = Some(now);
                if !pod.resources_released {
                    pod.resources_released = true;
                    release = Some((pod.node_id.clone(), pod.namespace.clone(), pod.resource_requests));
                }
            }

            let mut entry = PodHistoryEntry::new(history_action(target))
                .with_status(Some(previous), target)
                .with_actor(actor);
            if let Some(reason) = reason {
                entry = entry.with_reason(reason);
            }
            self.state.append_pod_history(pod_id, entry);

            (pod.clone(), release)
        };

        if let Some((node_id, namespace, requests)) = release {
            self.release(pod_id, node_id.as_deref(), &namespace, &requests);
        }

        debug!(pod = pod_id, status = ?updated.status, "pod status updated");
        Ok(updated)
    }

    /// Release node and namespace accounting for a terminal pod
    fn release(
        &self,
        pod_id: &str,
        node_id: Option<&str>,
        namespace: &str,
        requests: &PodResources,
    ) {
        if let Some(node_id) = node_id {
            if let Err(err) = self.nodes.release_resources(node_id, requests) {
                warn!(pod = pod_id, node = node_id, error = %err, "node release failed");
            }
        }
        if let Err(err) = self
            .namespaces
            .release_resources(namespace, &requests.as_node_footprint())
        {
            warn!(pod = pod_id, namespace, error = %err, "namespace release failed");
        }
    }

    // =========================================================================
    // Failover
    // =========================================================================

    /// Fail every live pod on a node; called by the unhealthy-node hook
    pub fn fail_pods_on_node(&self, node_id: &str, reason: &str) -> FailoverReport {
        let victims: Vec<String> = self
            .state
            .pods
            .iter()
            .filter(|p| p.node_id.as_deref() == Some(node_id) && !p.status.is_terminal())
            .map(|p| p.id.clone())
            .collect();

        let mut failed = Vec::new();
        for pod_id in victims {
            match self.fail(&pod_id, reason) {
                Ok(_) => failed.push(pod_id),
                Err(err) => warn!(pod = %pod_id, error = %err, "failover transition failed"),
            }
        }

        if !failed.is_empty() {
            info!(node = node_id, count = failed.len(), "pods failed over from dead node");
        }
        FailoverReport {
            failed: failed.len(),
            pod_ids: failed,
        }
    }

    // =========================================================================
    // Rollback
    // =========================================================================

    /// Point a placed pod at a different version of its pack
    ///
    /// The rollback itself does not reschedule; a subsequent restart on the
    /// same node picks up the new version.
    pub fn rollback(&self, pod_id: &str, target_version: &str, actor: Option<&str>) -> OpResult<Pod> {
        let pod = self.get(pod_id).ok_or_else(|| pod_not_found(pod_id))?;

        if !matches!(
            pod.status,
            PodStatus::Scheduled | PodStatus::Starting | PodStatus::Running
        ) {
            return Err(OpError::new(
                ErrorCode::InvalidStatusTransition,
                format!("pod '{}' is {:?}; rollback requires a placed pod", pod_id, pod.status),
            ));
        }

        let current_pack = self.packs.get(&pod.pack_id).ok_or_else(|| {
            OpError::new(
                ErrorCode::PackNotFound,
                format!("pack '{}' not found", pod.pack_id),
            )
        })?;

        if compare_versions(target_version, &pod.pack_version) == std::cmp::Ordering::Equal {
            return Err(OpError::new(
                ErrorCode::SameVersion,
                format!("pod '{}' already runs version {}", pod_id, pod.pack_version),
            ));
        }

        let target_pack = self
            .packs
            .find_version(&current_pack.name, target_version)
            .ok_or_else(|| {
                OpError::new(
                    ErrorCode::VersionNotFound,
                    format!("pack '{}@{}' not found", current_pack.name, target_version),
                )
            })?;

        if let Some(node_id) = &pod.node_id {
            let node = self
                .nodes
                .get(node_id)
                .ok_or_else(|| OpError::new(ErrorCode::NodeNotFound, format!("node '{}' not found", node_id)))?;
            if !target_pack.runtime_tag.compatible_with(node.runtime_type) {
                return Err(OpError::new(
                    ErrorCode::RuntimeMismatch,
                    format!(
                        "pack '{}@{}' does not run on {:?} nodes",
                        current_pack.name, target_version, node.runtime_type
                    ),
                ));
            }
        }

        let previous_version = pod.pack_version.clone();
        let updated = {
            let mut pod = self
                .state
                .pods
                .get_mut(pod_id)
                .ok_or_else(|| pod_not_found(pod_id))?;
            pod.pack_id = target_pack.id.clone();
            pod.pack_version = target_pack.version.clone();
            pod.updated_at = Utc::now();
            pod.clone()
        };

        self.state.append_pod_history(
            pod_id,
            PodHistoryEntry::new(PodHistoryAction::RolledBack)
                .with_versions(&previous_version, &target_pack.version)
                .with_actor(actor),
        );
        info!(pod = pod_id, from = %previous_version, to = %target_pack.version, "pod rolled back");
        Ok(updated)
    }

    // =========================================================================
    // Deletion and queries
    // =========================================================================

    /// Update a pod's mutable metadata; the body and placement are immutable
    pub fn update(&self, pod_id: &str, patch: UpdatePodInput, actor: Option<&str>) -> OpResult<Pod> {
        let updated = {
            let mut pod = self
                .state
                .pods
                .get_mut(pod_id)
                .ok_or_else(|| pod_not_found(pod_id))?;
            if pod.status.is_terminal() {
                return Err(OpError::new(
                    ErrorCode::InvalidStatusTransition,
                    format!("pod '{}' is {:?} and no longer accepts updates", pod_id, pod.status),
                ));
            }

            if let Some(labels) = patch.labels {
                pod.labels = labels;
            }
            if let Some(annotations) = patch.annotations {
                pod.annotations = annotations;
            }
            if let Some(metadata) = patch.metadata {
                pod.metadata = metadata;
            }
            pod.updated_at = Utc::now();
            pod.clone()
        };

        self.state.append_pod_history(
            pod_id,
            PodHistoryEntry::new(PodHistoryAction::Updated)
                .with_status(Some(updated.status), updated.status)
                .with_actor(actor),
        );
        Ok(updated)
    }

    /// Remove a pod; a live pod requires `force` and is released first
    pub fn delete(&self, pod_id: &str, force: bool, actor: Option<&str>) -> OpResult<Pod> {
        let pod = self.get(pod_id).ok_or_else(|| pod_not_found(pod_id))?;

        if !pod.status.is_terminal() && !force {
            return Err(OpError::new(
                ErrorCode::InvalidStatusTransition,
                format!("pod '{}' is {:?}; pass force to delete a live pod", pod_id, pod.status),
            ));
        }

        let release = {
            let mut entry = self
                .state
                .pods
                .get_mut(pod_id)
                .ok_or_else(|| pod_not_found(pod_id))?;
            if !entry.resources_released {
                entry.resources_released = true;
                Some((entry.node_id.clone(), entry.namespace.clone(), entry.resource_requests))
            } else {
                None
            }
        };
        if let Some((node_id, namespace, requests)) = release {
            self.release(pod_id, node_id.as_deref(), &namespace, &requests);
        }

        let (_, removed) = self
            .state
            .pods
            .remove(pod_id)
            .ok_or_else(|| pod_not_found(pod_id))?;
        self.state.append_pod_history(
            pod_id,
            PodHistoryEntry::new(PodHistoryAction::Deleted)
                .with_status(Some(removed.status), removed.status)
                .with_actor(actor),
        );
        info!(pod = pod_id, "pod deleted");
        Ok(removed)
    }

    pub fn get(&self, pod_id: &str) -> Option<Pod> {
        self.state.pods.get(pod_id).map(|p| p.clone())
    }

    pub fn list(&self, namespace: Option<&str>) -> Vec<Pod> {
        self.state
            .pods
            .iter()
            .filter(|p| namespace.map(|ns| p.namespace == ns).unwrap_or(true))
            .map(|p| p.clone())
            .collect()
    }

    pub fn list_on_node(&self, node_id: &str) -> Vec<Pod> {
        self.state.pods_on_node(node_id)
    }

    pub fn list_by_status(&self, status: PodStatus) -> Vec<Pod> {
        self.state
            .pods
            .iter()
            .filter(|p| p.status == status)
            .map(|p| p.clone())
            .collect()
    }

    /// The pod's audit log, oldest first
    pub fn history(&self, pod_id: &str) -> Vec<PodHistoryEntry> {
        self.state.pod_history(pod_id)
    }
}

fn history_action(target: PodStatus) -> PodHistoryAction {
    match target {
        PodStatus::Scheduled => PodHistoryAction::Scheduled,
        PodStatus::Running => PodHistoryAction::Started,
        PodStatus::Stopped => PodHistoryAction::Stopped,
        PodStatus::Failed => PodHistoryAction::Failed,
        PodStatus::Evicted => PodHistoryAction::Evicted,
        _ => PodHistoryAction::Updated,
    }
}

fn pod_not_found(pod_id: &str) -> OpError {
    OpError::new(ErrorCode::PodNotFound, format!("pod '{}' not found", pod_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::namespace::{NamespaceManagerConfig, QuotaLimits, ResourceQuota};
    use crate::node::{NodeManagerConfig, RegisterNodeInput};
    use crate::pack::{PackRegistryConfig, RegisterPackInput};
    use crate::state::PriorityClass;

    struct Harness {
        state: Arc<ClusterState>,
        nodes: Arc<NodeManager>,
        namespaces: Arc<NamespaceManager>,
        packs: Arc<PackRegistry>,
        scheduler: PodScheduler,
    }

    fn harness(config: SchedulerConfig) -> Harness {
        let state = Arc::new(ClusterState::new());
        let nodes = Arc::new(NodeManager::new(state.clone(), NodeManagerConfig::default()));
        let namespaces = Arc::new(NamespaceManager::new(
            state.clone(),
            NamespaceManagerConfig::default(),
        ));
        let packs = Arc::new(PackRegistry::new(state.clone(), PackRegistryConfig::default()));
        let scheduler = PodScheduler::new(
            state.clone(),
            nodes.clone(),
            namespaces.clone(),
            packs.clone(),
            config,
        );
        Harness {
            state,
            nodes,
            namespaces,
            packs,
            scheduler,
        }
    }

    fn register_node(h: &Harness, name: &str, cpu: u64) -> Node {
        h.nodes
            .register(
                RegisterNodeInput {
                    name: name.to_string(),
                    runtime_type: Some(RuntimeType::Node),
                    allocatable: NodeResources {
                        cpu,
                        memory: 4096,
                        pods: 10,
                        storage: 0,
                    },
                    ..Default::default()
                },
                "admin",
            )
            .unwrap()
    }

    fn register_pack(h: &Harness, name: &str, version: &str, tag: RuntimeTag) -> crate::pack::Pack {
        h.packs
            .register(
                RegisterPackInput {
                    name: name.to_string(),
                    version: version.to_string(),
                    runtime_tag: tag,
                    description: None,
                    metadata: HashMap::new(),
                    bundle_ext: None,
                },
                "alice",
            )
            .unwrap()
            .pack
    }

    fn pod_input(pack_id: &str, cpu: u64) -> CreatePodInput {
        CreatePodInput {
            pack_id: pack_id.to_string(),
            resource_requests: LimitRangeBounds {
                cpu: Some(cpu),
                memory: Some(256),
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_create_reserves_quota_and_writes_history() {
        let h = harness(SchedulerConfig::default());
        let pack = register_pack(&h, "svc", "1.0.0", RuntimeTag::Node);

        let pod = h.scheduler.create(pod_input(&pack.id, 100), "alice").unwrap();

        assert_eq!(pod.status, PodStatus::Pending);
        assert!(pod.node_id.is_none());

        let usage = h.namespaces.get("default").unwrap().resource_usage;
        assert_eq!(usage.pods, 1);
        assert_eq!(usage.cpu, 100);

        let history = h.scheduler.history(&pod.id);
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].action, PodHistoryAction::Created);
    }

    #[test]
    fn test_create_unknown_pack_fails() {
        let h = harness(SchedulerConfig::default());
        let err = h.scheduler.create(pod_input("ghost", 100), "alice").unwrap_err();
        assert_eq!(err.code, ErrorCode::PackNotFound);
    }

    #[test]
    fn test_create_in_terminating_namespace_fails() {
        let h = harness(SchedulerConfig::default());
        let pack = register_pack(&h, "svc", "1.0.0", RuntimeTag::Node);
        h.namespaces
            .create(
                crate::namespace::CreateNamespaceInput {
                    name: "team-a".to_string(),
                    ..Default::default()
                },
                "alice",
            )
            .unwrap();
        h.namespaces.mark_terminating("team-a").unwrap();

        let mut input = pod_input(&pack.id, 100);
        input.namespace = Some("team-a".to_string());
        let err = h.scheduler.create(input, "alice").unwrap_err();
        assert_eq!(err.code, ErrorCode::NamespaceTerminating);
    }

    #[test]
    fn test_create_resolves_priority_class() {
        let h = harness(SchedulerConfig::default());
        let pack = register_pack(&h, "svc", "1.0.0", RuntimeTag::Node);
        h.state.put_priority_class(PriorityClass {
            name: "critical".to_string(),
            value: 1000,
            preemption_policy: PreemptionPolicy::PreemptLowerPriority,
        });

        let mut input = pod_input(&pack.id, 100);
        input.priority_class_name = Some("critical".to_string());
        let pod = h.scheduler.create(input, "alice").unwrap();
        assert_eq!(pod.priority, 1000);

        // Unknown class falls back to the configured default
        let mut input = pod_input(&pack.id, 100);
        input.priority_class_name = Some("unknown".to_string());
        let pod = h.scheduler.create(input, "alice").unwrap();
        assert_eq!(pod.priority, 0);
    }

    #[test]
    fn test_quota_precheck_blocks_third_pod() {
        let h = harness(SchedulerConfig::default());
        let pack = register_pack(&h, "svc", "1.0.0", RuntimeTag::Node);
        h.namespaces
            .create(
                crate::namespace::CreateNamespaceInput {
                    name: "capped".to_string(),
                    resource_quota: Some(ResourceQuota {
                        hard: QuotaLimits {
                            pods: Some(2),
                            ..Default::default()
                        },
                    }),
                    ..Default::default()
                },
                "alice",
            )
            .unwrap();

        let make_input = || {
            let mut input = pod_input(&pack.id, 10);
            input.namespace = Some("capped".to_string());
            input
        };

        h.scheduler.create(make_input(), "alice").unwrap();
        h.scheduler.create(make_input(), "alice").unwrap();
        let err = h.scheduler.create(make_input(), "alice").unwrap_err();

        assert_eq!(err.code, ErrorCode::NamespaceQuotaExceeded);
        let details = err.details.unwrap();
        let axes: Vec<&str> = details["exceededResources"]
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["resource"].as_str().unwrap())
            .collect();
        assert!(axes.contains(&"pods"));
    }

    #[test]
    fn test_schedule_spreads_across_nodes() {
        let h = harness(SchedulerConfig::default());
        let a = register_node(&h, "node-a", 1000);
        let b = register_node(&h, "node-b", 1000);
        let pack = register_pack(&h, "svc", "1.0.0", RuntimeTag::Node);

        let p1 = h.scheduler.create(pod_input(&pack.id, 100), "alice").unwrap();
        let p1 = h.scheduler.schedule(&p1.id).unwrap();
        let p2 = h.scheduler.create(pod_input(&pack.id, 100), "alice").unwrap();
        let p2 = h.scheduler.schedule(&p2.id).unwrap();

        let placed: std::collections::HashSet<String> =
            [p1.node_id.unwrap(), p2.node_id.unwrap()].into_iter().collect();
        assert_eq!(placed, [a.id, b.id].into_iter().collect());
    }

    #[test]
    fn test_schedule_requires_pending() {
        let h = harness(SchedulerConfig::default());
        register_node(&h, "node-a", 1000);
        let pack = register_pack(&h, "svc", "1.0.0", RuntimeTag::Node);

        let pod = h.scheduler.create(pod_input(&pack.id, 100), "alice").unwrap();
        h.scheduler.schedule(&pod.id).unwrap();

        let err = h.scheduler.schedule(&pod.id).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidStatusTransition);
    }

    #[test]
    fn test_schedule_allocates_node_resources() {
        let h = harness(SchedulerConfig::default());
        let node = register_node(&h, "node-a", 1000);
        let pack = register_pack(&h, "svc", "1.0.0", RuntimeTag::Node);

        let pod = h.scheduler.create(pod_input(&pack.id, 400), "alice").unwrap();
        h.scheduler.schedule(&pod.id).unwrap();

        let allocated = h.nodes.get(&node.id).unwrap().allocated;
        assert_eq!(allocated.cpu, 400);
        assert_eq!(allocated.pods, 1);
    }

    #[test]
    fn test_schedule_no_nodes_stays_pending() {
        let h = harness(SchedulerConfig::default());
        let pack = register_pack(&h, "svc", "1.0.0", RuntimeTag::Node);

        let pod = h.scheduler.create(pod_input(&pack.id, 100), "alice").unwrap();
        let err = h.scheduler.schedule(&pod.id).unwrap_err();

        assert_eq!(err.code, ErrorCode::NoCompatibleNodes);
        assert_eq!(h.scheduler.get(&pod.id).unwrap().status, PodStatus::Pending);
    }

    #[test]
    fn test_required_affinity_rejects_incompatible() {
        let h = harness(SchedulerConfig::default());
        let node = register_node(&h, "node-a", 1000);
        h.nodes.add_label(&node.id, "zone", "east").unwrap();
        let pack = register_pack(&h, "svc", "1.0.0", RuntimeTag::Node);

        let mut input = pod_input(&pack.id, 100);
        input.scheduling.node_affinity = Some(crate::pod::NodeAffinity {
            required: Some(crate::pod::NodeSelector {
                node_selector_terms: vec![crate::pod::NodeSelectorTerm {
                    match_expressions: vec![crate::pod::NodeSelectorRequirement {
                        key: "zone".to_string(),
                        operator: crate::pod::NodeSelectorOperator::In,
                        values: vec!["west".to_string()],
                    }],
                }],
            }),
            preferred: vec![],
        });

        let pod = h.scheduler.create(input, "alice").unwrap();
        let err = h.scheduler.schedule(&pod.id).unwrap_err();
        assert_eq!(err.code, ErrorCode::NoCompatibleNodes);
    }

    #[test]
    fn test_universal_pack_prefers_node_runtime() {
        let h = harness(SchedulerConfig::default());
        register_node(&h, "node-a", 1000);
        let browser = h
            .nodes
            .register(
                RegisterNodeInput {
                    name: "browser-a".to_string(),
                    runtime_type: Some(RuntimeType::Browser),
                    allocatable: NodeResources {
                        cpu: 1000,
                        memory: 4096,
                        pods: 10,
                        storage: 0,
                    },
                    ..Default::default()
                },
                "admin",
            )
            .unwrap();
        let pack = register_pack(&h, "svc", "1.0.0", RuntimeTag::Universal);

        let pod = h.scheduler.create(pod_input(&pack.id, 100), "alice").unwrap();
        let pod = h.scheduler.schedule(&pod.id).unwrap();
        assert_ne!(pod.node_id.as_deref(), Some(browser.id.as_str()));
    }

    #[test]
    fn test_lifecycle_timestamps_ordered() {
        let h = harness(SchedulerConfig::default());
        register_node(&h, "node-a", 1000);
        let pack = register_pack(&h, "svc", "1.0.0", RuntimeTag::Node);

        let pod = h.scheduler.create(pod_input(&pack.id, 100), "alice").unwrap();
        h.scheduler.schedule(&pod.id).unwrap();
        h.scheduler.start(&pod.id).unwrap();
        h.scheduler.mark_running(&pod.id).unwrap();
        h.scheduler.stop(&pod.id).unwrap();
        let pod = h.scheduler.mark_stopped(&pod.id).unwrap();

        let scheduled_at = pod.scheduled_at.unwrap();
        let started_at = pod.started_at.unwrap();
        let stopped_at = pod.stopped_at.unwrap();
        assert!(scheduled_at <= started_at);
        assert!(started_at <= stopped_at);
    }

    #[test]
    fn test_terminal_release_is_exactly_once() {
        let h = harness(SchedulerConfig::default());
        let node = register_node(&h, "node-a", 1000);
        let pack = register_pack(&h, "svc", "1.0.0", RuntimeTag::Node);

        let pod = h.scheduler.create(pod_input(&pack.id, 100), "alice").unwrap();
        h.scheduler.schedule(&pod.id).unwrap();
        h.scheduler.fail(&pod.id, "crash").unwrap();

        assert_eq!(h.nodes.get(&node.id).unwrap().allocated, NodeResources::default());
        assert_eq!(
            h.namespaces.get("default").unwrap().resource_usage,
            NodeResources::default()
        );

        // A second terminal transition is rejected, and deleting the
        // already-released pod releases nothing further
        assert_eq!(
            h.scheduler.fail(&pod.id, "again").unwrap_err().code,
            ErrorCode::InvalidStatusTransition
        );
        h.scheduler.delete(&pod.id, false, None).unwrap();
        assert_eq!(h.nodes.get(&node.id).unwrap().allocated, NodeResources::default());
        assert_eq!(
            h.namespaces.get("default").unwrap().resource_usage,
            NodeResources::default()
        );
    }

    #[test]
    fn test_preemption_evicts_lower_priority() {
        let h = harness(SchedulerConfig {
            enable_preemption: true,
            ..Default::default()
        });
        let node = register_node(&h, "node-a", 1000);
        let pack = register_pack(&h, "svc", "1.0.0", RuntimeTag::Node);

        h.state.put_priority_class(PriorityClass {
            name: "low".to_string(),
            value: 1,
            preemption_policy: PreemptionPolicy::PreemptLowerPriority,
        });
        h.state.put_priority_class(PriorityClass {
            name: "high".to_string(),
            value: 10,
            preemption_policy: PreemptionPolicy::PreemptLowerPriority,
        });

        // Low-priority pod occupying 900 cpu
        let mut low = pod_input(&pack.id, 900);
        low.priority_class_name = Some("low".to_string());
        let low = h.scheduler.create(low, "alice").unwrap();
        h.scheduler.schedule(&low.id).unwrap();
        h.scheduler.start(&low.id).unwrap();
        h.scheduler.mark_running(&low.id).unwrap();

        // High-priority pod needing 500 cpu
        let mut high = pod_input(&pack.id, 500);
        high.priority_class_name = Some("high".to_string());
        let high = h.scheduler.create(high, "alice").unwrap();
        let high = h.scheduler.schedule(&high.id).unwrap();

        assert_eq!(high.status, PodStatus::Scheduled);
        assert_eq!(high.node_id.as_deref(), Some(node.id.as_str()));

        let evicted = h.scheduler.get(&low.id).unwrap();
        assert_eq!(evicted.status, PodStatus::Evicted);
        assert!(evicted
            .status_message
            .as_deref()
            .unwrap()
            .contains(&format!("Preempted by pod {}", high.id)));

        // Only the preemptor's resources remain allocated
        assert_eq!(h.nodes.get(&node.id).unwrap().allocated.cpu, 500);
    }

    #[test]
    fn test_preemption_disabled_fails_plain() {
        let h = harness(SchedulerConfig::default());
        register_node(&h, "node-a", 1000);
        let pack = register_pack(&h, "svc", "1.0.0", RuntimeTag::Node);

        let low = h.scheduler.create(pod_input(&pack.id, 900), "alice").unwrap();
        h.scheduler.schedule(&low.id).unwrap();

        let contender = h.scheduler.create(pod_input(&pack.id, 500), "alice").unwrap();
        let err = h.scheduler.schedule(&contender.id).unwrap_err();
        assert_eq!(err.code, ErrorCode::NoCompatibleNodes);
    }

    #[test]
    fn test_preemption_respects_never_policy() {
        let h = harness(SchedulerConfig {
            enable_preemption: true,
            ..Default::default()
        });
        register_node(&h, "node-a", 1000);
        let pack = register_pack(&h, "svc", "1.0.0", RuntimeTag::Node);

        h.state.put_priority_class(PriorityClass {
            name: "polite".to_string(),
            value: 100,
            preemption_policy: PreemptionPolicy::Never,
        });

        let low = h.scheduler.create(pod_input(&pack.id, 900), "alice").unwrap();
        h.scheduler.schedule(&low.id).unwrap();

        let mut contender = pod_input(&pack.id, 500);
        contender.priority_class_name = Some("polite".to_string());
        let contender = h.scheduler.create(contender, "alice").unwrap();
        let err = h.scheduler.schedule(&contender.id).unwrap_err();
        assert_eq!(err.code, ErrorCode::NoCompatibleNodes);
    }

    #[test]
    fn test_preemption_cannot_clear_equal_priority() {
        let h = harness(SchedulerConfig {
            enable_preemption: true,
            ..Default::default()
        });
        register_node(&h, "node-a", 1000);
        let pack = register_pack(&h, "svc", "1.0.0", RuntimeTag::Node);

        // Same priority (0 for both): nothing may be evicted
        let low = h.scheduler.create(pod_input(&pack.id, 900), "alice").unwrap();
        h.scheduler.schedule(&low.id).unwrap();

        let contender = h.scheduler.create(pod_input(&pack.id, 500), "alice").unwrap();
        let err = h.scheduler.schedule(&contender.id).unwrap_err();
        assert_eq!(err.code, ErrorCode::PreemptionFailed);
    }

    #[test]
    fn test_fail_pods_on_node() {
        let h = harness(SchedulerConfig::default());
        let node = register_node(&h, "node-a", 1000);
        let pack = register_pack(&h, "svc", "1.0.0", RuntimeTag::Node);

        let p1 = h.scheduler.create(pod_input(&pack.id, 100), "alice").unwrap();
        h.scheduler.schedule(&p1.id).unwrap();
        let p2 = h.scheduler.create(pod_input(&pack.id, 100), "alice").unwrap();
        h.scheduler.schedule(&p2.id).unwrap();

        let report = h.scheduler.fail_pods_on_node(&node.id, "node unhealthy");
        assert_eq!(report.failed, 2);

        for pod_id in [&p1.id, &p2.id] {
            assert_eq!(h.scheduler.get(pod_id).unwrap().status, PodStatus::Failed);
        }
        assert_eq!(h.nodes.get(&node.id).unwrap().allocated, NodeResources::default());
        assert_eq!(
            h.namespaces.get("default").unwrap().resource_usage,
            NodeResources::default()
        );
    }

    #[test]
    fn test_rollback_happy_path_and_history() {
        let h = harness(SchedulerConfig::default());
        register_node(&h, "node-a", 1000);
        let v1 = register_pack(&h, "svc", "1.0.0", RuntimeTag::Node);
        register_pack(&h, "svc", "2.0.0", RuntimeTag::Node);

        let mut input = pod_input(&v1.id, 100);
        input.pack_version = None;
        let pod = h.scheduler.create(input, "alice").unwrap();
        h.scheduler.schedule(&pod.id).unwrap();

        let rolled = h.scheduler.rollback(&pod.id, "2.0.0", Some("alice")).unwrap();
        assert_eq!(rolled.pack_version, "2.0.0");
        // Rollback does not reschedule
        assert_eq!(rolled.status, PodStatus::Scheduled);

        let history = h.scheduler.history(&pod.id);
        let entry = history
            .iter()
            .find(|e| e.action == PodHistoryAction::RolledBack)
            .unwrap();
        assert_eq!(entry.previous_version.as_deref(), Some("1.0.0"));
        assert_eq!(entry.new_version.as_deref(), Some("2.0.0"));
    }

    #[test]
    fn test_rollback_rejections() {
        let h = harness(SchedulerConfig::default());
        register_node(&h, "node-a", 1000);
        let v1 = register_pack(&h, "svc", "1.0.0", RuntimeTag::Node);
        register_pack(&h, "svc", "2.0.0", RuntimeTag::Browser);

        let pod = h.scheduler.create(pod_input(&v1.id, 100), "alice").unwrap();

        // Pending pods cannot roll back
        assert_eq!(
            h.scheduler.rollback(&pod.id, "2.0.0", None).unwrap_err().code,
            ErrorCode::InvalidStatusTransition
        );

        h.scheduler.schedule(&pod.id).unwrap();

        assert_eq!(
            h.scheduler.rollback(&pod.id, "1.0.0", None).unwrap_err().code,
            ErrorCode::SameVersion
        );
        assert_eq!(
            h.scheduler.rollback(&pod.id, "9.9.9", None).unwrap_err().code,
            ErrorCode::VersionNotFound
        );
        // 2.0.0 is browser-only; the pod sits on a node-runtime worker
        assert_eq!(
            h.scheduler.rollback(&pod.id, "2.0.0", None).unwrap_err().code,
            ErrorCode::RuntimeMismatch
        );
    }

    #[test]
    fn test_history_begins_with_created_and_is_ordered() {
        let h = harness(SchedulerConfig::default());
        register_node(&h, "node-a", 1000);
        let pack = register_pack(&h, "svc", "1.0.0", RuntimeTag::Node);

        let pod = h.scheduler.create(pod_input(&pack.id, 100), "alice").unwrap();
        h.scheduler.schedule(&pod.id).unwrap();
        h.scheduler.start(&pod.id).unwrap();
        h.scheduler.mark_running(&pod.id).unwrap();

        let history = h.scheduler.history(&pod.id);
        assert!(!history.is_empty());
        assert_eq!(history[0].action, PodHistoryAction::Created);
        for pair in history.windows(2) {
            assert!(pair[0].timestamp <= pair[1].timestamp);
        }
    }

    #[test]
    fn test_schedule_pending_sweep() {
        let h = harness(SchedulerConfig::default());
        let pack = register_pack(&h, "svc", "1.0.0", RuntimeTag::Node);

        // No nodes yet: everything stays pending
        let p1 = h.scheduler.create(pod_input(&pack.id, 100), "alice").unwrap();
        let p2 = h.scheduler.create(pod_input(&pack.id, 100), "alice").unwrap();
        let sweep = h.scheduler.schedule_pending();
        assert!(sweep.scheduled.is_empty());
        assert_eq!(sweep.remaining, 2);

        // A node arrives; the next sweep places both
        register_node(&h, "node-a", 1000);
        let sweep = h.scheduler.schedule_pending();
        assert_eq!(sweep.scheduled.len(), 2);
        assert_eq!(sweep.remaining, 0);
        for pod_id in [&p1.id, &p2.id] {
            assert_eq!(h.scheduler.get(pod_id).unwrap().status, PodStatus::Scheduled);
        }
    }

    #[test]
    fn test_update_pod_metadata() {
        let h = harness(SchedulerConfig::default());
        let pack = register_pack(&h, "svc", "1.0.0", RuntimeTag::Node);
        let pod = h.scheduler.create(pod_input(&pack.id, 100), "alice").unwrap();

        let updated = h
            .scheduler
            .update(
                &pod.id,
                UpdatePodInput {
                    labels: Some(HashMap::from([("app".to_string(), "web".to_string())])),
                    ..Default::default()
                },
                Some("alice"),
            )
            .unwrap();
        assert_eq!(updated.labels.get("app").map(String::as_str), Some("web"));

        let history = h.scheduler.history(&pod.id);
        assert!(history.iter().any(|e| e.action == PodHistoryAction::Updated));

        // Terminal pods reject updates
        h.scheduler.fail(&pod.id, "done").unwrap();
        assert_eq!(
            h.scheduler
                .update(&pod.id, UpdatePodInput::default(), None)
                .unwrap_err()
                .code,
            ErrorCode::InvalidStatusTransition
        );
    }

    #[test]
    fn test_delete_live_pod_requires_force() {
        let h = harness(SchedulerConfig::default());
        let node = register_node(&h, "node-a", 1000);
        let pack = register_pack(&h, "svc", "1.0.0", RuntimeTag::Node);

        let pod = h.scheduler.create(pod_input(&pack.id, 100), "alice").unwrap();
        h.scheduler.schedule(&pod.id).unwrap();

        assert_eq!(
            h.scheduler.delete(&pod.id, false, None).unwrap_err().code,
            ErrorCode::InvalidStatusTransition
        );

        h.scheduler.delete(&pod.id, true, None).unwrap();
        assert!(h.scheduler.get(&pod.id).is_none());
        // Forced deletion released the live pod's resources
        assert_eq!(h.nodes.get(&node.id).unwrap().allocated, NodeResources::default());
    }
}
