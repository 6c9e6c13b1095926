//! Pod resources - scheduled instances of packs running on nodes
//!
//! A pod is created pending, placed onto a node by the scheduler, and walks
//! a one-way status machine to a terminal state. Every transition is audited
//! in the pod's history log.

pub mod filter;
pub mod scheduler;
pub mod score;

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::node::TaintEffect;
use crate::resources::PodResources;

pub use scheduler::{
    CreatePodInput, FailoverReport, PodScheduler, SchedulerConfig, ScheduleSweep, UpdatePodInput,
};
pub use score::SchedulingPolicy;

/// Lifecycle status of a pod
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PodStatus {
    /// Created, waiting for placement
    Pending,
    /// Bound to a node, not yet starting
    Scheduled,
    /// Launching on its node
    Starting,
    /// Up and serving
    Running,
    /// Shutting down
    Stopping,
    /// Stopped cleanly (terminal)
    Stopped,
    /// Crashed or failed over (terminal)
    Failed,
    /// Evicted by preemption or policy (terminal)
    Evicted,
}

impl PodStatus {
    /// Terminal states never transition again
    pub fn is_terminal(&self) -> bool {
        matches!(self, PodStatus::Stopped | PodStatus::Failed | PodStatus::Evicted)
    }

    /// Whether a pod in this state holds node/namespace resources
    pub fn holds_resources(&self) -> bool {
        !self.is_terminal()
    }

    /// The status machine: which targets are reachable from here
    pub fn can_transition_to(&self, target: PodStatus) -> bool {
        use PodStatus::*;
        match (self, target) {
            (Pending, Scheduled) => true,
            (Scheduled, Starting) => true,
            (Starting, Running) => true,
            (Scheduled | Starting | Running, Stopping) => true,
            (Stopping, Stopped) => true,
            (Pending | Scheduled | Starting | Running | Stopping, Failed) => true,
            (Pending | Scheduled | Starting | Running | Stopping, Evicted) => true,
            _ => false,
        }
    }
}

/// Audit actions recorded in a pod's history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PodHistoryAction {
    Created,
    Scheduled,
    Started,
    Stopped,
    Failed,
    Evicted,
    Updated,
    RolledBack,
    Deleted,
}

/// One append-only audit record for a pod
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodHistoryEntry {
    pub action: PodHistoryAction,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub actor_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_status: Option<PodStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_status: Option<PodStatus>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_version: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_node_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_node_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    pub timestamp: DateTime<Utc>,
}

impl PodHistoryEntry {
    pub fn new(action: PodHistoryAction) -> Self {
        Self {
            action,
            actor_id: None,
            previous_status: None,
            new_status: None,
            previous_version: None,
            new_version: None,
            previous_node_id: None,
            new_node_id: None,
            reason: None,
            message: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_status(mut self, previous: Option<PodStatus>, new: PodStatus) -> Self {
        self.previous_status = previous;
        self.new_status = Some(new);
        self
    }

    pub fn with_versions(mut self, previous: &str, new: &str) -> Self {
        self.previous_version = Some(previous.to_string());
        self.new_version = Some(new.to_string());
        self
    }

    pub fn with_node(mut self, node_id: &str) -> Self {
        self.new_node_id = Some(node_id.to_string());
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn with_actor(mut self, actor_id: Option<&str>) -> Self {
        self.actor_id = actor_id.map(|a| a.to_string());
        self
    }
}

/// Operator of a toleration match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TolerationOperator {
    /// Key, value, and effect must match
    Equal,
    /// Any value matches as long as the key (and effect, if set) matches
    Exists,
}

/// Pod-side acceptance of a node taint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Toleration {
    pub key: String,
    pub operator: TolerationOperator,

    /// Required for `Equal`; ignored for `Exists`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,

    /// Unset tolerates the taint regardless of effect
    #[serde(skip_serializing_if = "Option::is_none")]
    pub effect: Option<TaintEffect>,
}

/// Operators usable in node affinity expressions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeSelectorOperator {
    In,
    NotIn,
    Exists,
    DoesNotExist,
    Gt,
    Lt,
}

/// One label expression inside a node selector term
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeSelectorRequirement {
    pub key: String,
    pub operator: NodeSelectorOperator,
    #[serde(default)]
    pub values: Vec<String>,
}

/// A conjunction of expressions; all must match
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeSelectorTerm {
    #[serde(default)]
    pub match_expressions: Vec<NodeSelectorRequirement>,
}

/// A disjunction of terms; at least one must match
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeSelector {
    #[serde(default)]
    pub node_selector_terms: Vec<NodeSelectorTerm>,
}

/// A soft node preference with a score weight
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreferredSchedulingTerm {
    pub weight: i64,
    pub preference: NodeSelectorTerm,
}

/// Hard and soft node affinity
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeAffinity {
    /// Enforced in filtering
    #[serde(
        default,
        rename = "requiredDuringSchedulingIgnoredDuringExecution",
        skip_serializing_if = "Option::is_none"
    )]
    pub required: Option<NodeSelector>,

    /// Contributes weight in scoring
    #[serde(default, rename = "preferredDuringSchedulingIgnoredDuringExecution")]
    pub preferred: Vec<PreferredSchedulingTerm>,
}

/// A soft co-location preference against pods already on a node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeightedPodAffinityTerm {
    pub weight: i64,

    /// Matches when every key/value is present on some pod on the node
    pub label_selector: HashMap<String, String>,
}

/// Soft pod affinity (or anti-affinity) preferences
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodAffinity {
    #[serde(default, rename = "preferredDuringSchedulingIgnoredDuringExecution")]
    pub preferred: Vec<WeightedPodAffinityTerm>,
}

/// Placement constraints carried by a pod
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulingConfig {
    /// Every key/value must be present on the node's labels
    #[serde(default)]
    pub node_selector: HashMap<String, String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_affinity: Option<NodeAffinity>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub pod_affinity: Option<PodAffinity>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub pod_anti_affinity: Option<PodAffinity>,
}

/// A scheduled instance of a pack
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pod {
    /// Opaque unique id
    pub id: String,

    /// Pack this pod runs
    pub pack_id: String,

    /// Effective pack version at creation (or after rollback)
    pub pack_version: String,

    /// Node the pod is bound to; unset until scheduled
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,

    pub status: PodStatus,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_message: Option<String>,

    pub namespace: String,

    #[serde(default)]
    pub labels: HashMap<String, String>,

    #[serde(default)]
    pub annotations: HashMap<String, String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority_class_name: Option<String>,

    /// Resolved from the priority class at create time
    pub priority: i64,

    #[serde(default)]
    pub tolerations: Vec<Toleration>,

    pub resource_requests: PodResources,

    pub resource_limits: PodResources,

    #[serde(default)]
    pub scheduling: SchedulingConfig,

    pub created_by: String,

    #[serde(default)]
    pub metadata: HashMap<String, String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduled_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stopped_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    /// Bookkeeping flag making terminal resource release exactly-once
    #[serde(skip)]
    pub resources_released: bool,
}
