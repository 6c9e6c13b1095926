//! Namespace resources - isolation and accounting boundaries
//!
//! A namespace groups pods, carries an optional resource quota enforced at
//! pod creation, and an optional limit range that defaults and validates pod
//! resource requests and limits.

pub mod manager;

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::resources::NodeResources;

pub use manager::{
    CreateNamespaceInput, NamespaceManager, NamespaceManagerConfig, UpdateNamespaceInput,
    NAMESPACE_DEFAULT, NAMESPACE_PUBLIC, NAMESPACE_SYSTEM,
};

/// Lifecycle phase of a namespace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NamespacePhase {
    Active,
    /// Winding down: accepts no new pods and rejects updates
    Terminating,
}

/// Hard ceilings per resource axis; an unset axis is unbounded
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaLimits {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pods: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage: Option<u64>,
}

/// Namespace-level resource quota
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceQuota {
    /// Hard ceilings enforced at allocation time
    pub hard: QuotaLimits,
}

/// Optional cpu/memory bounds used by limit ranges
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitRangeBounds {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory: Option<u64>,
}

/// Defaulting and validation rules for pod resources in a namespace
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LimitRange {
    /// Default limits for axes the pod leaves unset
    #[serde(default)]
    pub default: LimitRangeBounds,

    /// Default requests for axes the pod leaves unset
    #[serde(default)]
    pub default_request: LimitRangeBounds,

    /// Minimum allowed requests
    #[serde(default)]
    pub min: LimitRangeBounds,

    /// Maximum allowed limits
    #[serde(default)]
    pub max: LimitRangeBounds,
}

/// An isolation and accounting boundary for pods
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Namespace {
    /// Opaque unique id
    pub id: String,

    /// Unique name; also the map key
    pub name: String,

    pub phase: NamespacePhase,

    #[serde(default)]
    pub labels: HashMap<String, String>,

    #[serde(default)]
    pub annotations: HashMap<String, String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_quota: Option<ResourceQuota>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit_range: Option<LimitRange>,

    /// Currently accounted usage across pods of this namespace
    pub resource_usage: NodeResources,

    pub created_by: String,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One quota axis that a request would exceed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExceededResource {
    /// Axis name: `pods`, `cpu`, `memory`, or `storage`
    pub resource: String,
    pub requested: u64,
    pub remaining: u64,
}

/// Result of a quota check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaCheck {
    pub allowed: bool,

    /// Remaining headroom per axis; `None` means unbounded
    pub remaining: QuotaRemaining,

    /// Axes the request would exceed, empty when allowed
    #[serde(default)]
    pub exceeded: Vec<ExceededResource>,
}

/// Per-axis remaining headroom under the quota
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct QuotaRemaining {
    pub pods: Option<u64>,
    pub cpu: Option<u64>,
    pub memory: Option<u64>,
    pub storage: Option<u64>,
}
