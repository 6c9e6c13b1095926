//! Namespace manager - lifecycle, quota enforcement, limit ranges
//!
//! Quota math and limit-range defaulting/validation are pure functions over
//! a snapshot; the manager wraps them with namespace lookup and the atomic
//! check-and-increment the scheduler depends on.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use regex::Regex;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{ErrorCode, OpError, OpResult};
use crate::resources::NodeResources;
use crate::state::ClusterState;

use super::{
    ExceededResource, LimitRange, LimitRangeBounds, Namespace, NamespacePhase, QuotaCheck,
    QuotaRemaining, ResourceQuota,
};

/// The always-present namespaces
pub const NAMESPACE_DEFAULT: &str = "default";
pub const NAMESPACE_SYSTEM: &str = "packnet-system";
pub const NAMESPACE_PUBLIC: &str = "packnet-public";

const RESERVED_NAMESPACES: [&str; 3] = [NAMESPACE_DEFAULT, NAMESPACE_SYSTEM, NAMESPACE_PUBLIC];

/// Namespace manager configuration
#[derive(Debug, Clone)]
pub struct NamespaceManagerConfig {
    /// Create the reserved namespaces at construction (default true)
    pub initialize_defaults: bool,
}

impl Default for NamespaceManagerConfig {
    fn default() -> Self {
        Self {
            initialize_defaults: true,
        }
    }
}

/// Input for creating a namespace
#[derive(Debug, Clone, Default)]
pub struct CreateNamespaceInput {
    pub name: String,
    pub labels: HashMap<String, String>,
    pub annotations: HashMap<String, String>,
    pub resource_quota: Option<ResourceQuota>,
    pub limit_range: Option<LimitRange>,
}

/// Patch applied by [`NamespaceManager::update`]
#[derive(Debug, Clone, Default)]
pub struct UpdateNamespaceInput {
    pub labels: Option<HashMap<String, String>>,
    pub annotations: Option<HashMap<String, String>>,
    pub resource_quota: Option<Option<ResourceQuota>>,
    pub limit_range: Option<Option<LimitRange>>,
}

/// Manages namespaces over the shared cluster state
pub struct NamespaceManager {
    state: Arc<ClusterState>,
}

impl NamespaceManager {
    pub fn new(state: Arc<ClusterState>, config: NamespaceManagerConfig) -> Self {
        let manager = Self { state };
        if config.initialize_defaults {
            manager.initialize_reserved();
        }
        manager
    }

    /// Create the reserved namespaces if missing; idempotent
    fn initialize_reserved(&self) {
        for name in RESERVED_NAMESPACES {
            if !self.state.namespaces.contains_key(name) {
                let ns = new_namespace(name, CreateNamespaceInput::default(), "system");
                self.state.namespaces.insert(name.to_string(), ns);
                debug!(namespace = name, "reserved namespace created");
            }
        }
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Create a namespace
    pub fn create(&self, input: CreateNamespaceInput, created_by: &str) -> OpResult<Namespace> {
        if RESERVED_NAMESPACES.contains(&input.name.as_str()) {
            return Err(OpError::new(
                ErrorCode::ReservedNamespace,
                format!("'{}' is a reserved namespace", input.name),
            ));
        }
        if !is_valid_name(&input.name) {
            return Err(OpError::validation(format!(
                "'{}' is not a valid namespace name (lowercase DNS label, max 63 chars)",
                input.name
            )));
        }
        if self.state.namespaces.contains_key(&input.name) {
            return Err(OpError::new(
                ErrorCode::NamespaceExists,
                format!("namespace '{}' already exists", input.name),
            ));
        }

        let name = input.name.clone();
        let ns = new_namespace(&name, input, created_by);
        info!(namespace = %ns.name, "namespace created");
        self.state.namespaces.insert(ns.name.clone(), ns.clone());
        Ok(ns)
    }

    /// Update labels, annotations, quota, or limit range
    ///
    /// Rejected while the namespace is terminating.
    pub fn update(&self, name: &str, patch: UpdateNamespaceInput) -> OpResult<Namespace> {
        let mut ns = self.get_mut(name)?;
        if ns.phase == NamespacePhase::Terminating {
            return Err(OpError::new(
                ErrorCode::NamespaceTerminating,
                format!("namespace '{}' is terminating and rejects updates", name),
            ));
        }

        if let Some(labels) = patch.labels {
            ns.labels = labels;
        }
        if let Some(annotations) = patch.annotations {
            ns.annotations = annotations;
        }
        if let Some(quota) = patch.resource_quota {
            ns.resource_quota = quota;
        }
        if let Some(limit_range) = patch.limit_range {
            ns.limit_range = limit_range;
        }
        ns.updated_at = Utc::now();
        Ok(ns.clone())
    }

    /// Transition a namespace to terminating; idempotent
    ///
    /// `default` can never be terminated.
    pub fn mark_terminating(&self, name: &str) -> OpResult<Namespace> {
        if name == NAMESPACE_DEFAULT {
            return Err(OpError::new(
                ErrorCode::CannotDeleteDefault,
                "the default namespace cannot be terminated",
            ));
        }
        let mut ns = self.get_mut(name)?;
        if ns.phase != NamespacePhase::Terminating {
            ns.phase = NamespacePhase::Terminating;
            ns.updated_at = Utc::now();
            info!(namespace = name, "namespace terminating");
        }
        Ok(ns.clone())
    }

    /// Delete a namespace
    ///
    /// `default` is never deletable; other reserved namespaces are protected
    /// too. A namespace still holding non-terminal pods requires `force`.
    pub fn delete(&self, name: &str, force: bool) -> OpResult<Namespace> {
        if name == NAMESPACE_DEFAULT {
            return Err(OpError::new(
                ErrorCode::CannotDeleteDefault,
                "the default namespace cannot be deleted",
            ));
        }
        if RESERVED_NAMESPACES.contains(&name) {
            return Err(OpError::new(
                ErrorCode::ReservedNamespace,
                format!("'{}' is a reserved namespace", name),
            ));
        }
        if !self.state.namespaces.contains_key(name) {
            return Err(not_found(name));
        }

        let active_pods = self.state.active_pods_in_namespace(name).len();
        if active_pods > 0 && !force {
            return Err(OpError::new(
                ErrorCode::NamespaceNotEmpty,
                format!("namespace '{}' still has {} active pod(s)", name, active_pods),
            )
            .with_details(serde_json::json!({ "activePods": active_pods })));
        }

        let (_, ns) = self
            .state
            .namespaces
            .remove(name)
            .ok_or_else(|| not_found(name))?;
        info!(namespace = name, forced = force, "namespace deleted");
        Ok(ns)
    }

    // =========================================================================
    // Quota
    // =========================================================================

    /// Check whether `required` fits under the namespace quota
    pub fn check_quota(&self, name: &str, required: &NodeResources) -> OpResult<QuotaCheck> {
        let ns = self.get(name).ok_or_else(|| not_found(name))?;
        Ok(check_quota(&ns, required))
    }

    /// Atomically check and account `required` against the namespace
    ///
    /// Fails with `QUOTA_EXCEEDED` (listing the exceeded axes) if any axis
    /// would go over its hard ceiling.
    pub fn allocate_resources(&self, name: &str, required: &NodeResources) -> OpResult<()> {
        let mut ns = self.get_mut(name)?;
        let check = check_quota(&ns, required);
        if !check.allowed {
            let axes: Vec<&str> = check.exceeded.iter().map(|e| e.resource.as_str()).collect();
            return Err(OpError::new(
                ErrorCode::QuotaExceeded,
                format!("namespace '{}' quota exceeded on {}", name, axes.join(", ")),
            )
            .with_details(serde_json::json!({
                "exceededResources": check.exceeded,
            })));
        }

        ns.resource_usage = ns.resource_usage.saturating_add(required);
        ns.updated_at = Utc::now();
        Ok(())
    }

    /// Release previously accounted resources, clamped at zero
    pub fn release_resources(&self, name: &str, amount: &NodeResources) -> OpResult<()> {
        let mut ns = self.get_mut(name)?;
        ns.resource_usage = ns.resource_usage.saturating_sub(amount);
        ns.updated_at = Utc::now();
        Ok(())
    }

    // =========================================================================
    // Limit range
    // =========================================================================

    /// Fill unset request/limit axes from the namespace limit range
    pub fn apply_defaults(
        &self,
        name: &str,
        requests: LimitRangeBounds,
        limits: LimitRangeBounds,
    ) -> OpResult<(LimitRangeBounds, LimitRangeBounds)> {
        let ns = self.get(name).ok_or_else(|| not_found(name))?;
        Ok(apply_defaults(ns.limit_range.as_ref(), requests, limits))
    }

    /// Validate requests/limits against the namespace limit range
    pub fn validate_resources(
        &self,
        name: &str,
        requests: &LimitRangeBounds,
        limits: &LimitRangeBounds,
    ) -> OpResult<()> {
        let ns = self.get(name).ok_or_else(|| not_found(name))?;
        validate_resources(ns.limit_range.as_ref(), requests, limits)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn get(&self, name: &str) -> Option<Namespace> {
        self.state.namespaces.get(name).map(|n| n.clone())
    }

    pub fn list(&self) -> Vec<Namespace> {
        self.state.namespaces.iter().map(|n| n.clone()).collect()
    }

    fn get_mut(
        &self,
        name: &str,
    ) -> OpResult<dashmap::mapref::one::RefMut<'_, String, Namespace>> {
        self.state
            .namespaces
            .get_mut(name)
            .ok_or_else(|| not_found(name))
    }
}

fn not_found(name: &str) -> OpError {
    OpError::new(
        ErrorCode::NamespaceNotFound,
        format!("namespace '{}' not found", name),
    )
}

fn new_namespace(name: &str, input: CreateNamespaceInput, created_by: &str) -> Namespace {
    let now = Utc::now();
    Namespace {
        id: Uuid::new_v4().to_string(),
        name: name.to_string(),
        phase: NamespacePhase::Active,
        labels: input.labels,
        annotations: input.annotations,
        resource_quota: input.resource_quota,
        limit_range: input.limit_range,
        resource_usage: NodeResources::default(),
        created_by: created_by.to_string(),
        created_at: now,
        updated_at: now,
    }
}

// ============================================================================
// Pure functions
// ============================================================================

/// Lowercase DNS-label names, max 63 characters
pub fn is_valid_name(name: &str) -> bool {
    if name.is_empty() || name.len() > 63 {
        return false;
    }
    let pattern = Regex::new(r"^[a-z0-9]([a-z0-9-]*[a-z0-9])?$").unwrap();
    pattern.is_match(name)
}

/// Quota check as a pure function of the namespace snapshot
pub fn check_quota(ns: &Namespace, required: &NodeResources) -> QuotaCheck {
    let hard = match ns.resource_quota {
        Some(quota) => quota.hard,
        None => {
            return QuotaCheck {
                allowed: true,
                remaining: QuotaRemaining::default(),
                exceeded: vec![],
            }
        }
    };

    let usage = ns.resource_usage;
    let mut exceeded = Vec::new();

    let axes: [(&str, Option<u64>, u64, u64); 4] = [
        ("pods", hard.pods, usage.pods, required.pods),
        ("cpu", hard.cpu, usage.cpu, required.cpu),
        ("memory", hard.memory, usage.memory, required.memory),
        ("storage", hard.storage, usage.storage, required.storage),
    ];

    let mut remaining = QuotaRemaining::default();
    for (axis, limit, used, want) in axes {
        let Some(limit) = limit else { continue };
        let headroom = limit.saturating_sub(used);
        match axis {
            "pods" => remaining.pods = Some(headroom),
            "cpu" => remaining.cpu = Some(headroom),
            "memory" => remaining.memory = Some(headroom),
            _ => remaining.storage = Some(headroom),
        }
        if want > headroom {
            exceeded.push(ExceededResource {
                resource: axis.to_string(),
                requested: want,
                remaining: headroom,
            });
        }
    }

    QuotaCheck {
        allowed: exceeded.is_empty(),
        remaining,
        exceeded,
    }
}

/// Fill unset axes from the limit range's `defaultRequest`/`default`
pub fn apply_defaults(
    limit_range: Option<&LimitRange>,
    requests: LimitRangeBounds,
    limits: LimitRangeBounds,
) -> (LimitRangeBounds, LimitRangeBounds) {
    let Some(lr) = limit_range else {
        return (requests, limits);
    };

    let requests = LimitRangeBounds {
        cpu: requests.cpu.or(lr.default_request.cpu),
        memory: requests.memory.or(lr.default_request.memory),
    };
    let limits = LimitRangeBounds {
        cpu: limits.cpu.or(lr.default.cpu),
        memory: limits.memory.or(lr.default.memory),
    };
    (requests, limits)
}

/// Enforce `min <= requests`, `limits <= max`, and `requests <= limits`
pub fn validate_resources(
    limit_range: Option<&LimitRange>,
    requests: &LimitRangeBounds,
    limits: &LimitRangeBounds,
) -> OpResult<()> {
    let axes: [(&str, Option<u64>, Option<u64>); 2] = [
        ("cpu", requests.cpu, limits.cpu),
        ("memory", requests.memory, limits.memory),
    ];

    if let Some(lr) = limit_range {
        for (axis, request, limit) in axes {
            let (min, max) = match axis {
                "cpu" => (lr.min.cpu, lr.max.cpu),
                _ => (lr.min.memory, lr.max.memory),
            };
            if let (Some(min), Some(request)) = (min, request) {
                if request < min {
                    return Err(OpError::validation(format!(
                        "{} request {} is below the namespace minimum {}",
                        axis, request, min
                    )));
                }
            }
            if let (Some(max), Some(limit)) = (max, limit) {
                if limit > max {
                    return Err(OpError::validation(format!(
                        "{} limit {} is above the namespace maximum {}",
                        axis, limit, max
                    )));
                }
            }
        }
    }

    for (axis, request, limit) in axes {
        if let (Some(request), Some(limit)) = (request, limit) {
            if request > limit {
                return Err(OpError::validation(format!(
                    "{} request {} exceeds its limit {}",
                    axis, request, limit
                )));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::namespace::QuotaLimits;

    fn manager() -> NamespaceManager {
        NamespaceManager::new(Arc::new(ClusterState::new()), NamespaceManagerConfig::default())
    }

    fn create_input(name: &str) -> CreateNamespaceInput {
        CreateNamespaceInput {
            name: name.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_reserved_namespaces_initialized() {
        let mgr = manager();
        for name in RESERVED_NAMESPACES {
            assert!(mgr.get(name).is_some(), "missing reserved namespace {name}");
        }
    }

    #[test]
    fn test_initialize_defaults_disabled() {
        let mgr = NamespaceManager::new(
            Arc::new(ClusterState::new()),
            NamespaceManagerConfig {
                initialize_defaults: false,
            },
        );
        assert!(mgr.list().is_empty());
    }

    #[test]
    fn test_create_and_duplicate() {
        let mgr = manager();
        mgr.create(create_input("team-a"), "alice").unwrap();

        let err = mgr.create(create_input("team-a"), "alice").unwrap_err();
        assert_eq!(err.code, ErrorCode::NamespaceExists);
    }

    #[test]
    fn test_create_reserved_rejected() {
        let mgr = manager();
        let err = mgr.create(create_input("default"), "alice").unwrap_err();
        assert_eq!(err.code, ErrorCode::ReservedNamespace);
    }

    #[test]
    fn test_create_invalid_name_rejected() {
        let mgr = manager();
        for bad in ["Team-A", "-leading", "trailing-", "has_underscore", ""] {
            let err = mgr.create(create_input(bad), "alice").unwrap_err();
            assert_eq!(err.code, ErrorCode::ValidationError, "accepted {bad:?}");
        }
    }

    #[test]
    fn test_update_rejected_while_terminating() {
        let mgr = manager();
        mgr.create(create_input("team-a"), "alice").unwrap();
        mgr.mark_terminating("team-a").unwrap();

        let err = mgr
            .update("team-a", UpdateNamespaceInput::default())
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::NamespaceTerminating);
    }

    #[test]
    fn test_mark_terminating_idempotent() {
        let mgr = manager();
        mgr.create(create_input("team-a"), "alice").unwrap();

        let first = mgr.mark_terminating("team-a").unwrap();
        let second = mgr.mark_terminating("team-a").unwrap();
        assert_eq!(first.phase, NamespacePhase::Terminating);
        assert_eq!(second.phase, NamespacePhase::Terminating);
    }

    #[test]
    fn test_default_protected() {
        let mgr = manager();
        assert_eq!(
            mgr.delete("default", true).unwrap_err().code,
            ErrorCode::CannotDeleteDefault
        );
        assert_eq!(
            mgr.mark_terminating("default").unwrap_err().code,
            ErrorCode::CannotDeleteDefault
        );
    }

    #[test]
    fn test_delete_reserved_rejected() {
        let mgr = manager();
        let err = mgr.delete(NAMESPACE_SYSTEM, true).unwrap_err();
        assert_eq!(err.code, ErrorCode::ReservedNamespace);
    }

    #[test]
    fn test_quota_exact_boundary() {
        let mgr = manager();
        let mut input = create_input("team-a");
        input.resource_quota = Some(ResourceQuota {
            hard: QuotaLimits {
                cpu: Some(1000),
                ..Default::default()
            },
        });
        mgr.create(input, "alice").unwrap();

        // Exactly at the limit succeeds
        mgr.allocate_resources(
            "team-a",
            &NodeResources {
                cpu: 1000,
                ..Default::default()
            },
        )
        .unwrap();

        // One more unit fails
        let err = mgr
            .allocate_resources(
                "team-a",
                &NodeResources {
                    cpu: 1,
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::QuotaExceeded);
    }

    #[test]
    fn test_quota_exceeded_axes_reported() {
        let mgr = manager();
        let mut input = create_input("team-a");
        input.resource_quota = Some(ResourceQuota {
            hard: QuotaLimits {
                pods: Some(1),
                memory: Some(100),
                ..Default::default()
            },
        });
        mgr.create(input, "alice").unwrap();

        let check = mgr
            .check_quota(
                "team-a",
                &NodeResources {
                    pods: 2,
                    memory: 200,
                    cpu: 10_000,
                    storage: 0,
                },
            )
            .unwrap();

        assert!(!check.allowed);
        let axes: Vec<&str> = check.exceeded.iter().map(|e| e.resource.as_str()).collect();
        assert_eq!(axes, vec!["pods", "memory"]);
        // cpu is unset and therefore unbounded
        assert!(check.remaining.cpu.is_none());
    }

    #[test]
    fn test_release_clamps_at_zero() {
        let mgr = manager();
        mgr.create(create_input("team-a"), "alice").unwrap();
        mgr.release_resources(
            "team-a",
            &NodeResources {
                cpu: 500,
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(mgr.get("team-a").unwrap().resource_usage.cpu, 0);
    }

    #[test]
    fn test_apply_defaults_fills_unset_axes() {
        let lr = LimitRange {
            default: LimitRangeBounds {
                cpu: Some(500),
                memory: Some(1024),
            },
            default_request: LimitRangeBounds {
                cpu: Some(100),
                memory: Some(256),
            },
            ..Default::default()
        };

        let (requests, limits) = apply_defaults(
            Some(&lr),
            LimitRangeBounds {
                cpu: Some(200),
                memory: None,
            },
            LimitRangeBounds::default(),
        );

        assert_eq!(requests.cpu, Some(200)); // explicit value kept
        assert_eq!(requests.memory, Some(256));
        assert_eq!(limits.cpu, Some(500));
        assert_eq!(limits.memory, Some(1024));
    }

    #[test]
    fn test_validate_resources_bounds() {
        let lr = LimitRange {
            min: LimitRangeBounds {
                cpu: Some(100),
                memory: None,
            },
            max: LimitRangeBounds {
                cpu: Some(1000),
                memory: None,
            },
            ..Default::default()
        };

        // below min
        let err = validate_resources(
            Some(&lr),
            &LimitRangeBounds {
                cpu: Some(50),
                memory: None,
            },
            &LimitRangeBounds::default(),
        )
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);

        // above max
        let err = validate_resources(
            Some(&lr),
            &LimitRangeBounds::default(),
            &LimitRangeBounds {
                cpu: Some(2000),
                memory: None,
            },
        )
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);

        // request > limit, even without a limit range
        let err = validate_resources(
            None,
            &LimitRangeBounds {
                cpu: Some(500),
                memory: None,
            },
            &LimitRangeBounds {
                cpu: Some(100),
                memory: None,
            },
        )
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);

        // well-formed passes
        validate_resources(
            Some(&lr),
            &LimitRangeBounds {
                cpu: Some(200),
                memory: None,
            },
            &LimitRangeBounds {
                cpu: Some(800),
                memory: None,
            },
        )
        .unwrap();
    }
}
