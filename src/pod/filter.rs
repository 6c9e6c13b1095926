//! Placement filter predicates
//!
//! Pure functions deciding whether a node may host a pod at all. A candidate
//! must pass every filter: schedulability, runtime compatibility, hard taint
//! toleration, available resources, node selector, and required node
//! affinity. `PreferNoSchedule` taints are not filtered here; they penalize
//! the score instead.

use std::collections::HashMap;

use crate::node::{Node, RuntimeType, Taint, TaintEffect};

use super::{
    NodeSelectorOperator, NodeSelectorRequirement, NodeSelectorTerm, Pod, Toleration,
    TolerationOperator,
};

/// Whether one toleration accepts one taint
///
/// `Exists` matches any value with a matching key; `Equal` also requires the
/// value. An unset toleration effect tolerates the taint regardless of its
/// effect.
pub fn tolerates(toleration: &Toleration, taint: &Taint) -> bool {
    if toleration.key != taint.key {
        return false;
    }
    if let Some(effect) = toleration.effect {
        if effect != taint.effect {
            return false;
        }
    }
    match toleration.operator {
        TolerationOperator::Exists => true,
        TolerationOperator::Equal => toleration.value.as_deref() == Some(taint.value.as_str()),
    }
}

/// Whether every hard taint (`NoSchedule`, `NoExecute`) is tolerated
pub fn tolerates_hard_taints(tolerations: &[Toleration], taints: &[Taint]) -> bool {
    taints
        .iter()
        .filter(|t| matches!(t.effect, TaintEffect::NoSchedule | TaintEffect::NoExecute))
        .all(|taint| tolerations.iter().any(|tol| tolerates(tol, taint)))
}

/// Count of `PreferNoSchedule` taints the pod does not tolerate
pub fn untolerated_soft_taints(tolerations: &[Toleration], taints: &[Taint]) -> usize {
    taints
        .iter()
        .filter(|t| t.effect == TaintEffect::PreferNoSchedule)
        .filter(|taint| !tolerations.iter().any(|tol| tolerates(tol, taint)))
        .count()
}

/// Simple node selector: every key/value must be present on the node
pub fn matches_node_selector(
    selector: &HashMap<String, String>,
    labels: &HashMap<String, String>,
) -> bool {
    selector.iter().all(|(k, v)| labels.get(k) == Some(v))
}

/// One affinity expression against the node's labels
pub fn matches_requirement(
    req: &NodeSelectorRequirement,
    labels: &HashMap<String, String>,
) -> bool {
    let value = labels.get(&req.key);
    match req.operator {
        NodeSelectorOperator::In => value.map(|v| req.values.contains(v)).unwrap_or(false),
        // An absent label satisfies NotIn
        NodeSelectorOperator::NotIn => value.map(|v| !req.values.contains(v)).unwrap_or(true),
        NodeSelectorOperator::Exists => value.is_some(),
        NodeSelectorOperator::DoesNotExist => value.is_none(),
        NodeSelectorOperator::Gt => numeric_compare(value, &req.values)
            .map(|(label, bound)| label > bound)
            .unwrap_or(false),
        NodeSelectorOperator::Lt => numeric_compare(value, &req.values)
            .map(|(label, bound)| label < bound)
            .unwrap_or(false),
    }
}

fn numeric_compare(value: Option<&String>, bounds: &[String]) -> Option<(i64, i64)> {
    let label = value?.parse::<i64>().ok()?;
    let bound = bounds.first()?.parse::<i64>().ok()?;
    Some((label, bound))
}

/// AND within a term: every expression must match
pub fn matches_term(term: &NodeSelectorTerm, labels: &HashMap<String, String>) -> bool {
    term.match_expressions
        .iter()
        .all(|req| matches_requirement(req, labels))
}

/// OR across terms: required affinity passes if any term matches
pub fn matches_required_affinity(
    terms: &[NodeSelectorTerm],
    labels: &HashMap<String, String>,
) -> bool {
    if terms.is_empty() {
        return true;
    }
    terms.iter().any(|term| matches_term(term, labels))
}

/// Every filter except resource fit; used by preemption planning
pub fn passes_non_resource_filters(node: &Node, pod: &Pod, runtime: RuntimeType) -> bool {
    if !node.is_schedulable() {
        return false;
    }
    if node.runtime_type != runtime {
        return false;
    }
    if !tolerates_hard_taints(&pod.tolerations, &node.taints) {
        return false;
    }
    if !matches_node_selector(&pod.scheduling.node_selector, &node.labels) {
        return false;
    }
    if let Some(affinity) = &pod.scheduling.node_affinity {
        if let Some(required) = &affinity.required {
            if !matches_required_affinity(&required.node_selector_terms, &node.labels) {
                return false;
            }
        }
    }
    true
}

/// The full filter pipeline, including resource fit
pub fn passes_filters(node: &Node, pod: &Pod, runtime: RuntimeType) -> bool {
    passes_non_resource_filters(node, pod, runtime) && has_room(node, pod)
}

/// `allocatable - allocated >= requests` component-wise, and a free pod slot
pub fn has_room(node: &Node, pod: &Pod) -> bool {
    pod.resource_requests
        .as_node_footprint()
        .fits_within(&node.available())
}
