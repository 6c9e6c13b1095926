//! Candidate scoring for pod placement
//!
//! Every node that survives filtering starts at a base score of 100 and
//! accumulates adjustments: the placement policy term, a penalty per
//! untolerated `PreferNoSchedule` taint, and the weighted affinity
//! preferences. The highest score wins; ties break to the first candidate
//! encountered.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::node::Node;

use super::filter::{matches_term, untolerated_soft_taints};
use super::Pod;

/// Base score every candidate starts from
pub const BASE_SCORE: f64 = 100.0;

/// Penalty per untolerated `PreferNoSchedule` taint
pub const SOFT_TAINT_PENALTY: f64 = 50.0;

/// How the placement policy shapes candidate scores
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulingPolicy {
    /// Prefer emptier nodes (default): -10 per pod already on the node
    #[default]
    Spread,
    /// Prefer fuller nodes: +5 per pod already on the node
    Binpack,
    /// Add a uniform random component in [0, 20)
    Random,
    /// Prefer nodes with the most free cpu and memory headroom
    LeastLoaded,
}

/// Score one filtered candidate for a pod
///
/// `pods_on_node` are the pods currently assigned to this node; they drive
/// the spread/binpack terms and the pod affinity preferences.
pub fn score_node(node: &Node, pod: &Pod, pods_on_node: &[Pod], policy: SchedulingPolicy) -> f64 {
    let mut score = BASE_SCORE;
    let pod_count = pods_on_node.len() as f64;

    match policy {
        SchedulingPolicy::Spread => score -= 10.0 * pod_count,
        SchedulingPolicy::Binpack => score += 5.0 * pod_count,
        SchedulingPolicy::Random => score += rand::thread_rng().gen_range(0.0..20.0),
        SchedulingPolicy::LeastLoaded => {
            score += 50.0 * available_fraction(node.available().cpu, node.allocatable.cpu);
            score += 50.0 * available_fraction(node.available().memory, node.allocatable.memory);
        }
    }

    score -= SOFT_TAINT_PENALTY * untolerated_soft_taints(&pod.tolerations, &node.taints) as f64;

    if let Some(affinity) = &pod.scheduling.node_affinity {
        for term in &affinity.preferred {
            if matches_term(&term.preference, &node.labels) {
                score += term.weight as f64;
            }
        }
    }

    if let Some(affinity) = &pod.scheduling.pod_affinity {
        for term in &affinity.preferred {
            if any_pod_matches(pods_on_node, &term.label_selector) {
                score += term.weight as f64;
            }
        }
    }

    if let Some(anti) = &pod.scheduling.pod_anti_affinity {
        for term in &anti.preferred {
            if any_pod_matches(pods_on_node, &term.label_selector) {
                score -= term.weight as f64;
            }
        }
    }

    score
}

fn available_fraction(available: u64, allocatable: u64) -> f64 {
    if allocatable == 0 {
        return 0.0;
    }
    available as f64 / allocatable as f64
}

fn any_pod_matches(
    pods: &[Pod],
    selector: &std::collections::HashMap<String, String>,
) -> bool {
    pods.iter()
        .any(|p| selector.iter().all(|(k, v)| p.labels.get(k) == Some(v)))
}
