//! # Packnet Control-Plane Core
//!
//! Packnet orchestrates **pods** (instances of versioned **packs**) across a
//! cluster of worker **nodes**, grouped into **namespaces** with quotas and
//! limit ranges, parameterized by encrypted **secrets**. This crate is the
//! scheduling and resource-management engine only: transport, persistence,
//! the node agent, and user interfaces are external collaborators.
//!
//! ## Core Resources
//!
//! - **Pack**: an immutable, versioned code artifact targeting a runtime
//! - **Pod**: a scheduled instance of a pack running on a node
//! - **Node**: a worker registered with the control plane
//! - **Namespace**: an isolation and accounting boundary
//! - **Secret**: encrypted key-value material injectable into pods
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                         Core                                 │
//! │  ┌────────────┐ ┌─────────────┐ ┌────────────┐ ┌──────────┐ │
//! │  │ Pod        │ │ Node        │ │ Namespace  │ │ Pack     │ │
//! │  │ Scheduler  │ │ Manager     │ │ Manager    │ │ Registry │ │
//! │  └─────┬──────┘ └──────┬──────┘ └─────┬──────┘ └────┬─────┘ │
//! │        └───────────────┴──────┬───────┴─────────────┘       │
//! │                        ┌──────▼──────┐   ┌───────────────┐  │
//! │                        │ ClusterState│   │ SecretManager │  │
//! │                        └─────────────┘   │  (own store)  │  │
//! │  ┌─────────────┐                         └───────────────┘  │
//! │  │ AuthService │──▶ injected AuthProvider                   │
//! │  └─────────────┘                                            │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! All managers share one [`state::ClusterState`]; the scheduler sits at the
//! root of the dependency tree and the node manager's unhealthy hook feeds
//! back into it for pod failover. Two background timers exist: the heartbeat
//! liveness sweep and the auth session auto-refresh; both are owned by
//! [`core::Core`] and stop deterministically at shutdown.

pub mod auth;
pub mod core;
pub mod error;
pub mod namespace;
pub mod node;
pub mod pack;
pub mod pod;
pub mod resources;
pub mod secret;
pub mod state;

pub use auth::{AuthConfig, AuthProvider, AuthService, Role, User, UserSession};
pub use crate::core::{Core, CoreConfig};
pub use error::{ErrorCode, OpError, OpResult};
pub use namespace::{Namespace, NamespaceManager, NamespaceManagerConfig, NamespacePhase};
pub use node::{
    Heartbeat, HeartbeatMonitor, Node, NodeManager, NodeManagerConfig, NodeStatus, RuntimeType,
    Taint, TaintEffect,
};
pub use pack::{Pack, PackRegistry, PackRegistryConfig, RuntimeTag};
pub use pod::{
    Pod, PodScheduler, PodStatus, SchedulerConfig, SchedulingPolicy, Toleration,
};
pub use resources::{NodeResources, PodResources};
pub use secret::{ResolvedSecrets, SecretManager, SecretManagerConfig};
pub use state::{ClusterState, ClusterStats, PreemptionPolicy, PriorityClass};
