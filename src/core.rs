//! Core aggregate - explicit composition of all managers
//!
//! Replaces any notion of global singletons: callers construct a `Core`,
//! tests construct a fresh one. The core wires the node manager's unhealthy
//! hook to the scheduler's failover path and owns the lifecycle of both
//! background timers.

use std::sync::Arc;

use tracing::info;

use crate::auth::{AuthConfig, AuthProvider, AuthService};
use crate::namespace::{NamespaceManager, NamespaceManagerConfig};
use crate::node::{HeartbeatMonitor, NodeManager, NodeManagerConfig};
use crate::pack::{PackRegistry, PackRegistryConfig};
use crate::pod::{PodScheduler, SchedulerConfig};
use crate::secret::{SecretManager, SecretManagerConfig};
use crate::state::{ClusterState, ClusterStats};

/// Configuration for every manager in one place
#[derive(Debug, Clone, Default)]
pub struct CoreConfig {
    pub scheduler: SchedulerConfig,
    pub nodes: NodeManagerConfig,
    pub namespaces: NamespaceManagerConfig,
    pub secrets: SecretManagerConfig,
    pub packs: PackRegistryConfig,
    pub auth: AuthConfig,
}

/// The control-plane core: shared state plus its managers
pub struct Core {
    state: Arc<ClusterState>,
    packs: Arc<PackRegistry>,
    nodes: Arc<NodeManager>,
    namespaces: Arc<NamespaceManager>,
    secrets: Arc<SecretManager>,
    scheduler: Arc<PodScheduler>,
    auth: Arc<AuthService>,
    monitor: HeartbeatMonitor,
    monitoring_enabled: bool,
}

impl Core {
    /// Build and wire the managers over a fresh cluster state
    pub fn new(config: CoreConfig, auth_provider: Arc<dyn AuthProvider>) -> Self {
        let state = Arc::new(ClusterState::new());

        let packs = Arc::new(PackRegistry::new(state.clone(), config.packs));
        let namespaces = Arc::new(NamespaceManager::new(state.clone(), config.namespaces));
        let secrets = Arc::new(SecretManager::new(config.secrets));
        let monitoring_enabled = config.nodes.enable_heartbeat_monitoring;
        let nodes = Arc::new(NodeManager::new(state.clone(), config.nodes));
        let scheduler = Arc::new(PodScheduler::new(
            state.clone(),
            nodes.clone(),
            namespaces.clone(),
            packs.clone(),
            config.scheduler,
        ));
        let auth = Arc::new(AuthService::new(auth_provider, config.auth));

        // Dead nodes fail their pods over through the scheduler
        let failover = scheduler.clone();
        nodes.set_unhealthy_hook(Arc::new(move |node_id, node_name| {
            let report = failover.fail_pods_on_node(
                node_id,
                &format!("node '{}' became unhealthy", node_name),
            );
            info!(node = node_name, failed = report.failed, "unhealthy-node failover complete");
            Ok(())
        }));

        let monitor = HeartbeatMonitor::new(nodes.clone());

        Self {
            state,
            packs,
            nodes,
            namespaces,
            secrets,
            scheduler,
            auth,
            monitor,
            monitoring_enabled,
        }
    }

    /// Start the background timers; idempotent
    pub fn start(&self) {
        if self.monitoring_enabled {
            self.monitor.start();
        }
        info!("core started");
    }

    /// Stop the background timers deterministically; idempotent
    pub fn shutdown(&self) {
        self.monitor.stop();
        self.auth.destroy();
        info!("core shut down");
    }

    pub fn state(&self) -> &Arc<ClusterState> {
        &self.state
    }

    pub fn packs(&self) -> &Arc<PackRegistry> {
        &self.packs
    }

    pub fn nodes(&self) -> &Arc<NodeManager> {
        &self.nodes
    }

    pub fn namespaces(&self) -> &Arc<NamespaceManager> {
        &self.namespaces
    }

    pub fn secrets(&self) -> &Arc<SecretManager> {
        &self.secrets
    }

    pub fn scheduler(&self) -> &Arc<PodScheduler> {
        &self.scheduler
    }

    pub fn auth(&self) -> &Arc<AuthService> {
        &self.auth
    }

    /// A consistent aggregate snapshot of the cluster
    pub fn stats(&self) -> ClusterStats {
        self.state.stats()
    }
}

impl Drop for Core {
    fn drop(&mut self) {
        self.shutdown();
    }
}
