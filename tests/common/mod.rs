//! Shared test fixtures: a freshly wired manager set over one cluster state
//! and a stub auth provider for core composition tests
#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use packnet::auth::{AuthProvider, ProviderError, ProviderResult, User, UserSession};
use packnet::namespace::{NamespaceManager, NamespaceManagerConfig};
use packnet::node::{NodeManager, NodeManagerConfig};
use packnet::pack::{PackRegistry, PackRegistryConfig};
use packnet::pod::PodScheduler;
use packnet::{ClusterState, SchedulerConfig};

/// The managers under test, sharing one state
pub struct TestCluster {
    pub state: Arc<ClusterState>,
    pub nodes: Arc<NodeManager>,
    pub namespaces: Arc<NamespaceManager>,
    pub packs: Arc<PackRegistry>,
    pub scheduler: Arc<PodScheduler>,
}

/// Install a test-friendly subscriber once; `RUST_LOG` controls verbosity
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

impl TestCluster {
    pub fn new(config: SchedulerConfig) -> Self {
        init_tracing();
        let state = Arc::new(ClusterState::new());
        let nodes = Arc::new(NodeManager::new(state.clone(), NodeManagerConfig::default()));
        let namespaces = Arc::new(NamespaceManager::new(
            state.clone(),
            NamespaceManagerConfig::default(),
        ));
        let packs = Arc::new(PackRegistry::new(state.clone(), PackRegistryConfig::default()));
        let scheduler = Arc::new(PodScheduler::new(
            state.clone(),
            nodes.clone(),
            namespaces.clone(),
            packs.clone(),
            config,
        ));

        Self {
            state,
            nodes,
            namespaces,
            packs,
            scheduler,
        }
    }
}

/// Auth provider stub: accepts any login, refuses everything else
pub struct StubAuthProvider;

#[async_trait]
impl AuthProvider for StubAuthProvider {
    async fn register_user(
        &self,
        email: &str,
        _password: &str,
        display_name: Option<&str>,
    ) -> ProviderResult<UserSession> {
        Ok(session_for(email, display_name))
    }

    async fn login_user(&self, email: &str, _password: &str) -> ProviderResult<UserSession> {
        Ok(session_for(email, None))
    }

    async fn logout_user(&self, _access_token: &str) -> ProviderResult<()> {
        Ok(())
    }

    async fn refresh_session(&self, _refresh_token: &str) -> ProviderResult<UserSession> {
        Ok(session_for("stub@example.com", None))
    }

    async fn get_user_by_id(&self, _user_id: &str) -> ProviderResult<User> {
        Err(ProviderError::new("USER_NOT_FOUND", "stub provider"))
    }

    async fn verify_token(&self, _access_token: &str) -> ProviderResult<User> {
        Err(ProviderError::new("SESSION_EXPIRED", "stub provider"))
    }

    async fn update_user(
        &self,
        _user_id: &str,
        _display_name: Option<&str>,
    ) -> ProviderResult<User> {
        Err(ProviderError::new("USER_NOT_FOUND", "stub provider"))
    }

    async fn delete_user(&self, _user_id: &str) -> ProviderResult<()> {
        Ok(())
    }
}

fn session_for(email: &str, display_name: Option<&str>) -> UserSession {
    UserSession {
        user: User {
            id: "stub-user".to_string(),
            email: email.to_string(),
            display_name: display_name.map(|d| d.to_string()),
            roles: vec![packnet::Role::Developer],
        },
        access_token: "stub-access".to_string(),
        refresh_token: Some("stub-refresh".to_string()),
        expires_at: chrono::Utc::now() + chrono::Duration::hours(1),
    }
}
