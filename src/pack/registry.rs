//! Pack registry - versioned artifact catalogue with ownership checks
//!
//! Registration allocates a deterministic bundle path and an upload URL from
//! a configurable generator; the bundle itself is transferred out of band.
//! Pack bodies are immutable: updates touch only description and metadata.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::error::{ErrorCode, OpError, OpResult};
use crate::node::RuntimeType;
use crate::state::ClusterState;

use super::semver::{compare_versions, is_valid_version};
use super::{Pack, PackListItem, RuntimeTag};

/// Generator for the opaque upload URL returned at registration
pub type UploadUrlFn = Arc<dyn Fn(&Pack) -> String + Send + Sync>;

/// Pack registry configuration
#[derive(Clone)]
pub struct PackRegistryConfig {
    /// Produces the upload URL handed back to the registering client
    pub upload_url: UploadUrlFn,

    /// Bundle file extension used when the input does not name one
    pub default_bundle_ext: String,
}

impl Default for PackRegistryConfig {
    fn default() -> Self {
        Self {
            upload_url: Arc::new(|pack| format!("upload://{}", pack.bundle_path)),
            default_bundle_ext: "tgz".to_string(),
        }
    }
}

impl std::fmt::Debug for PackRegistryConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PackRegistryConfig")
            .field("default_bundle_ext", &self.default_bundle_ext)
            .finish_non_exhaustive()
    }
}

/// Input for registering a pack version
#[derive(Debug, Clone)]
pub struct RegisterPackInput {
    pub name: String,
    pub version: String,
    pub runtime_tag: RuntimeTag,
    pub description: Option<String>,
    pub metadata: HashMap<String, String>,
    /// Bundle file extension; falls back to the configured default
    pub bundle_ext: Option<String>,
}

/// A freshly registered pack plus where to upload its bundle
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisteredPack {
    #[serde(flatten)]
    pub pack: Pack,
    pub upload_url: String,
}

/// Patch applied by [`PackRegistry::update`]; only mutable fields
#[derive(Debug, Clone, Default)]
pub struct UpdatePackInput {
    pub description: Option<Option<String>>,
    pub metadata: Option<HashMap<String, String>>,
}

/// Immutable versioned artifact catalogue over the shared cluster state
pub struct PackRegistry {
    state: Arc<ClusterState>,
    config: PackRegistryConfig,
}

impl PackRegistry {
    pub fn new(state: Arc<ClusterState>, config: PackRegistryConfig) -> Self {
        Self { state, config }
    }

    // =========================================================================
    // Registration and mutation
    // =========================================================================

    /// Register a new pack version for `owner_id`
    pub fn register(&self, input: RegisterPackInput, owner_id: &str) -> OpResult<RegisteredPack> {
        if input.name.trim().is_empty() {
            return Err(OpError::validation("pack name must not be empty"));
        }
        if !is_valid_version(&input.version) {
            return Err(OpError::validation(format!(
                "'{}' is not a valid semantic version",
                input.version
            )));
        }
        if self.find_version(&input.name, &input.version).is_some() {
            return Err(OpError::new(
                ErrorCode::VersionExists,
                format!("pack '{}@{}' already exists", input.name, input.version),
            ));
        }

        let ext = input
            .bundle_ext
            .unwrap_or_else(|| self.config.default_bundle_ext.clone());
        let now = Utc::now();
        let pack = Pack {
            id: Uuid::new_v4().to_string(),
            bundle_path: format!("packs/{}/{}/bundle.{}", input.name, input.version, ext),
            name: input.name,
            version: input.version,
            runtime_tag: input.runtime_tag,
            owner_id: owner_id.to_string(),
            description: input.description,
            metadata: input.metadata,
            created_at: now,
            updated_at: now,
        };

        let upload_url = (self.config.upload_url)(&pack);
        info!(pack = %pack.name, version = %pack.version, "pack registered");
        self.state.packs.insert(pack.id.clone(), pack.clone());
        Ok(RegisteredPack { pack, upload_url })
    }

    /// Update description/metadata; the body is immutable
    pub fn update(
        &self,
        pack_id: &str,
        patch: UpdatePackInput,
        requester: &str,
    ) -> OpResult<Pack> {
        let mut pack = self
            .state
            .packs
            .get_mut(pack_id)
            .ok_or_else(|| not_found(pack_id))?;
        if pack.owner_id != requester {
            return Err(owner_only(&pack.owner_id));
        }

        if let Some(description) = patch.description {
            pack.description = description;
        }
        if let Some(metadata) = patch.metadata {
            pack.metadata = metadata;
        }
        pack.updated_at = Utc::now();
        Ok(pack.clone())
    }

    /// Delete one pack version; owner only
    pub fn delete(&self, pack_id: &str, requester: &str) -> OpResult<Pack> {
        {
            let pack = self
                .state
                .packs
                .get(pack_id)
                .ok_or_else(|| not_found(pack_id))?;
            if pack.owner_id != requester {
                return Err(owner_only(&pack.owner_id));
            }
        }
        let (_, pack) = self
            .state
            .packs
            .remove(pack_id)
            .ok_or_else(|| not_found(pack_id))?;
        info!(pack = %pack.name, version = %pack.version, "pack deleted");
        Ok(pack)
    }

    /// Delete every version of a name; the requester must own them all
    pub fn delete_all_versions(&self, name: &str, requester: &str) -> OpResult<usize> {
        let versions: Vec<Pack> = self.versions_of(name);
        if versions.is_empty() {
            return Err(OpError::new(
                ErrorCode::PackNotFound,
                format!("pack '{}' not found", name),
            ));
        }
        if versions.iter().any(|p| p.owner_id != requester) {
            return Err(OpError::new(
                ErrorCode::Forbidden,
                format!("requester does not own every version of '{}'", name),
            ));
        }

        let count = versions.len();
        for pack in versions {
            self.state.packs.remove(&pack.id);
        }
        info!(pack = name, count, "all pack versions deleted");
        Ok(count)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn get(&self, pack_id: &str) -> Option<Pack> {
        self.state.packs.get(pack_id).map(|p| p.clone())
    }

    /// Locate a specific `(name, version)` pair
    pub fn find_version(&self, name: &str, version: &str) -> Option<Pack> {
        self.state
            .packs
            .iter()
            .find(|p| p.name == name && compare_versions(&p.version, version) == Ordering::Equal)
            .map(|p| p.clone())
    }

    /// The newest registered version of a name
    pub fn latest_version(&self, name: &str) -> Option<Pack> {
        self.versions_of(name).into_iter().next()
    }

    /// All versions of a name, newest first
    pub fn versions_of(&self, name: &str) -> Vec<Pack> {
        let mut versions: Vec<Pack> = self
            .state
            .packs
            .iter()
            .filter(|p| p.name == name)
            .map(|p| p.clone())
            .collect();
        versions.sort_by(|a, b| compare_versions(&b.version, &a.version));
        versions
    }

    /// Latest version per name, with per-name version counts
    pub fn list(&self) -> Vec<PackListItem> {
        let mut by_name: HashMap<String, (Pack, usize)> = HashMap::new();
        for pack in self.state.packs.iter() {
            match by_name.get_mut(&pack.name) {
                Some((latest, count)) => {
                    *count += 1;
                    if compare_versions(&pack.version, &latest.version) == Ordering::Greater {
                        *latest = pack.clone();
                    }
                }
                None => {
                    by_name.insert(pack.name.clone(), (pack.clone(), 1));
                }
            }
        }

        let mut items: Vec<PackListItem> = by_name
            .into_values()
            .map(|(pack, version_count)| PackListItem {
                pack,
                version_count,
            })
            .collect();
        items.sort_by(|a, b| a.pack.name.cmp(&b.pack.name));
        items
    }

    /// Case-insensitive substring search on name; latest per unique name
    pub fn search(&self, query: &str) -> Vec<PackListItem> {
        let needle = query.to_lowercase();
        self.list()
            .into_iter()
            .filter(|item| item.pack.name.to_lowercase().contains(&needle))
            .collect()
    }

    /// Packs whose runtime tag can run on the given node runtime
    pub fn compatible_with(&self, runtime: RuntimeType) -> Vec<PackListItem> {
        self.list()
            .into_iter()
            .filter(|item| item.pack.runtime_tag.compatible_with(runtime))
            .collect()
    }
}

fn not_found(pack_id: &str) -> OpError {
    OpError::new(
        ErrorCode::PackNotFound,
        format!("pack '{}' not found", pack_id),
    )
}

fn owner_only(owner: &str) -> OpError {
    OpError::new(
        ErrorCode::Forbidden,
        format!("only the owner '{}' may modify this pack", owner),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> PackRegistry {
        PackRegistry::new(Arc::new(ClusterState::new()), PackRegistryConfig::default())
    }

    fn register_input(name: &str, version: &str) -> RegisterPackInput {
        RegisterPackInput {
            name: name.to_string(),
            version: version.to_string(),
            runtime_tag: RuntimeTag::Node,
            description: None,
            metadata: HashMap::new(),
            bundle_ext: None,
        }
    }

    #[test]
    fn test_register_bundle_path_layout() {
        let reg = registry();
        let registered = reg
            .register(register_input("analytics", "1.2.3"), "alice")
            .unwrap();

        assert_eq!(
            registered.pack.bundle_path,
            "packs/analytics/1.2.3/bundle.tgz"
        );
        assert_eq!(
            registered.upload_url,
            "upload://packs/analytics/1.2.3/bundle.tgz"
        );
    }

    #[test]
    fn test_register_custom_ext_and_url_hook() {
        let reg = PackRegistry::new(
            Arc::new(ClusterState::new()),
            PackRegistryConfig {
                upload_url: Arc::new(|p| format!("https://store.example/{}", p.id)),
                default_bundle_ext: "tgz".to_string(),
            },
        );

        let mut input = register_input("analytics", "1.0.0");
        input.bundle_ext = Some("zip".to_string());
        let registered = reg.register(input, "alice").unwrap();

        assert_eq!(
            registered.pack.bundle_path,
            "packs/analytics/1.0.0/bundle.zip"
        );
        assert!(registered.upload_url.starts_with("https://store.example/"));
    }

    #[test]
    fn test_register_duplicate_version_fails() {
        let reg = registry();
        reg.register(register_input("analytics", "1.0.0"), "alice")
            .unwrap();

        let err = reg
            .register(register_input("analytics", "1.0.0"), "bob")
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::VersionExists);
    }

    #[test]
    fn test_register_malformed_version_fails() {
        let reg = registry();
        let err = reg
            .register(register_input("analytics", "1.0"), "alice")
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);
    }

    #[test]
    fn test_update_owner_check() {
        let reg = registry();
        let pack = reg
            .register(register_input("analytics", "1.0.0"), "alice")
            .unwrap()
            .pack;

        let err = reg
            .update(&pack.id, UpdatePackInput::default(), "bob")
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::Forbidden);

        let updated = reg
            .update(
                &pack.id,
                UpdatePackInput {
                    description: Some(Some("event analytics".to_string())),
                    metadata: None,
                },
                "alice",
            )
            .unwrap();
        assert_eq!(updated.description.as_deref(), Some("event analytics"));
    }

    #[test]
    fn test_delete_all_versions_requires_full_ownership() {
        let reg = registry();
        reg.register(register_input("analytics", "1.0.0"), "alice")
            .unwrap();
        reg.register(register_input("analytics", "2.0.0"), "bob")
            .unwrap();

        let err = reg.delete_all_versions("analytics", "alice").unwrap_err();
        assert_eq!(err.code, ErrorCode::Forbidden);

        // After bob hands over his version, alice can clear the name
        let bobs = reg.find_version("analytics", "2.0.0").unwrap();
        reg.delete(&bobs.id, "bob").unwrap();
        assert_eq!(reg.delete_all_versions("analytics", "alice").unwrap(), 1);
        assert!(reg.versions_of("analytics").is_empty());
    }

    #[test]
    fn test_list_latest_per_name() {
        let reg = registry();
        reg.register(register_input("analytics", "1.9.0"), "alice")
            .unwrap();
        reg.register(register_input("analytics", "1.10.0"), "alice")
            .unwrap();
        reg.register(register_input("billing", "0.1.0"), "alice")
            .unwrap();

        let items = reg.list();
        assert_eq!(items.len(), 2);

        let analytics = items.iter().find(|i| i.pack.name == "analytics").unwrap();
        // Numeric segment ordering: 1.10.0 > 1.9.0
        assert_eq!(analytics.pack.version, "1.10.0");
        assert_eq!(analytics.version_count, 2);
    }

    #[test]
    fn test_search_case_insensitive() {
        let reg = registry();
        reg.register(register_input("Analytics-Service", "1.0.0"), "alice")
            .unwrap();
        reg.register(register_input("billing", "1.0.0"), "alice")
            .unwrap();

        let hits = reg.search("ANALYT");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].pack.name, "Analytics-Service");
    }

    #[test]
    fn test_latest_version() {
        let reg = registry();
        assert!(reg.latest_version("analytics").is_none());

        reg.register(register_input("analytics", "1.2.0"), "alice")
            .unwrap();
        reg.register(register_input("analytics", "1.10.0"), "alice")
            .unwrap();
        assert_eq!(reg.latest_version("analytics").unwrap().version, "1.10.0");
    }

    #[test]
    fn test_versions_sorted_descending() {
        let reg = registry();
        for v in ["1.0.0", "1.2.0", "1.10.0", "1.9.0"] {
            reg.register(register_input("analytics", v), "alice")
                .unwrap();
        }

        let versions: Vec<String> = reg
            .versions_of("analytics")
            .into_iter()
            .map(|p| p.version)
            .collect();
        assert_eq!(versions, vec!["1.10.0", "1.9.0", "1.2.0", "1.0.0"]);
    }
}
