//! Pack resources - immutable, versioned code artifacts
//!
//! A Pack is the deployable unit of the cluster: a versioned bundle that
//! pods are instantiated from. Pack bodies are immutable; only the
//! description and metadata may change after registration, and only by the
//! owner.

pub mod registry;
pub mod semver;

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use registry::{
    PackRegistry, PackRegistryConfig, RegisterPackInput, RegisteredPack, UpdatePackInput,
    UploadUrlFn,
};
pub use semver::{compare_versions, is_valid_version};

/// Runtime a pack is built for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeTag {
    /// Runs only on node-runtime workers
    Node,
    /// Runs only on browser-runtime workers
    Browser,
    /// Runs on any worker runtime
    Universal,
}

impl RuntimeTag {
    /// Whether a pack with this tag can run on a worker of the given runtime
    pub fn compatible_with(&self, runtime: crate::node::RuntimeType) -> bool {
        match self {
            RuntimeTag::Universal => true,
            RuntimeTag::Node => runtime == crate::node::RuntimeType::Node,
            RuntimeTag::Browser => runtime == crate::node::RuntimeType::Browser,
        }
    }
}

/// An immutable, versioned code artifact
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pack {
    /// Opaque unique id
    pub id: String,

    /// Pack name; `(name, version)` is unique across the registry
    pub name: String,

    /// Semantic version (`MAJOR.MINOR.PATCH[-pre][+build]`)
    pub version: String,

    /// Runtime the bundle targets
    pub runtime_tag: RuntimeTag,

    /// User that registered this pack version
    pub owner_id: String,

    /// Deterministic artifact-store path (`packs/<name>/<version>/bundle.<ext>`)
    pub bundle_path: String,

    /// Optional human-readable description (mutable)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Free-form metadata (mutable)
    #[serde(default)]
    pub metadata: HashMap<String, String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Listing entry: the latest version of a name plus how many versions exist
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackListItem {
    /// The latest version of this pack name
    #[serde(flatten)]
    pub pack: Pack,

    /// Number of registered versions under this name
    pub version_count: usize,
}
