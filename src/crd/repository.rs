//! # Repository
//!
//! A repository on the forge, declared in the cluster.

use super::status::{Phase, StatusObject};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Repository Custom Resource Definition
///
/// # Example
///
/// ```yaml
/// apiVersion: forge.microscaler.io/v1alpha1
/// kind: Repository
/// metadata:
///   name: widgets
///   namespace: default
/// spec:
///   organization: acme
///   description: Widget service
///   settings:
///     private: true
///     issues: true
/// ```
#[derive(CustomResource, Debug, Clone, PartialEq, Deserialize, Serialize, JsonSchema)]
#[kube(
    kind = "Repository",
    group = "forge.microscaler.io",
    version = "v1alpha1",
    namespaced,
    status = "RepositoryStatus",
    shortname = "repo",
    printcolumn = r#"{"name":"Phase", "type":"string", "jsonPath":".status.phase"}, {"name":"URL", "type":"string", "jsonPath":".status.url"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct RepositorySpec {
    /// Organization (or user) owning the repository on the forge
    pub organization: String,
    /// Repository description
    #[serde(default)]
    pub description: String,
    /// Homepage where documentation can be found
    #[serde(default)]
    pub homepage: String,
    /// Repository feature settings
    #[serde(default)]
    pub settings: RepositorySettings,
}

/// Repository feature settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RepositorySettings {
    /// Create a private repository
    #[serde(default)]
    pub private: bool,
    /// Enable issues
    #[serde(default)]
    pub issues: bool,
    /// Enable projects
    #[serde(default)]
    pub projects: bool,
    /// Enable the wiki
    #[serde(default)]
    pub wiki: bool,
    /// Mark the repository as a template
    #[serde(default)]
    pub template: bool,
}

/// Observed state of a Repository
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryStatus {
    #[serde(default)]
    pub phase: Option<Phase>,
    /// Web URL of the remote repository
    #[serde(default)]
    pub url: String,
    /// Forks when last synced
    #[serde(default)]
    pub fork_count: i64,
    /// Stars when last synced
    #[serde(default)]
    pub stargazers_count: i64,
    /// Watchers when last synced
    #[serde(default)]
    pub watchers_count: i64,
}

impl Repository {
    pub fn phase(&self) -> Option<Phase> {
        self.status.as_ref().and_then(|status| status.phase)
    }
}

impl StatusObject for Repository {
    type Status = RepositoryStatus;

    fn current_status(&self) -> Option<&RepositoryStatus> {
        self.status.as_ref()
    }

    fn status_entry(&mut self) -> &mut RepositoryStatus {
        self.status.get_or_insert_with(RepositoryStatus::default)
    }
}
