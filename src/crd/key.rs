//! # Key
//!
//! A deploy key for a Repository. The keypair lives in a Kubernetes Secret;
//! the public half is registered on the forge.

use super::status::{Phase, StatusObject};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Key Custom Resource Definition
///
/// # Example
///
/// ```yaml
/// apiVersion: forge.microscaler.io/v1alpha1
/// kind: Key
/// metadata:
///   name: widgets-deploy
///   namespace: default
/// spec:
///   repositoryRef: widgets
///   readOnly: true
///   secretTemplate:
///     targetNamespace: ci
///     labels:
///       app: builder
/// ```
#[derive(CustomResource, Debug, Clone, PartialEq, Deserialize, Serialize, JsonSchema)]
#[kube(
    kind = "Key",
    group = "forge.microscaler.io",
    version = "v1alpha1",
    namespaced,
    status = "KeyStatus",
    shortname = "fkey",
    printcolumn = r#"{"name":"Phase", "type":"string", "jsonPath":".status.phase"}, {"name":"Repository", "type":"string", "jsonPath":".spec.repositoryRef"}, {"name":"ReadOnly", "type":"boolean", "jsonPath":".spec.readOnly"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct KeySpec {
    /// Grant read-only access to the repository
    #[serde(default)]
    pub read_only: bool,
    /// Name of a Repository in the same namespace
    pub repository_ref: String,
    /// Shape of the Secret holding the keypair
    #[serde(default)]
    pub secret_template: SecretTemplate,
}

/// Template for the generated Secret
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SecretTemplate {
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
    /// Namespace for the Secret; defaults to the Key's namespace.
    /// Secrets outside the Key's namespace carry no owner reference.
    #[serde(default)]
    pub target_namespace: Option<String>,
    /// Name for the Secret; defaults to the Key's name
    #[serde(default)]
    pub name_override: Option<String>,
}

/// Observed state of a Key
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct KeyStatus {
    #[serde(default)]
    pub phase: Option<Phase>,
    /// Deploy key settings page on the forge
    #[serde(default)]
    pub url: String,
    /// Remote key id; zero when no remote key is tracked
    #[serde(default, rename = "remoteKeyID")]
    pub remote_key_id: i64,
    /// Repository holding the tracked remote key
    #[serde(default)]
    pub remote_repository: String,
    /// Organization holding the tracked remote key
    #[serde(default)]
    pub remote_organization: String,
    /// OpenSSH public key; must match `identity.pub` in the Secret
    #[serde(default)]
    pub public_key: String,
}

impl KeyStatus {
    /// Whether the status names a complete remote location for the key
    pub fn tracks_remote_key(&self) -> bool {
        self.remote_key_id != 0
            && !self.remote_repository.is_empty()
            && !self.remote_organization.is_empty()
    }
}

impl Key {
    pub fn phase(&self) -> Option<Phase> {
        self.status.as_ref().and_then(|status| status.phase)
    }
}

impl StatusObject for Key {
    type Status = KeyStatus;

    fn current_status(&self) -> Option<&KeyStatus> {
        self.status.as_ref()
    }

    fn status_entry(&mut self) -> &mut KeyStatus {
        self.status.get_or_insert_with(KeyStatus::default)
    }
}
