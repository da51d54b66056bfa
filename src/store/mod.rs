//! # Resource Store
//!
//! Optimistic-concurrency access to namespaced resources.
//!
//! The reconcilers never talk to the Kubernetes API directly; they go through
//! [`Store`], which has two implementations:
//!
//! - [`KubeStore`]: the Kubernetes API server, via `kube::Api`
//! - `MemoryStore`: an in-process store with resourceVersion checks, built
//!   for tests only (`test-util` feature)

mod kubernetes;
#[cfg(any(test, feature = "test-util"))]
mod memory;

pub use self::kubernetes::KubeStore;
#[cfg(any(test, feature = "test-util"))]
pub use self::memory::{MemoryStore, StoreWrite, WriteKind};

use async_trait::async_trait;
use thiserror::Error;

/// Errors surfaced by a [`Store`]
#[derive(Debug, Error)]
pub enum StoreError {
    /// The object changed since it was read
    #[error("{kind} {namespace}/{name} was modified concurrently")]
    Conflict {
        kind: String,
        namespace: String,
        name: String,
    },
    /// Create found an existing object with the same name
    #[error("{kind} {namespace}/{name} already exists")]
    AlreadyExists {
        kind: String,
        namespace: String,
        name: String,
    },
    /// Update targeted an object that no longer exists
    #[error("{kind} {namespace}/{name} not found")]
    NotFound {
        kind: String,
        namespace: String,
        name: String,
    },
    /// The object is missing a metadata field required for the operation
    #[error("object is missing metadata.{0}")]
    MissingMetadata(&'static str),
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] ::kube::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict { .. })
    }
}

/// Get / update / update-status / create / delete over one resource kind
///
/// `update` and `update_status` are conditional on the object's
/// `metadata.resourceVersion`; a stale version yields [`StoreError::Conflict`].
#[async_trait]
pub trait Store<K>: Send + Sync
where
    K: Send + Sync + 'static,
{
    /// Fetch an object, `None` when it does not exist
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<K>, StoreError>;

    /// Replace metadata and spec; status is ignored
    async fn update(&self, object: &K) -> Result<K, StoreError>;

    /// Replace the status subresource
    async fn update_status(&self, object: &K) -> Result<K, StoreError>;

    /// Create a new object
    async fn create(&self, object: &K) -> Result<K, StoreError>;

    /// Request deletion of an object; an absent object counts as deleted
    async fn delete(&self, namespace: &str, name: &str) -> Result<(), StoreError>;
}

/// Namespace and name of an object, or the missing field
pub(crate) fn object_key<K: ::kube::Resource>(object: &K) -> Result<(String, String), StoreError> {
    let meta = object.meta();
    let namespace = meta
        .namespace
        .clone()
        .ok_or(StoreError::MissingMetadata("namespace"))?;
    let name = meta.name.clone().ok_or(StoreError::MissingMetadata("name"))?;
    Ok((namespace, name))
}
