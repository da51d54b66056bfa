//! # Kubernetes Store
//!
//! [`Store`] backed by the Kubernetes API server.

use super::{object_key, Store, StoreError};
use crate::constants::FIELD_MANAGER;
use async_trait::async_trait;
use kube::api::{Api, DeleteParams, Patch, PatchParams, PostParams};
use kube::{Client, Resource};
use k8s_openapi::NamespaceResourceScope;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;
use tracing::debug;

/// Store that reads and writes through `kube::Api`
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl std::fmt::Debug for KubeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeStore").finish_non_exhaustive()
    }
}

impl KubeStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api<K>(&self, namespace: &str) -> Api<K>
    where
        K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>,
    {
        Api::namespaced(self.client.clone(), namespace)
    }
}

/// Map a 409 from the API server to the store's own conflict variants
fn classify<K>(error: kube::Error, namespace: &str, name: &str, on_conflict: ConflictMeaning) -> StoreError
where
    K: Resource<DynamicType = ()>,
{
    match error {
        kube::Error::Api(response) if response.code == 409 => {
            let kind = K::kind(&()).to_string();
            let namespace = namespace.to_string();
            let name = name.to_string();
            match on_conflict {
                ConflictMeaning::StaleVersion => StoreError::Conflict {
                    kind,
                    namespace,
                    name,
                },
                ConflictMeaning::AlreadyExists => StoreError::AlreadyExists {
                    kind,
                    namespace,
                    name,
                },
            }
        }
        kube::Error::Api(response) if response.code == 404 => StoreError::NotFound {
            kind: K::kind(&()).to_string(),
            namespace: namespace.to_string(),
            name: name.to_string(),
        },
        other => StoreError::Kube(other),
    }
}

#[derive(Debug, Clone, Copy)]
enum ConflictMeaning {
    StaleVersion,
    AlreadyExists,
}

#[async_trait]
impl<K> Store<K> for KubeStore
where
    K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
        + Clone
        + Debug
        + Serialize
        + DeserializeOwned
        + Send
        + Sync
        + 'static,
{
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<K>, StoreError> {
        Ok(self.api::<K>(namespace).get_opt(name).await?)
    }

    async fn update(&self, object: &K) -> Result<K, StoreError> {
        let (namespace, name) = object_key(object)?;
        if object.meta().resource_version.is_none() {
            return Err(StoreError::MissingMetadata("resourceVersion"));
        }
        self.api::<K>(&namespace)
            .replace(&name, &PostParams::default(), object)
            .await
            .map_err(|e| classify::<K>(e, &namespace, &name, ConflictMeaning::StaleVersion))
    }

    async fn update_status(&self, object: &K) -> Result<K, StoreError> {
        let (namespace, name) = object_key(object)?;
        let resource_version = object
            .meta()
            .resource_version
            .clone()
            .ok_or(StoreError::MissingMetadata("resourceVersion"))?;
        let mut value = serde_json::to_value(object)?;
        let status = value
            .get_mut("status")
            .map(serde_json::Value::take)
            .unwrap_or(serde_json::Value::Null);

        // A merge patch carrying metadata.resourceVersion is rejected with 409
        // when the stored version differs.
        let patch = serde_json::json!({
            "metadata": { "resourceVersion": resource_version },
            "status": status,
        });
        debug!(
            kind = %K::kind(&()),
            namespace = %namespace,
            name = %name,
            "patching status"
        );
        self.api::<K>(&namespace)
            .patch_status(&name, &PatchParams::apply(FIELD_MANAGER), &Patch::Merge(patch))
            .await
            .map_err(|e| classify::<K>(e, &namespace, &name, ConflictMeaning::StaleVersion))
    }

    async fn create(&self, object: &K) -> Result<K, StoreError> {
        let (namespace, name) = object_key(object)?;
        self.api::<K>(&namespace)
            .create(&PostParams::default(), object)
            .await
            .map_err(|e| classify::<K>(e, &namespace, &name, ConflictMeaning::AlreadyExists))
    }

    async fn delete(&self, namespace: &str, name: &str) -> Result<(), StoreError> {
        match self
            .api::<K>(namespace)
            .delete(name, &DeleteParams::default())
            .await
        {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(response)) if response.code == 404 => {
                debug!(kind = %K::kind(&()), namespace, name, "already deleted");
                Ok(())
            }
            Err(e) => Err(StoreError::Kube(e)),
        }
    }
}
