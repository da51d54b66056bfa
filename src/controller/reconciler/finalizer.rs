//! # Finalizers
//!
//! Attach and detach per-kind finalizers through the conflict-retrying update.

use super::status::{update_object, RetryPolicy, UpdateOutcome};
use crate::store::{Store, StoreError};
use kube::Resource;

pub fn has_finalizer<K: Resource>(object: &K, finalizer: &str) -> bool {
    object
        .meta()
        .finalizers
        .as_ref()
        .is_some_and(|finalizers| finalizers.iter().any(|f| f == finalizer))
}

/// Add `finalizer` unless already present
pub async fn add_finalizer<K>(
    store: &dyn Store<K>,
    namespace: &str,
    name: &str,
    finalizer: &str,
    retry: RetryPolicy,
) -> Result<UpdateOutcome<K>, StoreError>
where
    K: Resource + Clone + Send + Sync + 'static,
{
    update_object(store, namespace, name, retry, |object: &mut K| {
        if has_finalizer(object, finalizer) {
            return false;
        }
        object
            .meta_mut()
            .finalizers
            .get_or_insert_with(Vec::new)
            .push(finalizer.to_string());
        true
    })
    .await
}

/// Remove `finalizer` if present
pub async fn remove_finalizer<K>(
    store: &dyn Store<K>,
    namespace: &str,
    name: &str,
    finalizer: &str,
    retry: RetryPolicy,
) -> Result<UpdateOutcome<K>, StoreError>
where
    K: Resource + Clone + Send + Sync + 'static,
{
    update_object(store, namespace, name, retry, |object: &mut K| {
        if !has_finalizer(object, finalizer) {
            return false;
        }
        if let Some(finalizers) = object.meta_mut().finalizers.as_mut() {
            finalizers.retain(|f| f != finalizer);
        }
        true
    })
    .await
}
