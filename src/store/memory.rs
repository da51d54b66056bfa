//! # Memory Store
//!
//! In-process [`Store`] with the same optimistic-concurrency rules as the
//! API server:
//!
//! - every write bumps `metadata.resourceVersion`, stale writes get a conflict
//! - `update` never touches status, `update_status` only touches status
//! - an object with a deletion timestamp disappears once its finalizers are gone
//!
//! It also records every write, and can hide freshly created objects from a
//! number of reads to mimic a lagging informer cache.

use super::{object_key, Store, StoreError};
use async_trait::async_trait;
use kube::Resource;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Kind of write recorded by [`MemoryStore`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteKind {
    Create,
    Update,
    UpdateStatus,
    Delete,
}

/// One write that went through the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreWrite {
    pub kind: WriteKind,
    pub resource_kind: String,
    pub namespace: String,
    pub name: String,
}

type ObjectKey = (String, String, String);

#[derive(Debug, Default)]
struct Inner {
    objects: HashMap<ObjectKey, Value>,
    version: u64,
    writes: Vec<StoreWrite>,
    hidden_reads: HashMap<ObjectKey, u32>,
    create_read_lag: u32,
    injected_status_conflicts: u32,
}

impl Inner {
    fn next_version(&mut self) -> String {
        self.version += 1;
        self.version.to_string()
    }

    /// Remove the object, or stamp it for deletion while finalizers remain.
    /// `false` when it does not exist.
    fn mark_deleted(&mut self, key: &ObjectKey) -> bool {
        let Some(mut value) = self.objects.get(key).cloned() else {
            return false;
        };
        if !has_finalizers(&value) {
            self.objects.remove(key);
            self.hidden_reads.remove(key);
            return true;
        }
        if !is_set(&value, "deletionTimestamp") {
            let now = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
            set_metadata(&mut value, "deletionTimestamp", json!(now));
            let version = self.next_version();
            set_metadata(&mut value, "resourceVersion", json!(version));
            self.objects.insert(key.clone(), value);
        }
        true
    }

    fn record(&mut self, kind: WriteKind, key: &ObjectKey) {
        self.writes.push(StoreWrite {
            kind,
            resource_kind: key.0.clone(),
            namespace: key.1.clone(),
            name: key.2.clone(),
        });
    }
}

/// In-memory store for any namespaced resource kind
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

fn key_for<K: Resource<DynamicType = ()>>(namespace: &str, name: &str) -> ObjectKey {
    (
        K::kind(&()).to_string(),
        namespace.to_string(),
        name.to_string(),
    )
}

fn stored_version(value: &Value) -> Option<&str> {
    value
        .get("metadata")
        .and_then(|meta| meta.get("resourceVersion"))
        .and_then(Value::as_str)
}

fn is_set(value: &Value, field: &str) -> bool {
    value
        .get("metadata")
        .and_then(|meta| meta.get(field))
        .is_some_and(|v| !v.is_null())
}

fn has_finalizers(value: &Value) -> bool {
    value
        .get("metadata")
        .and_then(|meta| meta.get("finalizers"))
        .and_then(Value::as_array)
        .is_some_and(|finalizers| !finalizers.is_empty())
}

fn set_metadata(value: &mut Value, field: &str, field_value: Value) {
    if let Some(meta) = value.get_mut("metadata").and_then(Value::as_object_mut) {
        meta.insert(field.to_string(), field_value);
    } else if let Some(object) = value.as_object_mut() {
        object.insert("metadata".to_string(), json!({ field: field_value }));
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Seed an object without recording a write
    pub fn insert<K>(&self, object: &K) -> Result<K, StoreError>
    where
        K: Resource<DynamicType = ()> + Serialize + DeserializeOwned,
    {
        let (namespace, name) = object_key(object)?;
        let key = key_for::<K>(&namespace, &name);
        let mut value = serde_json::to_value(object)?;
        let mut inner = self.lock();
        let version = inner.next_version();
        set_metadata(&mut value, "resourceVersion", json!(version));
        if !is_set(&value, "uid") {
            set_metadata(&mut value, "uid", json!(uuid::Uuid::new_v4().to_string()));
        }
        inner.objects.insert(key, value.clone());
        Ok(serde_json::from_value(value)?)
    }

    /// Apply an out-of-band change (status included) without recording a write
    pub fn modify<K, F>(&self, namespace: &str, name: &str, change: F) -> Result<K, StoreError>
    where
        K: Resource<DynamicType = ()> + Serialize + DeserializeOwned,
        F: FnOnce(&mut K),
    {
        let key = key_for::<K>(namespace, name);
        let mut inner = self.lock();
        let stored = inner.objects.get(&key).cloned().ok_or_else(|| StoreError::NotFound {
            kind: key.0.clone(),
            namespace: namespace.to_string(),
            name: name.to_string(),
        })?;
        let mut object: K = serde_json::from_value(stored)?;
        change(&mut object);
        let mut value = serde_json::to_value(&object)?;
        let version = inner.next_version();
        set_metadata(&mut value, "resourceVersion", json!(version));
        inner.objects.insert(key, value.clone());
        Ok(serde_json::from_value(value)?)
    }

    /// Mark an object for deletion without recording a write; it is removed
    /// at once when it has no finalizers
    pub fn request_deletion<K>(&self, namespace: &str, name: &str) -> Result<(), StoreError>
    where
        K: Resource<DynamicType = ()>,
    {
        let key = key_for::<K>(namespace, name);
        if self.lock().mark_deleted(&key) {
            return Ok(());
        }
        Err(StoreError::NotFound {
            kind: key.0,
            namespace: namespace.to_string(),
            name: name.to_string(),
        })
    }

    /// Drop an object immediately, ignoring finalizers
    pub fn remove<K>(&self, namespace: &str, name: &str) -> bool
    where
        K: Resource<DynamicType = ()>,
    {
        self.lock()
            .objects
            .remove(&key_for::<K>(namespace, name))
            .is_some()
    }

    /// Whether an object exists, regardless of read lag
    pub fn contains<K>(&self, namespace: &str, name: &str) -> bool
    where
        K: Resource<DynamicType = ()>,
    {
        self.lock()
            .objects
            .contains_key(&key_for::<K>(namespace, name))
    }

    /// Hide every object created from now on for `reads` subsequent gets
    pub fn set_create_read_lag(&self, reads: u32) {
        self.lock().create_read_lag = reads;
    }

    /// Fail the next `count` status updates with a conflict
    pub fn inject_status_conflicts(&self, count: u32) {
        self.lock().injected_status_conflicts = count;
    }

    /// Writes recorded so far
    pub fn writes(&self) -> Vec<StoreWrite> {
        self.lock().writes.clone()
    }

    pub fn clear_writes(&self) {
        self.lock().writes.clear();
    }
}

#[async_trait]
impl<K> Store<K> for MemoryStore
where
    K: Resource<DynamicType = ()> + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<K>, StoreError> {
        let key = key_for::<K>(namespace, name);
        let mut inner = self.lock();
        if let Some(remaining) = inner.hidden_reads.get_mut(&key) {
            if *remaining > 0 {
                *remaining -= 1;
                return Ok(None);
            }
        }
        match inner.objects.get(&key) {
            Some(value) => Ok(Some(serde_json::from_value(value.clone())?)),
            None => Ok(None),
        }
    }

    async fn update(&self, object: &K) -> Result<K, StoreError> {
        let (namespace, name) = object_key(object)?;
        let key = key_for::<K>(&namespace, &name);
        let requested_version = object
            .meta()
            .resource_version
            .clone()
            .ok_or(StoreError::MissingMetadata("resourceVersion"))?;

        let mut inner = self.lock();
        let stored = inner.objects.get(&key).cloned().ok_or_else(|| StoreError::NotFound {
            kind: key.0.clone(),
            namespace: namespace.clone(),
            name: name.clone(),
        })?;
        if stored_version(&stored) != Some(requested_version.as_str()) {
            return Err(StoreError::Conflict {
                kind: key.0.clone(),
                namespace,
                name,
            });
        }

        let mut value = serde_json::to_value(object)?;
        if let Some(fields) = value.as_object_mut() {
            match stored.get("status") {
                Some(status) => fields.insert("status".to_string(), status.clone()),
                None => fields.remove("status"),
            };
        }
        for owned_by_server in ["uid", "deletionTimestamp"] {
            if let Some(field) = stored.get("metadata").and_then(|meta| meta.get(owned_by_server)) {
                set_metadata(&mut value, owned_by_server, field.clone());
            }
        }
        let version = inner.next_version();
        set_metadata(&mut value, "resourceVersion", json!(version));
        inner.record(WriteKind::Update, &key);

        if is_set(&value, "deletionTimestamp") && !has_finalizers(&value) {
            inner.objects.remove(&key);
        } else {
            inner.objects.insert(key, value.clone());
        }
        Ok(serde_json::from_value(value)?)
    }

    async fn update_status(&self, object: &K) -> Result<K, StoreError> {
        let (namespace, name) = object_key(object)?;
        let key = key_for::<K>(&namespace, &name);
        let requested_version = object
            .meta()
            .resource_version
            .clone()
            .ok_or(StoreError::MissingMetadata("resourceVersion"))?;

        let mut inner = self.lock();
        let mut stored = inner.objects.get(&key).cloned().ok_or_else(|| StoreError::NotFound {
            kind: key.0.clone(),
            namespace: namespace.clone(),
            name: name.clone(),
        })?;
        if inner.injected_status_conflicts > 0
            || stored_version(&stored) != Some(requested_version.as_str())
        {
            inner.injected_status_conflicts = inner.injected_status_conflicts.saturating_sub(1);
            return Err(StoreError::Conflict {
                kind: key.0.clone(),
                namespace,
                name,
            });
        }

        let status = serde_json::to_value(object)?
            .get("status")
            .cloned()
            .unwrap_or(Value::Null);
        if let Some(fields) = stored.as_object_mut() {
            fields.insert("status".to_string(), status);
        }
        let version = inner.next_version();
        set_metadata(&mut stored, "resourceVersion", json!(version));
        inner.record(WriteKind::UpdateStatus, &key);
        inner.objects.insert(key, stored.clone());
        Ok(serde_json::from_value(stored)?)
    }

    async fn create(&self, object: &K) -> Result<K, StoreError> {
        let (namespace, name) = object_key(object)?;
        let key = key_for::<K>(&namespace, &name);

        let mut inner = self.lock();
        if inner.objects.contains_key(&key) {
            return Err(StoreError::AlreadyExists {
                kind: key.0.clone(),
                namespace,
                name,
            });
        }
        let mut value = serde_json::to_value(object)?;
        let version = inner.next_version();
        set_metadata(&mut value, "resourceVersion", json!(version));
        set_metadata(&mut value, "uid", json!(uuid::Uuid::new_v4().to_string()));
        inner.record(WriteKind::Create, &key);
        if inner.create_read_lag > 0 {
            let lag = inner.create_read_lag;
            inner.hidden_reads.insert(key.clone(), lag);
        }
        inner.objects.insert(key, value.clone());
        Ok(serde_json::from_value(value)?)
    }

    async fn delete(&self, namespace: &str, name: &str) -> Result<(), StoreError> {
        let key = key_for::<K>(namespace, name);
        let mut inner = self.lock();
        if inner.mark_deleted(&key) {
            inner.record(WriteKind::Delete, &key);
        }
        Ok(())
    }
}
