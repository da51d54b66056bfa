//! # Status Management
//!
//! Conflict-retrying read-modify-write helpers.
//!
//! Every write re-reads the latest object, applies the change to a copy and
//! writes it conditionally on the read resourceVersion. A conflict sleeps and
//! retries with a fresh read, up to a bounded number of attempts. Writes that
//! would not change anything are skipped, which keeps synced resources from
//! generating watch events.

use crate::config::ControllerConfig;
use crate::crd::StatusObject;
use crate::store::{Store, StoreError};
use kube::{Resource, ResourceExt};
use std::time::Duration;
use tracing::{debug, warn};

/// Attempts and spacing for conflict retries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub interval: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &ControllerConfig) -> Self {
        Self {
            attempts: config.status_update_attempts.max(1),
            interval: config.status_update_interval(),
        }
    }
}

/// Result of a conditional write
#[derive(Debug)]
pub enum UpdateOutcome<K> {
    /// The write went through
    Updated(K),
    /// Nothing changed, no write was issued
    Unchanged(K),
    /// The object no longer exists
    Gone,
}

impl<K> UpdateOutcome<K> {
    pub fn is_gone(&self) -> bool {
        matches!(self, UpdateOutcome::Gone)
    }
}

/// Apply `mutate` to the latest status of an object and write it back
///
/// # Errors
///
/// Returns the store error once retries are exhausted, or immediately for
/// anything other than a conflict.
pub async fn update_status<K, F>(
    store: &dyn Store<K>,
    namespace: &str,
    name: &str,
    retry: RetryPolicy,
    mut mutate: F,
) -> Result<UpdateOutcome<K>, StoreError>
where
    K: StatusObject + Resource + Clone + Send + Sync + 'static,
    F: FnMut(&mut K::Status) + Send,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        let Some(current) = store.get(namespace, name).await? else {
            warn!(namespace, name, "object disappeared before its status could be written");
            return Ok(UpdateOutcome::Gone);
        };

        let mut desired = current.clone();
        mutate(desired.status_entry());
        if desired.current_status() == current.current_status() {
            debug!(namespace, name, "status unchanged, skipping write");
            return Ok(UpdateOutcome::Unchanged(current));
        }

        match store.update_status(&desired).await {
            Ok(updated) => return Ok(UpdateOutcome::Updated(updated)),
            Err(StoreError::NotFound { .. }) => {
                warn!(namespace, name, "object disappeared while its status was written");
                return Ok(UpdateOutcome::Gone);
            }
            Err(err) if err.is_conflict() && attempt < retry.attempts => {
                debug!(namespace, name, attempt, "status write conflicted, retrying");
                tokio::time::sleep(retry.interval).await;
            }
            Err(err) => return Err(err),
        }
    }
}

/// Apply `mutate` to the latest metadata/spec of an object and write it back
///
/// `mutate` returns whether it changed anything; `false` skips the write.
///
/// # Errors
///
/// Same as [`update_status`].
pub async fn update_object<K, F>(
    store: &dyn Store<K>,
    namespace: &str,
    name: &str,
    retry: RetryPolicy,
    mut mutate: F,
) -> Result<UpdateOutcome<K>, StoreError>
where
    K: Resource + Clone + Send + Sync + 'static,
    F: FnMut(&mut K) -> bool + Send,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        let Some(mut object) = store.get(namespace, name).await? else {
            warn!(namespace, name, "object disappeared before it could be updated");
            return Ok(UpdateOutcome::Gone);
        };

        if !mutate(&mut object) {
            debug!(namespace, name = %object.name_any(), "object unchanged, skipping write");
            return Ok(UpdateOutcome::Unchanged(object));
        }

        match store.update(&object).await {
            Ok(updated) => return Ok(UpdateOutcome::Updated(updated)),
            Err(StoreError::NotFound { .. }) => {
                warn!(namespace, name, "object disappeared while it was updated");
                return Ok(UpdateOutcome::Gone);
            }
            Err(err) if err.is_conflict() && attempt < retry.attempts => {
                debug!(namespace, name, attempt, "update conflicted, retrying");
                tokio::time::sleep(retry.interval).await;
            }
            Err(err) => return Err(err),
        }
    }
}
