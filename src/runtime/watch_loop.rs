//! # Watch Loop
//!
//! Runs one `kube_runtime::Controller` per resource kind until a shutdown signal.
//!
//! The Key controller also watches:
//! - Secrets it owns, so a deleted or edited Secret re-triggers its Key
//! - Repositories, mapped to the Keys in the same namespace that reference
//!   them, so Keys proceed as soon as their Repository is Synced

use crate::controller::reconciler::{reconcile_key, reconcile_repository, Reconciler};
use crate::crd::{Key, Repository};
use crate::runtime::error_policy::{handle_key_error, handle_repository_error};
use anyhow::Result;
use futures::StreamExt;
use k8s_openapi::api::core::v1::Secret;
use kube::{Api, Client, ResourceExt};
use kube_runtime::reflector::{ObjectRef, Store};
use kube_runtime::{watcher, Controller};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Keys in the Repository's namespace whose `repositoryRef` names it
pub fn keys_for_repository(keys: &Store<Key>, repository: &Repository) -> Vec<ObjectRef<Key>> {
    let namespace = repository.namespace();
    let name = repository.name_any();
    keys.state()
        .iter()
        .filter(|key| key.namespace() == namespace && key.spec.repository_ref == name)
        .map(|key| ObjectRef::from_obj(&**key))
        .collect()
}

/// Run the Repository and Key controllers until shutdown
pub async fn run_watch_loop(client: Client, reconciler: Arc<Reconciler>) -> Result<()> {
    let repositories: Api<Repository> = Api::all(client.clone());
    let keys: Api<Key> = Api::all(client.clone());
    let secrets: Api<Secret> = Api::all(client);

    let repository_controller = Controller::new(repositories.clone(), watcher::Config::default())
        .shutdown_on_signal()
        .run(
            reconcile_repository,
            handle_repository_error,
            Arc::clone(&reconciler),
        )
        .for_each(|result| async move {
            match result {
                Ok((object, action)) => debug!("Reconciled Repository {}: {:?}", object, action),
                Err(e) => warn!("Repository controller error: {}", e),
            }
        });

    let key_controller = Controller::new(keys, watcher::Config::default());
    let key_cache = key_controller.store();
    let key_controller = key_controller
        .owns(secrets, watcher::Config::default())
        .watches(
            repositories,
            watcher::Config::default(),
            move |repository: Repository| keys_for_repository(&key_cache, &repository),
        )
        .shutdown_on_signal()
        .run(reconcile_key, handle_key_error, reconciler)
        .for_each(|result| async move {
            match result {
                Ok((object, action)) => debug!("Reconciled Key {}: {:?}", object, action),
                Err(e) => warn!("Key controller error: {}", e),
            }
        });

    futures::join!(repository_controller, key_controller);
    info!("Controllers stopped");
    Ok(())
}
